//! Property-based tests for cache serialization.
//!
//! These tests use proptest to verify that serialization properties hold
//! for randomly generated inputs, catching edge cases that example-based
//! tests might miss.
//!
//! # Properties Tested
//!
//! 1. **Roundtrip Property**: deserialize(serialize(x)) == x for ANY x
//! 2. **Determinism Property**: serialize(x) == serialize(x) always
//! 3. **Envelope Property**: All serialized data has correct magic + version
//! 4. **Corruption Property**: Mangled envelopes never decode successfully

use herd_cache::serialization::{
    deserialize_from_cache, serialize_for_cache, CacheEnvelope, CACHE_MAGIC,
    CURRENT_SCHEMA_VERSION,
};
use proptest::prelude::*;
use serde::{Deserialize, Serialize};

// ============================================================================
// Test Values with Arbitrary Implementations
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Profile {
    id: u64,
    name: String,
    email: String,
    active: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Listing {
    id: String,
    title: String,
    tags: Vec<String>,
    score: i64,
    visible: bool,
}

/// Generate arbitrary Profile with any valid values
fn arb_profile() -> impl Strategy<Value = Profile> {
    (
        any::<u64>(),
        any::<String>(),
        any::<String>(),
        any::<bool>(),
    )
        .prop_map(|(id, name, email, active)| Profile {
            id,
            name,
            email,
            active,
        })
}

/// Generate arbitrary Listing, including empty and unicode-heavy strings
fn arb_listing() -> impl Strategy<Value = Listing> {
    (
        any::<String>(),
        any::<String>(),
        proptest::collection::vec(any::<String>(), 0..8),
        any::<i64>(),
        any::<bool>(),
    )
        .prop_map(|(id, title, tags, score, visible)| Listing {
            id,
            title,
            tags,
            score,
            visible,
        })
}

proptest! {
    #[test]
    fn prop_profile_roundtrip(profile in arb_profile()) {
        let bytes = serialize_for_cache(&profile).expect("Serialization should succeed");
        let decoded: Profile = deserialize_from_cache(&bytes).expect("Deserialization should succeed");
        prop_assert_eq!(profile, decoded);
    }

    #[test]
    fn prop_listing_roundtrip(listing in arb_listing()) {
        let bytes = serialize_for_cache(&listing).expect("Serialization should succeed");
        let decoded: Listing = deserialize_from_cache(&bytes).expect("Deserialization should succeed");
        prop_assert_eq!(listing, decoded);
    }

    #[test]
    fn prop_string_values_roundtrip(value in any::<String>()) {
        // The engine caches whole values; plain strings are the common case.
        let bytes = serialize_for_cache(&value).expect("Serialization should succeed");
        let decoded: String = deserialize_from_cache(&bytes).expect("Deserialization should succeed");
        prop_assert_eq!(value, decoded);
    }

    #[test]
    fn prop_serialization_is_deterministic(profile in arb_profile()) {
        let first = serialize_for_cache(&profile).expect("Serialization should succeed");
        let second = serialize_for_cache(&profile).expect("Serialization should succeed");
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_envelope_carries_magic_and_version(profile in arb_profile()) {
        let bytes = serialize_for_cache(&profile).expect("Serialization should succeed");
        let envelope: CacheEnvelope<Profile> =
            postcard::from_bytes(&bytes).expect("Envelope should decode");
        prop_assert_eq!(envelope.magic, CACHE_MAGIC);
        prop_assert_eq!(envelope.version, CURRENT_SCHEMA_VERSION);
        prop_assert_eq!(envelope.payload, profile);
    }

    #[test]
    fn prop_wrong_version_always_rejected(profile in arb_profile(), version in 2u32..) {
        let mut envelope = CacheEnvelope::new(&profile);
        envelope.version = version;
        let bytes = postcard::to_allocvec(&envelope).expect("Encoding should succeed");

        let result: Result<Profile, _> = deserialize_from_cache(&bytes);
        prop_assert!(result.is_err());
    }

    #[test]
    fn prop_truncated_bytes_never_decode(profile in arb_profile(), cut in 1usize..16) {
        let bytes = serialize_for_cache(&profile).expect("Serialization should succeed");
        if bytes.len() > cut {
            let truncated = &bytes[..bytes.len() - cut];
            let result: Result<Profile, _> = deserialize_from_cache(truncated);
            prop_assert!(result.is_err());
        }
    }
}
