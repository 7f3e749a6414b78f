//! Cache key canonicalization.
//!
//! Every user-supplied key is mapped to a canonical backend key before it
//! touches the promise tables or the remote cache. The mapping is driven by
//! a [`KeyHasher`] and two configuration knobs (`key_prefix`,
//! `hash_key_prefix`); stale-tier entries live at the canonical key behind a
//! namespace prefix.

use std::sync::Arc;

/// Pure key-hashing function, `String -> String`.
///
/// The client does not care which digest is used; plug in xxhash, MD5,
/// SHA-256 or anything else that produces a memcached-safe key. The default
/// [`IdentityHasher`] passes keys through untouched, which is fine for keys
/// that are already short and ASCII-clean.
pub trait KeyHasher: Send + Sync {
    /// Map a user key to its canonical backend form.
    fn hash_key(&self, key: &str) -> String;
}

/// Pass-through hasher (default).
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityHasher;

impl KeyHasher for IdentityHasher {
    fn hash_key(&self, key: &str) -> String {
        key.to_string()
    }
}

/// Builds canonical and stale backend keys from user keys.
///
/// Three prefix policies exist:
///
/// | `key_prefix` | `hash_key_prefix` | canonical key          |
/// |--------------|-------------------|------------------------|
/// | set          | true              | `hash(prefix ‖ key)`   |
/// | set          | false             | `prefix ‖ hash(key)`   |
/// | unset        | —                 | `hash(key)`            |
///
/// The same user key always produces the same canonical key for a given
/// builder; callers rely on this to coalesce concurrent demand.
#[derive(Clone)]
pub struct KeyBuilder {
    hasher: Arc<dyn KeyHasher>,
    prefix: Option<String>,
    hash_prefix: bool,
    stale_prefix: String,
}

impl KeyBuilder {
    pub fn new(
        hasher: Arc<dyn KeyHasher>,
        prefix: Option<String>,
        hash_prefix: bool,
        stale_prefix: String,
    ) -> Self {
        KeyBuilder {
            hasher,
            prefix,
            hash_prefix,
            stale_prefix,
        }
    }

    /// Build the canonical (fresh-tier) backend key for a user key.
    pub fn canonical(&self, user_key: &str) -> String {
        match &self.prefix {
            Some(prefix) if self.hash_prefix => {
                self.hasher.hash_key(&format!("{}{}", prefix, user_key))
            }
            Some(prefix) => format!("{}{}", prefix, self.hasher.hash_key(user_key)),
            None => self.hasher.hash_key(user_key),
        }
    }

    /// Build the stale-tier key for an already-canonical key.
    ///
    /// The only wire-visible contract of the stale tier: entries live at
    /// `stale_prefix ‖ canonical_key`.
    pub fn stale(&self, canonical_key: &str) -> String {
        format!("{}{}", self.stale_prefix, canonical_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Toy digest so prefix-vs-hash ordering is observable in assertions.
    struct RevHasher;

    impl KeyHasher for RevHasher {
        fn hash_key(&self, key: &str) -> String {
            key.chars().rev().collect()
        }
    }

    #[test]
    fn test_identity_hasher_passthrough() {
        assert_eq!(IdentityHasher.hash_key("abc"), "abc");
    }

    #[test]
    fn test_canonical_no_prefix() {
        let builder = KeyBuilder::new(Arc::new(RevHasher), None, false, "stale".to_string());
        assert_eq!(builder.canonical("abc"), "cba");
        // Deterministic across calls
        assert_eq!(builder.canonical("abc"), "cba");
    }

    #[test]
    fn test_canonical_prefix_unhashed() {
        let builder = KeyBuilder::new(
            Arc::new(RevHasher),
            Some("app:".to_string()),
            false,
            "stale".to_string(),
        );
        assert_eq!(builder.canonical("abc"), "app:cba");
        assert_eq!(builder.canonical("abc"), "app:cba");
    }

    #[test]
    fn test_canonical_prefix_hashed() {
        let builder = KeyBuilder::new(
            Arc::new(RevHasher),
            Some("app:".to_string()),
            true,
            "stale".to_string(),
        );
        // hash("app:abc") with the reversing digest
        assert_eq!(builder.canonical("abc"), "cba:ppa");
        assert_eq!(builder.canonical("abc"), "cba:ppa");
    }

    #[test]
    fn test_stale_key_namespacing() {
        let builder = KeyBuilder::new(Arc::new(IdentityHasher), None, false, "stale".to_string());
        let canonical = builder.canonical("user_1");
        assert_eq!(builder.stale(&canonical), "staleuser_1");
    }
}
