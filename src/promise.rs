//! Single-assignment pending results.
//!
//! A [`PendingResult`] fans one computation's outcome out to every caller
//! coalesced onto the same key. It is a last-value channel with a
//! write-once discipline: the first `resolve`/`fail` wins, later attempts
//! are ignored, and every observer (past or future) sees the same terminal
//! outcome.

use crate::error::Error;
use std::sync::Arc;
use tokio::sync::watch;

/// Terminal outcome of a computation generation.
///
/// `Ok(None)` is a legal resolution: the computation produced "no value",
/// which is still fanned out to all observers (and never written to the
/// backend).
pub type Outcome<V> = std::result::Result<Option<V>, Error>;

/// A single-assignment, multi-observer result container.
///
/// Cloning is cheap (one `Arc` bump) and clones share the same slot: any
/// clone may complete it, any clone may await it. An instance evicted from
/// a promise table stays fully functional for holders of a clone; the table
/// only ever held one of many references.
pub struct PendingResult<V> {
    tx: Arc<watch::Sender<Option<Outcome<V>>>>,
}

impl<V> Clone for PendingResult<V> {
    fn clone(&self) -> Self {
        PendingResult {
            tx: Arc::clone(&self.tx),
        }
    }
}

impl<V: Clone> PendingResult<V> {
    /// Create a new pending (non-terminal) result.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        PendingResult { tx: Arc::new(tx) }
    }

    /// Resolve with a value (or the "no value" outcome).
    ///
    /// Returns true if this call performed the assignment, false if the
    /// result was already terminal.
    pub fn resolve(&self, value: Option<V>) -> bool {
        self.complete(Ok(value))
    }

    /// Fail with an error, waking all observers with the same error.
    ///
    /// Returns true if this call performed the assignment.
    pub fn fail(&self, error: Error) -> bool {
        self.complete(Err(error))
    }

    /// Assign the terminal outcome; first writer wins.
    pub fn complete(&self, outcome: Outcome<V>) -> bool {
        let mut first = false;
        self.tx.send_if_modified(|slot| {
            if slot.is_none() {
                *slot = Some(outcome);
                first = true;
                true
            } else {
                false
            }
        });
        first
    }

    /// Non-blocking view of the outcome, if terminal.
    pub fn peek(&self) -> Option<Outcome<V>> {
        self.tx.borrow().clone()
    }

    /// Whether the result has been assigned.
    pub fn is_terminal(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Await the terminal outcome.
    ///
    /// Completes immediately if already terminal. Any number of concurrent
    /// waiters receive clones of the same outcome.
    pub async fn wait(&self) -> Outcome<V> {
        let mut rx = self.tx.subscribe();
        loop {
            {
                let current = rx.borrow_and_update();
                if let Some(outcome) = current.as_ref() {
                    return outcome.clone();
                }
            }
            if rx.changed().await.is_err() {
                // The sender lives inside self, so this is unreachable while
                // a waiter exists; degrade instead of spinning.
                return Err(Error::Other("pending result abandoned".to_string()));
            }
        }
    }
}

impl<V: Clone> Default for PendingResult<V> {
    fn default() -> Self {
        Self::new()
    }
}
