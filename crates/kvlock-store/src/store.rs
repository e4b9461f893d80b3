//! The store contract shared by every lock type.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// Outcome of a compare-and-act primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOutcome {
    /// The key held the expected value and the action was applied.
    Matched,
    /// The key did not exist (never set, deleted, or expired).
    Absent,
    /// The key exists with a different value; nothing was changed.
    Mismatch,
}

/// Shared, atomic key-value substrate.
///
/// Each call must be atomic on its own. Nothing is assumed about atomicity
/// across two calls, which is why the compare-and-act operations below exist:
/// an implementation has to evaluate each of them as one unit on the server
/// (a script, a transaction, or a single critical section).
///
/// Counters live in the same keyspace as plain values and are stored as
/// decimal strings, so `get` on a counter key returns e.g. `Some("2")`.
#[async_trait]
pub trait Store: Send + Sync {
    /// Set `key` to `value` with expiry `ttl` only if `key` does not exist.
    ///
    /// Returns whether the value was written.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;

    /// Current value of `key`, or `None` if it does not exist.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Remove `key` unconditionally. Returns whether a key was removed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Add one to the integer at `key`, creating it at 0 first if absent.
    async fn increment(&self, key: &str) -> Result<i64>;

    /// Subtract one from the integer at `key`, creating it at 0 first if absent.
    async fn decrement(&self, key: &str) -> Result<i64>;

    /// Delete `key` only if it currently holds `expected`.
    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<CompareOutcome>;

    /// Reset the expiry of `key` to `ttl` only if it currently holds `expected`.
    async fn expire_if_equals(
        &self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> Result<CompareOutcome>;

    /// Increment `counter` only while `guard` does not exist.
    ///
    /// Returns the new counter value, or `None` if `guard` was present and
    /// the counter was left untouched.
    async fn increment_unless_present(&self, counter: &str, guard: &str) -> Result<Option<i64>>;

    /// Remaining time to live of `key`.
    ///
    /// `None` when the key is absent or has no expiry.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>>;
}
