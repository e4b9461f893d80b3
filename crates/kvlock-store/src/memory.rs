// In-memory atomic key-value store
// Serializes every primitive behind one keyspace mutex, the way a single-threaded server would

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::{Result, StoreError};
use crate::store::{CompareOutcome, Store};

/// A stored value with its optional expiry
#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

type Keyspace = HashMap<String, Entry>;

/// Shortest sweep period; `tokio::time::interval` rejects zero
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// Expiry instant for a lease of `ttl` starting at `now`.
///
/// A zero TTL is rejected like a `PX 0` request. A TTL too large to be
/// represented never expires.
fn expiry(key: &str, now: Instant, ttl: Duration) -> Result<Option<Instant>> {
    if ttl.is_zero() {
        return Err(StoreError::InvalidTtl {
            key: key.to_string(),
        });
    }
    Ok(now.checked_add(ttl))
}

/// Look up a live entry, purging it first if it has expired.
fn live_entry<'a>(entries: &'a mut Keyspace, key: &str, now: Instant) -> Option<&'a mut Entry> {
    if entries.get(key).is_some_and(|e| e.is_expired(now)) {
        entries.remove(key);
        return None;
    }
    entries.get_mut(key)
}

/// Remove every expired entry, returning how many were purged.
fn purge_expired(entries: &mut Keyspace, now: Instant) -> usize {
    let before = entries.len();
    entries.retain(|_, e| !e.is_expired(now));
    before - entries.len()
}

/// In-process implementation of [`Store`].
///
/// Expired entries are dropped lazily whenever they are touched. A background
/// sweeper can additionally be started with [`MemoryStore::with_expiry_sweep`]
/// so that keys nobody reads again do not accumulate.
pub struct MemoryStore {
    entries: Arc<Mutex<Keyspace>>,
    sweeper: Option<JoinHandle<()>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            sweeper: None,
        }
    }

    /// Start a background task purging expired entries every `interval`.
    ///
    /// Must be called from within a tokio runtime. The task stops when the
    /// store is dropped. Intervals below one millisecond are raised to it.
    pub fn with_expiry_sweep(mut self, interval: Duration) -> Self {
        let interval = interval.max(MIN_SWEEP_INTERVAL);
        let entries = self.entries.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let purged = purge_expired(&mut entries.lock(), Instant::now());
                if purged > 0 {
                    debug!(count = purged, "Purged expired store entries");
                }
            }
        });

        if let Some(previous) = self.sweeper.replace(handle) {
            previous.abort();
        }
        info!(interval_ms = interval.as_millis() as u64, "Memory store expiry sweep started");
        self
    }

    /// Number of live (unexpired) keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .values()
            .filter(|e| !e.is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn add(&self, key: &str, delta: i64) -> Result<i64> {
        let mut entries = self.entries.lock();
        let now = Instant::now();

        match live_entry(&mut entries, key, now) {
            Some(entry) => {
                let next = apply_delta(key, &entry.value, delta)?;
                entry.value = next.to_string();
                Ok(next)
            }
            None => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        value: delta.to_string(),
                        expires_at: None,
                    },
                );
                Ok(delta)
            }
        }
    }
}

impl Drop for MemoryStore {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.take() {
            handle.abort();
        }
    }
}

fn apply_delta(key: &str, current: &str, delta: i64) -> Result<i64> {
    let current: i64 = current.parse().map_err(|_| StoreError::NotAnInteger {
        key: key.to_string(),
    })?;
    current.checked_add(delta).ok_or_else(|| StoreError::Overflow {
        key: key.to_string(),
    })
}

#[async_trait]
impl Store for MemoryStore {
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        let expires_at = expiry(key, now, ttl)?;

        if live_entry(&mut entries, key, now).is_some() {
            return Ok(false);
        }

        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(true)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.lock();
        Ok(live_entry(&mut entries, key, Instant::now()).map(|e| e.value.clone()))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        Ok(entries.remove(key).is_some_and(|e| !e.is_expired(now)))
    }

    async fn increment(&self, key: &str) -> Result<i64> {
        self.add(key, 1)
    }

    async fn decrement(&self, key: &str) -> Result<i64> {
        self.add(key, -1)
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<CompareOutcome> {
        let mut entries = self.entries.lock();

        let outcome = match live_entry(&mut entries, key, Instant::now()) {
            None => CompareOutcome::Absent,
            Some(entry) if entry.value == expected => CompareOutcome::Matched,
            Some(_) => CompareOutcome::Mismatch,
        };

        if outcome == CompareOutcome::Matched {
            entries.remove(key);
        }
        Ok(outcome)
    }

    async fn expire_if_equals(
        &self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> Result<CompareOutcome> {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        let expires_at = expiry(key, now, ttl)?;

        Ok(match live_entry(&mut entries, key, now) {
            None => CompareOutcome::Absent,
            Some(entry) if entry.value == expected => {
                entry.expires_at = expires_at;
                CompareOutcome::Matched
            }
            Some(_) => CompareOutcome::Mismatch,
        })
    }

    async fn increment_unless_present(&self, counter: &str, guard: &str) -> Result<Option<i64>> {
        // The guard check and the increment share one critical section.
        let mut entries = self.entries.lock();
        let now = Instant::now();

        if live_entry(&mut entries, guard, now).is_some() {
            return Ok(None);
        }

        let next = match live_entry(&mut entries, counter, now) {
            Some(entry) => {
                let next = apply_delta(counter, &entry.value, 1)?;
                entry.value = next.to_string();
                next
            }
            None => {
                entries.insert(
                    counter.to_string(),
                    Entry {
                        value: "1".to_string(),
                        expires_at: None,
                    },
                );
                1
            }
        };
        Ok(Some(next))
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        Ok(live_entry(&mut entries, key, now)
            .and_then(|e| e.expires_at)
            .map(|at| at.saturating_duration_since(now)))
    }
}
