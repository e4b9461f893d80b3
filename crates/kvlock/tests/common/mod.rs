//! Shared fixtures for kvlock integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Once;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use kvlock::{CompareOutcome, MemoryStore, Store, StoreError};

static TRACING: Once = Once::new();

/// Install a test-friendly subscriber once per test binary (RUST_LOG to tune)
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

pub fn memory_store() -> Arc<dyn Store> {
    init_tracing();
    Arc::new(MemoryStore::new())
}

/// Store wrapper that can be switched into a failing mode and counts calls
pub struct FlakyStore {
    inner: MemoryStore,
    failing: AtomicBool,
    failing_reads: AtomicBool,
    calls: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Arc<Self> {
        init_tracing();
        Arc::new(Self {
            inner: MemoryStore::new(),
            failing: AtomicBool::new(false),
            failing_reads: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Fail only `get`, leaving writes and compare-and-act calls working
    pub fn set_failing_reads(&self, failing: bool) {
        self.failing_reads.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for FlakyStore {
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> kvlock_store::Result<bool> {
        self.enter()?;
        self.inner.set_if_absent(key, value, ttl).await
    }

    async fn get(&self, key: &str) -> kvlock_store::Result<Option<String>> {
        self.enter()?;
        if self.failing_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Timeout);
        }
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> kvlock_store::Result<bool> {
        self.enter()?;
        self.inner.delete(key).await
    }

    async fn increment(&self, key: &str) -> kvlock_store::Result<i64> {
        self.enter()?;
        self.inner.increment(key).await
    }

    async fn decrement(&self, key: &str) -> kvlock_store::Result<i64> {
        self.enter()?;
        self.inner.decrement(key).await
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> kvlock_store::Result<CompareOutcome> {
        self.enter()?;
        self.inner.delete_if_equals(key, expected).await
    }

    async fn expire_if_equals(
        &self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> kvlock_store::Result<CompareOutcome> {
        self.enter()?;
        self.inner.expire_if_equals(key, expected, ttl).await
    }

    async fn increment_unless_present(
        &self,
        counter: &str,
        guard: &str,
    ) -> kvlock_store::Result<Option<i64>> {
        self.enter()?;
        self.inner.increment_unless_present(counter, guard).await
    }

    async fn ttl(&self, key: &str) -> kvlock_store::Result<Option<Duration>> {
        self.enter()?;
        self.inner.ttl(key).await
    }
}

/// Store that applies `set_if_absent` immediately but delays its reply
pub struct SlowStore {
    inner: MemoryStore,
    reply_delay: Duration,
}

impl SlowStore {
    pub fn new(reply_delay: Duration) -> Arc<Self> {
        init_tracing();
        Arc::new(Self {
            inner: MemoryStore::new(),
            reply_delay,
        })
    }
}

#[async_trait]
impl Store for SlowStore {
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> kvlock_store::Result<bool> {
        let written = self.inner.set_if_absent(key, value, ttl).await;
        tokio::time::sleep(self.reply_delay).await;
        written
    }

    async fn get(&self, key: &str) -> kvlock_store::Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> kvlock_store::Result<bool> {
        self.inner.delete(key).await
    }

    async fn increment(&self, key: &str) -> kvlock_store::Result<i64> {
        self.inner.increment(key).await
    }

    async fn decrement(&self, key: &str) -> kvlock_store::Result<i64> {
        self.inner.decrement(key).await
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> kvlock_store::Result<CompareOutcome> {
        self.inner.delete_if_equals(key, expected).await
    }

    async fn expire_if_equals(
        &self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> kvlock_store::Result<CompareOutcome> {
        self.inner.expire_if_equals(key, expected, ttl).await
    }

    async fn increment_unless_present(
        &self,
        counter: &str,
        guard: &str,
    ) -> kvlock_store::Result<Option<i64>> {
        self.inner.increment_unless_present(counter, guard).await
    }

    async fn ttl(&self, key: &str) -> kvlock_store::Result<Option<Duration>> {
        self.inner.ttl(key).await
    }
}
