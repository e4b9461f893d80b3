//! Exclusive lock over a single store key

use std::sync::Arc;

use async_trait::async_trait;
use kvlock_store::Store;

use crate::context::LockContext;
use crate::error::Result;
use crate::lease::Lease;
use crate::locker::Locker;
use crate::metrics::LockKind;
use crate::options::LockOptions;
use crate::token::Token;

/// Distributed exclusive lock.
///
/// Each instance generates its own random token at construction, so two
/// instances on the same key are always distinct owners, even inside one
/// process. The lock holds no local state besides that token: all exclusion
/// is delegated to the store.
///
/// The held entry expires after [`LockOptions::ttl`] whether or not the
/// critical section has finished. Call [`Mutex::extend`] periodically for
/// long critical sections.
pub struct Mutex {
    lease: Lease,
}

impl Mutex {
    /// Create a lock on `key` with default options (30s TTL, 100ms polling)
    pub fn new(store: Arc<dyn Store>, key: impl Into<String>) -> Self {
        Self::build(store, key.into(), LockOptions::default())
    }

    /// Create a lock with custom options.
    ///
    /// Fails with [`crate::LockError::InvalidConfig`] if the options do not
    /// pass [`LockOptions::validate`].
    pub fn with_options(
        store: Arc<dyn Store>,
        key: impl Into<String>,
        options: LockOptions,
    ) -> Result<Self> {
        options.validate()?;
        Ok(Self::build(store, key.into(), options))
    }

    fn build(store: Arc<dyn Store>, key: String, options: LockOptions) -> Self {
        Self {
            lease: Lease::new(store, key, Token::generate(), options, LockKind::Mutex),
        }
    }

    pub fn key(&self) -> &str {
        self.lease.key()
    }

    pub fn token(&self) -> &Token {
        self.lease.token()
    }

    pub fn options(&self) -> &LockOptions {
        self.lease.options()
    }

    /// Block until the lock is acquired.
    ///
    /// Store errors are returned immediately. Contention is retried until
    /// the context is cancelled or its deadline passes.
    pub async fn acquire(&self, ctx: &LockContext) -> Result<()> {
        self.lease.acquire(ctx).await
    }

    /// Make exactly one acquisition attempt.
    pub async fn try_acquire(&self, ctx: &LockContext) -> Result<bool> {
        self.lease.try_acquire(ctx).await
    }

    /// Release the lock.
    ///
    /// Releasing a lock that is no longer present (already released or
    /// expired) succeeds. If another token holds the key,
    /// [`crate::LockError::OwnershipConflict`] is returned and the entry is
    /// left untouched.
    pub async fn release(&self, ctx: &LockContext) -> Result<()> {
        self.lease.release(ctx).await
    }

    /// Renew the lease to a full TTL while this instance still holds it.
    pub async fn extend(&self, ctx: &LockContext) -> Result<()> {
        self.lease.extend(ctx).await
    }

    /// Whether the store currently records this instance as the holder.
    pub async fn is_held(&self, ctx: &LockContext) -> Result<bool> {
        self.lease.is_held(ctx).await
    }
}

#[async_trait]
impl Locker for Mutex {
    async fn acquire(&self, ctx: &LockContext) -> Result<()> {
        Mutex::acquire(self, ctx).await
    }

    async fn try_acquire(&self, ctx: &LockContext) -> Result<bool> {
        Mutex::try_acquire(self, ctx).await
    }

    async fn release(&self, ctx: &LockContext) -> Result<()> {
        Mutex::release(self, ctx).await
    }
}
