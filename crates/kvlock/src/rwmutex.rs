//! Distributed reader/writer lock
//!
//! Layout in the store, for a base key `res`:
//! - `res:write`     - write slot, holds the writer's token with a TTL
//! - `res:readcount` - number of admitted readers (plain counter, no TTL)
//! - `res:read`      - reserved; no operation writes it
//!
//! Readers are anonymous: admission increments the counter, release
//! decrements it. A writer first takes the write slot, then waits until the
//! counter drains to zero. Reader admission is a single store-side
//! check-and-increment against the write slot, so no reader is admitted
//! while a writer holds the slot.
//!
//! A reader that crashes between lock and unlock leaves the count inflated.
//! Writers then wait for as long as their context allows; bound `write_lock`
//! with a deadline when that matters.

use std::sync::Arc;

use async_trait::async_trait;
use kvlock_store::{Store, StoreError};
use tracing::{debug, warn};

use crate::context::LockContext;
use crate::error::{LockError, Result};
use crate::lease::Lease;
use crate::locker::RwLocker;
use crate::metrics::{self, LockKind};
use crate::options::LockOptions;
use crate::token::Token;

/// Store keys derived from a reader/writer lock's base key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RwKeys {
    pub write: String,
    pub read: String,
    pub readcount: String,
}

impl RwKeys {
    pub fn new(base: &str) -> Self {
        Self {
            write: format!("{}:write", base),
            read: format!("{}:read", base),
            readcount: format!("{}:readcount", base),
        }
    }
}

/// Distributed reader/writer lock.
///
/// Any number of readers may hold the lock at once; a writer excludes all
/// readers and other writers. The writer identity is supplied by the caller
/// and proves ownership of the write slot on unlock.
pub struct RwMutex {
    store: Arc<dyn Store>,
    keys: RwKeys,
    writer: Lease,
}

impl RwMutex {
    pub fn new(store: Arc<dyn Store>, base_key: &str, writer: impl Into<Token>) -> Self {
        Self::build(store, base_key, writer.into(), LockOptions::default())
    }

    /// Create a lock with custom options, rejecting options that fail
    /// [`LockOptions::validate`].
    pub fn with_options(
        store: Arc<dyn Store>,
        base_key: &str,
        writer: impl Into<Token>,
        options: LockOptions,
    ) -> Result<Self> {
        options.validate()?;
        Ok(Self::build(store, base_key, writer.into(), options))
    }

    /// Same as [`RwMutex::with_options`] with a freshly generated writer token
    pub fn with_random_writer(
        store: Arc<dyn Store>,
        base_key: &str,
        options: LockOptions,
    ) -> Result<Self> {
        Self::with_options(store, base_key, Token::generate(), options)
    }

    fn build(store: Arc<dyn Store>, base_key: &str, writer: Token, options: LockOptions) -> Self {
        let keys = RwKeys::new(base_key);
        let writer = Lease::new(
            store.clone(),
            keys.write.clone(),
            writer,
            options,
            LockKind::Write,
        );
        Self {
            store,
            keys,
            writer,
        }
    }

    pub fn keys(&self) -> &RwKeys {
        &self.keys
    }

    pub fn writer(&self) -> &Token {
        self.writer.token()
    }

    pub fn options(&self) -> &LockOptions {
        self.writer.options()
    }

    /// Wait until no writer holds the slot, then register as a reader.
    pub async fn read_lock(&self, ctx: &LockContext) -> Result<()> {
        let retry = &self.writer.options().retry;
        let mut attempt: u32 = 0;

        loop {
            let admitted = ctx
                .run(
                    self.store
                        .increment_unless_present(&self.keys.readcount, &self.keys.write),
                )
                .await
                .and_then(|r| r.map_err(LockError::from));

            match admitted {
                Ok(Some(readers)) => {
                    metrics::record_acquire(LockKind::Read);
                    debug!(key = %self.keys.readcount, readers, "Read lock acquired");
                    return Ok(());
                }
                Ok(None) => metrics::record_contention(LockKind::Read),
                Err(e) => return Err(observe(LockKind::Read, e)),
            }

            if let Err(e) = ctx.sleep(retry.delay(attempt)).await {
                return Err(observe(LockKind::Read, e));
            }
            attempt = attempt.saturating_add(1);
        }
    }

    /// Deregister one reader.
    ///
    /// Readers carry no identity, so there is no ownership check. An
    /// unmatched release drives the counter negative; that is logged but
    /// not corrected.
    pub async fn read_unlock(&self, ctx: &LockContext) -> Result<()> {
        let readers = ctx.run(self.store.decrement(&self.keys.readcount)).await??;
        metrics::record_release(LockKind::Read);

        if readers < 0 {
            warn!(key = %self.keys.readcount, readers, "Reader count went negative, unmatched read_unlock");
        } else {
            debug!(key = %self.keys.readcount, readers, "Read lock released");
        }
        Ok(())
    }

    /// Take the write slot, then wait for admitted readers to drain.
    ///
    /// If the drain fails (cancellation, deadline, store error) the write
    /// slot is given back before the error is returned, so an abandoned
    /// writer does not block readers until its lease expires.
    pub async fn write_lock(&self, ctx: &LockContext) -> Result<()> {
        self.writer.acquire(ctx).await?;

        if let Err(e) = self.drain_readers(ctx).await {
            self.writer.release_detached().await;
            return Err(observe(LockKind::Write, e));
        }
        debug!(key = %self.keys.write, "Write lock acquired");
        Ok(())
    }

    /// One attempt at the write lock, without waiting for readers.
    ///
    /// Returns `false` if another writer holds the slot or readers are
    /// still admitted; in the latter case the slot is given back.
    pub async fn try_write_lock(&self, ctx: &LockContext) -> Result<bool> {
        if !self.writer.try_acquire(ctx).await? {
            return Ok(false);
        }

        match self.readers(ctx).await {
            Ok(readers) if readers <= 0 => Ok(true),
            Ok(readers) => {
                debug!(key = %self.keys.write, readers, "Readers present, giving back write slot");
                self.writer.release_detached().await;
                Ok(false)
            }
            Err(e) => {
                self.writer.release_detached().await;
                Err(e)
            }
        }
    }

    /// Release the write slot; same contract as [`crate::Mutex::release`].
    pub async fn write_unlock(&self, ctx: &LockContext) -> Result<()> {
        self.writer.release(ctx).await
    }

    /// Renew the write slot lease while this writer still holds it.
    pub async fn extend_write(&self, ctx: &LockContext) -> Result<()> {
        self.writer.extend(ctx).await
    }

    /// Current reader count (0 when the counter does not exist).
    pub async fn readers(&self, ctx: &LockContext) -> Result<i64> {
        let raw = ctx.run(self.store.get(&self.keys.readcount)).await??;
        match raw {
            None => Ok(0),
            Some(value) => value.trim().parse::<i64>().map_err(|_| {
                LockError::Store(StoreError::NotAnInteger {
                    key: self.keys.readcount.clone(),
                })
            }),
        }
    }

    /// Whether this writer currently holds the write slot.
    pub async fn is_write_held(&self, ctx: &LockContext) -> Result<bool> {
        self.writer.is_held(ctx).await
    }

    async fn drain_readers(&self, ctx: &LockContext) -> Result<()> {
        let retry = &self.writer.options().retry;
        let mut attempt: u32 = 0;

        loop {
            let readers = self.readers(ctx).await?;
            if readers <= 0 {
                return Ok(());
            }

            debug!(key = %self.keys.readcount, readers, "Write slot held, waiting for readers");
            ctx.sleep(retry.delay(attempt)).await?;
            attempt = attempt.saturating_add(1);
        }
    }
}

fn observe(kind: LockKind, err: LockError) -> LockError {
    if err.is_cancellation() {
        metrics::record_cancelled(kind);
    }
    err
}

#[async_trait]
impl RwLocker for RwMutex {
    async fn read_lock(&self, ctx: &LockContext) -> Result<()> {
        RwMutex::read_lock(self, ctx).await
    }

    async fn read_unlock(&self, ctx: &LockContext) -> Result<()> {
        RwMutex::read_unlock(self, ctx).await
    }

    async fn write_lock(&self, ctx: &LockContext) -> Result<()> {
        RwMutex::write_lock(self, ctx).await
    }

    async fn write_unlock(&self, ctx: &LockContext) -> Result<()> {
        RwMutex::write_unlock(self, ctx).await
    }
}
