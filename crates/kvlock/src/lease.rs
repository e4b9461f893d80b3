//! Token-guarded lease on a single store key
//!
//! Shared by [`crate::Mutex`] and the write slot of [`crate::RwMutex`]:
//! - acquire: set-if-absent(key, token, ttl), polled per the retry policy
//! - release: compare-and-delete; absent is a no-op, a foreign token a conflict
//! - extend: compare-and-expire, the explicit renewal hook

use std::sync::Arc;

use kvlock_store::{CompareOutcome, Store};
use tracing::{debug, warn};

use crate::context::LockContext;
use crate::error::{LockError, Result};
use crate::metrics::{self, LockKind};
use crate::options::LockOptions;
use crate::token::Token;

pub(crate) struct Lease {
    store: Arc<dyn Store>,
    key: String,
    token: Token,
    options: LockOptions,
    kind: LockKind,
}

impl Lease {
    pub(crate) fn new(
        store: Arc<dyn Store>,
        key: String,
        token: Token,
        options: LockOptions,
        kind: LockKind,
    ) -> Self {
        Self {
            store,
            key,
            token,
            options,
            kind,
        }
    }

    pub(crate) fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn token(&self) -> &Token {
        &self.token
    }

    pub(crate) fn options(&self) -> &LockOptions {
        &self.options
    }

    /// One set-if-absent attempt.
    ///
    /// If the context ends while the write is in flight, the store may still
    /// have applied it; the key is given back before the error is returned.
    pub(crate) async fn try_acquire(&self, ctx: &LockContext) -> Result<bool> {
        ctx.check()?;

        let reply = ctx
            .run(
                self.store
                    .set_if_absent(&self.key, self.token.as_str(), self.options.ttl),
            )
            .await;
        let acquired = match reply {
            Ok(written) => written?,
            Err(e) => {
                debug!(key = %self.key, error = %e, "Context ended during set-if-absent, giving back lease");
                self.release_detached().await;
                return Err(e);
            }
        };

        if acquired {
            metrics::record_acquire(self.kind);
            debug!(key = %self.key, token = ?self.token, "Lease acquired");
        } else {
            metrics::record_contention(self.kind);
        }
        Ok(acquired)
    }

    /// Poll until acquired, a store error occurs, or the context ends.
    pub(crate) async fn acquire(&self, ctx: &LockContext) -> Result<()> {
        let mut attempt: u32 = 0;
        loop {
            match self.try_acquire(ctx).await {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(e) => return Err(self.observe(e)),
            }

            let delay = self.options.retry.delay(attempt);
            debug!(key = %self.key, attempt, delay_ms = delay.as_millis() as u64, "Lease held elsewhere, retrying");
            if let Err(e) = ctx.sleep(delay).await {
                return Err(self.observe(e));
            }
            attempt = attempt.saturating_add(1);
        }
    }

    /// Delete the key if it still holds our token.
    pub(crate) async fn release(&self, ctx: &LockContext) -> Result<()> {
        let outcome = ctx
            .run(self.store.delete_if_equals(&self.key, self.token.as_str()))
            .await??;
        self.on_release(outcome)
    }

    /// Release without consulting the context.
    ///
    /// Used to give the key back after the context that acquired it has
    /// already ended; errors are only logged.
    pub(crate) async fn release_detached(&self) {
        match self
            .store
            .delete_if_equals(&self.key, self.token.as_str())
            .await
        {
            Ok(outcome) => {
                let _ = self.on_release(outcome);
            }
            Err(e) => warn!(key = %self.key, error = %e, "Failed to give back lease"),
        }
    }

    fn on_release(&self, outcome: CompareOutcome) -> Result<()> {
        match outcome {
            CompareOutcome::Matched => {
                metrics::record_release(self.kind);
                debug!(key = %self.key, "Lease released");
                Ok(())
            }
            CompareOutcome::Absent => {
                debug!(key = %self.key, "Lease already released or expired");
                Ok(())
            }
            CompareOutcome::Mismatch => {
                metrics::record_conflict(self.kind);
                warn!(key = %self.key, "Release refused, lease is held by another token");
                Err(LockError::OwnershipConflict {
                    key: self.key.clone(),
                })
            }
        }
    }

    /// Reset the TTL while our token still holds the key.
    ///
    /// Absent and foreign-token outcomes both mean the lease was lost.
    pub(crate) async fn extend(&self, ctx: &LockContext) -> Result<()> {
        let outcome = ctx
            .run(
                self.store
                    .expire_if_equals(&self.key, self.token.as_str(), self.options.ttl),
            )
            .await??;

        match outcome {
            CompareOutcome::Matched => {
                debug!(key = %self.key, ttl_ms = self.options.ttl.as_millis() as u64, "Lease extended");
                Ok(())
            }
            CompareOutcome::Absent | CompareOutcome::Mismatch => {
                metrics::record_conflict(self.kind);
                warn!(key = %self.key, outcome = ?outcome, "Lease lost before renewal");
                Err(LockError::OwnershipConflict {
                    key: self.key.clone(),
                })
            }
        }
    }

    /// Whether the key currently holds our token.
    pub(crate) async fn is_held(&self, ctx: &LockContext) -> Result<bool> {
        let current = ctx.run(self.store.get(&self.key)).await??;
        Ok(current.as_deref() == Some(self.token.as_str()))
    }

    fn observe(&self, err: LockError) -> LockError {
        if err.is_cancellation() {
            metrics::record_cancelled(self.kind);
            debug!(key = %self.key, error = %err, "Lease wait abandoned");
        }
        err
    }
}
