//! Lock traits

use std::future::Future;

use async_trait::async_trait;
use tracing::warn;

use crate::context::LockContext;
use crate::error::Result;

/// An exclusive lock
#[async_trait]
pub trait Locker: Send + Sync {
    /// Block until acquired or the context ends
    async fn acquire(&self, ctx: &LockContext) -> Result<()>;

    /// One acquisition attempt
    async fn try_acquire(&self, ctx: &LockContext) -> Result<bool>;

    /// Release; absent is a no-op, a foreign holder an ownership conflict
    async fn release(&self, ctx: &LockContext) -> Result<()>;
}

/// A reader/writer lock
#[async_trait]
pub trait RwLocker: Send + Sync {
    async fn read_lock(&self, ctx: &LockContext) -> Result<()>;

    async fn read_unlock(&self, ctx: &LockContext) -> Result<()>;

    async fn write_lock(&self, ctx: &LockContext) -> Result<()>;

    async fn write_unlock(&self, ctx: &LockContext) -> Result<()>;
}

/// Run `critical` while holding `lock`.
///
/// `ctx` bounds the acquisition only; the release runs unbound so that a
/// section cut short by cancellation still gives the lock back. The lock is
/// released even if `critical` fails. A failed release is reported in
/// preference to the section's own result: an ownership conflict means the
/// section may not have been protected for its whole duration.
pub async fn with_lock<L, F, Fut, T>(lock: &L, ctx: &LockContext, critical: F) -> Result<T>
where
    L: Locker + ?Sized,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    lock.acquire(ctx).await?;
    let outcome = critical().await;

    if let Err(e) = lock.release(&LockContext::background()).await {
        if let Err(inner) = &outcome {
            warn!(error = %inner, "Critical section failed before the release error");
        }
        return Err(e);
    }
    outcome
}
