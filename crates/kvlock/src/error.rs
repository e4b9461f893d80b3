//! Lock error types

use kvlock_store::StoreError;

/// Error type for lock operations
///
/// Contention is never an error: blocking operations keep polling and
/// `try_*` operations report it as `Ok(false)`.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// The underlying store call failed. Never retried by the lock itself.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The stored token is not ours: the lease expired and may have been
    /// taken by another holder.
    #[error("lock '{key}' already released or acquired by someone else")]
    OwnershipConflict { key: String },

    #[error("lock operation cancelled")]
    Cancelled,

    #[error("lock operation deadline exceeded")]
    DeadlineExceeded,

    #[error("invalid lock configuration: {0}")]
    InvalidConfig(String),
}

impl LockError {
    /// Whether the error came from the caller's context rather than the lock.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, LockError::Cancelled | LockError::DeadlineExceeded)
    }

    pub fn is_ownership_conflict(&self) -> bool {
        matches!(self, LockError::OwnershipConflict { .. })
    }
}

pub type Result<T> = std::result::Result<T, LockError>;
