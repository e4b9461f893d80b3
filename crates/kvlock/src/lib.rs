//! kvlock - distributed locks over a shared atomic key-value store
//!
//! This crate provides:
//! - `Mutex`: exclusive lock (set-if-absent + ownership token + TTL)
//! - `RwMutex`: reader/writer lock (reader counter + exclusive write slot)
//! - `LockContext` / `CancelSignal`: cancellation and deadlines for every wait
//! - `LockOptions` / `LockConfig`: lease TTL and retry policy, loadable from
//!   config files and environment
//!
//! Coordination happens entirely in the store (see `kvlock_store::Store`);
//! lock instances hold no shared local state. Leases are not renewed
//! automatically and no fencing token is issued: callers must keep critical
//! sections well inside the TTL, or call `extend` while working.

pub mod context;
pub mod error;
mod lease;
pub mod locker;
pub mod metrics;
pub mod mutex;
pub mod options;
pub mod retry;
pub mod rwmutex;
pub mod token;

pub use context::{CancelSignal, LockContext};
pub use error::{LockError, Result};
pub use locker::{Locker, RwLocker, with_lock};
pub use self::metrics::describe_metrics;
pub use mutex::Mutex;
pub use options::{DEFAULT_TTL, LockConfig, LockOptions};
pub use retry::{DEFAULT_RETRY_INTERVAL, RetryPolicy};
pub use rwmutex::{RwKeys, RwMutex};
pub use token::Token;

pub use kvlock_store::{CompareOutcome, MemoryStore, Store, StoreError};
