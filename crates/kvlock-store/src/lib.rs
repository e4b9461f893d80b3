//! kvlock store - the key-value substrate behind kvlock
//!
//! This crate provides:
//! - The `Store` contract: set-if-absent with TTL, get, delete, counters
//! - Compare-and-act primitives the lock protocol relies on for atomicity
//! - `MemoryStore`, an in-process implementation with TTL expiry

pub mod error;
pub mod memory;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use store::{CompareOutcome, Store};
