//! Store error types

/// Failure of a store primitive.
///
/// Every variant means the store could not answer the request. Contention
/// (a key already being set) is never reported through this type.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store request timed out")]
    Timeout,

    #[error("value at '{key}' is not an integer")]
    NotAnInteger { key: String },

    #[error("increment or decrement of '{key}' would overflow")]
    Overflow { key: String },

    #[error("invalid expire time for '{key}'")]
    InvalidTtl { key: String },

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
