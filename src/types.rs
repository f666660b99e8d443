//! Shared error types
//!
//! Component boundaries resolve every failure into a [`GateError`] before it
//! crosses into the HTTP layer. Absence (missing profile, missing assignment,
//! no matching tasks) is modeled with `Option`/empty collections, never as an
//! error variant.

use thiserror::Error;

use crate::store::StoreError;

/// Gateway-level error, produced at component boundaries
#[derive(Debug, Error)]
pub enum GateError {
    /// Shared state store failed (timeout, unavailable)
    #[error("state store error: {0}")]
    Store(#[from] StoreError),

    /// Record could not be encoded/decoded
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// Task catalog failed or timed out
    #[error("task catalog error: {0}")]
    Catalog(String),

    /// Startup configuration is invalid
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GateError>;

impl GateError {
    /// Whether the caller may retry the request unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, GateError::Store(_) | GateError::Catalog(_))
    }
}
