//! Shared state store
//!
//! The store is the single shared mutable resource in the gateway: profiles,
//! assignments, leases, audit records, completion counters and rate windows
//! all live here, and every transient record is deleted by store-managed TTL
//! rather than explicit teardown.
//!
//! [`StateStore`] is an injected capability with atomic compound operations:
//! `window_add` runs trim + count + add + refresh-TTL as one unit, `incr` and
//! `set_nx` are single atomic steps. Components never coordinate with each
//! other directly, only through these primitives.

pub mod keys;
pub mod memory;

pub use memory::{spawn_sweep_task, MemoryStore, StoreStats};

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Error types for store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store unreachable or refusing connections
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Operation exceeded its deadline
    #[error("store operation timed out after {0} ms")]
    Timeout(u64),

    /// Counter key holds a non-integer value
    #[error("value at key '{0}' is not an integer")]
    NotAnInteger(String),
}

/// Key-value store with per-key TTL and atomic compound operations
///
/// Implementations must guarantee that each method executes atomically with
/// respect to concurrent calls on the same key.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Get the value at `key`, or `None` if absent or expired
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Set `key` to `value`, expiring after `ttl`
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError>;

    /// Set `key` only if absent (first write wins). Returns whether the
    /// write happened. Used for idempotent submission records.
    async fn set_nx(&self, key: &str, value: String, ttl: Duration) -> Result<bool, StoreError>;

    /// Remove `key`. Returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Increment the integer at `key` by one, creating it at 1 if absent.
    /// Existing expiry is preserved. Returns the new value.
    async fn incr(&self, key: &str) -> Result<i64, StoreError>;

    /// Sliding-window compound operation: drop window members with
    /// timestamp <= `now - window_secs`, count the survivors, add a member
    /// at `now`, and refresh the key's TTL to `window_secs` - all as one
    /// atomic unit. Returns the count BEFORE the add.
    ///
    /// Members form a set of integer-second timestamps, so two calls within
    /// the same second collapse to one member.
    async fn window_add(&self, key: &str, now: u64, window_secs: u64)
        -> Result<u64, StoreError>;
}
