//! In-process state store
//!
//! Thread-safe implementation of [`StateStore`] over `DashMap`. A DashMap
//! entry guard gives exclusive access to one key, so the compound operations
//! (`window_add`, `incr`, `set_nx`) execute as single atomic units without a
//! global lock.
//!
//! Expiry is checked lazily on every read and enforced in bulk by a periodic
//! sweep task; the sweep reclaims memory but is never load-bearing for
//! correctness.

use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::{StateStore, StoreError};

/// Value entry with optional expiry
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Rate window entry: a set of integer-second timestamps
#[derive(Default)]
struct RateWindow {
    stamps: BTreeSet<u64>,
    expires_at: Option<Instant>,
}

/// Store statistics
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct StoreStats {
    /// Live value entries
    pub entries: usize,
    /// Live rate windows
    pub rate_windows: usize,
    /// Read hits
    pub hits: u64,
    /// Read misses
    pub misses: u64,
    /// Entries reclaimed after TTL expiry
    pub expirations: u64,
}

/// In-memory [`StateStore`] with per-key TTL
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
    windows: DashMap<String, RateWindow>,
    hits: AtomicU64,
    misses: AtomicU64,
    expirations: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            windows: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    /// Remove all expired entries and rate windows.
    ///
    /// Returns (expired entries, expired windows).
    pub fn sweep(&self) -> (usize, usize) {
        let now = Instant::now();

        let before_entries = self.entries.len();
        self.entries.retain(|_, e| !e.is_expired(now));
        let expired_entries = before_entries - self.entries.len();

        let before_windows = self.windows.len();
        self.windows
            .retain(|_, w| !w.expires_at.is_some_and(|at| now >= at));
        let expired_windows = before_windows - self.windows.len();

        if expired_entries + expired_windows > 0 {
            self.expirations
                .fetch_add((expired_entries + expired_windows) as u64, Ordering::Relaxed);
            debug!(
                entries = expired_entries,
                windows = expired_windows,
                "Swept expired store entries"
            );
        }

        (expired_entries, expired_windows)
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            entries: self.entries.len(),
            rate_windows: self.windows.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl StateStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(Instant::now()) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Some(entry.value.clone()));
            }
            drop(entry);
            self.entries.remove(key);
            self.expirations.fetch_add(1, Ordering::Relaxed);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: String, ttl: Duration) -> Result<bool, StoreError> {
        let now = Instant::now();
        match self.entries.entry(key.to_string()) {
            MapEntry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    // Expired entry counts as absent
                    occupied.insert(Entry {
                        value,
                        expires_at: Some(now + ttl),
                    });
                    self.expirations.fetch_add(1, Ordering::Relaxed);
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            MapEntry::Vacant(vacant) => {
                vacant.insert(Entry {
                    value,
                    expires_at: Some(now + ttl),
                });
                Ok(true)
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        let now = Instant::now();
        match self.entries.entry(key.to_string()) {
            MapEntry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                if entry.is_expired(now) {
                    // Expired counter restarts at 1 with no expiry, as a
                    // freshly created counter would
                    entry.value = "1".to_string();
                    entry.expires_at = None;
                    return Ok(1);
                }
                let current: i64 = entry
                    .value
                    .parse()
                    .map_err(|_| StoreError::NotAnInteger(key.to_string()))?;
                let next = current + 1;
                entry.value = next.to_string();
                Ok(next)
            }
            MapEntry::Vacant(vacant) => {
                vacant.insert(Entry {
                    value: "1".to_string(),
                    expires_at: None,
                });
                Ok(1)
            }
        }
    }

    async fn window_add(
        &self,
        key: &str,
        now: u64,
        window_secs: u64,
    ) -> Result<u64, StoreError> {
        // The entry guard holds the shard lock for the whole compound
        // operation: trim + count + add + refresh-TTL cannot interleave with
        // another request on the same key.
        let mut window = self.windows.entry(key.to_string()).or_default();

        let window_start = now.saturating_sub(window_secs);
        window.stamps.retain(|&stamp| stamp > window_start);
        let count_before = window.stamps.len() as u64;
        window.stamps.insert(now);
        window.expires_at = Some(Instant::now() + Duration::from_secs(window_secs));

        Ok(count_before)
    }
}

/// Spawn a background task that periodically sweeps expired entries
pub fn spawn_sweep_task(store: Arc<MemoryStore>, interval: Duration) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let (entries, windows) = store.sweep();
            if entries + windows > 0 {
                debug!(entries, windows, "Store sweep completed");
            }
        }
    });

    info!(interval_secs = interval.as_secs(), "Store sweep task started");
}
