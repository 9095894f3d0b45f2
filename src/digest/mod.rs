//! Duplicate-Detection Store
//!
//! Owns all replay-suppression state shared between the packet path and
//! the maintenance tasks:
//!
//! - the local domain's sequence counter (atomic)
//! - a ring of blocked Bloom filter shards; one is writable, all are queried
//! - per-neighbor sequence marks, TTLs and MAC keys
//!
//! ## Locking
//!
//! The shard ring sits behind one `RwLock`: queries take the read lock,
//! inserts and rotation take the write lock, so a query never observes a
//! shard mid-clear. Each neighbor entry has its own `Mutex`; the table
//! itself is behind an `RwLock` that is only write-locked to insert a new
//! neighbor. When both are needed the neighbor lock is taken first.

mod neighbor;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::bloom::{BlockedFilter, BlockedFilterSpec, BloomError, BloomHash};
use crate::config::{Config, ConfigError};
use crate::identity::DomainId;
use crate::mac::MacKey;
use crate::seqnum::SeqSpace;

pub use neighbor::{NeighborEntry, NeighborSnapshot};

/// Default number of rotating shards.
pub const DEFAULT_SHARD_COUNT: usize = 4;

/// Minimum shard count: one writable plus at least one retained.
pub const MIN_SHARD_COUNT: usize = 2;

/// Shared handle to one neighbor entry.
pub type NeighborHandle = Arc<Mutex<NeighborEntry>>;

/// Errors from building the store.
#[derive(Debug, Error)]
pub enum DigestError {
    #[error("bloom filter error: {0}")]
    Bloom(#[from] BloomError),

    #[error("need at least {MIN_SHARD_COUNT} shards, got {0}")]
    TooFewShards(usize),

    #[error("sequence range must be at least 2, got {0}")]
    SeqRangeTooSmall(u32),

    #[error("window {window} must be less than half of sequence range {range}")]
    WindowTooLarge { window: u32, range: u32 },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Construction parameters for a [`DigestStore`].
#[derive(Clone, Debug)]
pub struct DigestParams {
    pub filter_spec: BlockedFilterSpec,
    pub shard_count: usize,
    pub space: SeqSpace,
    pub increment_period: Duration,
    pub skew_slack: Duration,
}

/// Fill level of one shard.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct ShardFill {
    pub index: usize,
    pub writable: bool,
    pub fill_ratio: f64,
    pub estimated_count: f64,
}

struct ShardRing {
    filters: Vec<BlockedFilter>,
    writable: usize,
}

impl ShardRing {
    fn contains(&self, hash: &BloomHash) -> bool {
        self.filters.iter().any(|f| f.contains_hash(hash))
    }

    fn insert(&mut self, hash: &BloomHash) {
        self.filters[self.writable].insert_hash(hash);
    }
}

/// Process-wide replay-suppression state, shared by handle.
pub struct DigestStore {
    local_sequence: AtomicU32,
    space: SeqSpace,
    ttl_base_micros: i64,
    neighbors: RwLock<HashMap<DomainId, NeighborHandle>>,
    keys: RwLock<HashMap<DomainId, MacKey>>,
    shards: RwLock<ShardRing>,
}

impl DigestStore {
    /// Create an empty store.
    ///
    /// Rejects parameters that would make packet processing divide by
    /// zero or never accept anything.
    pub fn new(params: DigestParams) -> Result<Self, DigestError> {
        if params.shard_count < MIN_SHARD_COUNT {
            return Err(DigestError::TooFewShards(params.shard_count));
        }
        if params.filter_spec.hash_count == 0 {
            return Err(BloomError::ZeroHashCount.into());
        }
        if params.filter_spec.num_blocks == 0 || params.filter_spec.bits_per_block == 0 {
            return Err(BloomError::ZeroSize.into());
        }
        let (range, window) = (params.space.range(), params.space.window());
        if range < 2 {
            return Err(DigestError::SeqRangeTooSmall(range));
        }
        if window >= range / 2 {
            return Err(DigestError::WindowTooLarge { window, range });
        }

        let filters = (0..params.shard_count)
            .map(|_| BlockedFilter::new(params.filter_spec))
            .collect();
        let ttl_base = params.increment_period + params.skew_slack;

        Ok(Self {
            local_sequence: AtomicU32::new(0),
            space: params.space,
            ttl_base_micros: ttl_base.as_micros() as i64,
            neighbors: RwLock::new(HashMap::new()),
            keys: RwLock::new(HashMap::new()),
            shards: RwLock::new(ShardRing {
                filters,
                writable: 0,
            }),
        })
    }

    /// Create a store from configuration and pre-populate the configured
    /// neighbors with sequence 0 and their provisioned (or placeholder) keys.
    pub fn from_config(config: &Config) -> Result<Self, DigestError> {
        config.validate()?;
        let digest = &config.digest;
        let timers = &config.timers;
        let store = Self::new(DigestParams {
            filter_spec: BlockedFilterSpec::from_size_kb(
                digest.hash_count(),
                digest.filter_size_kb(),
            )?,
            shard_count: digest.shard_count(),
            space: SeqSpace::new(digest.seq_range(), digest.window_size()),
            increment_period: timers.increment_period(),
            skew_slack: timers.skew_slack(),
        })?;

        for neighbor in &config.neighbors {
            if let Some(key) = &neighbor.key {
                store.provision_key(neighbor.domain, key.clone());
            }
            store.add_neighbor(neighbor.domain);
        }

        debug!(
            shards = store.shard_count(),
            neighbors = store.neighbor_count(),
            "Digest store created"
        );
        Ok(store)
    }

    // === Sequence space ===

    pub fn seq_space(&self) -> &SeqSpace {
        &self.space
    }

    pub fn window_size(&self) -> u32 {
        self.space.window()
    }

    /// TTL assigned on every touch: increment period plus skew slack.
    pub fn ttl_base(&self) -> Duration {
        Duration::from_micros(self.ttl_base_micros as u64)
    }

    /// This domain's current sequence number.
    pub fn local_sequence(&self) -> u32 {
        self.local_sequence.load(Ordering::Acquire)
    }

    /// Advance the local counter one step, wrapping at the range.
    ///
    /// Returns the new value.
    pub fn tick_local_sequence(&self) -> u32 {
        let space = self.space;
        let prev = self
            .local_sequence
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |seq| {
                Some(space.next(seq))
            })
            .unwrap_or_else(|seq| seq);
        space.next(prev)
    }

    // === Duplicate cache ===

    /// Insert into the writable shard only.
    pub fn add(&self, data: &[u8]) {
        let hash = BloomHash::of(data);
        self.shards.write().insert(&hash);
    }

    /// True if any shard reports membership.
    pub fn check(&self, data: &[u8]) -> bool {
        let hash = BloomHash::of(data);
        self.shards.read().contains(&hash)
    }

    /// Check and, if absent, insert under one lock.
    ///
    /// Returns true if `data` was already present (a duplicate); nothing
    /// is inserted in that case.
    pub fn check_and_add(&self, data: &[u8]) -> bool {
        let hash = BloomHash::of(data);
        let mut ring = self.shards.write();
        if ring.contains(&hash) {
            return true;
        }
        ring.insert(&hash);
        false
    }

    /// Advance the writable index and clear the newly writable shard.
    ///
    /// Returns the new writable index.
    pub fn rotate(&self) -> usize {
        let mut ring = self.shards.write();
        ring.writable = (ring.writable + 1) % ring.filters.len();
        let writable = ring.writable;
        ring.filters[writable].reset();
        trace!(writable, "Rotated digest shard");
        writable
    }

    pub fn writable_index(&self) -> usize {
        self.shards.read().writable
    }

    pub fn shard_count(&self) -> usize {
        self.shards.read().filters.len()
    }

    /// Fill ratio and estimated element count of every shard.
    pub fn shard_fill(&self) -> Vec<ShardFill> {
        let ring = self.shards.read();
        ring.filters
            .iter()
            .enumerate()
            .map(|(index, filter)| ShardFill {
                index,
                writable: index == ring.writable,
                fill_ratio: filter.fill_ratio(),
                estimated_count: filter.estimated_count(),
            })
            .collect()
    }

    // === Keys ===

    /// Install the MAC key shared with `domain`.
    ///
    /// An existing neighbor entry picks the new key up immediately.
    pub fn provision_key(&self, domain: DomainId, key: MacKey) {
        if let Some(entry) = self.neighbor(domain) {
            entry.lock().set_key(key.clone());
        }
        self.keys.write().insert(domain, key);
    }

    /// Key to authenticate traffic with `domain`, without creating an entry.
    ///
    /// Falls back to the placeholder for unknown, unprovisioned domains.
    pub fn lookup_key(&self, domain: DomainId) -> MacKey {
        if let Some(entry) = self.neighbor(domain) {
            return entry.lock().key().clone();
        }
        self.keys
            .read()
            .get(&domain)
            .cloned()
            .unwrap_or_else(MacKey::placeholder)
    }

    fn key_for(&self, domain: DomainId) -> MacKey {
        match self.keys.read().get(&domain) {
            Some(key) => key.clone(),
            None => {
                warn!(domain = %domain, "No MAC key provisioned, using placeholder");
                MacKey::placeholder()
            }
        }
    }

    // === Neighbors ===

    /// Get the entry for `domain`, creating it if absent.
    ///
    /// New entries start at sequence 0, not yet valid, with a full TTL and
    /// the neighbor's provisioned key.
    pub fn add_neighbor(&self, domain: DomainId) -> NeighborHandle {
        if let Some(entry) = self.neighbor(domain) {
            return entry;
        }

        let key = self.key_for(domain);
        let mut neighbors = self.neighbors.write();
        neighbors
            .entry(domain)
            .or_insert_with(|| {
                debug!(domain = %domain, "Created neighbor entry");
                Arc::new(Mutex::new(NeighborEntry::new(key, self.ttl_base_micros)))
            })
            .clone()
    }

    pub fn neighbor(&self, domain: DomainId) -> Option<NeighborHandle> {
        self.neighbors.read().get(&domain).cloned()
    }

    pub fn neighbor_snapshot(&self, domain: DomainId) -> Option<NeighborSnapshot> {
        self.neighbor(domain).map(|entry| entry.lock().snapshot())
    }

    pub fn neighbor_count(&self) -> usize {
        self.neighbors.read().len()
    }

    /// Reset a neighbor's TTL to `ttl_base + offset`.
    ///
    /// Returns false if the neighbor is unknown.
    pub fn touch_ttl(&self, domain: DomainId, offset: i64) -> bool {
        match self.neighbor(domain) {
            Some(entry) => {
                entry.lock().touch_ttl(self.ttl_base_micros, offset);
                true
            }
            None => false,
        }
    }

    /// Record an accepted sequence number for a neighbor entry.
    pub(crate) fn accept_sequence(&self, entry: &mut NeighborEntry, seq: u32) {
        entry.accept(seq, self.ttl_base_micros);
    }

    /// Count down every valid neighbor's TTL by `elapsed`.
    ///
    /// Expired neighbors get their mark forced one step forward and their
    /// TTL reset with the overshoot carried over. Returns how many were
    /// advanced.
    pub fn sweep_ttl(&self, elapsed: Duration) -> usize {
        let elapsed_micros = elapsed.as_micros() as i64;
        let entries: Vec<(DomainId, NeighborHandle)> = self
            .neighbors
            .read()
            .iter()
            .map(|(domain, entry)| (*domain, entry.clone()))
            .collect();

        let mut advanced = 0;
        for (domain, entry) in entries {
            let mut entry = entry.lock();
            if entry.decay(elapsed_micros, self.ttl_base_micros, &self.space) {
                trace!(domain = %domain, seq = entry.seq_num(), "TTL expired, advanced mark");
                advanced += 1;
            }
        }
        advanced
    }
}

impl std::fmt::Debug for DigestStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigestStore")
            .field("local_sequence", &self.local_sequence())
            .field("space", &self.space)
            .field("neighbors", &self.neighbor_count())
            .field("shards", &self.shard_count())
            .field("writable", &self.writable_index())
            .finish()
    }
}

#[cfg(test)]
mod tests;
