//! Per-neighbor sequence state.

use serde::Serialize;

use crate::mac::MacKey;
use crate::seqnum::SeqSpace;

/// Sequence tracking for one neighbor domain.
///
/// `seq_num` is the high-water mark accepted from (or assigned to) the
/// neighbor. `ttl_micros` counts down between maintenance sweeps; when it
/// runs out the mark is pushed forward one step so an idle neighbor's
/// window keeps pace with its counter.
#[derive(Clone, Debug)]
pub struct NeighborEntry {
    seq_num: u32,
    ttl_micros: i64,
    valid: bool,
    key: MacKey,
}

impl NeighborEntry {
    /// Create an entry that has not yet seen traffic.
    pub fn new(key: MacKey, ttl_micros: i64) -> Self {
        Self {
            seq_num: 0,
            ttl_micros,
            valid: false,
            key,
        }
    }

    pub fn seq_num(&self) -> u32 {
        self.seq_num
    }

    pub fn ttl_micros(&self) -> i64 {
        self.ttl_micros
    }

    /// Whether a packet from this neighbor has been accepted yet.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn key(&self) -> &MacKey {
        &self.key
    }

    pub(crate) fn set_key(&mut self, key: MacKey) {
        self.key = key;
    }

    /// Reset the TTL to `base + offset`.
    ///
    /// `offset` is the (non-positive) overshoot left from the previous
    /// expiry, so repeated expiries do not accumulate drift.
    pub fn touch_ttl(&mut self, base_micros: i64, offset_micros: i64) {
        self.ttl_micros = base_micros + offset_micros;
    }

    /// Record an accepted sequence number as the new mark.
    pub fn accept(&mut self, seq: u32, base_micros: i64) {
        self.seq_num = seq;
        self.valid = true;
        self.touch_ttl(base_micros, 0);
    }

    /// Count down by `elapsed_micros`; on expiry advance the mark one step.
    ///
    /// Returns true if the mark was advanced. Entries that have not seen
    /// traffic are left untouched.
    pub fn decay(&mut self, elapsed_micros: i64, base_micros: i64, space: &SeqSpace) -> bool {
        if !self.valid {
            return false;
        }
        self.ttl_micros -= elapsed_micros;
        if self.ttl_micros > 0 {
            return false;
        }
        let overshoot = self.ttl_micros;
        self.touch_ttl(base_micros, overshoot);
        self.seq_num = space.next(self.seq_num);
        true
    }

    pub fn snapshot(&self) -> NeighborSnapshot {
        NeighborSnapshot {
            seq_num: self.seq_num,
            ttl_micros: self.ttl_micros,
            valid: self.valid,
            placeholder_key: self.key.is_placeholder(),
        }
    }
}

/// Point-in-time copy of a neighbor entry without key material.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct NeighborSnapshot {
    pub seq_num: u32,
    pub ttl_micros: i64,
    pub valid: bool,
    pub placeholder_key: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: i64 = 11_000;

    #[test]
    fn test_new_entry_is_invalid() {
        let entry = NeighborEntry::new(MacKey::placeholder(), BASE);
        assert!(!entry.is_valid());
        assert_eq!(entry.seq_num(), 0);
        assert_eq!(entry.ttl_micros(), BASE);
    }

    #[test]
    fn test_decay_skips_invalid() {
        let space = SeqSpace::new(100, 5);
        let mut entry = NeighborEntry::new(MacKey::placeholder(), BASE);
        assert!(!entry.decay(50_000, BASE, &space));
        assert_eq!(entry.ttl_micros(), BASE);
        assert_eq!(entry.seq_num(), 0);
    }

    #[test]
    fn test_decay_advances_once_per_expiry() {
        let space = SeqSpace::new(100, 5);
        let mut entry = NeighborEntry::new(MacKey::placeholder(), BASE);
        entry.accept(7, BASE);

        // 11ms TTL, 5ms sweeps: 6, 1, -4 -> expire
        assert!(!entry.decay(5_000, BASE, &space));
        assert!(!entry.decay(5_000, BASE, &space));
        assert!(entry.decay(5_000, BASE, &space));
        assert_eq!(entry.seq_num(), 8);
        // overshoot of 4ms carried into the next period
        assert_eq!(entry.ttl_micros(), 7_000);

        assert!(!entry.decay(5_000, BASE, &space));
        assert!(entry.decay(5_000, BASE, &space));
        assert_eq!(entry.seq_num(), 9);
        assert_eq!(entry.ttl_micros(), 8_000);
    }

    #[test]
    fn test_decay_wraps() {
        let space = SeqSpace::new(100, 5);
        let mut entry = NeighborEntry::new(MacKey::placeholder(), BASE);
        entry.accept(99, BASE);
        assert!(entry.decay(BASE, BASE, &space));
        assert_eq!(entry.seq_num(), 0);
    }

    #[test]
    fn test_accept_resets_ttl() {
        let space = SeqSpace::new(100, 5);
        let mut entry = NeighborEntry::new(MacKey::placeholder(), BASE);
        entry.accept(1, BASE);
        entry.decay(5_000, BASE, &space);
        entry.accept(2, BASE);
        assert_eq!(entry.ttl_micros(), BASE);
        assert_eq!(entry.seq_num(), 2);
    }
}
