//! A single 512-bit filter block.

use super::{BloomHash, BLOCK_BITS, BLOCK_BUCKETS, BUCKET_BITS};

/// One partition of a blocked filter.
///
/// Bits are packed into 32-bit buckets; a bit index maps to
/// `(index / 32 mod buckets, index mod 32)`.
#[derive(Clone, PartialEq, Eq)]
pub struct BloomBlock {
    buckets: [u32; BLOCK_BUCKETS],
}

impl BloomBlock {
    /// Create an empty block.
    pub fn new() -> Self {
        Self {
            buckets: [0; BLOCK_BUCKETS],
        }
    }

    /// Set the `hash_count` bits derived from `hash`.
    pub fn insert(&mut self, hash: &BloomHash, hash_count: u32) {
        for i in 0..hash_count {
            self.set_bit(hash.bit_index(i, BLOCK_BITS));
        }
    }

    /// Check whether all `hash_count` bits derived from `hash` are set.
    pub fn contains(&self, hash: &BloomHash, hash_count: u32) -> bool {
        (0..hash_count).all(|i| self.test_bit(hash.bit_index(i, BLOCK_BITS)))
    }

    /// Zero every bit.
    pub fn reset(&mut self) {
        self.buckets = [0; BLOCK_BUCKETS];
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> usize {
        self.buckets.iter().map(|b| b.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(|&b| b == 0)
    }

    pub fn set_bit(&mut self, index: usize) {
        let (bucket, offset) = Self::locate(index);
        self.buckets[bucket] |= 1 << offset;
    }

    pub fn test_bit(&self, index: usize) -> bool {
        let (bucket, offset) = Self::locate(index);
        self.buckets[bucket] & (1 << offset) != 0
    }

    fn locate(index: usize) -> (usize, usize) {
        ((index / BUCKET_BITS) % BLOCK_BUCKETS, index % BUCKET_BITS)
    }
}

impl Default for BloomBlock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BloomBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BloomBlock")
            .field("ones", &self.count_ones())
            .finish()
    }
}
