//! Blocked Bloom Filter Implementation
//!
//! Space-bounded approximate membership for duplicate packet detection.
//! A blocked filter routes every element to exactly one 512-bit block and
//! sets `k` bits inside that block, so each insert or query touches a
//! single cache line pair instead of `k` random positions in a large array.
//!
//! ## Parameters
//!
//! - Block size: 512 bits (16 x 32-bit buckets)
//! - Filter size: configured in KiB, `blocks = size_kb * 8192 / 512`
//! - Hash functions: `k` derived by double hashing from one SHA-256 digest
//! - Capacity: `floor(total_bits / k * ln 2)` elements at the design
//!   false-positive rate

mod block;
mod filter;

use sha2::{Digest, Sha256};
use thiserror::Error;

pub use block::BloomBlock;
pub use filter::{BlockedFilter, BlockedFilterSpec};

/// Bits per block.
pub const BLOCK_BITS: usize = 512;

/// Bits per bucket (one `u32` word).
pub const BUCKET_BITS: usize = 32;

/// Buckets per block.
pub const BLOCK_BUCKETS: usize = BLOCK_BITS / BUCKET_BITS;

/// Bits per KiB of filter budget.
pub const BITS_PER_KB: usize = 8192;

/// Default filter size per shard in KiB.
pub const DEFAULT_FILTER_SIZE_KB: usize = 16;

/// Default number of hash functions.
///
/// k=7 keeps the false-positive rate near 1% at design capacity.
pub const DEFAULT_HASH_COUNT: u32 = 7;

/// Errors related to Bloom filter construction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BloomError {
    #[error("hash count must be positive")]
    ZeroHashCount,

    #[error("filter size must be at least one block ({BLOCK_BITS} bits)")]
    ZeroSize,
}

/// Precomputed hash of an element.
///
/// A store with several shards hashes each packet digest once and reuses
/// the result for every shard lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BloomHash {
    /// First double-hashing base.
    pub(crate) h_a: u32,
    /// Second double-hashing base (stride).
    pub(crate) h_b: u32,
    /// Independent hash selecting the block.
    pub(crate) block: u32,
}

impl BloomHash {
    /// Hash an element.
    ///
    /// Bytes 0..8 of the SHA-256 digest give the two 32-bit bases and
    /// bytes 8..12 give the block selector, so the two levels are
    /// independent of each other.
    pub fn of(data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        let word = |i: usize| u32::from_le_bytes([digest[i], digest[i + 1], digest[i + 2], digest[i + 3]]);
        Self {
            h_a: word(0),
            h_b: word(4),
            block: word(8),
        }
    }

    /// Bit index for the `i`-th simulated hash function within a block.
    ///
    /// Double hashing: g_i(x) = h_a(x) + i * h_b(x) (mod 2^32), then mod
    /// the block width.
    pub(crate) fn bit_index(&self, i: u32, num_bits: usize) -> usize {
        self.h_a.wrapping_add(self.h_b.wrapping_mul(i)) as usize % num_bits
    }
}

#[cfg(test)]
mod tests;
