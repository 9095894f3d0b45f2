//! Blocked Bloom filter data structure.

use std::f64::consts::LN_2;
use std::fmt;

use super::{BloomBlock, BloomError, BloomHash, BITS_PER_KB, BLOCK_BITS};

/// Sizing of a blocked filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockedFilterSpec {
    /// Design capacity `n`: elements storable at the target error rate.
    pub capacity: usize,
    /// Number of hash functions `k`.
    pub hash_count: u32,
    /// Bits per block `m`.
    pub bits_per_block: usize,
    /// Number of blocks `N`.
    pub num_blocks: usize,
}

impl BlockedFilterSpec {
    /// Derive a spec from a bit budget expressed in KiB.
    ///
    /// `capacity = floor(total_bits / k * ln 2)`, the load at which `k`
    /// is the optimal hash count for the total bit budget.
    pub fn from_size_kb(hash_count: u32, size_kb: usize) -> Result<Self, BloomError> {
        if hash_count == 0 {
            return Err(BloomError::ZeroHashCount);
        }
        let num_blocks = size_kb * BITS_PER_KB / BLOCK_BITS;
        if num_blocks == 0 {
            return Err(BloomError::ZeroSize);
        }

        let total_bits = (num_blocks * BLOCK_BITS) as f64;
        let capacity = (total_bits / hash_count as f64 * LN_2).floor() as usize;

        Ok(Self {
            capacity,
            hash_count,
            bits_per_block: BLOCK_BITS,
            num_blocks,
        })
    }

    /// Total bits across all blocks.
    pub fn total_bits(&self) -> usize {
        self.num_blocks * self.bits_per_block
    }

    /// Theoretical false-positive rate after `items` insertions.
    ///
    /// Uses the classic `(1 - e^(-k n / m))^k` bound over the whole bit
    /// budget; block partitioning adds a small penalty on top of it.
    pub fn false_positive_rate(&self, items: usize) -> f64 {
        let k = self.hash_count as f64;
        let m = self.total_bits() as f64;
        (1.0 - (-k * items as f64 / m).exp()).powf(k)
    }
}

/// A Bloom filter partitioned into fixed-size blocks.
///
/// Elements are routed to one block by an independent hash, then `k`
/// bits are set or tested within that block.
#[derive(Clone, PartialEq, Eq)]
pub struct BlockedFilter {
    blocks: Vec<BloomBlock>,
    spec: BlockedFilterSpec,
}

impl BlockedFilter {
    /// Create an empty filter for the given spec.
    pub fn new(spec: BlockedFilterSpec) -> Self {
        Self {
            blocks: vec![BloomBlock::new(); spec.num_blocks],
            spec,
        }
    }

    /// Create an empty filter from a KiB budget.
    pub fn with_size_kb(hash_count: u32, size_kb: usize) -> Result<Self, BloomError> {
        Ok(Self::new(BlockedFilterSpec::from_size_kb(hash_count, size_kb)?))
    }

    /// Insert raw bytes.
    pub fn insert(&mut self, data: &[u8]) {
        self.insert_hash(&BloomHash::of(data));
    }

    /// Check whether the filter might contain raw bytes.
    ///
    /// Returns `false` only if the element was definitely never inserted.
    pub fn contains(&self, data: &[u8]) -> bool {
        self.contains_hash(&BloomHash::of(data))
    }

    /// Insert a precomputed hash.
    pub fn insert_hash(&mut self, hash: &BloomHash) {
        let idx = self.block_index(hash);
        self.blocks[idx].insert(hash, self.spec.hash_count);
    }

    /// Check a precomputed hash.
    pub fn contains_hash(&self, hash: &BloomHash) -> bool {
        self.blocks[self.block_index(hash)].contains(hash, self.spec.hash_count)
    }

    /// Zero every block.
    pub fn reset(&mut self) {
        for block in &mut self.blocks {
            block.reset();
        }
    }

    /// Count the number of set bits (population count).
    pub fn count_ones(&self) -> usize {
        self.blocks.iter().map(BloomBlock::count_ones).sum()
    }

    /// Estimate the fill ratio (set bits / total bits).
    pub fn fill_ratio(&self) -> f64 {
        self.count_ones() as f64 / self.spec.total_bits() as f64
    }

    /// Estimate the number of elements in the filter.
    ///
    /// Uses the formula: n = -(m/k) * ln(1 - X/m)
    /// where m = total bits, k = hash_count, X = count_ones
    pub fn estimated_count(&self) -> f64 {
        let m = self.spec.total_bits() as f64;
        let k = self.spec.hash_count as f64;
        let x = self.count_ones() as f64;

        if x >= m {
            return f64::INFINITY;
        }

        -(m / k) * (1.0 - x / m).ln()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(BloomBlock::is_empty)
    }

    pub fn spec(&self) -> &BlockedFilterSpec {
        &self.spec
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    fn block_index(&self, hash: &BloomHash) -> usize {
        hash.block as usize % self.blocks.len()
    }
}

impl fmt::Debug for BlockedFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockedFilter")
            .field("blocks", &self.spec.num_blocks)
            .field("hash_count", &self.spec.hash_count)
            .field("fill_ratio", &format!("{:.2}%", self.fill_ratio() * 100.0))
            .field("est_count", &format!("{:.0}", self.estimated_count()))
            .finish()
    }
}
