use super::*;
use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;

fn make_element(val: u32) -> [u8; 8] {
    let mut bytes = [0u8; 8];
    bytes[..4].copy_from_slice(&val.to_be_bytes());
    bytes[4] = 0xa5;
    bytes
}

// ===== BloomBlock Tests =====

#[test]
fn test_block_set_and_test_bit() {
    let mut block = BloomBlock::new();
    assert!(block.is_empty());

    block.set_bit(0);
    block.set_bit(33);
    block.set_bit(511);

    assert!(block.test_bit(0));
    assert!(block.test_bit(33));
    assert!(block.test_bit(511));
    assert!(!block.test_bit(1));
    assert_eq!(block.count_ones(), 3);
}

#[test]
fn test_block_index_wraps_buckets() {
    let mut block = BloomBlock::new();
    // Bucket index is taken mod 16, so bit 512 aliases bit 0.
    block.set_bit(512);
    assert!(block.test_bit(0));
}

#[test]
fn test_block_insert_contains_reset() {
    let mut block = BloomBlock::new();
    let hash = BloomHash::of(b"packet");

    assert!(!block.contains(&hash, 5));
    block.insert(&hash, 5);
    assert!(block.contains(&hash, 5));
    assert!(block.count_ones() <= 5);

    block.reset();
    assert!(block.is_empty());
    assert!(!block.contains(&hash, 5));
}

// ===== BloomHash Tests =====

#[test]
fn test_hash_is_deterministic() {
    assert_eq!(BloomHash::of(b"abc"), BloomHash::of(b"abc"));
    assert_ne!(BloomHash::of(b"abc"), BloomHash::of(b"abd"));
}

#[test]
fn test_hash_bit_index_in_range() {
    let hash = BloomHash::of(b"some element");
    for i in 0..64 {
        assert!(hash.bit_index(i, BLOCK_BITS) < BLOCK_BITS);
    }
}

// ===== BlockedFilterSpec Tests =====

#[test]
fn test_spec_from_size_kb() {
    let spec = BlockedFilterSpec::from_size_kb(7, 16).unwrap();
    assert_eq!(spec.num_blocks, 256);
    assert_eq!(spec.bits_per_block, BLOCK_BITS);
    assert_eq!(spec.total_bits(), 131_072);
    // floor(131072 / 7 * ln 2) = floor(12978.9) = 12978
    assert_eq!(spec.capacity, 12_978);
}

#[test]
fn test_spec_invalid_params() {
    assert_eq!(
        BlockedFilterSpec::from_size_kb(0, 16),
        Err(BloomError::ZeroHashCount)
    );
    assert_eq!(
        BlockedFilterSpec::from_size_kb(7, 0),
        Err(BloomError::ZeroSize)
    );
}

#[test]
fn test_spec_false_positive_rate_monotonic() {
    let spec = BlockedFilterSpec::from_size_kb(7, 16).unwrap();
    assert_eq!(spec.false_positive_rate(0), 0.0);
    let half = spec.false_positive_rate(spec.capacity / 2);
    let full = spec.false_positive_rate(spec.capacity);
    assert!(half < full);
    assert!(full < 0.02, "fpr at capacity: {}", full);
}

// ===== BlockedFilter Tests =====

#[test]
fn test_filter_new_is_empty() {
    let filter = BlockedFilter::with_size_kb(DEFAULT_HASH_COUNT, 1).unwrap();
    assert_eq!(filter.num_blocks(), 16);
    assert!(filter.is_empty());
    assert_eq!(filter.count_ones(), 0);
    assert_eq!(filter.estimated_count(), 0.0);
}

#[test]
fn test_filter_no_false_negatives() {
    let mut filter = BlockedFilter::with_size_kb(DEFAULT_HASH_COUNT, 4).unwrap();
    let capacity = filter.spec().capacity as u32;

    for i in 0..capacity {
        filter.insert(&make_element(i));
    }

    for i in 0..capacity {
        assert!(filter.contains(&make_element(i)), "element {} not found", i);
    }
}

#[test]
fn test_filter_hash_and_bytes_agree() {
    let mut filter = BlockedFilter::with_size_kb(5, 1).unwrap();
    filter.insert_hash(&BloomHash::of(b"x"));
    assert!(filter.contains(b"x"));
}

#[test]
fn test_filter_touches_one_block() {
    let mut filter = BlockedFilter::with_size_kb(DEFAULT_HASH_COUNT, 4).unwrap();
    filter.insert(b"only element");

    let touched = filter.count_ones();
    assert!(touched >= 1 && touched <= DEFAULT_HASH_COUNT as usize);
}

#[test]
fn test_filter_reset() {
    let mut filter = BlockedFilter::with_size_kb(DEFAULT_HASH_COUNT, 1).unwrap();
    for i in 0..100 {
        filter.insert(&make_element(i));
    }
    assert!(!filter.is_empty());

    filter.reset();
    assert!(filter.is_empty());
    assert!(!filter.contains(&make_element(1)));
}

#[test]
fn test_filter_estimated_count() {
    let mut filter = BlockedFilter::with_size_kb(DEFAULT_HASH_COUNT, 4).unwrap();
    for i in 0..500 {
        filter.insert(&make_element(i));
    }

    let estimate = filter.estimated_count();
    assert!(
        estimate > 400.0 && estimate < 600.0,
        "Unexpected estimate: {}",
        estimate
    );
}

#[test]
fn test_filter_false_positive_rate_bounded() {
    let mut filter = BlockedFilter::with_size_kb(DEFAULT_HASH_COUNT, 4).unwrap();
    let spec = *filter.spec();
    let load = spec.capacity / 2;

    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..load {
        let element: [u8; 16] = rng.r#gen();
        filter.insert(&element);
    }

    // Probe with a tagged prefix so probes never collide with inserts.
    let probes = 50_000;
    let mut false_positives = 0;
    for _ in 0..probes {
        let mut probe = [0xffu8; 17];
        rng.fill(&mut probe[1..]);
        if filter.contains(&probe) {
            false_positives += 1;
        }
    }

    let observed = false_positives as f64 / probes as f64;
    let theoretical = spec.false_positive_rate(load);
    assert!(
        observed <= theoretical * 4.0 + 0.001,
        "observed fpr {} vs theoretical {}",
        observed,
        theoretical
    );
}

#[test]
fn test_filter_equality() {
    let mut filter1 = BlockedFilter::with_size_kb(5, 1).unwrap();
    let mut filter2 = BlockedFilter::with_size_kb(5, 1).unwrap();
    assert_eq!(filter1, filter2);

    filter1.insert(b"a");
    assert_ne!(filter1, filter2);

    filter2.insert(b"a");
    assert_eq!(filter1, filter2);
}
