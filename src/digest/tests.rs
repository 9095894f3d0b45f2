use super::*;
use std::thread;

fn make_domain(val: u64) -> DomainId {
    DomainId::new(1, 0xff00_0000_0000 + val).unwrap()
}

fn make_params(shard_count: usize, range: u32, window: u32) -> DigestParams {
    DigestParams {
        filter_spec: BlockedFilterSpec::from_size_kb(7, 1).unwrap(),
        shard_count,
        space: SeqSpace::new(range, window),
        increment_period: Duration::from_millis(10),
        skew_slack: Duration::from_millis(1),
    }
}

fn make_store() -> DigestStore {
    DigestStore::new(make_params(4, 100, 10)).unwrap()
}

// ===== Construction =====

#[test]
fn test_store_creation() {
    let store = make_store();
    assert_eq!(store.shard_count(), 4);
    assert_eq!(store.writable_index(), 0);
    assert_eq!(store.local_sequence(), 0);
    assert_eq!(store.window_size(), 10);
    assert_eq!(store.ttl_base(), Duration::from_millis(11));
    assert_eq!(store.neighbor_count(), 0);
}

#[test]
fn test_store_rejects_single_shard() {
    assert!(matches!(
        DigestStore::new(make_params(1, 100, 10)),
        Err(DigestError::TooFewShards(1))
    ));
}

#[test]
fn test_store_rejects_degenerate_sequence_space() {
    assert!(matches!(
        DigestStore::new(make_params(4, 0, 0)),
        Err(DigestError::SeqRangeTooSmall(0))
    ));
    assert!(matches!(
        DigestStore::new(make_params(4, 1, 0)),
        Err(DigestError::SeqRangeTooSmall(1))
    ));
    assert!(matches!(
        DigestStore::new(make_params(4, 20, 10)),
        Err(DigestError::WindowTooLarge {
            window: 10,
            range: 20
        })
    ));
    assert!(DigestStore::new(make_params(4, 20, 9)).is_ok());
}

#[test]
fn test_store_rejects_empty_filter_spec() {
    let mut params = make_params(4, 100, 10);
    params.filter_spec.num_blocks = 0;
    assert!(matches!(
        DigestStore::new(params),
        Err(DigestError::Bloom(BloomError::ZeroSize))
    ));

    let mut params = make_params(4, 100, 10);
    params.filter_spec.hash_count = 0;
    assert!(matches!(
        DigestStore::new(params),
        Err(DigestError::Bloom(BloomError::ZeroHashCount))
    ));
}

#[test]
fn test_from_config_validates() {
    let mut config = Config::default();
    config.digest.seq_range = Some(0);
    assert!(matches!(
        DigestStore::from_config(&config),
        Err(DigestError::Config(_))
    ));

    let mut config = Config::default();
    config.timers.rotation_period_ms = Some(0);
    assert!(matches!(
        DigestStore::from_config(&config),
        Err(DigestError::Config(_))
    ));
}

// ===== Local counter =====

#[test]
fn test_local_sequence_wraps() {
    let store = make_store();
    for expected in 1..100 {
        assert_eq!(store.tick_local_sequence(), expected);
    }
    assert_eq!(store.tick_local_sequence(), 0);
    assert_eq!(store.local_sequence(), 0);
}

#[test]
fn test_local_sequence_concurrent_ticks() {
    let store = Arc::new(DigestStore::new(make_params(2, 1_000_000, 10)).unwrap());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let store = store.clone();
            thread::spawn(move || {
                for _ in 0..1000 {
                    store.tick_local_sequence();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(store.local_sequence(), 4000);
}

// ===== Duplicate cache =====

#[test]
fn test_add_then_check() {
    let store = make_store();
    assert!(!store.check(b"packet-1"));
    store.add(b"packet-1");
    assert!(store.check(b"packet-1"));
}

#[test]
fn test_check_and_add() {
    let store = make_store();
    assert!(!store.check_and_add(b"packet-1"));
    assert!(store.check_and_add(b"packet-1"));
    assert!(!store.check_and_add(b"packet-2"));
}

#[test]
fn test_add_goes_to_writable_shard_only() {
    let store = make_store();
    store.add(b"packet-1");

    let fill = store.shard_fill();
    assert!(fill[0].fill_ratio > 0.0);
    assert!(fill[0].writable);
    assert!(fill[1..].iter().all(|s| s.fill_ratio == 0.0 && !s.writable));
}

#[test]
fn test_rotation_retention() {
    let store = make_store();
    store.add(b"old");

    // Still detectable through shard_count - 1 rotations.
    for _ in 0..3 {
        store.rotate();
        assert!(store.check(b"old"));
    }

    // The next rotation clears the shard holding it.
    assert_eq!(store.rotate(), 0);
    assert!(!store.check(b"old"));
}

#[test]
fn test_rotate_clears_new_writable_shard() {
    let store = make_store();
    store.rotate();
    store.add(b"in shard 1");
    assert_eq!(store.writable_index(), 1);

    for _ in 0..4 {
        store.rotate();
    }
    assert_eq!(store.writable_index(), 1);
    assert!(store.shard_fill()[1].fill_ratio == 0.0);
}

#[test]
fn test_no_false_negatives_across_rotations() {
    let store = make_store();
    for round in 0u32..3 {
        for i in 0u32..200 {
            let key = [round.to_be_bytes(), i.to_be_bytes()].concat();
            store.add(&key);
        }
        store.rotate();
    }
    for round in 0u32..3 {
        for i in 0u32..200 {
            let key = [round.to_be_bytes(), i.to_be_bytes()].concat();
            assert!(store.check(&key), "round {} element {}", round, i);
        }
    }
}

#[test]
fn test_concurrent_check_and_add_single_winner() {
    let store = Arc::new(make_store());
    let winners: usize = (0..8)
        .map(|_| {
            let store = store.clone();
            thread::spawn(move || !store.check_and_add(b"same packet"))
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|h| h.join().unwrap() as usize)
        .sum();
    assert_eq!(winners, 1);
}

#[test]
fn test_concurrent_rotation_never_loses_retained_items() {
    let store = Arc::new(make_store());
    store.add(b"anchor");
    store.rotate();

    let rotator = {
        let store = store.clone();
        thread::spawn(move || {
            // Two rotations keep the anchor's shard (index 0) alive.
            store.rotate();
            store.rotate();
        })
    };
    for _ in 0..1000 {
        assert!(store.check(b"anchor"));
    }
    rotator.join().unwrap();
    assert!(store.check(b"anchor"));
}

// ===== Neighbors =====

#[test]
fn test_add_neighbor_defaults() {
    let store = make_store();
    let domain = make_domain(1);
    store.add_neighbor(domain);

    let snap = store.neighbor_snapshot(domain).unwrap();
    assert_eq!(snap.seq_num, 0);
    assert!(!snap.valid);
    assert_eq!(snap.ttl_micros, 11_000);
    assert!(snap.placeholder_key);
}

#[test]
fn test_add_neighbor_is_idempotent() {
    let store = make_store();
    let domain = make_domain(1);

    let first = store.add_neighbor(domain);
    store.accept_sequence(&mut first.lock(), 42);

    let second = store.add_neighbor(domain);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(second.lock().seq_num(), 42);
    assert_eq!(store.neighbor_count(), 1);
}

#[test]
fn test_provisioned_key_used() {
    let store = make_store();
    let domain = make_domain(2);
    let key = MacKey::from_bytes([7; 16]);

    store.provision_key(domain, key.clone());
    let entry = store.add_neighbor(domain);
    assert_eq!(entry.lock().key(), &key);
}

#[test]
fn test_provision_key_updates_existing_entry() {
    let store = make_store();
    let domain = make_domain(3);
    let entry = store.add_neighbor(domain);
    assert!(entry.lock().key().is_placeholder());

    store.provision_key(domain, MacKey::from_bytes([9; 16]));
    assert_eq!(entry.lock().key(), &MacKey::from_bytes([9; 16]));
}

#[test]
fn test_touch_ttl_with_offset() {
    let store = make_store();
    let domain = make_domain(1);
    store.add_neighbor(domain);

    assert!(store.touch_ttl(domain, -3_000));
    assert_eq!(store.neighbor_snapshot(domain).unwrap().ttl_micros, 8_000);
    assert!(!store.touch_ttl(make_domain(99), 0));
}

#[test]
fn test_sweep_ttl_forces_single_step() {
    let store = make_store();
    let active = make_domain(1);
    let idle = make_domain(2);

    store.accept_sequence(&mut store.add_neighbor(active).lock(), 50);
    store.add_neighbor(idle);

    // 11ms TTL swept in 5ms steps: expiry on the third sweep.
    assert_eq!(store.sweep_ttl(Duration::from_millis(5)), 0);
    assert_eq!(store.sweep_ttl(Duration::from_millis(5)), 0);
    assert_eq!(store.sweep_ttl(Duration::from_millis(5)), 1);

    let snap = store.neighbor_snapshot(active).unwrap();
    assert_eq!(snap.seq_num, 51);
    assert_eq!(snap.ttl_micros, 7_000);

    // Never-seen neighbors do not drift.
    let idle_snap = store.neighbor_snapshot(idle).unwrap();
    assert_eq!(idle_snap.seq_num, 0);
    assert_eq!(idle_snap.ttl_micros, 11_000);
}

#[test]
fn test_sweep_ttl_one_step_even_for_long_gap() {
    let store = make_store();
    let domain = make_domain(1);
    store.accept_sequence(&mut store.add_neighbor(domain).lock(), 10);

    // A single late sweep covering several periods still moves one step.
    assert_eq!(store.sweep_ttl(Duration::from_millis(40)), 1);
    assert_eq!(store.neighbor_snapshot(domain).unwrap().seq_num, 11);
}

#[test]
fn test_from_config_prepopulates_neighbors() {
    let yaml = r#"
local_domain: "1-ff00:0:110"
digest:
  filter_size_kb: 1
  shard_count: 3
neighbors:
  - domain: "1-ff00:0:111"
    key: "000102030405060708090a0b0c0d0e0f"
  - domain: "1-ff00:0:112"
"#;
    let config: Config = serde_yaml::from_str(yaml).unwrap();
    let store = DigestStore::from_config(&config).unwrap();

    assert_eq!(store.shard_count(), 3);
    assert_eq!(store.neighbor_count(), 2);

    let keyed = store
        .neighbor_snapshot("1-ff00:0:111".parse().unwrap())
        .unwrap();
    assert!(!keyed.placeholder_key);
    assert_eq!(keyed.seq_num, 0);

    let unkeyed = store
        .neighbor_snapshot("1-ff00:0:112".parse().unwrap())
        .unwrap();
    assert!(unkeyed.placeholder_key);
}
