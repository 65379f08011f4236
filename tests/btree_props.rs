//! Reference-model property tests for the range index B-tree: any sequence
//! of operations must leave the tree agreeing with `std::collections::BTreeMap`
//! on membership, ordering, and range contents.

use std::collections::BTreeMap;
use veldb::btree::{BTree, RangeMode};

fn lcg(state: &mut u64) -> u64 {
    *state = state
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
    *state >> 33
}

fn full_scan(tree: &BTree<i64, i64>) -> Vec<(i64, i64)> {
    match (tree.first_key().copied(), tree.last_key().copied()) {
        (Some(lo), Some(hi)) => tree
            .collect(&lo, &hi, RangeMode::Closed)
            .unwrap()
            .map(|(k, v)| (*k, *v))
            .collect(),
        _ => Vec::new(),
    }
}

#[test]
fn random_workload_matches_reference_for_every_degree() {
    for degree in [2, 3, 4, 5, 8, 16, 64] {
        let mut tree = BTree::new(degree).unwrap();
        let mut reference = BTreeMap::new();
        let mut state = degree as u64 * 7919 + 1;

        for step in 0..5000 {
            let key = (lcg(&mut state) % 600) as i64;
            match lcg(&mut state) % 3 {
                0 | 1 => {
                    tree.insert(key, step);
                    reference.insert(key, step);
                }
                _ => {
                    assert_eq!(tree.remove(&key), reference.remove(&key), "degree {degree}");
                }
            }
        }

        assert_eq!(tree.len(), reference.len(), "degree {degree}");
        assert_eq!(
            full_scan(&tree),
            reference.iter().map(|(k, v)| (*k, *v)).collect::<Vec<_>>(),
            "degree {degree}"
        );
        for key in 0..600i64 {
            assert_eq!(tree.get(&key), reference.get(&key), "degree {degree} key {key}");
        }
    }
}

#[test]
fn random_closed_ranges_match_reference() {
    let mut tree = BTree::new(4).unwrap();
    let mut reference = BTreeMap::new();
    let mut state = 42u64;

    for _ in 0..1500 {
        let key = (lcg(&mut state) % 10_000) as i64;
        tree.insert(key, key);
        reference.insert(key, key);
    }

    for _ in 0..300 {
        let a = (lcg(&mut state) % 11_000) as i64 - 500;
        let b = (lcg(&mut state) % 11_000) as i64 - 500;
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };

        let got: Vec<i64> = tree
            .collect(&lo, &hi, RangeMode::Closed)
            .unwrap()
            .map(|(k, _)| *k)
            .collect();
        let want: Vec<i64> = reference.range(lo..=hi).map(|(k, _)| *k).collect();
        assert_eq!(got, want, "range [{lo}, {hi}]");
    }
}

#[test]
fn insert_remove_round_trip_preserves_key_set() {
    let mut tree = BTree::new(3).unwrap();
    let mut state = 7u64;
    let keys: Vec<i64> = (0..400).map(|_| (lcg(&mut state) % 5_000) as i64).collect();
    for &key in &keys {
        tree.insert(key, key);
    }
    let baseline = full_scan(&tree);

    for probe in [-1i64, 2_501, 9_999] {
        if tree.get(&probe).is_none() {
            tree.insert(probe, 0);
            assert_eq!(tree.remove(&probe), Some(0));
            assert_eq!(full_scan(&tree), baseline, "probe {probe}");
        }
    }
}

#[test]
fn ascending_and_descending_loads_stay_ordered() {
    for degree in [2, 5, 32] {
        let mut asc = BTree::new(degree).unwrap();
        let mut desc = BTree::new(degree).unwrap();
        for key in 0..2000i64 {
            asc.insert(key, key);
            desc.insert(2000 - key, key);
        }
        assert_eq!(asc.first_key(), Some(&0));
        assert_eq!(asc.last_key(), Some(&1999));
        assert_eq!(desc.first_key(), Some(&1));
        assert_eq!(desc.last_key(), Some(&2000));

        let scanned: Vec<i64> = full_scan(&asc).iter().map(|(k, _)| *k).collect();
        assert!(scanned.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(scanned.len(), 2000);
    }
}
