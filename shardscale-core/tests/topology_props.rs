//! Property tests for shard filtering and key-space tiling

use proptest::prelude::*;
use shardscale_core::{
    filter_open_shards, verify_key_space_coverage, HashKey, HashKeyRange, SequenceNumberRange,
    Shard,
};
use std::collections::BTreeSet;

fn shard(index: usize, range: HashKeyRange, open: bool) -> Shard {
    Shard {
        shard_id: format!("shardId-{:012}", index),
        parent_shard_id: None,
        adjacent_parent_shard_id: None,
        hash_key_range: range,
        sequence_number_range: SequenceNumberRange {
            starting_sequence_number: index.to_string(),
            ending_sequence_number: if open { None } else { Some("9".to_string()) },
        },
    }
}

/// Open shards tiling the key space, split at each cut point
fn tiling(cuts: &BTreeSet<u128>) -> Vec<Shard> {
    let mut starts = vec![0u128];
    starts.extend(cuts.iter().copied());

    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).map(|next| next - 1).unwrap_or(u128::MAX);
            let range = HashKeyRange::new(HashKey::new(start), HashKey::new(end)).unwrap();
            shard(i, range, true)
        })
        .collect()
}

fn cut_points() -> impl Strategy<Value = BTreeSet<u128>> {
    prop::collection::btree_set(1..=u128::MAX, 0..12)
}

proptest! {
    #[test]
    fn tiling_covers_key_space_in_any_order(cuts in cut_points(), rotate in 0usize..16) {
        let mut shards = tiling(&cuts);
        let n = shards.len();
        shards.rotate_left(rotate % n);

        prop_assert_eq!(verify_key_space_coverage(&shards), Ok(()));
    }

    #[test]
    fn closed_shards_never_returned(
        cuts in cut_points(),
        closed in prop::collection::vec(any::<bool>(), 12),
    ) {
        let mut shards = tiling(&cuts);
        let open_ids: Vec<String> = shards.iter().map(|s| s.shard_id.clone()).collect();

        for (i, is_closed) in closed.iter().enumerate() {
            if *is_closed {
                shards.push(shard(100 + i, HashKeyRange::full(), false));
            }
        }

        let filtered = filter_open_shards(&shards, false);
        prop_assert_eq!(filtered.len(), open_ids.len());
        prop_assert!(filtered.iter().all(|s| s.is_open()));
        prop_assert_eq!(verify_key_space_coverage(&shards), Ok(()));
    }

    #[test]
    fn sorted_filter_orders_by_numeric_end(cuts in cut_points()) {
        let mut shards = tiling(&cuts);
        shards.reverse();

        let sorted = filter_open_shards(&shards, true);
        for pair in sorted.windows(2) {
            let (low, high) = (&pair[0].hash_key_range, &pair[1].hash_key_range);
            prop_assert!(low.ending_hash_key < high.ending_hash_key);
            prop_assert!(pair[0].hash_key_range.is_adjacent_to(&pair[1].hash_key_range));
        }
    }

    #[test]
    fn midpoint_split_keeps_tiling(cuts in cut_points(), pick in any::<prop::sample::Index>()) {
        let mut shards = tiling(&cuts);
        let target = pick.index(shards.len());
        let range = shards[target].hash_key_range;
        let midpoint = range.midpoint();
        prop_assume!(midpoint > range.starting_hash_key);

        shards[target].sequence_number_range.ending_sequence_number = Some("9".to_string());
        let lower =
            HashKeyRange::new(range.starting_hash_key, HashKey::new(midpoint.value() - 1))
                .unwrap();
        let upper = HashKeyRange::new(midpoint, range.ending_hash_key).unwrap();
        shards.push(shard(200, lower, true));
        shards.push(shard(201, upper, true));

        prop_assert_eq!(verify_key_space_coverage(&shards), Ok(()));
    }
}

#[test]
fn removing_a_shard_leaves_a_gap() {
    let cuts: BTreeSet<u128> = [1u128 << 64, 1u128 << 100].into_iter().collect();
    let mut shards = tiling(&cuts);
    shards.remove(1);

    assert!(verify_key_space_coverage(&shards).is_err());
}
