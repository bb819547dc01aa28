#![cfg(feature = "persistent")]
//! Integration tests for PersistentHashMap.
//!
//! These tests exercise the hash-keyed map built on the int-keyed
//! tree, with particular attention to hash collision handling and
//! the operations that leave the map untouched.

use broadleaf::persistent::PersistentHashMap;
use rstest::rstest;
use std::hash::{Hash, Hasher};

// =============================================================================
// Construction
// =============================================================================

#[rstest]
fn test_new_is_empty() {
    let map = PersistentHashMap::<String, i32>::new();
    assert!(map.is_empty());
    assert_eq!(map.len(), 0);
}

#[rstest]
fn test_default_matches_new() {
    let map = PersistentHashMap::<String, i32>::default();
    assert!(map.is_empty());
}

#[rstest]
fn test_get_on_an_empty_map() {
    let map = PersistentHashMap::<String, i32>::new();
    assert_eq!(map.get("anything"), None);
}

#[rstest]
fn test_singleton_holds_exactly_one_entry() {
    let map = PersistentHashMap::singleton("workers".to_string(), 8);
    assert_eq!(map.len(), 1);
    assert_eq!(map.get("workers"), Some(&8));
}

// =============================================================================
// Insert and Get
// =============================================================================

#[rstest]
fn test_insert_into_empty_map() {
    let map = PersistentHashMap::new().insert("timeout".to_string(), 30);
    assert_eq!(map.len(), 1);
    assert_eq!(map.get("timeout"), Some(&30));
}

#[rstest]
fn test_inserts_accumulate() {
    let map = PersistentHashMap::new()
        .insert("retries".to_string(), 3)
        .insert("timeout".to_string(), 30)
        .insert("backlog".to_string(), 128);

    assert_eq!(map.len(), 3);
    assert_eq!(map.get("retries"), Some(&3));
    assert_eq!(map.get("timeout"), Some(&30));
    assert_eq!(map.get("backlog"), Some(&128));
}

#[rstest]
fn test_insert_leaves_the_source_version_alone() {
    let small = PersistentHashMap::new().insert("retries".to_string(), 3);
    let bigger = small.insert("timeout".to_string(), 30);

    assert_eq!(small.len(), 1);
    assert_eq!(small.get("timeout"), None);
    assert_eq!(bigger.len(), 2);
    assert_eq!(bigger.get("timeout"), Some(&30));
}

#[rstest]
fn test_insert_replaces_value_for_existing_key() {
    let before = PersistentHashMap::new().insert("revision".to_string(), 1);
    let after = before.insert("revision".to_string(), 2);

    assert_eq!(before.get("revision"), Some(&1));
    assert_eq!(after.get("revision"), Some(&2));
    assert_eq!(after.len(), 1);
}

// =============================================================================
// Removal
// =============================================================================

#[rstest]
fn test_remove_present_key() {
    let map = PersistentHashMap::new()
        .insert("retries".to_string(), 3)
        .insert("timeout".to_string(), 30)
        .insert("backlog".to_string(), 128);
    let shrunk = map.remove("timeout");

    assert_eq!(shrunk.len(), 2);
    assert_eq!(shrunk.get("timeout"), None);
    assert_eq!(shrunk.get("retries"), Some(&3));
    assert_eq!(shrunk.get("backlog"), Some(&128));
}

#[rstest]
fn test_remove_absent_key_shares_the_tree() {
    let map = PersistentHashMap::new().insert("retries".to_string(), 3);
    let untouched = map.remove("nonexistent");

    assert_eq!(untouched.len(), 1);
    assert!(untouched.ptr_eq(&map));
}

#[rstest]
fn test_remove_leaves_the_source_version_alone() {
    let full = PersistentHashMap::new()
        .insert("retries".to_string(), 3)
        .insert("timeout".to_string(), 30);
    let shrunk = full.remove("retries");

    assert_eq!(full.len(), 2);
    assert_eq!(full.get("retries"), Some(&3));
    assert_eq!(shrunk.len(), 1);
    assert_eq!(shrunk.get("retries"), None);
}

#[rstest]
fn test_remove_every_entry_empties_the_map() {
    let map = PersistentHashMap::new()
        .insert("retries".to_string(), 3)
        .insert("timeout".to_string(), 30);
    let emptied = map.remove("retries").remove("timeout");

    assert!(emptied.is_empty());
    assert_eq!(emptied.get("retries"), None);
    assert_eq!(emptied.get("timeout"), None);
}

// =============================================================================
// Contains Key
// =============================================================================

#[rstest]
fn test_contains_key_present() {
    let map = PersistentHashMap::new()
        .insert("retries".to_string(), 3)
        .insert("timeout".to_string(), 30);

    assert!(map.contains_key("retries"));
    assert!(map.contains_key("timeout"));
}

#[rstest]
fn test_contains_key_absent() {
    let map = PersistentHashMap::new().insert("retries".to_string(), 3);
    assert!(!map.contains_key("timeout"));
}

#[rstest]
fn test_contains_key_on_empty_map() {
    let map = PersistentHashMap::<String, i32>::new();
    assert!(!map.contains_key("anything"));
}

// =============================================================================
// Hash Collisions
// =============================================================================

/// Key whose hash pins every instance to one slot, so all entries
/// share a single collision chain.
#[derive(Clone, PartialEq, Eq, Debug)]
struct PinnedHash(u32);

impl Hash for PinnedHash {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // The payload never reaches the hasher.
        7_u64.hash(state);
    }
}

#[rstest]
fn test_colliding_keys_stay_distinct() {
    let map = PersistentHashMap::new()
        .insert(PinnedHash(1), "jan".to_string())
        .insert(PinnedHash(2), "feb".to_string())
        .insert(PinnedHash(3), "mar".to_string());

    assert_eq!(map.len(), 3);
    assert_eq!(map.get(&PinnedHash(1)), Some(&"jan".to_string()));
    assert_eq!(map.get(&PinnedHash(2)), Some(&"feb".to_string()));
    assert_eq!(map.get(&PinnedHash(3)), Some(&"mar".to_string()));
}

#[rstest]
fn test_colliding_overwrite_of_a_lone_entry() {
    let only = PinnedHash(1);

    let before = PersistentHashMap::new().insert(only.clone(), "jan".to_string());
    let after = before.insert(only.clone(), "june".to_string());

    assert_eq!(before.get(&only), Some(&"jan".to_string()));
    assert_eq!(after.get(&only), Some(&"june".to_string()));
    assert_eq!(after.len(), 1);
}

#[rstest]
fn test_colliding_overwrite_deep_in_the_chain() {
    let first = PinnedHash(1);
    let second = PinnedHash(2);

    let map = PersistentHashMap::new()
        .insert(first.clone(), "jan".to_string())
        .insert(second.clone(), "feb".to_string())
        .insert(first.clone(), "june".to_string());

    assert_eq!(map.len(), 2);
    assert_eq!(map.get(&first), Some(&"june".to_string()));
    assert_eq!(map.get(&second), Some(&"feb".to_string()));
}

#[rstest]
fn test_colliding_remove_from_the_chain() {
    let map = PersistentHashMap::new()
        .insert(PinnedHash(1), 10)
        .insert(PinnedHash(2), 20)
        .insert(PinnedHash(3), 30)
        .insert(PinnedHash(4), 40);

    let shrunk = map.remove(&PinnedHash(3));

    assert_eq!(shrunk.len(), 3);
    assert_eq!(shrunk.get(&PinnedHash(1)), Some(&10));
    assert_eq!(shrunk.get(&PinnedHash(2)), Some(&20));
    assert_eq!(shrunk.get(&PinnedHash(3)), None);
    assert_eq!(shrunk.get(&PinnedHash(4)), Some(&40));
}

#[rstest]
fn test_chain_collapses_to_a_single_entry() {
    let first = PinnedHash(1);
    let second = PinnedHash(2);

    let map = PersistentHashMap::new()
        .insert(first.clone(), "jan".to_string())
        .insert(second.clone(), "feb".to_string());

    let collapsed = map.remove(&first);
    assert_eq!(collapsed.len(), 1);
    assert_eq!(collapsed.get(&first), None);
    assert_eq!(collapsed.get(&second), Some(&"feb".to_string()));

    let emptied = collapsed.remove(&second);
    assert!(emptied.is_empty());
}

#[rstest]
fn test_colliding_lookup_misses_cleanly() {
    let map = PersistentHashMap::new()
        .insert(PinnedHash(1), "jan".to_string())
        .insert(PinnedHash(2), "feb".to_string());

    // Lands in the occupied slot and walks the whole chain without a match.
    assert_eq!(map.get(&PinnedHash(9)), None);
}

#[rstest]
fn test_colliding_remove_of_absent_key_shares_the_tree() {
    let map = PersistentHashMap::new()
        .insert(PinnedHash(1), 10)
        .insert(PinnedHash(2), 20);

    let untouched = map.remove(&PinnedHash(9));
    assert_eq!(untouched.len(), 2);
    assert!(untouched.ptr_eq(&map));
}

#[rstest]
fn test_colliding_entries_all_iterate() {
    let map = PersistentHashMap::new()
        .insert(PinnedHash(1), 10)
        .insert(PinnedHash(2), 20)
        .insert(PinnedHash(3), 30);

    let mut values: Vec<i32> = map.iter().map(|(_, value)| *value).collect();
    values.sort_unstable();
    assert_eq!(values, vec![10, 20, 30]);
}

// =============================================================================
// Conditional Operations
// =============================================================================

#[rstest]
fn test_insert_if_absent_adds_missing_key() {
    let map = PersistentHashMap::new().insert("retries".to_string(), 3);
    let extended = map.insert_if_absent("timeout".to_string(), 30);

    assert_eq!(extended.len(), 2);
    assert_eq!(extended.get("timeout"), Some(&30));
}

#[rstest]
fn test_insert_if_absent_keeps_existing_value() {
    let map = PersistentHashMap::new().insert("retries".to_string(), 3);
    let kept = map.insert_if_absent("retries".to_string(), 99);

    assert_eq!(kept.get("retries"), Some(&3));
    assert!(kept.ptr_eq(&map));
}

#[rstest]
fn test_update_replaces_existing_value() {
    let map = PersistentHashMap::new().insert("retries".to_string(), 3);
    let updated = map.update("retries".to_string(), 10);

    assert_eq!(updated.get("retries"), Some(&10));
    assert_eq!(map.get("retries"), Some(&3));
}

#[rstest]
fn test_update_skips_missing_key() {
    let map = PersistentHashMap::new().insert("retries".to_string(), 3);
    let unchanged = map.update("timeout".to_string(), 30);

    assert_eq!(unchanged.len(), 1);
    assert_eq!(unchanged.get("timeout"), None);
    assert!(unchanged.ptr_eq(&map));
}

// =============================================================================
// Get Or Default
// =============================================================================

#[rstest]
fn test_get_or_default_returns_present_value() {
    let map = PersistentHashMap::new().insert("hits".to_string(), 7);
    assert_eq!(map.get_or_default("hits"), 7);
}

#[rstest]
fn test_get_or_default_falls_back_when_absent() {
    let map = PersistentHashMap::new().insert("hits".to_string(), 7);
    assert_eq!(map.get_or_default("misses"), 0);
}

// =============================================================================
// Iteration
// =============================================================================

#[rstest]
fn test_iter_on_empty_map() {
    let map = PersistentHashMap::<String, i32>::new();
    assert_eq!(map.iter().count(), 0);
}

#[rstest]
fn test_iter_reaches_every_entry() {
    let map = PersistentHashMap::new()
        .insert("jan".to_string(), 31)
        .insert("feb".to_string(), 28)
        .insert("mar".to_string(), 31);

    let mut entries: Vec<(String, i32)> = map
        .iter()
        .map(|(key, value)| (key.clone(), *value))
        .collect();
    entries.sort();

    assert_eq!(
        entries,
        vec![
            ("feb".to_string(), 28),
            ("jan".to_string(), 31),
            ("mar".to_string(), 31)
        ]
    );
}

#[rstest]
fn test_keys_projection() {
    let map = PersistentHashMap::new()
        .insert("jan".to_string(), 31)
        .insert("feb".to_string(), 28);

    let mut keys: Vec<String> = map.keys().cloned().collect();
    keys.sort();
    assert_eq!(keys, vec!["feb".to_string(), "jan".to_string()]);
}

#[rstest]
fn test_values_projection() {
    let map = PersistentHashMap::new()
        .insert("jan".to_string(), 31)
        .insert("feb".to_string(), 28);

    let mut values: Vec<i32> = map.values().copied().collect();
    values.sort_unstable();
    assert_eq!(values, vec![28, 31]);
}

#[rstest]
fn test_size_hint_is_exact() {
    let map = PersistentHashMap::new()
        .insert("jan".to_string(), 31)
        .insert("feb".to_string(), 28)
        .insert("mar".to_string(), 31);

    let entries = map.iter();
    assert_eq!(entries.size_hint(), (3, Some(3)));
    assert_eq!(entries.len(), 3);
}

#[rstest]
fn test_size_hint_shrinks_as_the_iterator_advances() {
    let map = PersistentHashMap::new()
        .insert("jan".to_string(), 31)
        .insert("feb".to_string(), 28)
        .insert("mar".to_string(), 31);

    let mut entries = map.iter();
    assert!(entries.next().is_some());

    assert_eq!(entries.size_hint(), (2, Some(2)));
    assert_eq!(entries.len(), 2);
}

#[rstest]
fn test_exhausted_iterator_stays_empty() {
    let map = PersistentHashMap::new().insert("jan".to_string(), 31);

    let mut entries = map.iter();
    assert!(entries.next().is_some());
    assert!(entries.next().is_none());
    assert!(entries.next().is_none());
    assert_eq!(entries.len(), 0);
}

#[rstest]
fn test_into_iter_moves_entries_out() {
    let map = PersistentHashMap::new()
        .insert("jan".to_string(), 31)
        .insert("feb".to_string(), 28);

    let mut drained: Vec<(String, i32)> = map.into_iter().collect();
    drained.sort();

    assert_eq!(
        drained,
        vec![("feb".to_string(), 28), ("jan".to_string(), 31)]
    );
}

#[rstest]
fn test_into_iter_size_hint_is_exact() {
    let map = PersistentHashMap::new()
        .insert("jan".to_string(), 31)
        .insert("feb".to_string(), 28);

    let entries = map.into_iter();
    assert_eq!(entries.size_hint(), (2, Some(2)));
}

#[rstest]
fn test_borrowing_for_loop() {
    let map = PersistentHashMap::new()
        .insert("jan".to_string(), 31)
        .insert("feb".to_string(), 28)
        .insert("mar".to_string(), 31);

    let mut days = 0;
    for (_, value) in &map {
        days += value;
    }
    assert_eq!(days, 90);
}

// =============================================================================
// Folds
// =============================================================================

#[rstest]
fn test_fold_left_totals_the_days() {
    let map = PersistentHashMap::new()
        .insert("jan".to_string(), 31)
        .insert("feb".to_string(), 28)
        .insert("mar".to_string(), 31);

    let days = map.fold_left(0, |accumulator, _key, value| accumulator + value);
    assert_eq!(days, 90);
}

#[rstest]
fn test_fold_right_mirrors_fold_left() {
    let map = PersistentHashMap::new()
        .insert("jan".to_string(), 31)
        .insert("feb".to_string(), 28)
        .insert("mar".to_string(), 31);

    let forward = map.fold_left(Vec::new(), |mut accumulator, key, _value| {
        accumulator.push(key.clone());
        accumulator
    });
    let mut backward = map.fold_right(Vec::new(), |key, _value, mut accumulator| {
        accumulator.push(key.clone());
        accumulator
    });
    backward.reverse();

    assert_eq!(forward, backward);
}

#[rstest]
fn test_for_each_visits_every_entry() {
    let map = PersistentHashMap::new()
        .insert("jan".to_string(), 31)
        .insert("feb".to_string(), 28);

    let mut total = 0;
    let mut count = 0;
    map.for_each(|_key, value| {
        total += value;
        count += 1;
    });

    assert_eq!(total, 59);
    assert_eq!(count, 2);
}

// =============================================================================
// Collecting
// =============================================================================

#[rstest]
fn test_collect_from_pairs() {
    let pairs = vec![
        ("jan".to_string(), 31),
        ("feb".to_string(), 28),
        ("mar".to_string(), 31),
    ];
    let map: PersistentHashMap<String, i32> = pairs.into_iter().collect();

    assert_eq!(map.len(), 3);
    assert_eq!(map.get("jan"), Some(&31));
    assert_eq!(map.get("feb"), Some(&28));
    assert_eq!(map.get("mar"), Some(&31));
}

#[rstest]
fn test_collect_keeps_the_last_duplicate() {
    let pairs = vec![
        ("feb".to_string(), 28),
        ("feb".to_string(), 29), // leap year correction wins
        ("mar".to_string(), 31),
    ];
    let map: PersistentHashMap<String, i32> = pairs.into_iter().collect();

    assert_eq!(map.len(), 2);
    assert_eq!(map.get("feb"), Some(&29));
}

// =============================================================================
// Equality and Debug
// =============================================================================

#[rstest]
fn test_eq_ignores_insertion_order() {
    let forward = PersistentHashMap::new()
        .insert("retries".to_string(), 3)
        .insert("timeout".to_string(), 30);
    let backward = PersistentHashMap::new()
        .insert("timeout".to_string(), 30)
        .insert("retries".to_string(), 3);

    assert_eq!(forward, backward);
}

#[rstest]
fn test_ne_when_values_differ() {
    let low = PersistentHashMap::new().insert("retries".to_string(), 3);
    let high = PersistentHashMap::new().insert("retries".to_string(), 5);

    assert_ne!(low, high);
}

#[rstest]
fn test_ne_when_lengths_differ() {
    let shorter = PersistentHashMap::new().insert("retries".to_string(), 3);
    let longer = shorter.insert("timeout".to_string(), 30);

    assert_ne!(shorter, longer);
}

#[rstest]
fn test_empty_maps_are_equal() {
    let left: PersistentHashMap<String, i32> = PersistentHashMap::new();
    let right: PersistentHashMap<String, i32> = PersistentHashMap::new();

    assert_eq!(left, right);
}

#[rstest]
fn test_eq_ignores_chain_order() {
    let first = PinnedHash(1);
    let second = PinnedHash(2);

    // Same pairs, chained in opposite order
    let one_way = PersistentHashMap::new()
        .insert(first.clone(), 10)
        .insert(second.clone(), 20);
    let other_way = PersistentHashMap::new()
        .insert(second, 20)
        .insert(first, 10);

    assert_eq!(one_way, other_way);
}

#[rstest]
fn test_debug_mentions_every_entry() {
    let map = PersistentHashMap::new()
        .insert("retries".to_string(), 3)
        .insert("timeout".to_string(), 30);

    let rendered = format!("{map:?}");
    assert!(rendered.contains("retries"));
    assert!(rendered.contains('3'));
    assert!(rendered.contains("timeout"));
    assert!(rendered.contains("30"));
}

// =============================================================================
// Borrowed Lookups
// =============================================================================

#[rstest]
fn test_str_lookup_on_string_keys() {
    let map = PersistentHashMap::new().insert("endpoint".to_string(), 443);

    // &str reaches entries stored under String keys
    assert_eq!(map.get("endpoint"), Some(&443));
}

#[rstest]
fn test_str_contains_on_string_keys() {
    let map = PersistentHashMap::new().insert("endpoint".to_string(), 443);

    assert!(map.contains_key("endpoint"));
    assert!(!map.contains_key("gateway"));
}

#[rstest]
fn test_str_removal_on_string_keys() {
    let map = PersistentHashMap::new()
        .insert("endpoint".to_string(), 443)
        .insert("gateway".to_string(), 80);

    let shrunk = map.remove("endpoint");

    assert_eq!(shrunk.len(), 1);
    assert_eq!(shrunk.get("endpoint"), None);
    assert_eq!(shrunk.get("gateway"), Some(&80));
}

// =============================================================================
// Scale
// =============================================================================

#[rstest]
fn test_bulk_integer_keys_round_trip() {
    let map: PersistentHashMap<i32, i32> = (0..900).map(|key| (key, key * 3)).collect();

    assert_eq!(map.len(), 900);
    for key in 0..900 {
        assert_eq!(map.get(&key), Some(&(key * 3)));
    }
    assert_eq!(map.get(&900), None);
}

#[rstest]
fn test_bulk_removals_leave_the_rest() {
    let mut map: PersistentHashMap<i32, i32> = (0..640).map(|key| (key, key)).collect();

    for key in (0..640).step_by(2) {
        map = map.remove(&key);
    }

    assert_eq!(map.len(), 320);
    for key in 0..640 {
        if key % 2 == 0 {
            assert_eq!(map.get(&key), None);
        } else {
            assert_eq!(map.get(&key), Some(&key));
        }
    }
}

// =============================================================================
// Structural Sharing
// =============================================================================

#[rstest]
fn test_forty_forks_of_one_base() {
    let base = PersistentHashMap::new()
        .insert("jan".to_string(), 31)
        .insert("feb".to_string(), 28);

    let forks: Vec<PersistentHashMap<String, i32>> = (3..43)
        .map(|number| base.insert(format!("extra_{number}"), number))
        .collect();

    for (number, fork) in (3..43).zip(&forks) {
        assert_eq!(fork.len(), 3);
        assert_eq!(fork.get(&format!("extra_{number}")), Some(&number));
        assert_eq!(fork.get("jan"), Some(&31));
        assert_eq!(fork.get("feb"), Some(&28));
    }

    assert_eq!(base.len(), 2);
}

#[rstest]
fn test_clone_shares_the_tree() {
    let map = PersistentHashMap::new().insert("retries".to_string(), 3);
    let cloned = map.clone();

    assert_eq!(cloned, map);
    assert!(cloned.ptr_eq(&map));
}
