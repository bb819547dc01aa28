//! Persistent (immutable) hash map layered over the int-keyed tree.
//!
//! This module provides [`PersistentHashMap`], an immutable map for
//! arbitrary `Hash + Eq` keys that uses structural sharing for
//! efficient operations.
//!
//! # Overview
//!
//! `PersistentHashMap` folds each key's hash into an `i32` slot and
//! stores the entry in a [`PersistentIntMap`] keyed by that slot. Keys
//! whose folded hashes coincide share a slot through a small collision
//! chain, so lookups stay correct for any hash function.
//!
//! - O(log N) get
//! - O(log N) insert
//! - O(log N) remove
//! - O(1) `len`, `is_empty`, and `clone`
//!
//! Every operation leaves the receiver intact and hands back a new
//! map that shares all untouched slots with it.
//!
//! # Examples
//!
//! ```rust
//! use broadleaf::persistent::PersistentHashMap;
//!
//! let ports = PersistentHashMap::new()
//!     .insert("smtp".to_string(), 25)
//!     .insert("dns".to_string(), 53);
//!
//! assert_eq!(ports.get("smtp"), Some(&25));
//!
//! // Rebinding a key forks the map; both versions stay readable.
//! let submission = ports.insert("smtp".to_string(), 587);
//! assert_eq!(ports.get("smtp"), Some(&25));
//! assert_eq!(submission.get("smtp"), Some(&587));
//! ```
//!
//! # Hashing
//!
//! Keys are hashed with `DefaultHasher` unless a faster hasher is
//! selected at build time: the `fxhash` feature switches to
//! `rustc_hash::FxHasher` and the `ahash` feature to `ahash::AHasher`,
//! with `fxhash` taking precedence when both are enabled. The 64-bit
//! hash is xor-folded into the signed 32-bit slot space.

use super::Shared;
use super::intmap::{PersistentIntMap, PersistentIntMapIterator};
use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::iter::{FromIterator, FusedIterator};

#[cfg(feature = "fxhash")]
use rustc_hash::FxHasher;

#[cfg(all(feature = "ahash", not(feature = "fxhash")))]
use ahash::AHasher;

#[cfg(not(any(feature = "fxhash", feature = "ahash")))]
use std::collections::hash_map::DefaultHasher;

// =============================================================================
// Hash Computation
// =============================================================================

/// Hashes a key and folds the result into the signed 32-bit slot space.
///
/// The upper half is xor-folded into the lower half so keys that only
/// differ in high hash bits still land in distinct slots.
#[allow(clippy::cast_possible_truncation)]
fn hash_key<K: Hash + ?Sized>(key: &K) -> i32 {
    #[cfg(feature = "fxhash")]
    let mut hasher = FxHasher::default();

    #[cfg(all(feature = "ahash", not(feature = "fxhash")))]
    let mut hasher = AHasher::default();

    #[cfg(not(any(feature = "fxhash", feature = "ahash")))]
    let mut hasher = DefaultHasher::new();

    key.hash(&mut hasher);
    let hash = hasher.finish();
    (hash ^ (hash >> 32)) as i32
}

// =============================================================================
// Bucket Definition
// =============================================================================

/// Payload of one slot: almost always a single entry, widening to a
/// shared chain only when distinct keys fold to the same slot.
enum Bucket<K, V> {
    Single(K, V),
    Chain(Shared<[(K, V)]>),
}

impl<K, V> Bucket<K, V> {
    fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        match self {
            Self::Single(existing, value) => (existing.borrow() == key).then_some(value),
            Self::Chain(pairs) => pairs
                .iter()
                .find(|(existing, _)| existing.borrow() == key)
                .map(|(_, value)| value),
        }
    }
}

impl<K: Clone + Eq, V: Clone> Bucket<K, V> {
    /// Adds or replaces `key` within the bucket.
    ///
    /// The boolean is `true` when a new key joined the bucket and
    /// `false` when an existing value was replaced.
    fn inserted(&self, key: K, value: V) -> (Self, bool) {
        match self {
            Self::Single(existing, existing_value) => {
                if *existing == key {
                    (Self::Single(key, value), false)
                } else {
                    (
                        Self::Chain(Shared::from([
                            (existing.clone(), existing_value.clone()),
                            (key, value),
                        ])),
                        true,
                    )
                }
            }
            Self::Chain(pairs) => {
                if let Some(at) = pairs.iter().position(|(existing, _)| *existing == key) {
                    let replaced: Vec<(K, V)> = pairs
                        .iter()
                        .enumerate()
                        .map(|(index, pair)| {
                            if index == at {
                                (key.clone(), value.clone())
                            } else {
                                pair.clone()
                            }
                        })
                        .collect();
                    (Self::Chain(Shared::from(replaced)), false)
                } else {
                    let extended: Vec<(K, V)> = pairs
                        .iter()
                        .cloned()
                        .chain(std::iter::once((key, value)))
                        .collect();
                    (Self::Chain(Shared::from(extended)), true)
                }
            }
        }
    }
}

// =============================================================================
// PersistentHashMap
// =============================================================================

/// A persistent (immutable) hash map built on a balanced search tree
/// of folded hash slots.
///
/// `PersistentHashMap` is an immutable data structure that uses
/// structural sharing to efficiently support functional programming
/// patterns. Every update returns a new map and shares all untouched
/// structure with the original, so old versions remain valid and cheap
/// to keep around. Cloning a map is O(1).
///
/// Entries whose keys fold to the same hash slot are kept in a short
/// chain inside that slot; operations on a chain are linear in the
/// chain length, which stays tiny for any reasonable hash function.
///
/// Values are stored as-is. A value type with interior mutability
/// (`RefCell`, `Mutex`) can still be mutated through a shared map, and
/// such mutation is visible to every version sharing the node; keeping
/// that sound is the caller's concern, and plain values are immune.
///
/// # Performance
///
/// | Operation | Cost |
/// |-----------|------|
/// | `get` | O(log N) |
/// | `insert` | O(log N) |
/// | `remove` | O(log N) |
/// | `len` / `is_empty` | O(1) |
/// | `iter` | O(N) |
///
/// # Examples
///
/// ```rust
/// use broadleaf::persistent::PersistentHashMap;
///
/// let counters = PersistentHashMap::new()
///     .insert("reads".to_string(), 310)
///     .insert("writes".to_string(), 12);
///
/// assert_eq!(counters.len(), 2);
/// assert_eq!(counters.get("reads"), Some(&310));
/// assert!(counters.remove("absent").ptr_eq(&counters));
/// ```
pub struct PersistentHashMap<K, V> {
    slots: PersistentIntMap<Bucket<K, V>>,
    length: usize,
}

impl<K, V> PersistentHashMap<K, V> {
    /// Returns the empty map.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use broadleaf::persistent::PersistentHashMap;
    ///
    /// let empty = PersistentHashMap::<String, i32>::new();
    /// assert_eq!(empty.len(), 0);
    /// ```
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: PersistentIntMap::new(),
            length: 0,
        }
    }

    /// Returns how many keys the map holds.
    ///
    /// Chained keys are counted individually.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.length
    }

    /// Returns `true` when the map holds nothing.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Returns `true` when both maps share the same underlying tree.
    ///
    /// This is the cheap way to detect that an operation such as
    /// [`remove`](Self::remove) or
    /// [`insert_if_absent`](Self::insert_if_absent) left the map
    /// untouched. Two empty maps always compare equal here.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use broadleaf::persistent::PersistentHashMap;
    ///
    /// let base = PersistentHashMap::new().insert("base".to_string(), 1);
    /// assert!(base.clone().ptr_eq(&base));
    /// assert!(!base.insert("next".to_string(), 2).ptr_eq(&base));
    /// ```
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.slots.ptr_eq(&other.slots)
    }

    /// Walks the entries lazily, slot by slot.
    ///
    /// The order follows the folded hash slots and is deterministic
    /// for a given map, but has no relation to key ordering.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use broadleaf::persistent::PersistentHashMap;
    ///
    /// let days = PersistentHashMap::new()
    ///     .insert("jan".to_string(), 31)
    ///     .insert("feb".to_string(), 28);
    ///
    /// let total: i32 = days.iter().map(|(_, count)| count).sum();
    /// assert_eq!(total, 59);
    /// ```
    #[must_use]
    pub fn iter(&self) -> PersistentHashMapIterator<'_, K, V> {
        let empty: &[(K, V)] = &[];
        PersistentHashMapIterator {
            slots: self.slots.iter(),
            chain: empty.iter(),
            remaining: self.length,
        }
    }

    /// Iterates over the keys in slot order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use broadleaf::persistent::PersistentHashMap;
    ///
    /// let days = PersistentHashMap::new()
    ///     .insert("jan".to_string(), 31)
    ///     .insert("feb".to_string(), 28);
    ///
    /// assert_eq!(days.keys().count(), 2);
    /// ```
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(key, _)| key)
    }

    /// Iterates over the values in slot order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use broadleaf::persistent::PersistentHashMap;
    ///
    /// let days = PersistentHashMap::new()
    ///     .insert("jan".to_string(), 31)
    ///     .insert("feb".to_string(), 28);
    ///
    /// assert_eq!(days.values().max(), Some(&31));
    /// ```
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, value)| value)
    }

    /// Folds every entry into an accumulator in slot order, walking
    /// chained entries oldest first.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use broadleaf::persistent::PersistentHashMap;
    ///
    /// let days = PersistentHashMap::new()
    ///     .insert("jan".to_string(), 31)
    ///     .insert("feb".to_string(), 28);
    ///
    /// let total = days.fold_left(0, |accumulator, _key, count| accumulator + count);
    /// assert_eq!(total, 59);
    /// ```
    pub fn fold_left<B, F>(&self, initial: B, mut function: F) -> B
    where
        F: FnMut(B, &K, &V) -> B,
    {
        self.slots
            .fold_left(initial, |accumulator, _slot, bucket| match bucket {
                Bucket::Single(key, value) => function(accumulator, key, value),
                Bucket::Chain(pairs) => {
                    pairs.iter().fold(accumulator, |accumulator, (key, value)| {
                        function(accumulator, key, value)
                    })
                }
            })
    }

    /// Folds every entry into an accumulator in reverse slot order,
    /// walking chained entries newest first.
    pub fn fold_right<B, F>(&self, initial: B, mut function: F) -> B
    where
        F: FnMut(&K, &V, B) -> B,
    {
        self.slots
            .fold_right(initial, |_slot, bucket, accumulator| match bucket {
                Bucket::Single(key, value) => function(key, value, accumulator),
                Bucket::Chain(pairs) => {
                    pairs
                        .iter()
                        .rev()
                        .fold(accumulator, |accumulator, (key, value)| {
                            function(key, value, accumulator)
                        })
                }
            })
    }

    /// Calls `function` on every entry in iteration order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use broadleaf::persistent::PersistentHashMap;
    ///
    /// let days = PersistentHashMap::new()
    ///     .insert("jan".to_string(), 31)
    ///     .insert("feb".to_string(), 28);
    ///
    /// let mut total = 0;
    /// days.for_each(|_key, count| total += count);
    /// assert_eq!(total, 59);
    /// ```
    pub fn for_each<F>(&self, mut function: F)
    where
        F: FnMut(&K, &V),
    {
        self.fold_left((), |(), key, value| function(key, value));
    }
}

impl<K: Hash + Eq, V> PersistentHashMap<K, V> {
    /// Looks up the value bound to `key`.
    ///
    /// Any borrowed form of the key type works, as long as it hashes
    /// and compares the same way as the owned form.
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use broadleaf::persistent::PersistentHashMap;
    ///
    /// let heights = PersistentHashMap::new().insert("everest".to_string(), 8849);
    ///
    /// // A `&str` reaches the `String` key through `Borrow`.
    /// assert_eq!(heights.get("everest"), Some(&8849));
    /// assert_eq!(heights.get("olympus"), None);
    /// ```
    #[must_use]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.slots.get(hash_key(key))?.get(key)
    }

    /// Returns `true` when `key` has a binding.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use broadleaf::persistent::PersistentHashMap;
    ///
    /// let flags = PersistentHashMap::new().insert("dark_mode".to_string(), true);
    /// assert!(flags.contains_key("dark_mode"));
    /// assert!(!flags.contains_key("telemetry"));
    /// ```
    #[must_use]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).is_some()
    }

    /// Returns the value for the key, or `V::default()` when absent.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use broadleaf::persistent::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::new().insert("hits".to_string(), 3);
    /// assert_eq!(map.get_or_default("hits"), 3);
    /// assert_eq!(map.get_or_default("misses"), 0);
    /// ```
    #[must_use]
    pub fn get_or_default<Q>(&self, key: &Q) -> V
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone + Default,
    {
        self.get(key).cloned().unwrap_or_default()
    }
}

impl<K: Clone + Hash + Eq, V: Clone> PersistentHashMap<K, V> {
    /// Builds a map holding exactly one entry.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use broadleaf::persistent::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::singleton("seed".to_string(), 7);
    /// assert_eq!(map.len(), 1);
    /// assert_eq!(map.get("seed"), Some(&7));
    /// ```
    #[inline]
    #[must_use]
    pub fn singleton(key: K, value: V) -> Self {
        let slot = hash_key(&key);
        Self {
            slots: PersistentIntMap::singleton(slot, Bucket::Single(key, value)),
            length: 1,
        }
    }

    /// Binds `key` to `value`, superseding any earlier binding.
    ///
    /// The receiver is left as it was; the returned map is a new
    /// version that shares every untouched slot with it.
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use broadleaf::persistent::PersistentHashMap;
    ///
    /// let first = PersistentHashMap::new().insert("attempts".to_string(), 1);
    /// let second = first.insert("attempts".to_string(), 2);
    ///
    /// assert_eq!(first.get("attempts"), Some(&1));
    /// assert_eq!(second.get("attempts"), Some(&2));
    /// ```
    #[must_use]
    pub fn insert(&self, key: K, value: V) -> Self {
        let slot = hash_key(&key);
        match self.slots.get(slot) {
            None => Self {
                slots: self.slots.insert(slot, Bucket::Single(key, value)),
                length: self.length + 1,
            },
            Some(bucket) => {
                let (bucket, added) = bucket.inserted(key, value);
                Self {
                    slots: self.slots.insert(slot, bucket),
                    length: self.length + usize::from(added),
                }
            }
        }
    }

    /// Inserts the pair only when the key is absent.
    ///
    /// When the key is already present the map is returned as-is,
    /// value untouched, sharing the original tree.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use broadleaf::persistent::PersistentHashMap;
    ///
    /// let roles = PersistentHashMap::new().insert("leader".to_string(), 1);
    ///
    /// let kept = roles.insert_if_absent("leader".to_string(), 9);
    /// assert!(kept.ptr_eq(&roles));
    /// assert_eq!(kept.get("leader"), Some(&1));
    ///
    /// let extended = roles.insert_if_absent("backup".to_string(), 2);
    /// assert_eq!(extended.get("backup"), Some(&2));
    /// ```
    #[must_use]
    pub fn insert_if_absent(&self, key: K, value: V) -> Self {
        if self.contains_key(&key) {
            self.clone()
        } else {
            self.insert(key, value)
        }
    }

    /// Replaces the value only when the key is already present.
    ///
    /// When the key is absent the map is returned as-is, sharing the
    /// original tree.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use broadleaf::persistent::PersistentHashMap;
    ///
    /// let limits = PersistentHashMap::new().insert("quota".to_string(), 10);
    ///
    /// let raised = limits.update("quota".to_string(), 20);
    /// assert_eq!(raised.get("quota"), Some(&20));
    ///
    /// let unchanged = limits.update("burst".to_string(), 5);
    /// assert!(unchanged.ptr_eq(&limits));
    /// ```
    #[must_use]
    pub fn update(&self, key: K, value: V) -> Self {
        if self.contains_key(&key) {
            self.insert(key, value)
        } else {
            self.clone()
        }
    }

    /// Deletes the entry for `key`.
    ///
    /// When the key is absent the map is returned as-is, sharing the
    /// original tree. A two-entry chain collapses back to a single
    /// entry when one of its keys leaves.
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use broadleaf::persistent::PersistentHashMap;
    ///
    /// let cache = PersistentHashMap::new()
    ///     .insert("stale".to_string(), 1)
    ///     .insert("fresh".to_string(), 2);
    ///
    /// let evicted = cache.remove("stale");
    /// assert_eq!(evicted.get("stale"), None);
    /// assert_eq!(evicted.len(), 1);
    /// assert_eq!(cache.len(), 2);
    /// ```
    #[must_use]
    pub fn remove<Q>(&self, key: &Q) -> Self
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot = hash_key(key);
        let Some(bucket) = self.slots.get(slot) else {
            return self.clone();
        };
        match bucket {
            Bucket::Single(existing, _) => {
                if existing.borrow() == key {
                    Self {
                        slots: self.slots.remove(slot),
                        length: self.length - 1,
                    }
                } else {
                    self.clone()
                }
            }
            Bucket::Chain(pairs) => {
                let Some(at) = pairs
                    .iter()
                    .position(|(existing, _)| existing.borrow() == key)
                else {
                    return self.clone();
                };
                let replacement = if pairs.len() == 2 {
                    let (kept_key, kept_value) = pairs[1 - at].clone();
                    Bucket::Single(kept_key, kept_value)
                } else {
                    let kept: Vec<(K, V)> = pairs
                        .iter()
                        .enumerate()
                        .filter(|(index, _)| *index != at)
                        .map(|(_, pair)| pair.clone())
                        .collect();
                    Bucket::Chain(Shared::from(kept))
                };
                Self {
                    slots: self.slots.insert(slot, replacement),
                    length: self.length - 1,
                }
            }
        }
    }
}

// =============================================================================
// Iterators
// =============================================================================

/// An iterator over the entries of a [`PersistentHashMap`] in slot
/// order.
///
/// Created by [`PersistentHashMap::iter`]. The iterator walks the
/// underlying slot tree lazily and unpacks collision chains as it
/// meets them.
pub struct PersistentHashMapIterator<'a, K, V> {
    slots: PersistentIntMapIterator<'a, Bucket<K, V>>,
    chain: std::slice::Iter<'a, (K, V)>,
    remaining: usize,
}

impl<'a, K, V> Iterator for PersistentHashMapIterator<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((key, value)) = self.chain.next() {
                self.remaining -= 1;
                return Some((key, value));
            }
            match self.slots.next()?.1 {
                Bucket::Single(key, value) => {
                    self.remaining -= 1;
                    return Some((key, value));
                }
                Bucket::Chain(pairs) => self.chain = pairs.iter(),
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for PersistentHashMapIterator<'_, K, V> {
    fn len(&self) -> usize {
        self.remaining
    }
}

impl<K, V> FusedIterator for PersistentHashMapIterator<'_, K, V> {}

/// An owning iterator over the entries of a [`PersistentHashMap`].
pub struct PersistentHashMapIntoIterator<K, V> {
    pairs: Vec<(K, V)>,
    cursor: usize,
}

impl<K: Clone, V: Clone> Iterator for PersistentHashMapIntoIterator<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor < self.pairs.len() {
            let pair = self.pairs[self.cursor].clone();
            self.cursor += 1;
            Some(pair)
        } else {
            None
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.pairs.len() - self.cursor;
        (remaining, Some(remaining))
    }
}

impl<K: Clone, V: Clone> ExactSizeIterator for PersistentHashMapIntoIterator<K, V> {}

impl<K: Clone, V: Clone> FusedIterator for PersistentHashMapIntoIterator<K, V> {}

// =============================================================================
// Trait Implementations
// =============================================================================

impl<K, V> Clone for PersistentHashMap<K, V> {
    /// Clones the map in O(1) by sharing the slot tree.
    #[inline]
    fn clone(&self) -> Self {
        Self {
            slots: self.slots.clone(),
            length: self.length,
        }
    }
}

impl<K, V> Default for PersistentHashMap<K, V> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone + Hash + Eq, V: Clone> FromIterator<(K, V)> for PersistentHashMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iterator: I) -> Self {
        let mut map = Self::new();
        for (key, value) in iterator {
            map = map.insert(key, value);
        }
        map
    }
}

impl<K: Clone, V: Clone> IntoIterator for PersistentHashMap<K, V> {
    type Item = (K, V);
    type IntoIter = PersistentHashMapIntoIterator<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        let pairs: Vec<(K, V)> = self
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        PersistentHashMapIntoIterator { pairs, cursor: 0 }
    }
}

impl<'a, K, V> IntoIterator for &'a PersistentHashMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = PersistentHashMapIterator<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: Hash + Eq, V: PartialEq> PartialEq for PersistentHashMap<K, V> {
    /// Compares by content, ignoring slot order and chain history.
    fn eq(&self, other: &Self) -> bool {
        if self.length != other.length {
            return false;
        }
        for (key, value) in self {
            match other.get(key) {
                Some(found) if found == value => {}
                _ => return false,
            }
        }
        true
    }
}

impl<K: Hash + Eq, V: Eq> Eq for PersistentHashMap<K, V> {}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for PersistentHashMap<K, V> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_map().entries(self.iter()).finish()
    }
}

// =============================================================================
// Serde Support
// =============================================================================

#[cfg(feature = "serde")]
impl<K, V> serde::Serialize for PersistentHashMap<K, V>
where
    K: serde::Serialize,
    V: serde::Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[cfg(feature = "serde")]
struct PersistentHashMapVisitor<K, V> {
    entry_types: std::marker::PhantomData<(K, V)>,
}

#[cfg(feature = "serde")]
impl<K, V> PersistentHashMapVisitor<K, V> {
    const fn new() -> Self {
        Self {
            entry_types: std::marker::PhantomData,
        }
    }
}

#[cfg(feature = "serde")]
impl<'de, K, V> serde::de::Visitor<'de> for PersistentHashMapVisitor<K, V>
where
    K: serde::Deserialize<'de> + Clone + Hash + Eq,
    V: serde::Deserialize<'de> + Clone,
{
    type Value = PersistentHashMap<K, V>;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("a map")
    }

    fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: serde::de::MapAccess<'de>,
    {
        // Entries go into the map as they arrive rather than through an
        // intermediate Vec.
        let mut map = PersistentHashMap::new();
        while let Some((key, value)) = access.next_entry()? {
            map = map.insert(key, value);
        }
        Ok(map)
    }
}

#[cfg(feature = "serde")]
impl<'de, K, V> serde::Deserialize<'de> for PersistentHashMap<K, V>
where
    K: serde::Deserialize<'de> + Clone + Hash + Eq,
    V: serde::Deserialize<'de> + Clone,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_map(PersistentHashMapVisitor::new())
    }
}

// =============================================================================
// Thread Safety Assertions
// =============================================================================

#[cfg(feature = "arc")]
static_assertions::assert_impl_all!(PersistentHashMap<String, i32>: Send, Sync);

#[cfg(not(feature = "arc"))]
static_assertions::assert_not_impl_any!(PersistentHashMap<String, i32>: Send, Sync);

// =============================================================================
// Tests
// =============================================================================
