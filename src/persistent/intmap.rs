//! Persistent (immutable) map from `i32` keys, based on a balanced
//! multiway search tree.
//!
//! This module provides [`PersistentIntMap`], an immutable ordered map
//! specialized to `i32` keys that uses structural sharing for efficient
//! operations.
//!
//! # Overview
//!
//! `PersistentIntMap` is built on a 2-3-4 style search tree with wide
//! leaves: leaf nodes carry two to five sorted entries, interior nodes
//! carry one or two separator entries. Keeping leaves wide makes the
//! tree shallow, so update paths stay short.
//!
//! - O(log N) get
//! - O(log N) insert
//! - O(log N) remove
//! - O(1) `len`, `is_empty`, and `clone`
//! - O(N) iteration in ascending key order
//!
//! All operations return new maps without modifying the original, and
//! structural sharing ensures that an update allocates only the path
//! from the changed node to the root.
//!
//! # Examples
//!
//! ```rust
//! use broadleaf::persistent::PersistentIntMap;
//!
//! let map = PersistentIntMap::new()
//!     .insert(3, "earth")
//!     .insert(1, "mercury")
//!     .insert(2, "venus");
//!
//! // Entries are always in ascending key order
//! let keys: Vec<i32> = map.keys().collect();
//! assert_eq!(keys, vec![1, 2, 3]);
//!
//! // Updates leave the original untouched
//! let smaller = map.remove(2);
//! assert_eq!(smaller.len(), 2);
//! assert_eq!(map.len(), 3);
//! ```
//!
//! # Internal Structure
//!
//! The tree maintains the following invariants:
//! 1. Leaf nodes hold 2 to 5 entries in strictly ascending key order;
//!    a single-entry leaf may appear only at the root
//! 2. Interior nodes hold one separator (two children) or two
//!    separators (three children), and every key in a subtree lies
//!    strictly between the separators around it
//! 3. Every leaf sits at the same depth
//! 4. Published nodes are never mutated; updates build fresh nodes
//!    bottom-up and share every untouched subtree
//!
//! Inserting into a full leaf splits it around its middle entry, and
//! the split propagates upward only while parents are already at
//! maximum width. Removal mirrors this: an underfull node borrows from
//! or merges with an adjacent sibling, and the tree only loses a level
//! at the root.

use super::Shared;
use smallvec::SmallVec;
use std::array;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::iter::{FromIterator, FusedIterator};

// =============================================================================
// Entry Definition
// =============================================================================

/// Reference-counted handle to an entry, shared between tree versions.
type SharedEntry<V> = Shared<Entry<V>>;

/// Reference-counted handle to a node, shared between tree versions.
type SharedNode<V> = Shared<Node<V>>;

/// A key-value pair stored in the tree.
struct Entry<V> {
    key: i32,
    value: V,
}

impl<V> Entry<V> {
    fn shared(key: i32, value: V) -> SharedEntry<V> {
        Shared::new(Self { key, value })
    }
}

// =============================================================================
// Node Definition
// =============================================================================

/// Internal node of the multiway search tree.
///
/// Leaf variants store their entries in strictly ascending key order.
/// `Branch2` separates two subtrees with one entry; `Branch3` separates
/// three subtrees with two entries. `Branch3` exists so a parent can
/// absorb a child split without splitting itself.
enum Node<V> {
    Leaf1(SharedEntry<V>),
    Leaf2([SharedEntry<V>; 2]),
    Leaf3([SharedEntry<V>; 3]),
    Leaf4([SharedEntry<V>; 4]),
    Leaf5([SharedEntry<V>; 5]),
    Branch2 {
        left: SharedNode<V>,
        entry: SharedEntry<V>,
        right: SharedNode<V>,
    },
    Branch3 {
        left: SharedNode<V>,
        first: SharedEntry<V>,
        middle: SharedNode<V>,
        second: SharedEntry<V>,
        right: SharedNode<V>,
    },
}

// =============================================================================
// Entry Array Helpers
// =============================================================================

/// Locates `key` in a sorted entry slice.
///
/// Returns `Ok(index)` when the key is present, `Err(index)` with the
/// insertion point when it is not.
fn position<V>(entries: &[SharedEntry<V>], key: i32) -> Result<usize, usize> {
    entries.binary_search_by(|entry| entry.key.cmp(&key))
}

fn found<V>(entries: &[SharedEntry<V>], key: i32) -> Option<&V> {
    position(entries, key).ok().map(|at| &entries[at].value)
}

/// Copies an entry array with the entry at `at` swapped out.
fn replaced<V, const N: usize>(
    entries: &[SharedEntry<V>; N],
    at: usize,
    entry: &SharedEntry<V>,
) -> [SharedEntry<V>; N] {
    array::from_fn(|index| {
        if index == at {
            entry.clone()
        } else {
            entries[index].clone()
        }
    })
}

/// Copies an entry array with `entry` inserted at `at`, growing by one.
fn spliced<V, const N: usize, const M: usize>(
    entries: &[SharedEntry<V>; N],
    at: usize,
    entry: &SharedEntry<V>,
) -> [SharedEntry<V>; M] {
    debug_assert_eq!(N + 1, M);
    array::from_fn(|index| match index.cmp(&at) {
        Ordering::Less => entries[index].clone(),
        Ordering::Equal => entry.clone(),
        Ordering::Greater => entries[index - 1].clone(),
    })
}

/// Copies an entry array with the entry at `at` dropped, shrinking by one.
fn shrunk<V, const N: usize, const M: usize>(
    entries: &[SharedEntry<V>; N],
    at: usize,
) -> [SharedEntry<V>; M] {
    debug_assert_eq!(N, M + 1);
    array::from_fn(|index| {
        if index < at {
            entries[index].clone()
        } else {
            entries[index + 1].clone()
        }
    })
}

// =============================================================================
// Insertion
// =============================================================================

/// Result of inserting into a subtree.
///
/// A subtree either absorbs the entry in place, or splits into two
/// nodes around a separator entry that the caller must adopt. When an
/// overflow reaches the top, a fresh root is built around the
/// separator and the tree grows one level.
enum Inserted<V> {
    /// The subtree accommodated the entry without growing.
    Absorbed(Node<V>),
    /// The subtree split into `(left, separator, right)`.
    Overflowed(Node<V>, SharedEntry<V>, Node<V>),
}

impl<V> Node<V> {
    /// Inserts `key` into the subtree, never mutating existing nodes.
    ///
    /// The boolean is `true` when a new key was added and `false` when
    /// an existing value was replaced.
    #[allow(clippy::too_many_lines)]
    fn inserted(&self, key: i32, value: V) -> (Inserted<V>, bool) {
        match self {
            Self::Leaf1(existing) => match key.cmp(&existing.key) {
                Ordering::Less => (
                    Inserted::Absorbed(Self::Leaf2([Entry::shared(key, value), existing.clone()])),
                    true,
                ),
                Ordering::Equal => (
                    Inserted::Absorbed(Self::Leaf1(Entry::shared(key, value))),
                    false,
                ),
                Ordering::Greater => (
                    Inserted::Absorbed(Self::Leaf2([existing.clone(), Entry::shared(key, value)])),
                    true,
                ),
            },
            Self::Leaf2(entries) => match position(entries, key) {
                Ok(at) => (
                    Inserted::Absorbed(Self::Leaf2(replaced(entries, at, &Entry::shared(key, value)))),
                    false,
                ),
                Err(at) => (
                    Inserted::Absorbed(Self::Leaf3(spliced(entries, at, &Entry::shared(key, value)))),
                    true,
                ),
            },
            Self::Leaf3(entries) => match position(entries, key) {
                Ok(at) => (
                    Inserted::Absorbed(Self::Leaf3(replaced(entries, at, &Entry::shared(key, value)))),
                    false,
                ),
                Err(at) => (
                    Inserted::Absorbed(Self::Leaf4(spliced(entries, at, &Entry::shared(key, value)))),
                    true,
                ),
            },
            Self::Leaf4(entries) => match position(entries, key) {
                Ok(at) => (
                    Inserted::Absorbed(Self::Leaf4(replaced(entries, at, &Entry::shared(key, value)))),
                    false,
                ),
                Err(at) => (
                    Inserted::Absorbed(Self::Leaf5(spliced(entries, at, &Entry::shared(key, value)))),
                    true,
                ),
            },
            Self::Leaf5(entries) => match position(entries, key) {
                Ok(at) => (
                    Inserted::Absorbed(Self::Leaf5(replaced(entries, at, &Entry::shared(key, value)))),
                    false,
                ),
                Err(at) => {
                    // Full leaf: split around the middle entry. The new
                    // entry lands on whichever side its key belongs to.
                    let entry = Entry::shared(key, value);
                    let (left, right) = if at <= 2 {
                        (
                            Self::Leaf3(spliced(
                                &[entries[0].clone(), entries[1].clone()],
                                at,
                                &entry,
                            )),
                            Self::Leaf2([entries[3].clone(), entries[4].clone()]),
                        )
                    } else {
                        (
                            Self::Leaf2([entries[0].clone(), entries[1].clone()]),
                            Self::Leaf3(spliced(
                                &[entries[3].clone(), entries[4].clone()],
                                at - 3,
                                &entry,
                            )),
                        )
                    };
                    (Inserted::Overflowed(left, entries[2].clone(), right), true)
                }
            },
            Self::Branch2 { left, entry, right } => match key.cmp(&entry.key) {
                Ordering::Equal => (
                    Inserted::Absorbed(Self::Branch2 {
                        left: left.clone(),
                        entry: Entry::shared(key, value),
                        right: right.clone(),
                    }),
                    false,
                ),
                Ordering::Less => {
                    let (outcome, added) = left.inserted(key, value);
                    let node = match outcome {
                        Inserted::Absorbed(child) => Self::Branch2 {
                            left: Shared::new(child),
                            entry: entry.clone(),
                            right: right.clone(),
                        },
                        // A child split widens this node instead of
                        // propagating the overflow.
                        Inserted::Overflowed(split_left, separator, split_right) => Self::Branch3 {
                            left: Shared::new(split_left),
                            first: separator,
                            middle: Shared::new(split_right),
                            second: entry.clone(),
                            right: right.clone(),
                        },
                    };
                    (Inserted::Absorbed(node), added)
                }
                Ordering::Greater => {
                    let (outcome, added) = right.inserted(key, value);
                    let node = match outcome {
                        Inserted::Absorbed(child) => Self::Branch2 {
                            left: left.clone(),
                            entry: entry.clone(),
                            right: Shared::new(child),
                        },
                        Inserted::Overflowed(split_left, separator, split_right) => Self::Branch3 {
                            left: left.clone(),
                            first: entry.clone(),
                            middle: Shared::new(split_left),
                            second: separator,
                            right: Shared::new(split_right),
                        },
                    };
                    (Inserted::Absorbed(node), added)
                }
            },
            Self::Branch3 {
                left,
                first,
                middle,
                second,
                right,
            } => match (key.cmp(&first.key), key.cmp(&second.key)) {
                (Ordering::Equal, _) => (
                    Inserted::Absorbed(Self::Branch3 {
                        left: left.clone(),
                        first: Entry::shared(key, value),
                        middle: middle.clone(),
                        second: second.clone(),
                        right: right.clone(),
                    }),
                    false,
                ),
                (_, Ordering::Equal) => (
                    Inserted::Absorbed(Self::Branch3 {
                        left: left.clone(),
                        first: first.clone(),
                        middle: middle.clone(),
                        second: Entry::shared(key, value),
                        right: right.clone(),
                    }),
                    false,
                ),
                (Ordering::Less, _) => {
                    let (outcome, added) = left.inserted(key, value);
                    let outcome = match outcome {
                        Inserted::Absorbed(child) => Inserted::Absorbed(Self::Branch3 {
                            left: Shared::new(child),
                            first: first.clone(),
                            middle: middle.clone(),
                            second: second.clone(),
                            right: right.clone(),
                        }),
                        // Already at maximum width: split in half and
                        // pop the first separator up to the caller.
                        Inserted::Overflowed(split_left, separator, split_right) => {
                            Inserted::Overflowed(
                                Self::Branch2 {
                                    left: Shared::new(split_left),
                                    entry: separator,
                                    right: Shared::new(split_right),
                                },
                                first.clone(),
                                Self::Branch2 {
                                    left: middle.clone(),
                                    entry: second.clone(),
                                    right: right.clone(),
                                },
                            )
                        }
                    };
                    (outcome, added)
                }
                (Ordering::Greater, Ordering::Less) => {
                    let (outcome, added) = middle.inserted(key, value);
                    let outcome = match outcome {
                        Inserted::Absorbed(child) => Inserted::Absorbed(Self::Branch3 {
                            left: left.clone(),
                            first: first.clone(),
                            middle: Shared::new(child),
                            second: second.clone(),
                            right: right.clone(),
                        }),
                        Inserted::Overflowed(split_left, separator, split_right) => {
                            Inserted::Overflowed(
                                Self::Branch2 {
                                    left: left.clone(),
                                    entry: first.clone(),
                                    right: Shared::new(split_left),
                                },
                                separator,
                                Self::Branch2 {
                                    left: Shared::new(split_right),
                                    entry: second.clone(),
                                    right: right.clone(),
                                },
                            )
                        }
                    };
                    (outcome, added)
                }
                (_, Ordering::Greater) => {
                    let (outcome, added) = right.inserted(key, value);
                    let outcome = match outcome {
                        Inserted::Absorbed(child) => Inserted::Absorbed(Self::Branch3 {
                            left: left.clone(),
                            first: first.clone(),
                            middle: middle.clone(),
                            second: second.clone(),
                            right: Shared::new(child),
                        }),
                        Inserted::Overflowed(split_left, separator, split_right) => {
                            Inserted::Overflowed(
                                Self::Branch2 {
                                    left: left.clone(),
                                    entry: first.clone(),
                                    right: middle.clone(),
                                },
                                second.clone(),
                                Self::Branch2 {
                                    left: Shared::new(split_left),
                                    entry: separator,
                                    right: Shared::new(split_right),
                                },
                            )
                        }
                    };
                    (outcome, added)
                }
            },
        }
    }
}

// =============================================================================
// Removal
// =============================================================================

/// Result of removing an entry from a subtree.
enum Removal<V> {
    /// The subtree kept its shape requirements.
    Balanced(Node<V>),
    /// The subtree fell below minimum occupancy: a leaf shrank to a
    /// lone entry, or a branch was left holding a single child after
    /// its children merged.
    Deficient(Node<V>),
}

/// Resolution of a deficient child against an adjacent sibling.
enum Repair<V> {
    /// The sibling spared an entry. `(left, separator, right)` replace
    /// the two children and the separator that stood between them.
    Rotated(Node<V>, SharedEntry<V>, Node<V>),
    /// The sibling was at minimum occupancy, so both children and the
    /// old separator fused into one node.
    Merged(Node<V>),
}

/// Repairs a deficient node using the sibling on its right.
fn repaired_left<V>(
    deficient: Node<V>,
    separator: &SharedEntry<V>,
    sibling: &SharedNode<V>,
) -> Repair<V> {
    match (deficient, sibling.as_ref()) {
        (Node::Leaf1(orphan), Node::Leaf2(entries)) => Repair::Merged(Node::Leaf4([
            orphan,
            separator.clone(),
            entries[0].clone(),
            entries[1].clone(),
        ])),
        (Node::Leaf1(orphan), Node::Leaf3([donated, rest @ ..])) => Repair::Rotated(
            Node::Leaf2([orphan, separator.clone()]),
            donated.clone(),
            Node::Leaf2(rest.clone()),
        ),
        (Node::Leaf1(orphan), Node::Leaf4([donated, rest @ ..])) => Repair::Rotated(
            Node::Leaf2([orphan, separator.clone()]),
            donated.clone(),
            Node::Leaf3(rest.clone()),
        ),
        (Node::Leaf1(orphan), Node::Leaf5([donated, rest @ ..])) => Repair::Rotated(
            Node::Leaf2([orphan, separator.clone()]),
            donated.clone(),
            Node::Leaf4(rest.clone()),
        ),
        (deficient, Node::Branch2 { left, entry, right }) => Repair::Merged(Node::Branch3 {
            left: Shared::new(deficient),
            first: separator.clone(),
            middle: left.clone(),
            second: entry.clone(),
            right: right.clone(),
        }),
        (
            deficient,
            Node::Branch3 {
                left,
                first,
                middle,
                second,
                right,
            },
        ) => Repair::Rotated(
            Node::Branch2 {
                left: Shared::new(deficient),
                entry: separator.clone(),
                right: left.clone(),
            },
            first.clone(),
            Node::Branch2 {
                left: middle.clone(),
                entry: second.clone(),
                right: right.clone(),
            },
        ),
        _ => unreachable!("a deficient node and its sibling share one height"),
    }
}

/// Repairs a deficient node using the sibling on its left.
fn repaired_right<V>(
    sibling: &SharedNode<V>,
    separator: &SharedEntry<V>,
    deficient: Node<V>,
) -> Repair<V> {
    match (sibling.as_ref(), deficient) {
        (Node::Leaf2(entries), Node::Leaf1(orphan)) => Repair::Merged(Node::Leaf4([
            entries[0].clone(),
            entries[1].clone(),
            separator.clone(),
            orphan,
        ])),
        (Node::Leaf3([rest @ .., donated]), Node::Leaf1(orphan)) => Repair::Rotated(
            Node::Leaf2(rest.clone()),
            donated.clone(),
            Node::Leaf2([separator.clone(), orphan]),
        ),
        (Node::Leaf4([rest @ .., donated]), Node::Leaf1(orphan)) => Repair::Rotated(
            Node::Leaf3(rest.clone()),
            donated.clone(),
            Node::Leaf2([separator.clone(), orphan]),
        ),
        (Node::Leaf5([rest @ .., donated]), Node::Leaf1(orphan)) => Repair::Rotated(
            Node::Leaf4(rest.clone()),
            donated.clone(),
            Node::Leaf2([separator.clone(), orphan]),
        ),
        (Node::Branch2 { left, entry, right }, deficient) => Repair::Merged(Node::Branch3 {
            left: left.clone(),
            first: entry.clone(),
            middle: right.clone(),
            second: separator.clone(),
            right: Shared::new(deficient),
        }),
        (
            Node::Branch3 {
                left,
                first,
                middle,
                second,
                right,
            },
            deficient,
        ) => Repair::Rotated(
            Node::Branch2 {
                left: left.clone(),
                entry: first.clone(),
                right: middle.clone(),
            },
            second.clone(),
            Node::Branch2 {
                left: right.clone(),
                entry: separator.clone(),
                right: Shared::new(deficient),
            },
        ),
        _ => unreachable!("a deficient node and its sibling share one height"),
    }
}

impl<V> Node<V> {
    /// Removes `key` from the subtree.
    ///
    /// Returns `None` when the key is absent, so callers can hand back
    /// the original map unchanged. Separator removal substitutes the
    /// in-order successor pulled from the subtree to the right.
    #[allow(clippy::too_many_lines)]
    fn removed(&self, key: i32) -> Option<Removal<V>> {
        match self {
            Self::Leaf1(_) => unreachable!("a lone entry appears only at the root"),
            Self::Leaf2(entries) => {
                let at = position(entries, key).ok()?;
                Some(Removal::Deficient(Self::Leaf1(entries[1 - at].clone())))
            }
            Self::Leaf3(entries) => {
                let at = position(entries, key).ok()?;
                Some(Removal::Balanced(Self::Leaf2(shrunk(entries, at))))
            }
            Self::Leaf4(entries) => {
                let at = position(entries, key).ok()?;
                Some(Removal::Balanced(Self::Leaf3(shrunk(entries, at))))
            }
            Self::Leaf5(entries) => {
                let at = position(entries, key).ok()?;
                Some(Removal::Balanced(Self::Leaf4(shrunk(entries, at))))
            }
            Self::Branch2 { left, entry, right } => match key.cmp(&entry.key) {
                Ordering::Less => {
                    let removal = left.removed(key)?;
                    Some(match removal {
                        Removal::Balanced(child) => Removal::Balanced(Self::Branch2 {
                            left: Shared::new(child),
                            entry: entry.clone(),
                            right: right.clone(),
                        }),
                        Removal::Deficient(child) => match repaired_left(child, entry, right) {
                            Repair::Rotated(new_left, separator, new_right) => {
                                Removal::Balanced(Self::Branch2 {
                                    left: Shared::new(new_left),
                                    entry: separator,
                                    right: Shared::new(new_right),
                                })
                            }
                            // The merge consumed this node's only
                            // separator, so the deficiency moves up.
                            Repair::Merged(merged) => Removal::Deficient(merged),
                        },
                    })
                }
                Ordering::Equal => {
                    let (successor, removal) = right.removed_min();
                    Some(match removal {
                        Removal::Balanced(child) => Removal::Balanced(Self::Branch2 {
                            left: left.clone(),
                            entry: successor,
                            right: Shared::new(child),
                        }),
                        Removal::Deficient(child) => match repaired_right(left, &successor, child) {
                            Repair::Rotated(new_left, separator, new_right) => {
                                Removal::Balanced(Self::Branch2 {
                                    left: Shared::new(new_left),
                                    entry: separator,
                                    right: Shared::new(new_right),
                                })
                            }
                            Repair::Merged(merged) => Removal::Deficient(merged),
                        },
                    })
                }
                Ordering::Greater => {
                    let removal = right.removed(key)?;
                    Some(match removal {
                        Removal::Balanced(child) => Removal::Balanced(Self::Branch2 {
                            left: left.clone(),
                            entry: entry.clone(),
                            right: Shared::new(child),
                        }),
                        Removal::Deficient(child) => match repaired_right(left, entry, child) {
                            Repair::Rotated(new_left, separator, new_right) => {
                                Removal::Balanced(Self::Branch2 {
                                    left: Shared::new(new_left),
                                    entry: separator,
                                    right: Shared::new(new_right),
                                })
                            }
                            Repair::Merged(merged) => Removal::Deficient(merged),
                        },
                    })
                }
            },
            Self::Branch3 {
                left,
                first,
                middle,
                second,
                right,
            } => match (key.cmp(&first.key), key.cmp(&second.key)) {
                (Ordering::Equal, _) => {
                    let (successor, removal) = middle.removed_min();
                    Some(Removal::Balanced(match removal {
                        Removal::Balanced(child) => Self::Branch3 {
                            left: left.clone(),
                            first: successor,
                            middle: Shared::new(child),
                            second: second.clone(),
                            right: right.clone(),
                        },
                        Removal::Deficient(child) => match repaired_right(left, &successor, child) {
                            Repair::Rotated(new_left, separator, new_middle) => Self::Branch3 {
                                left: Shared::new(new_left),
                                first: separator,
                                middle: Shared::new(new_middle),
                                second: second.clone(),
                                right: right.clone(),
                            },
                            Repair::Merged(merged) => Self::Branch2 {
                                left: Shared::new(merged),
                                entry: second.clone(),
                                right: right.clone(),
                            },
                        },
                    }))
                }
                (_, Ordering::Equal) => {
                    let (successor, removal) = right.removed_min();
                    Some(Removal::Balanced(match removal {
                        Removal::Balanced(child) => Self::Branch3 {
                            left: left.clone(),
                            first: first.clone(),
                            middle: middle.clone(),
                            second: successor,
                            right: Shared::new(child),
                        },
                        Removal::Deficient(child) => {
                            match repaired_right(middle, &successor, child) {
                                Repair::Rotated(new_middle, separator, new_right) => Self::Branch3 {
                                    left: left.clone(),
                                    first: first.clone(),
                                    middle: Shared::new(new_middle),
                                    second: separator,
                                    right: Shared::new(new_right),
                                },
                                Repair::Merged(merged) => Self::Branch2 {
                                    left: left.clone(),
                                    entry: first.clone(),
                                    right: Shared::new(merged),
                                },
                            }
                        }
                    }))
                }
                (Ordering::Less, _) => {
                    let removal = left.removed(key)?;
                    Some(Removal::Balanced(match removal {
                        Removal::Balanced(child) => Self::Branch3 {
                            left: Shared::new(child),
                            first: first.clone(),
                            middle: middle.clone(),
                            second: second.clone(),
                            right: right.clone(),
                        },
                        Removal::Deficient(child) => match repaired_left(child, first, middle) {
                            Repair::Rotated(new_left, separator, new_middle) => Self::Branch3 {
                                left: Shared::new(new_left),
                                first: separator,
                                middle: Shared::new(new_middle),
                                second: second.clone(),
                                right: right.clone(),
                            },
                            // A three-way branch absorbs the merge by
                            // narrowing, so the height is preserved.
                            Repair::Merged(merged) => Self::Branch2 {
                                left: Shared::new(merged),
                                entry: second.clone(),
                                right: right.clone(),
                            },
                        },
                    }))
                }
                (Ordering::Greater, Ordering::Less) => {
                    let removal = middle.removed(key)?;
                    Some(Removal::Balanced(match removal {
                        Removal::Balanced(child) => Self::Branch3 {
                            left: left.clone(),
                            first: first.clone(),
                            middle: Shared::new(child),
                            second: second.clone(),
                            right: right.clone(),
                        },
                        Removal::Deficient(child) => match repaired_right(left, first, child) {
                            Repair::Rotated(new_left, separator, new_middle) => Self::Branch3 {
                                left: Shared::new(new_left),
                                first: separator,
                                middle: Shared::new(new_middle),
                                second: second.clone(),
                                right: right.clone(),
                            },
                            Repair::Merged(merged) => Self::Branch2 {
                                left: Shared::new(merged),
                                entry: second.clone(),
                                right: right.clone(),
                            },
                        },
                    }))
                }
                (_, Ordering::Greater) => {
                    let removal = right.removed(key)?;
                    Some(Removal::Balanced(match removal {
                        Removal::Balanced(child) => Self::Branch3 {
                            left: left.clone(),
                            first: first.clone(),
                            middle: middle.clone(),
                            second: second.clone(),
                            right: Shared::new(child),
                        },
                        Removal::Deficient(child) => match repaired_right(middle, second, child) {
                            Repair::Rotated(new_middle, separator, new_right) => Self::Branch3 {
                                left: left.clone(),
                                first: first.clone(),
                                middle: Shared::new(new_middle),
                                second: separator,
                                right: Shared::new(new_right),
                            },
                            Repair::Merged(merged) => Self::Branch2 {
                                left: left.clone(),
                                entry: first.clone(),
                                right: Shared::new(merged),
                            },
                        },
                    }))
                }
            },
        }
    }

    /// Detaches the smallest entry of the subtree.
    ///
    /// Used when removing a separator: the in-order successor replaces
    /// it while order and balance are restored on the way back up.
    fn removed_min(&self) -> (SharedEntry<V>, Removal<V>) {
        match self {
            Self::Leaf1(_) => unreachable!("a lone entry appears only at the root"),
            Self::Leaf2([minimum, remaining]) => (
                minimum.clone(),
                Removal::Deficient(Self::Leaf1(remaining.clone())),
            ),
            Self::Leaf3([minimum, rest @ ..]) => {
                (minimum.clone(), Removal::Balanced(Self::Leaf2(rest.clone())))
            }
            Self::Leaf4([minimum, rest @ ..]) => {
                (minimum.clone(), Removal::Balanced(Self::Leaf3(rest.clone())))
            }
            Self::Leaf5([minimum, rest @ ..]) => {
                (minimum.clone(), Removal::Balanced(Self::Leaf4(rest.clone())))
            }
            Self::Branch2 { left, entry, right } => {
                let (minimum, removal) = left.removed_min();
                let removal = match removal {
                    Removal::Balanced(child) => Removal::Balanced(Self::Branch2 {
                        left: Shared::new(child),
                        entry: entry.clone(),
                        right: right.clone(),
                    }),
                    Removal::Deficient(child) => match repaired_left(child, entry, right) {
                        Repair::Rotated(new_left, separator, new_right) => {
                            Removal::Balanced(Self::Branch2 {
                                left: Shared::new(new_left),
                                entry: separator,
                                right: Shared::new(new_right),
                            })
                        }
                        Repair::Merged(merged) => Removal::Deficient(merged),
                    },
                };
                (minimum, removal)
            }
            Self::Branch3 {
                left,
                first,
                middle,
                second,
                right,
            } => {
                let (minimum, removal) = left.removed_min();
                let removal = Removal::Balanced(match removal {
                    Removal::Balanced(child) => Self::Branch3 {
                        left: Shared::new(child),
                        first: first.clone(),
                        middle: middle.clone(),
                        second: second.clone(),
                        right: right.clone(),
                    },
                    Removal::Deficient(child) => match repaired_left(child, first, middle) {
                        Repair::Rotated(new_left, separator, new_middle) => Self::Branch3 {
                            left: Shared::new(new_left),
                            first: separator,
                            middle: Shared::new(new_middle),
                            second: second.clone(),
                            right: right.clone(),
                        },
                        Repair::Merged(merged) => Self::Branch2 {
                            left: Shared::new(merged),
                            entry: second.clone(),
                            right: right.clone(),
                        },
                    },
                });
                (minimum, removal)
            }
        }
    }
}

// =============================================================================
// Folding
// =============================================================================

fn folded_entries<V, B, F>(entries: &[SharedEntry<V>], accumulator: B, function: &mut F) -> B
where
    F: FnMut(B, i32, &V) -> B,
{
    entries.iter().fold(accumulator, |accumulator, entry| {
        function(accumulator, entry.key, &entry.value)
    })
}

fn folded_entries_back<V, B, F>(entries: &[SharedEntry<V>], accumulator: B, function: &mut F) -> B
where
    F: FnMut(i32, &V, B) -> B,
{
    entries.iter().rev().fold(accumulator, |accumulator, entry| {
        function(entry.key, &entry.value, accumulator)
    })
}

impl<V> Node<V> {
    /// In-order fold over the subtree, smallest key first.
    #[allow(clippy::match_same_arms)]
    fn fold_entries<B, F>(&self, accumulator: B, function: &mut F) -> B
    where
        F: FnMut(B, i32, &V) -> B,
    {
        match self {
            Self::Leaf1(entry) => function(accumulator, entry.key, &entry.value),
            Self::Leaf2(entries) => folded_entries(entries, accumulator, function),
            Self::Leaf3(entries) => folded_entries(entries, accumulator, function),
            Self::Leaf4(entries) => folded_entries(entries, accumulator, function),
            Self::Leaf5(entries) => folded_entries(entries, accumulator, function),
            Self::Branch2 { left, entry, right } => {
                let accumulator = left.fold_entries(accumulator, function);
                let accumulator = function(accumulator, entry.key, &entry.value);
                right.fold_entries(accumulator, function)
            }
            Self::Branch3 {
                left,
                first,
                middle,
                second,
                right,
            } => {
                let accumulator = left.fold_entries(accumulator, function);
                let accumulator = function(accumulator, first.key, &first.value);
                let accumulator = middle.fold_entries(accumulator, function);
                let accumulator = function(accumulator, second.key, &second.value);
                right.fold_entries(accumulator, function)
            }
        }
    }

    /// Reverse in-order fold over the subtree, largest key first.
    #[allow(clippy::match_same_arms)]
    fn fold_entries_back<B, F>(&self, accumulator: B, function: &mut F) -> B
    where
        F: FnMut(i32, &V, B) -> B,
    {
        match self {
            Self::Leaf1(entry) => function(entry.key, &entry.value, accumulator),
            Self::Leaf2(entries) => folded_entries_back(entries, accumulator, function),
            Self::Leaf3(entries) => folded_entries_back(entries, accumulator, function),
            Self::Leaf4(entries) => folded_entries_back(entries, accumulator, function),
            Self::Leaf5(entries) => folded_entries_back(entries, accumulator, function),
            Self::Branch2 { left, entry, right } => {
                let accumulator = right.fold_entries_back(accumulator, function);
                let accumulator = function(entry.key, &entry.value, accumulator);
                left.fold_entries_back(accumulator, function)
            }
            Self::Branch3 {
                left,
                first,
                middle,
                second,
                right,
            } => {
                let accumulator = right.fold_entries_back(accumulator, function);
                let accumulator = function(second.key, &second.value, accumulator);
                let accumulator = middle.fold_entries_back(accumulator, function);
                let accumulator = function(first.key, &first.value, accumulator);
                left.fold_entries_back(accumulator, function)
            }
        }
    }
}

// =============================================================================
// PersistentIntMap
// =============================================================================

/// A persistent (immutable) map from `i32` keys, based on a balanced
/// multiway search tree.
///
/// `PersistentIntMap` is an immutable data structure that uses
/// structural sharing to efficiently support functional programming
/// patterns. Every update returns a new map and shares all untouched
/// subtrees with the original, so old versions remain valid and cheap
/// to keep around.
///
/// Cloning a map is O(1): it copies one reference-counted pointer and
/// the cached length.
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
/// use broadleaf::persistent::PersistentIntMap;
///
/// let map = PersistentIntMap::new()
///     .insert(1, "draft")
///     .insert(2, "review");
///
/// let updated = map.insert(1, "final");
///
/// assert_eq!(map.get(1), Some(&"draft"));
/// assert_eq!(updated.get(1), Some(&"final"));
/// assert_eq!(map.len(), 2);
/// ```
pub struct PersistentIntMap<V> {
    root: Option<SharedNode<V>>,
    length: usize,
}

impl<V> PersistentIntMap<V> {
    /// Returns the empty map.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use broadleaf::persistent::PersistentIntMap;
    ///
    /// let empty = PersistentIntMap::<String>::new();
    /// assert_eq!(empty.len(), 0);
    /// ```
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            root: None,
            length: 0,
        }
    }

    /// Builds a map holding exactly one entry.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use broadleaf::persistent::PersistentIntMap;
    ///
    /// let map = PersistentIntMap::singleton(42, "answer");
    /// assert_eq!(map.len(), 1);
    /// assert_eq!(map.get(42), Some(&"answer"));
    /// ```
    #[inline]
    #[must_use]
    pub fn singleton(key: i32, value: V) -> Self {
        Self {
            root: Some(Shared::new(Node::Leaf1(Entry::shared(key, value)))),
            length: 1,
        }
    }

    /// Returns how many entries the map holds.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use broadleaf::persistent::PersistentIntMap;
    ///
    /// let map = PersistentIntMap::new().insert(1, "solo").insert(2, "duo");
    /// assert_eq!(map.len(), 2);
    /// ```
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.length
    }

    /// Returns `true` when the map holds nothing.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use broadleaf::persistent::PersistentIntMap;
    ///
    /// let empty = PersistentIntMap::<i32>::new();
    /// assert!(empty.is_empty());
    /// assert!(!empty.insert(1, 10).is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Looks up the value bound to `key`.
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use broadleaf::persistent::PersistentIntMap;
    ///
    /// let map = PersistentIntMap::new().insert(7, "seven");
    ///
    /// assert_eq!(map.get(7), Some(&"seven"));
    /// assert_eq!(map.get(8), None);
    /// ```
    #[must_use]
    #[allow(clippy::match_same_arms)]
    pub fn get(&self, key: i32) -> Option<&V> {
        let mut node = self.root.as_deref()?;
        loop {
            match node {
                Node::Leaf1(entry) => return (entry.key == key).then_some(&entry.value),
                Node::Leaf2(entries) => return found(entries, key),
                Node::Leaf3(entries) => return found(entries, key),
                Node::Leaf4(entries) => return found(entries, key),
                Node::Leaf5(entries) => return found(entries, key),
                Node::Branch2 { left, entry, right } => match key.cmp(&entry.key) {
                    Ordering::Less => node = left.as_ref(),
                    Ordering::Equal => return Some(&entry.value),
                    Ordering::Greater => node = right.as_ref(),
                },
                Node::Branch3 {
                    left,
                    first,
                    middle,
                    second,
                    right,
                } => match (key.cmp(&first.key), key.cmp(&second.key)) {
                    (Ordering::Equal, _) => return Some(&first.value),
                    (_, Ordering::Equal) => return Some(&second.value),
                    (Ordering::Less, _) => node = left.as_ref(),
                    (Ordering::Greater, Ordering::Less) => node = middle.as_ref(),
                    (_, Ordering::Greater) => node = right.as_ref(),
                },
            }
        }
    }

    /// Returns `true` when `key` has a binding.
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use broadleaf::persistent::PersistentIntMap;
    ///
    /// let map = PersistentIntMap::new().insert(1, "here");
    /// assert!(map.contains_key(1));
    /// assert!(!map.contains_key(2));
    /// ```
    #[must_use]
    pub fn contains_key(&self, key: i32) -> bool {
        self.get(key).is_some()
    }

    /// Returns the value for the key, or `V::default()` when absent.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use broadleaf::persistent::PersistentIntMap;
    ///
    /// let map = PersistentIntMap::new().insert(1, 10);
    /// assert_eq!(map.get_or_default(1), 10);
    /// assert_eq!(map.get_or_default(9), 0);
    /// ```
    #[must_use]
    pub fn get_or_default(&self, key: i32) -> V
    where
        V: Clone + Default,
    {
        self.get(key).cloned().unwrap_or_default()
    }

    /// Binds `key` to `value`, superseding any earlier binding.
    ///
    /// The receiver is left as it was; the returned map is a new
    /// version that shares every untouched subtree with it.
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use broadleaf::persistent::PersistentIntMap;
    ///
    /// let first = PersistentIntMap::new().insert(10, "initial");
    /// let second = first.insert(10, "revised");
    ///
    /// assert_eq!(first.get(10), Some(&"initial"));
    /// assert_eq!(second.get(10), Some(&"revised"));
    /// ```
    #[must_use]
    pub fn insert(&self, key: i32, value: V) -> Self {
        let Some(root) = &self.root else {
            return Self::singleton(key, value);
        };
        let (outcome, added) = root.inserted(key, value);
        let root = match outcome {
            Inserted::Absorbed(node) => node,
            Inserted::Overflowed(left, separator, right) => Node::Branch2 {
                left: Shared::new(left),
                entry: separator,
                right: Shared::new(right),
            },
        };
        Self {
            root: Some(Shared::new(root)),
            length: self.length + usize::from(added),
        }
    }

    /// Inserts the pair only when the key is absent.
    ///
    /// When the key is already present the map is returned as-is, value
    /// untouched, sharing the original root.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use broadleaf::persistent::PersistentIntMap;
    ///
    /// let map = PersistentIntMap::new().insert(1, "set");
    ///
    /// let kept = map.insert_if_absent(1, "ignored");
    /// assert!(kept.ptr_eq(&map));
    /// assert_eq!(kept.get(1), Some(&"set"));
    ///
    /// let extended = map.insert_if_absent(2, "added");
    /// assert_eq!(extended.get(2), Some(&"added"));
    /// ```
    #[must_use]
    pub fn insert_if_absent(&self, key: i32, value: V) -> Self {
        if self.contains_key(key) {
            self.clone()
        } else {
            self.insert(key, value)
        }
    }

    /// Replaces the value only when the key is already present.
    ///
    /// When the key is absent the map is returned as-is, sharing the
    /// original root.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use broadleaf::persistent::PersistentIntMap;
    ///
    /// let map = PersistentIntMap::new().insert(1, "cold");
    ///
    /// let updated = map.update(1, "warm");
    /// assert_eq!(updated.get(1), Some(&"warm"));
    ///
    /// let unchanged = map.update(9, "ghost");
    /// assert!(unchanged.ptr_eq(&map));
    /// ```
    #[must_use]
    pub fn update(&self, key: i32, value: V) -> Self {
        if self.contains_key(key) {
            self.insert(key, value)
        } else {
            self.clone()
        }
    }

    /// Deletes the entry at `key`.
    ///
    /// When the key is absent the map is returned as-is, sharing the
    /// original root.
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use broadleaf::persistent::PersistentIntMap;
    ///
    /// let map = PersistentIntMap::new().insert(1, "gone").insert(2, "kept");
    ///
    /// let removed = map.remove(1);
    /// assert_eq!(removed.get(1), None);
    /// assert_eq!(removed.len(), 1);
    /// assert_eq!(map.len(), 2);
    /// ```
    #[must_use]
    pub fn remove(&self, key: i32) -> Self {
        let Some(root) = &self.root else {
            return self.clone();
        };
        if let Node::Leaf1(entry) = root.as_ref() {
            return if entry.key == key {
                Self::new()
            } else {
                self.clone()
            };
        }
        match root.removed(key) {
            None => self.clone(),
            // A deficient root is just a shorter tree.
            Some(Removal::Balanced(node) | Removal::Deficient(node)) => Self {
                root: Some(Shared::new(node)),
                length: self.length - 1,
            },
        }
    }

    /// Returns `true` when both maps share the same root node.
    ///
    /// This is the cheap way to detect that an operation such as
    /// [`remove`](Self::remove) or
    /// [`insert_if_absent`](Self::insert_if_absent) left the map
    /// untouched. Two empty maps always compare equal here.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use broadleaf::persistent::PersistentIntMap;
    ///
    /// let base = PersistentIntMap::new().insert(1, "base");
    ///
    /// assert!(base.clone().ptr_eq(&base));
    /// assert!(base.remove(42).ptr_eq(&base));
    /// assert!(!base.insert(2, "next").ptr_eq(&base));
    /// ```
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.root, &other.root) {
            (None, None) => true,
            (Some(left), Some(right)) => Shared::ptr_eq(left, right),
            _ => false,
        }
    }

    /// Walks the entries lazily in ascending key order.
    ///
    /// The iterator keeps an explicit stack of unvisited subtrees and
    /// descends only as entries are demanded.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use broadleaf::persistent::PersistentIntMap;
    ///
    /// let map = PersistentIntMap::new().insert(2, "late").insert(1, "early");
    ///
    /// let entries: Vec<(i32, &&str)> = map.iter().collect();
    /// assert_eq!(entries, vec![(1, &"early"), (2, &"late")]);
    /// ```
    #[must_use]
    pub fn iter(&self) -> PersistentIntMapIterator<'_, V> {
        let mut stack = SmallVec::new();
        if let Some(root) = &self.root {
            stack.push(Pending::Node(root.as_ref()));
        }
        PersistentIntMapIterator {
            stack,
            remaining: self.length,
        }
    }

    /// Iterates over the keys in ascending order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use broadleaf::persistent::PersistentIntMap;
    ///
    /// let map = PersistentIntMap::new()
    ///     .insert(3, "wed")
    ///     .insert(1, "mon")
    ///     .insert(2, "tue");
    ///
    /// let keys: Vec<i32> = map.keys().collect();
    /// assert_eq!(keys, vec![1, 2, 3]);
    /// ```
    pub fn keys(&self) -> impl Iterator<Item = i32> + '_ {
        self.iter().map(|(key, _)| key)
    }

    /// Iterates over the values in key order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use broadleaf::persistent::PersistentIntMap;
    ///
    /// let map = PersistentIntMap::new().insert(1, 10).insert(2, 20).insert(3, 30);
    ///
    /// let total: i32 = map.values().sum();
    /// assert_eq!(total, 60);
    /// ```
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, value)| value)
    }

    /// Folds every entry into an accumulator, smallest key first.
    ///
    /// Unlike [`iter`](Self::iter) this walks the tree by direct
    /// recursion, which makes it the fastest way to visit everything.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use broadleaf::persistent::PersistentIntMap;
    ///
    /// let map = PersistentIntMap::new().insert(1, 10).insert(2, 20);
    ///
    /// let total = map.fold_left(0, |accumulator, _key, value| accumulator + value);
    /// assert_eq!(total, 30);
    /// ```
    pub fn fold_left<B, F>(&self, initial: B, mut function: F) -> B
    where
        F: FnMut(B, i32, &V) -> B,
    {
        let Some(root) = &self.root else {
            return initial;
        };
        root.fold_entries(initial, &mut function)
    }

    /// Folds every entry into an accumulator, largest key first.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use broadleaf::persistent::PersistentIntMap;
    ///
    /// let map = PersistentIntMap::new()
    ///     .insert(1, "do".to_string())
    ///     .insert(2, "re".to_string());
    ///
    /// let backwards = map.fold_right(String::new(), |_key, value, accumulator| {
    ///     accumulator + value
    /// });
    /// assert_eq!(backwards, "redo");
    /// ```
    pub fn fold_right<B, F>(&self, initial: B, mut function: F) -> B
    where
        F: FnMut(i32, &V, B) -> B,
    {
        let Some(root) = &self.root else {
            return initial;
        };
        root.fold_entries_back(initial, &mut function)
    }

    /// Calls `function` on every entry in ascending key order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use broadleaf::persistent::PersistentIntMap;
    ///
    /// let map = PersistentIntMap::new().insert(1, 10).insert(2, 20);
    ///
    /// let mut sum = 0;
    /// map.for_each(|_key, value| sum += value);
    /// assert_eq!(sum, 30);
    /// ```
    pub fn for_each<F>(&self, mut function: F)
    where
        F: FnMut(i32, &V),
    {
        self.fold_left((), |(), key, value| function(key, value));
    }
}

// =============================================================================
// Iterators
// =============================================================================

/// A frame of the iterator's explicit traversal stack: either a
/// subtree still to be expanded or an entry ready to be yielded.
enum Pending<'a, V> {
    Node(&'a Node<V>),
    Entry(&'a Entry<V>),
}

/// An iterator over the entries of a [`PersistentIntMap`] in ascending
/// key order.
///
/// Created by [`PersistentIntMap::iter`]. The traversal state lives on
/// a small inline stack, so iteration allocates only for deep trees.
pub struct PersistentIntMapIterator<'a, V> {
    stack: SmallVec<[Pending<'a, V>; 8]>,
    remaining: usize,
}

impl<'a, V> PersistentIntMapIterator<'a, V> {
    fn push_entries(&mut self, entries: &'a [SharedEntry<V>]) {
        for entry in entries.iter().rev() {
            self.stack.push(Pending::Entry(entry));
        }
    }
}

impl<'a, V> Iterator for PersistentIntMapIterator<'a, V> {
    type Item = (i32, &'a V);

    #[allow(clippy::match_same_arms)]
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.stack.pop()? {
                Pending::Entry(entry) => {
                    self.remaining -= 1;
                    return Some((entry.key, &entry.value));
                }
                Pending::Node(node) => match node {
                    Node::Leaf1(entry) => {
                        self.remaining -= 1;
                        return Some((entry.key, &entry.value));
                    }
                    Node::Leaf2(entries) => self.push_entries(entries),
                    Node::Leaf3(entries) => self.push_entries(entries),
                    Node::Leaf4(entries) => self.push_entries(entries),
                    Node::Leaf5(entries) => self.push_entries(entries),
                    Node::Branch2 { left, entry, right } => {
                        self.stack.push(Pending::Node(right.as_ref()));
                        self.stack.push(Pending::Entry(entry.as_ref()));
                        self.stack.push(Pending::Node(left.as_ref()));
                    }
                    Node::Branch3 {
                        left,
                        first,
                        middle,
                        second,
                        right,
                    } => {
                        self.stack.push(Pending::Node(right.as_ref()));
                        self.stack.push(Pending::Entry(second.as_ref()));
                        self.stack.push(Pending::Node(middle.as_ref()));
                        self.stack.push(Pending::Entry(first.as_ref()));
                        self.stack.push(Pending::Node(left.as_ref()));
                    }
                },
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<V> ExactSizeIterator for PersistentIntMapIterator<'_, V> {
    fn len(&self) -> usize {
        self.remaining
    }
}

impl<V> FusedIterator for PersistentIntMapIterator<'_, V> {}

/// An owning iterator over the entries of a [`PersistentIntMap`].
pub struct PersistentIntMapIntoIterator<V> {
    pairs: Vec<(i32, V)>,
    cursor: usize,
}

impl<V: Clone> Iterator for PersistentIntMapIntoIterator<V> {
    type Item = (i32, V);

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

impl<V: Clone> ExactSizeIterator for PersistentIntMapIntoIterator<V> {}

impl<V: Clone> FusedIterator for PersistentIntMapIntoIterator<V> {}

// =============================================================================
// Trait Implementations
// =============================================================================

impl<V> Clone for PersistentIntMap<V> {
    /// Clones the map in O(1) by sharing the root.
    #[inline]
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            length: self.length,
        }
    }
}

impl<V> Default for PersistentIntMap<V> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<V> FromIterator<(i32, V)> for PersistentIntMap<V> {
    fn from_iter<I: IntoIterator<Item = (i32, V)>>(iterator: I) -> Self {
        iterator
            .into_iter()
            .fold(Self::new(), |map, (key, value)| map.insert(key, value))
    }
}

impl<V: Clone> IntoIterator for PersistentIntMap<V> {
    type Item = (i32, V);
    type IntoIter = PersistentIntMapIntoIterator<V>;

    fn into_iter(self) -> Self::IntoIter {
        let pairs = self
            .iter()
            .map(|(key, value)| (key, value.clone()))
            .collect();
        PersistentIntMapIntoIterator { pairs, cursor: 0 }
    }
}

impl<'a, V> IntoIterator for &'a PersistentIntMap<V> {
    type Item = (i32, &'a V);
    type IntoIter = PersistentIntMapIterator<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<V: PartialEq> PartialEq for PersistentIntMap<V> {
    fn eq(&self, other: &Self) -> bool {
        self.length == other.length
            && self
                .iter()
                .zip(other.iter())
                .all(|((left_key, left_value), (right_key, right_value))| {
                    left_key == right_key && left_value == right_value
                })
    }
}

impl<V: Eq> Eq for PersistentIntMap<V> {}

impl<V: Hash> Hash for PersistentIntMap<V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.length.hash(state);
        for (key, value) in self {
            key.hash(state);
            value.hash(state);
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for PersistentIntMap<V> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_map().entries(self.iter()).finish()
    }
}

impl<V: fmt::Display> fmt::Display for PersistentIntMap<V> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{{")?;
        for (index, (key, value)) in self.iter().enumerate() {
            if index > 0 {
                write!(formatter, ", ")?;
            }
            write!(formatter, "{key}: {value}")?;
        }
        write!(formatter, "}}")
    }
}

// =============================================================================
// Serde Support
// =============================================================================

#[cfg(feature = "serde")]
impl<V> serde::Serialize for PersistentIntMap<V>
where
    V: serde::Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self {
            map.serialize_entry(&key, value)?;
        }
        map.end()
    }
}

#[cfg(feature = "serde")]
struct PersistentIntMapVisitor<V> {
    value_type: std::marker::PhantomData<V>,
}

#[cfg(feature = "serde")]
impl<V> PersistentIntMapVisitor<V> {
    const fn new() -> Self {
        Self {
            value_type: std::marker::PhantomData,
        }
    }
}

#[cfg(feature = "serde")]
impl<'de, V> serde::de::Visitor<'de> for PersistentIntMapVisitor<V>
where
    V: serde::Deserialize<'de>,
{
    type Value = PersistentIntMap<V>;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("a map with integer keys")
    }

    fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: serde::de::MapAccess<'de>,
    {
        // Entries go into the map as they arrive rather than through an
        // intermediate Vec.
        let mut map = PersistentIntMap::new();
        while let Some((key, value)) = access.next_entry()? {
            map = map.insert(key, value);
        }
        Ok(map)
    }
}

#[cfg(feature = "serde")]
impl<'de, V> serde::Deserialize<'de> for PersistentIntMap<V>
where
    V: serde::Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_map(PersistentIntMapVisitor::new())
    }
}

// =============================================================================
// Thread Safety Assertions
// =============================================================================

#[cfg(feature = "arc")]
static_assertions::assert_impl_all!(PersistentIntMap<i32>: Send, Sync);

#[cfg(not(feature = "arc"))]
static_assertions::assert_not_impl_any!(PersistentIntMap<i32>: Send, Sync);

// =============================================================================
// Tests
// =============================================================================
