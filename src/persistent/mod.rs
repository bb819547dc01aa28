//! Persistent (immutable) map structures.
//!
//! This module provides immutable associative maps that use structural
//! sharing to minimize copying:
//!
//! - [`PersistentIntMap`]: Persistent `i32`-keyed map (balanced
//!   multiway search tree with 2-5 entries per leaf)
//! - [`PersistentHashMap`]: Persistent hash map for arbitrary keys,
//!   layered on [`PersistentIntMap`] with collision chains
//!
//! # Structural Sharing
//!
//! Every updating operation returns a new map version without touching
//! the original. Only the nodes on the path from the root to the
//! changed entry are rebuilt; all sibling subtrees are shared between
//! the old and the new version, bounding each update to O(log N) new
//! nodes.
//!
//! # Examples
//!
//! ## `PersistentIntMap`
//!
//! ```rust
//! use broadleaf::persistent::PersistentIntMap;
//!
//! let population = PersistentIntMap::new()
//!     .insert(1959, 2_979)
//!     .insert(1999, 6_034)
//!     .insert(1987, 5_027);
//!
//! // Entries are always in ascending key order
//! let years: Vec<i32> = population.keys().collect();
//! assert_eq!(years, vec![1959, 1987, 1999]);
//!
//! // Updates produce a new version and leave the source untouched
//! let revised = population.insert(1999, 6_067);
//! assert_eq!(population.get(1999), Some(&6_034));
//! assert_eq!(revised.get(1999), Some(&6_067));
//! ```
//!
//! ## `PersistentHashMap`
//!
//! ```rust
//! use broadleaf::persistent::PersistentHashMap;
//!
//! let ports = PersistentHashMap::new()
//!     .insert("https".to_string(), 443)
//!     .insert("ssh".to_string(), 22);
//! assert_eq!(ports.get("https"), Some(&443));
//!
//! // Updates produce a new version and leave the source untouched
//! let rebound = ports.insert("https".to_string(), 8443);
//! assert_eq!(ports.get("https"), Some(&443));
//! assert_eq!(rebound.get("https"), Some(&8443));
//!
//! // Absent-key removal is a reference-level no-op
//! let unchanged = ports.remove("gopher");
//! assert!(unchanged.ptr_eq(&ports));
//! ```

// =============================================================================
// Shared Pointer Alias
// =============================================================================

/// Reference-counted pointer used for all tree nodes.
///
/// With the `arc` feature this is `std::sync::Arc`, making every map
/// `Send + Sync` at the cost of atomic counter updates. Without it
/// (the default) it is `std::rc::Rc`, which avoids the atomics but
/// keeps the maps single-threaded.
#[cfg(feature = "arc")]
pub(crate) type Shared<T> = std::sync::Arc<T>;

#[cfg(not(feature = "arc"))]
pub(crate) type Shared<T> = std::rc::Rc<T>;

mod hashmap;
mod intmap;

pub use hashmap::PersistentHashMap;
pub use hashmap::PersistentHashMapIntoIterator;
pub use hashmap::PersistentHashMapIterator;
pub use intmap::PersistentIntMap;
pub use intmap::PersistentIntMapIntoIterator;
pub use intmap::PersistentIntMapIterator;

// =============================================================================
// Tests
// =============================================================================
