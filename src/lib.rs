//! # broadleaf
//!
//! Persistent multiway-tree maps with structural sharing.
//!
//! ## Overview
//!
//! This library provides immutable associative maps built on a balanced
//! multiway search tree (a 2-3-4-style tree with 2 to 5 entries per
//! leaf). Every update returns a new map value while all previous
//! versions remain valid; unmodified subtrees are shared between
//! versions instead of being copied.
//!
//! - **`PersistentIntMap`**: the tree engine itself, keyed by `i32`
//! - **`PersistentHashMap`**: a hash-keyed map for arbitrary `Hash + Eq`
//!   keys, layered on the engine with collision chains
//!
//! ## Feature Flags
//!
//! - `persistent`: the persistent map types (enabled by default)
//! - `arc`: share nodes with `Arc` instead of `Rc`, making the maps
//!   `Send + Sync`
//! - `fxhash` / `ahash`: faster hashers for `PersistentHashMap`
//! - `serde`: `Serialize`/`Deserialize` for both maps
//! - `full`: everything except `arc` and the hasher switches
//!
//! ## Example
//!
//! ```rust
//! use broadleaf::prelude::*;
//!
//! let grove = PersistentHashMap::new()
//!     .insert("oak", 12)
//!     .insert("elm", 8);
//!
//! let thinned = grove.insert("elm", 5);
//! assert_eq!(grove.get("elm"), Some(&8)); // The first version still sees 8
//! assert_eq!(thinned.get("elm"), Some(&5));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
// clippy 0.1.92 panics while checking redundant_closure_for_method_calls,
// so that lint stays off until the fix ships.
#![allow(clippy::redundant_closure_for_method_calls)]

/// Everything most callers need, importable in one line.
///
/// ```rust
/// use broadleaf::prelude::*;
/// ```
pub mod prelude {

    #[cfg(feature = "persistent")]
    pub use crate::persistent::*;
}

#[cfg(feature = "persistent")]
pub mod persistent;
