//! Byte-bounded LRU caches with durable snapshots.
//!
//! - [`SizedCache`]: LRU ordering with a capacity in value bytes
//! - [`MemoryCache`]: mutex-guarded [`StringCache`] shared by worker tasks
//! - [`PersistentCache`]: a memory cache bound to an atomically replaced snapshot file
//! - [`SnapshotStore`]: where each snapshot lives and how it is loaded

pub mod hash;
pub mod memory;
pub mod persistent;
pub mod sized;
pub mod store;

pub use crate::Error;

pub use memory::{MemoryCache, StringCache};
pub use persistent::{PersistentCache, SnapshotError, decode_snapshot, encode_snapshot};
pub use sized::{SizedCache, Weighted};
pub use store::{Capacities, SnapshotStore};
