//! Block cache module.
//!
//! ## Architecture
//!
//! - **Slab-based storage**: O(1) entry insertion, removal and lookup
//! - **Global LRU list**: one recency order across every series
//! - **Per-series unload callbacks**: evicted blocks are handed back to
//!   their owner before the slot is discarded
//!
//! ## Components
//!
//! - [`CacheEntry`]: a block plus linked-list pointers
//! - [`LruList`]: the intrusive recency list
//! - [`BlockCache`]: the bounded cache and series registry
//!
//! ## Performance
//!
//! | Operation | Complexity |
//! |-----------|------------|
//! | insert | O(1) amortized |
//! | touch / remove | O(1) |
//! | lookup by address | O(1) |
//! | free / purge | O(n) in resident blocks |

pub mod block_cache;
pub mod entry;
pub mod lru;

pub use block_cache::{BlockCache, UnloadFn};
pub use entry::CacheEntry;
pub use lru::LruList;
