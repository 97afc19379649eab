//! Intrusive LRU list over slab keys.
//!
//! ## Queue Structure
//!
//! ```text
//! head (least recent) <-> entry2 <-> entry3 <-> tail (most recent)
//! ```
//!
//! - Inserted and touched entries are appended at the tail
//! - Eviction consumes entries from the head
//! - Any entry can be unlinked in O(1) using its slab key
//!
//! The entries themselves live in the cache's slab; this struct only holds
//! the list endpoints.

use slab::Slab;

use crate::cache::CacheEntry;

/// Doubly-linked list threaded through [`CacheEntry::prev`]/[`CacheEntry::next`].
#[derive(Debug, Clone, Default)]
pub struct LruList {
    /// Least recently used entry (slab key)
    pub head: Option<usize>,

    /// Most recently used entry (slab key)
    pub tail: Option<usize>,

    /// Number of linked entries
    pub len: usize,
}

impl LruList {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the list is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Link an entry at the most-recently-used end.
    ///
    /// The entry must be unlinked. Unknown keys are ignored.
    pub fn push_back(&mut self, key: usize, slab: &mut Slab<CacheEntry>) {
        let Some(entry) = slab.get_mut(key) else {
            return;
        };
        entry.prev = self.tail;
        entry.next = None;

        match self.tail.and_then(|tail| slab.get_mut(tail)) {
            Some(tail) => tail.next = Some(key),
            None => self.head = Some(key),
        }

        self.tail = Some(key);
        self.len += 1;
    }

    /// Unlink an entry from anywhere in the list.
    ///
    /// Returns `false` if the key is not in the slab.
    pub fn remove(&mut self, key: usize, slab: &mut Slab<CacheEntry>) -> bool {
        let Some(entry) = slab.get_mut(key) else {
            return false;
        };
        let prev_key = entry.prev.take();
        let next_key = entry.next.take();

        match prev_key.and_then(|prev| slab.get_mut(prev)) {
            Some(prev) => prev.next = next_key,
            None => self.head = next_key,
        }

        match next_key.and_then(|next| slab.get_mut(next)) {
            Some(next) => next.prev = prev_key,
            None => self.tail = prev_key,
        }

        self.len -= 1;
        true
    }

    /// Move an entry to the most-recently-used end
    pub fn move_to_back(&mut self, key: usize, slab: &mut Slab<CacheEntry>) {
        if self.tail == Some(key) {
            return;
        }
        if self.remove(key, slab) {
            self.push_back(key, slab);
        }
    }

    /// Unlink and return the least recently used key
    pub fn pop_front(&mut self, slab: &mut Slab<CacheEntry>) -> Option<usize> {
        let head = self.head?;
        self.remove(head, slab);
        Some(head)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
