//! Order-statistics multiset over decimal values.
//!
//! ## Design
//!
//! An AVL tree whose nodes live in a [`Slab`]. Each node carries one
//! distinct value with its multiplicity, and the subtree's total
//! multiplicity, so `order(i)` and `order_of(v)` walk a single root-to-leaf
//! path.
//!
//! Running aggregates (count, sum, sum of squares) are maintained on every
//! `add`/`del`, so `mean` and `std` are O(1).
//!
//! ## Example
//!
//! ```
//! use ticktape::stats::StatsTree;
//! use ticktape::types::decimal::parse;
//!
//! let mut tree = StatsTree::new();
//! for s in ["42.0", "42.1", "42.0", "42.2"] {
//!     tree.add(parse(s).unwrap());
//! }
//!
//! assert_eq!(tree.count(), 4);
//! assert_eq!(tree.distinct(), 3);
//! assert_eq!(tree.order(1), parse("42.0"));
//! assert_eq!(tree.maximum(), parse("42.2"));
//! ```

use std::cmp::Ordering;

use rust_decimal::Decimal;
use slab::Slab;

use crate::stats::StatsNode;
use crate::types::decimal;

/// Duplicate-aware order-statistics tree.
#[derive(Debug, Clone, Default)]
pub struct StatsTree {
    nodes: Slab<StatsNode>,
    root: Option<usize>,
    sum: f64,
    sum_sq: f64,
}

impl StatsTree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty tree with room for `capacity` distinct values
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Slab::with_capacity(capacity),
            ..Self::default()
        }
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Add one occurrence of `value`.
    pub fn add(&mut self, value: Decimal) {
        let root = self.insert(self.root, value);
        self.root = Some(root);

        let v = decimal::to_f64(value);
        self.sum += v;
        self.sum_sq += v * v;
    }

    /// Remove one occurrence of `value`.
    ///
    /// Returns `false`, changing nothing, if `value` is not present.
    pub fn del(&mut self, value: Decimal) -> bool {
        let (root, found) = self.delete(self.root, value);
        self.root = root;
        if !found {
            return false;
        }

        if self.root.is_none() {
            self.sum = 0.0;
            self.sum_sq = 0.0;
        } else {
            let v = decimal::to_f64(value);
            self.sum -= v;
            self.sum_sq -= v * v;
        }
        true
    }

    /// Remove every value
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
        self.sum = 0.0;
        self.sum_sq = 0.0;
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Total number of values, duplicates included
    #[inline]
    pub fn count(&self) -> u64 {
        self.size(self.root)
    }

    /// Number of distinct values
    #[inline]
    pub fn distinct(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the tree is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Smallest value
    pub fn minimum(&self) -> Option<Decimal> {
        let mut key = self.root?;
        while let Some(left) = self.nodes[key].left {
            key = left;
        }
        Some(self.nodes[key].value)
    }

    /// Largest value
    pub fn maximum(&self) -> Option<Decimal> {
        let mut key = self.root?;
        while let Some(right) = self.nodes[key].right {
            key = right;
        }
        Some(self.nodes[key].value)
    }

    /// The `i`-th smallest value (0-based), counting duplicates.
    pub fn order(&self, mut i: u64) -> Option<Decimal> {
        let mut cursor = self.root;
        while let Some(key) = cursor {
            let node = &self.nodes[key];
            let left = self.size(node.left);
            if i < left {
                cursor = node.left;
            } else if i < left + node.count {
                return Some(node.value);
            } else {
                i -= left + node.count;
                cursor = node.right;
            }
        }
        None
    }

    /// Number of values strictly less than `value`.
    pub fn order_of(&self, value: Decimal) -> u64 {
        let mut below = 0;
        let mut cursor = self.root;
        while let Some(key) = cursor {
            let node = &self.nodes[key];
            match value.cmp(&node.value) {
                Ordering::Less => cursor = node.left,
                Ordering::Equal => return below + self.size(node.left),
                Ordering::Greater => {
                    below += self.size(node.left) + node.count;
                    cursor = node.right;
                }
            }
        }
        below
    }

    /// Multiplicity of `value`
    pub fn count_of(&self, value: Decimal) -> u64 {
        let mut cursor = self.root;
        while let Some(key) = cursor {
            let node = &self.nodes[key];
            match value.cmp(&node.value) {
                Ordering::Less => cursor = node.left,
                Ordering::Equal => return node.count,
                Ordering::Greater => cursor = node.right,
            }
        }
        0
    }

    /// Arithmetic mean
    pub fn mean(&self) -> Option<f64> {
        let n = self.count();
        if n == 0 {
            return None;
        }
        Some(self.sum / n as f64)
    }

    /// Population standard deviation
    pub fn std(&self) -> Option<f64> {
        let n = self.count() as f64;
        let mean = self.mean()?;
        let var = (self.sum_sq / n - mean * mean).max(0.0);
        Some(var.sqrt())
    }

    /// Middle value, interpolated for even counts
    #[inline]
    pub fn median(&self) -> Option<Decimal> {
        self.rank(0.5)
    }

    /// Value at fraction `f` of the sorted sequence.
    ///
    /// `f` is clamped to `[0, 1]`. Positions between two values are
    /// interpolated linearly: `rank(0.5)` of `[1, 2]` is `1.5`.
    pub fn rank(&self, f: f64) -> Option<Decimal> {
        let n = self.count();
        if n == 0 {
            return None;
        }
        let f = if f.is_nan() { 0.0 } else { f.clamp(0.0, 1.0) };
        let pos = f * (n - 1) as f64;
        let lo = pos.floor();
        let hi = pos.ceil();
        let lo_value = self.order(lo as u64)?;
        let hi_value = self.order(hi as u64)?;
        Some(decimal::lerp(lo_value, hi_value, pos - lo))
    }

    /// Iterate `(value, multiplicity)` in ascending order
    pub fn iter(&self) -> Iter<'_> {
        let mut iter = Iter {
            tree: self,
            stack: Vec::new(),
        };
        iter.push_left(self.root);
        iter
    }

    // ========================================================================
    // AVL internals
    // ========================================================================

    #[inline]
    fn size(&self, key: Option<usize>) -> u64 {
        key.map_or(0, |k| self.nodes[k].size)
    }

    #[inline]
    fn height(&self, key: Option<usize>) -> i32 {
        key.map_or(0, |k| self.nodes[k].height)
    }

    fn update(&mut self, key: usize) {
        let (left, right) = (self.nodes[key].left, self.nodes[key].right);
        let height = 1 + self.height(left).max(self.height(right));
        let size = self.size(left) + self.size(right);
        let node = &mut self.nodes[key];
        node.height = height;
        node.size = size + node.count;
    }

    fn rotate_right(&mut self, key: usize) -> usize {
        let Some(pivot) = self.nodes[key].left else {
            return key;
        };
        self.nodes[key].left = self.nodes[pivot].right;
        self.nodes[pivot].right = Some(key);
        self.update(key);
        self.update(pivot);
        pivot
    }

    fn rotate_left(&mut self, key: usize) -> usize {
        let Some(pivot) = self.nodes[key].right else {
            return key;
        };
        self.nodes[key].right = self.nodes[pivot].left;
        self.nodes[pivot].left = Some(key);
        self.update(key);
        self.update(pivot);
        pivot
    }

    fn balance(&mut self, key: usize) -> usize {
        self.update(key);
        let (left, right) = (self.nodes[key].left, self.nodes[key].right);
        let factor = self.height(left) - self.height(right);

        if factor > 1 {
            if let Some(l) = left {
                if self.height(self.nodes[l].left) < self.height(self.nodes[l].right) {
                    self.nodes[key].left = Some(self.rotate_left(l));
                }
            }
            return self.rotate_right(key);
        }
        if factor < -1 {
            if let Some(r) = right {
                if self.height(self.nodes[r].right) < self.height(self.nodes[r].left) {
                    self.nodes[key].right = Some(self.rotate_right(r));
                }
            }
            return self.rotate_left(key);
        }
        key
    }

    fn insert(&mut self, node: Option<usize>, value: Decimal) -> usize {
        let Some(key) = node else {
            return self.nodes.insert(StatsNode::new(value));
        };
        match value.cmp(&self.nodes[key].value) {
            Ordering::Less => {
                let left = self.insert(self.nodes[key].left, value);
                self.nodes[key].left = Some(left);
            }
            Ordering::Greater => {
                let right = self.insert(self.nodes[key].right, value);
                self.nodes[key].right = Some(right);
            }
            Ordering::Equal => {
                let node = &mut self.nodes[key];
                node.count += 1;
                node.size += 1;
                return key;
            }
        }
        self.balance(key)
    }

    fn delete(&mut self, node: Option<usize>, value: Decimal) -> (Option<usize>, bool) {
        let Some(key) = node else {
            return (None, false);
        };
        match value.cmp(&self.nodes[key].value) {
            Ordering::Less => {
                let (left, found) = self.delete(self.nodes[key].left, value);
                self.nodes[key].left = left;
                if !found {
                    return (Some(key), false);
                }
            }
            Ordering::Greater => {
                let (right, found) = self.delete(self.nodes[key].right, value);
                self.nodes[key].right = right;
                if !found {
                    return (Some(key), false);
                }
            }
            Ordering::Equal => {
                if self.nodes[key].count > 1 {
                    let node = &mut self.nodes[key];
                    node.count -= 1;
                    node.size -= 1;
                    return (Some(key), true);
                }
                let (left, right) = (self.nodes[key].left, self.nodes[key].right);
                self.nodes.remove(key);
                return match (left, right) {
                    (None, None) => (None, true),
                    (Some(child), None) | (None, Some(child)) => (Some(child), true),
                    (Some(left), Some(right)) => {
                        let (rest, successor) = self.detach_min(right);
                        self.nodes[successor].left = Some(left);
                        self.nodes[successor].right = rest;
                        (Some(self.balance(successor)), true)
                    }
                };
            }
        }
        (Some(self.balance(key)), true)
    }

    /// Unlink the smallest node of a subtree.
    ///
    /// Returns the rebalanced subtree and the detached node's key.
    fn detach_min(&mut self, key: usize) -> (Option<usize>, usize) {
        let Some(left) = self.nodes[key].left else {
            return (self.nodes[key].right, key);
        };
        let (rest, min) = self.detach_min(left);
        self.nodes[key].left = rest;
        (Some(self.balance(key)), min)
    }
}

// ============================================================================
// Iterator
// ============================================================================

/// In-order iterator over `(value, multiplicity)`.
pub struct Iter<'a> {
    tree: &'a StatsTree,
    stack: Vec<usize>,
}

impl Iter<'_> {
    fn push_left(&mut self, mut cursor: Option<usize>) {
        while let Some(key) = cursor {
            self.stack.push(key);
            cursor = self.tree.nodes[key].left;
        }
    }
}

impl Iterator for Iter<'_> {
    type Item = (Decimal, u64);

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.stack.pop()?;
        let node = &self.tree.nodes[key];
        self.push_left(node.right);
        Some((node.value, node.count))
    }
}

impl<'a> IntoIterator for &'a StatsTree {
    type Item = (Decimal, u64);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
