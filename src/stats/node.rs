//! Tree node for slab-based storage.
//!
//! ## Design
//!
//! Each node holds one distinct value and its multiplicity. Child links are
//! slab keys. `size` is the total multiplicity of the subtree rooted here,
//! which is what makes rank queries logarithmic.

use rust_decimal::Decimal;

/// Node stored in the stats tree slab.
#[derive(Debug, Clone)]
pub struct StatsNode {
    /// Distinct value held by this node
    pub value: Decimal,

    /// How many times `value` was added
    pub count: u64,

    /// Sum of `count` over this subtree
    pub size: u64,

    /// AVL height, 1 for a leaf
    pub height: i32,

    /// Smaller values (slab key)
    pub left: Option<usize>,

    /// Larger values (slab key)
    pub right: Option<usize>,
}

impl StatsNode {
    /// Create a leaf holding one occurrence of `value`
    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self {
            value,
            count: 1,
            size: 1,
            height: 1,
            left: None,
            right: None,
        }
    }

    /// Check if this node has no children
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_new() {
        let node = StatsNode::new(Decimal::new(4210, 2));
        assert_eq!(node.count, 1);
        assert_eq!(node.size, 1);
        assert_eq!(node.height, 1);
        assert!(node.is_leaf());
    }
}
