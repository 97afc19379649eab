//! Order-statistics aggregation.
//!
//! ## Components
//!
//! - [`StatsNode`]: one distinct value, its multiplicity and subtree size
//! - [`StatsTree`]: AVL multiset with rank queries and running aggregates
//!
//! ## Performance
//!
//! | Operation | Complexity |
//! |-----------|------------|
//! | add / del | O(log d) |
//! | order / order_of | O(log d) |
//! | count / mean / std | O(1) |
//! | minimum / maximum | O(log d) |
//!
//! `d` is the number of distinct values.

pub mod node;
pub mod tree;

pub use node::StatsNode;
pub use tree::{Iter, StatsTree};
