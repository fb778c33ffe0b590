//! Gradient-boosted decision tree canonical representations.
//!
//! Trees are stored as structure-of-arrays with node-local child indices
//! (0 = root). Per-node covers are carried alongside the structure because
//! TreeSHAP needs them to weight the branches a sample does not take.

/// Canonical node identifier: an index into the tree's SoA arrays.
pub type NodeId = u32;

pub mod forest;
pub mod mutable_tree;
pub mod tree;

pub use forest::{Forest, ForestValidationError};
pub use mutable_tree::MutableTree;
pub use tree::{Tree, TreeValidationError};
