//! Mutable tree used while converting or hand-building trees.

use super::{NodeId, Tree};

/// Node-addressable tree builder.
///
/// Nodes are pre-allocated with [`init_root_with_n_nodes`](Self::init_root_with_n_nodes)
/// and then filled in any order, which matches formats that store nodes in
/// BFS order with explicit child indices. Unfilled nodes default to leaves
/// with value `0.0`.
#[derive(Debug, Clone, Default)]
pub struct MutableTree {
    split_indices: Vec<u32>,
    split_thresholds: Vec<f32>,
    left_children: Vec<NodeId>,
    right_children: Vec<NodeId>,
    default_left: Vec<bool>,
    is_leaf: Vec<bool>,
    leaf_values: Vec<f32>,
    covers: Vec<Option<f32>>,
}

impl MutableTree {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            split_indices: Vec::with_capacity(capacity),
            split_thresholds: Vec::with_capacity(capacity),
            left_children: Vec::with_capacity(capacity),
            right_children: Vec::with_capacity(capacity),
            default_left: Vec::with_capacity(capacity),
            is_leaf: Vec::with_capacity(capacity),
            leaf_values: Vec::with_capacity(capacity),
            covers: Vec::with_capacity(capacity),
        }
    }

    /// Reset the tree to `n_nodes` placeholder leaves.
    pub fn init_root_with_n_nodes(&mut self, n_nodes: usize) {
        self.split_indices = vec![0; n_nodes];
        self.split_thresholds = vec![0.0; n_nodes];
        self.left_children = vec![0; n_nodes];
        self.right_children = vec![0; n_nodes];
        self.default_left = vec![false; n_nodes];
        self.is_leaf = vec![true; n_nodes];
        self.leaf_values = vec![0.0; n_nodes];
        self.covers = vec![None; n_nodes];
    }

    pub fn n_nodes(&self) -> usize {
        self.is_leaf.len()
    }

    pub fn make_leaf(&mut self, node: NodeId, value: f32) {
        let i = node as usize;
        self.is_leaf[i] = true;
        self.leaf_values[i] = value;
    }

    pub fn set_numeric_split(
        &mut self,
        node: NodeId,
        feature: u32,
        threshold: f32,
        default_left: bool,
        left: NodeId,
        right: NodeId,
    ) {
        let i = node as usize;
        self.is_leaf[i] = false;
        self.split_indices[i] = feature;
        self.split_thresholds[i] = threshold;
        self.default_left[i] = default_left;
        self.left_children[i] = left;
        self.right_children[i] = right;
    }

    pub fn set_cover(&mut self, node: NodeId, cover: f32) {
        self.covers[node as usize] = Some(cover);
    }

    /// Freeze into an immutable [`Tree`].
    ///
    /// Covers are attached only if every node received one.
    pub fn freeze(self) -> Tree {
        let covers: Option<Vec<f32>> = self.covers.iter().copied().collect();
        let tree = Tree::from_parts(
            self.split_indices,
            self.split_thresholds,
            self.left_children,
            self.right_children,
            self.default_left,
            self.is_leaf,
            self.leaf_values,
        );
        match covers {
            Some(c) if !c.is_empty() => tree.with_covers(c),
            _ => tree,
        }
    }
}
