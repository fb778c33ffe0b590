//! Canonical forest representation (collection of trees).

use super::{tree::TreeValidationError, Tree};

/// Structural validation errors for [`Forest`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ForestValidationError {
    #[error("tree {tree_idx} is invalid: {error}")]
    InvalidTree {
        tree_idx: usize,
        error: TreeValidationError,
    },
    #[error("tree {tree_idx} splits on feature {feature} but the forest has {n_features} features")]
    FeatureOutOfRange {
        tree_idx: usize,
        feature: u32,
        n_features: usize,
    },
}

/// Single-output forest of regression trees.
///
/// The raw prediction is `base_score + Σ tree(x)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Forest {
    trees: Vec<Tree>,
    base_score: f32,
    n_features: usize,
}

impl Forest {
    /// Create an empty regression forest over `n_features` features.
    pub fn for_regression(n_features: usize) -> Self {
        Self {
            trees: Vec::new(),
            base_score: 0.0,
            n_features,
        }
    }

    pub fn with_base_score(mut self, base_score: f32) -> Self {
        self.base_score = base_score;
        self
    }

    pub fn push_tree(&mut self, tree: Tree) {
        self.trees.push(tree);
    }

    #[inline]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Number of input features the forest was trained on.
    #[inline]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    #[inline]
    pub fn base_score(&self) -> f32 {
        self.base_score
    }

    #[inline]
    pub fn tree(&self, idx: usize) -> &Tree {
        &self.trees[idx]
    }

    pub fn trees(&self) -> impl Iterator<Item = &Tree> {
        self.trees.iter()
    }

    pub(crate) fn trees_mut(&mut self) -> impl Iterator<Item = &mut Tree> {
        self.trees.iter_mut()
    }

    /// Deepest tree depth in nodes (0 for an empty forest).
    pub fn max_depth(&self) -> usize {
        self.trees.iter().map(Tree::depth).max().unwrap_or(0)
    }

    /// Validate every tree and check split features against `n_features`.
    pub fn validate(&self) -> Result<(), ForestValidationError> {
        for (tree_idx, tree) in self.trees.iter().enumerate() {
            tree.validate()
                .map_err(|error| ForestValidationError::InvalidTree { tree_idx, error })?;
            if let Some(feature) = tree.max_split_index() {
                if feature as usize >= self.n_features {
                    return Err(ForestValidationError::FeatureOutOfRange {
                        tree_idx,
                        feature,
                        n_features: self.n_features,
                    });
                }
            }
        }
        Ok(())
    }

    /// Raw prediction for a single row of features.
    ///
    /// Leaf values are accumulated in `f64`.
    pub fn predict_row(&self, features: &[f32]) -> f64 {
        self.trees
            .iter()
            .fold(self.base_score as f64, |acc, tree| {
                acc + tree.predict_row(features) as f64
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repr::MutableTree;

    fn build_simple_tree(left_val: f32, right_val: f32, threshold: f32) -> Tree {
        let mut tree = MutableTree::with_capacity(3);
        tree.init_root_with_n_nodes(3);
        tree.set_numeric_split(0, 0, threshold, true, 1, 2);
        tree.make_leaf(1, left_val);
        tree.make_leaf(2, right_val);
        tree.freeze()
    }

    #[test]
    fn forest_single_tree_regression() {
        let mut forest = Forest::for_regression(1);
        forest.push_tree(build_simple_tree(1.0, 2.0, 0.5));

        assert_eq!(forest.predict_row(&[0.3]), 1.0);
        assert_eq!(forest.predict_row(&[0.7]), 2.0);
    }

    #[test]
    fn forest_multiple_trees_sum() {
        let mut forest = Forest::for_regression(1);
        forest.push_tree(build_simple_tree(1.0, 2.0, 0.5));
        forest.push_tree(build_simple_tree(0.5, 1.5, 0.5));

        assert_eq!(forest.predict_row(&[0.3]), 1.5);
        assert_eq!(forest.predict_row(&[0.7]), 3.5);
    }

    #[test]
    fn forest_with_base_score() {
        let mut forest = Forest::for_regression(1).with_base_score(0.5);
        forest.push_tree(build_simple_tree(1.0, 2.0, 0.5));

        assert_eq!(forest.predict_row(&[0.3]), 1.5);
    }

    #[test]
    fn validate_rejects_feature_out_of_range() {
        let mut forest = Forest::for_regression(0);
        forest.push_tree(build_simple_tree(1.0, 2.0, 0.5));

        assert_eq!(
            forest.validate(),
            Err(ForestValidationError::FeatureOutOfRange {
                tree_idx: 0,
                feature: 0,
                n_features: 0
            })
        );
    }

    #[test]
    fn max_depth_over_trees() {
        let mut forest = Forest::for_regression(1);
        assert_eq!(forest.max_depth(), 0);
        forest.push_tree(build_simple_tree(1.0, 2.0, 0.5));
        assert_eq!(forest.max_depth(), 2);
    }
}
