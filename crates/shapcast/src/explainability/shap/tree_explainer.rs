//! TreeSHAP explainer for tree ensembles.
//!
//! Implements the path-dependent TreeSHAP algorithm from Lundberg et al. (2020):
//! "From local explanations to global understanding with explainable AI for trees"
//!
//! The "absent feature" distribution is taken from node covers, so the
//! expected value of each tree is its cover-weighted mean leaf value and the
//! attributions of a row always sum to `prediction - base_value`.

use ndarray::ArrayView2;

use super::path::{extend_path, unwind_path, unwound_path_sum, PathState};
use super::ShapValues;
use crate::explainability::ExplainError;
use crate::repr::{Forest, NodeId, Tree};
use crate::utils::Parallelism;

/// TreeSHAP explainer for tree-based models.
///
/// Computes exact SHAP values for tree ensembles in polynomial time.
#[derive(Debug, Clone)]
pub struct TreeExplainer<'a> {
    forest: &'a Forest,
    /// Expected raw prediction under the training distribution.
    base_value: f64,
    max_depth: usize,
}

impl<'a> TreeExplainer<'a> {
    /// Create a new TreeExplainer for the given forest.
    ///
    /// # Errors
    /// Returns [`ExplainError::AttributionUnavailable`] if the forest is
    /// structurally invalid, a tree has no cover statistics, or an internal
    /// node's children carry no usable cover.
    pub fn new(forest: &'a Forest) -> Result<Self, ExplainError> {
        forest
            .validate()
            .map_err(|e| ExplainError::AttributionUnavailable { reason: e.to_string() })?;
        for (tree_idx, tree) in forest.trees().enumerate() {
            check_covers(tree_idx, tree)?;
        }

        let base_value = forest
            .trees()
            .fold(forest.base_score() as f64, |acc, tree| acc + expected_value(tree, 0));

        Ok(Self {
            forest,
            base_value,
            max_depth: forest.max_depth(),
        })
    }

    /// Rebuild an explainer for a forest already accepted by [`new`](Self::new).
    pub(crate) fn from_validated(forest: &'a Forest, base_value: f64, max_depth: usize) -> Self {
        Self {
            forest,
            base_value,
            max_depth,
        }
    }

    #[inline]
    pub(crate) fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Expected prediction: `base_score` plus every tree's cover-weighted mean.
    #[inline]
    pub fn base_value(&self) -> f64 {
        self.base_value
    }

    #[inline]
    pub fn forest(&self) -> &'a Forest {
        self.forest
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.forest.n_features()
    }

    /// SHAP values of one row, one entry per forest feature.
    ///
    /// Feature positions past the end of `features` are treated as missing.
    pub fn explain_row(&self, features: &[f32]) -> Vec<f64> {
        let mut phi = vec![0.0; self.n_features()];
        self.accumulate_row(features, &mut phi);
        phi
    }

    /// Compute SHAP values for a batch of samples.
    ///
    /// `features` is sample-major: `[n_samples, n_features]`.
    pub fn shap_values(&self, features: ArrayView2<'_, f32>, parallelism: Parallelism) -> ShapValues {
        let n_samples = features.nrows();
        let n_features = self.n_features();
        let mut shap = ShapValues::zeros(n_samples, n_features);
        let row_len = shap.row_len();

        parallelism.maybe_par_chunks_mut(shap.as_mut_slice(), row_len, |sample, out| {
            let row = features.row(sample).to_vec();
            let (phi, base) = out.split_at_mut(n_features);
            self.accumulate_row(&row, phi);
            base[0] = self.base_value;
        });

        shap
    }

    fn accumulate_row(&self, features: &[f32], phi: &mut [f64]) {
        let mut path = PathState::new(self.max_depth);
        for tree in self.forest.trees() {
            tree_shap(
                tree,
                features,
                phi,
                &mut path,
                Recursion {
                    node: 0,
                    parent_start: 0,
                    unique_depth: 0,
                    zero_fraction: 1.0,
                    one_fraction: 1.0,
                    feature: None,
                },
            );
        }
    }
}

/// Per-call state of the TreeSHAP recursion.
#[derive(Debug, Clone, Copy)]
struct Recursion {
    node: NodeId,
    parent_start: usize,
    unique_depth: usize,
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<u32>,
}

fn tree_shap(tree: &Tree, features: &[f32], phi: &mut [f64], path: &mut PathState, call: Recursion) {
    let Recursion {
        node,
        parent_start,
        mut unique_depth,
        zero_fraction,
        one_fraction,
        feature,
    } = call;

    // Neither "present" nor "absent" paths reach this subtree.
    if zero_fraction == 0.0 && one_fraction == 0.0 {
        return;
    }

    let start = PathState::child_start(parent_start, unique_depth);
    if unique_depth > 0 {
        path.copy_segment(parent_start, start, unique_depth);
    }
    extend_path(path.segment_mut(start), unique_depth, zero_fraction, one_fraction, feature);

    if tree.is_leaf(node) {
        let leaf = tree.leaf_value(node) as f64;
        let segment = path.segment(start);
        for i in 1..=unique_depth {
            let w = unwound_path_sum(segment, unique_depth, i);
            let el = segment[i];
            if let Some(f) = el.feature {
                if let Some(slot) = phi.get_mut(f as usize) {
                    *slot += w * (el.one_fraction - el.zero_fraction) * leaf;
                }
            }
        }
        return;
    }

    let split = tree.split_index(node);
    let fvalue = features.get(split as usize).copied().unwrap_or(f32::NAN);
    let (left, right) = (tree.left_child(node), tree.right_child(node));
    let (hot, cold) = if tree.goes_left(node, fvalue) {
        (left, right)
    } else {
        (right, left)
    };

    let (hot_cover, cold_cover) = (cover(tree, hot), cover(tree, cold));
    let total = hot_cover + cold_cover;

    let mut incoming_zero = 1.0;
    let mut incoming_one = 1.0;
    let segment = path.segment_mut(start);
    if let Some(k) = (1..=unique_depth).find(|&k| segment[k].feature == Some(split)) {
        incoming_zero = segment[k].zero_fraction;
        incoming_one = segment[k].one_fraction;
        unwind_path(segment, unique_depth, k);
        unique_depth -= 1;
    }

    tree_shap(
        tree,
        features,
        phi,
        path,
        Recursion {
            node: hot,
            parent_start: start,
            unique_depth: unique_depth + 1,
            zero_fraction: hot_cover / total * incoming_zero,
            one_fraction: incoming_one,
            feature: Some(split),
        },
    );
    tree_shap(
        tree,
        features,
        phi,
        path,
        Recursion {
            node: cold,
            parent_start: start,
            unique_depth: unique_depth + 1,
            zero_fraction: cold_cover / total * incoming_zero,
            one_fraction: 0.0,
            feature: Some(split),
        },
    );
}

#[inline]
fn cover(tree: &Tree, node: NodeId) -> f64 {
    tree.covers().map_or(0.0, |c| c[node as usize] as f64)
}

/// Cover-weighted mean leaf value of the subtree rooted at `node`.
fn expected_value(tree: &Tree, node: NodeId) -> f64 {
    if tree.is_leaf(node) {
        return tree.leaf_value(node) as f64;
    }
    let (left, right) = (tree.left_child(node), tree.right_child(node));
    let (cl, cr) = (cover(tree, left), cover(tree, right));
    (cl * expected_value(tree, left) + cr * expected_value(tree, right)) / (cl + cr)
}

fn check_covers(tree_idx: usize, tree: &Tree) -> Result<(), ExplainError> {
    let covers = tree.covers().ok_or_else(|| ExplainError::AttributionUnavailable {
        reason: format!("tree {tree_idx} has no cover statistics"),
    })?;

    if let Some(node) = covers.iter().position(|c| !c.is_finite() || *c < 0.0) {
        return Err(ExplainError::AttributionUnavailable {
            reason: format!("tree {tree_idx} node {node} has invalid cover {}", covers[node]),
        });
    }

    for node in 0..tree.n_nodes() as NodeId {
        if tree.is_leaf(node) {
            continue;
        }
        let children = cover(tree, tree.left_child(node)) + cover(tree, tree.right_child(node));
        if children <= 0.0 {
            return Err(ExplainError::AttributionUnavailable {
                reason: format!("tree {tree_idx} node {node} has zero child cover"),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repr::MutableTree;
    use crate::testing;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn stump(threshold: f32, left: f32, right: f32, covers: [f32; 3]) -> Tree {
        let mut tree = MutableTree::with_capacity(3);
        tree.init_root_with_n_nodes(3);
        tree.set_numeric_split(0, 0, threshold, true, 1, 2);
        tree.make_leaf(1, left);
        tree.make_leaf(2, right);
        for (node, cover) in covers.into_iter().enumerate() {
            tree.set_cover(node as NodeId, cover);
        }
        tree.freeze()
    }

    #[test]
    fn stump_attribution_is_cover_weighted() {
        let mut forest = Forest::for_regression(1);
        forest.push_tree(stump(0.5, 1.0, -1.0, [10.0, 4.0, 6.0]));
        let explainer = TreeExplainer::new(&forest).unwrap();

        // E[f] = 0.4 * 1 + 0.6 * -1
        assert_abs_diff_eq!(explainer.base_value(), -0.2, epsilon = 1e-9);
        let phi = explainer.explain_row(&[0.0]);
        assert_abs_diff_eq!(phi[0], 1.2, epsilon = 1e-9);
        let phi = explainer.explain_row(&[1.0]);
        assert_abs_diff_eq!(phi[0], -0.8, epsilon = 1e-9);
    }

    #[test]
    fn missing_covers_error() {
        let mut tree = MutableTree::with_capacity(3);
        tree.init_root_with_n_nodes(3);
        tree.set_numeric_split(0, 0, 0.5, true, 1, 2);
        tree.make_leaf(1, -1.0);
        tree.make_leaf(2, 1.0);

        let mut forest = Forest::for_regression(1);
        forest.push_tree(tree.freeze());

        let err = TreeExplainer::new(&forest).unwrap_err();
        assert!(matches!(err, ExplainError::AttributionUnavailable { .. }));
    }

    #[test]
    fn malformed_forest_is_rejected_before_traversal() {
        // Root's right child points past the node arrays.
        let tree = Tree::from_parts(
            vec![0, 0, 0],
            vec![0.5, 0.0, 0.0],
            vec![1, 0, 0],
            vec![7, 0, 0],
            vec![true, false, false],
            vec![false, true, true],
            vec![0.0, 1.0, 2.0],
        )
        .with_covers(vec![10.0, 4.0, 6.0]);
        let mut forest = Forest::for_regression(1);
        forest.push_tree(tree);

        match TreeExplainer::new(&forest) {
            Err(ExplainError::AttributionUnavailable { reason }) => {
                assert!(reason.contains("tree 0"), "{reason}");
            }
            other => panic!("expected AttributionUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn feature_outside_forest_is_rejected() {
        let mut forest = Forest::for_regression(1);
        let mut tree = MutableTree::with_capacity(3);
        tree.init_root_with_n_nodes(3);
        tree.set_numeric_split(0, 3, 0.5, true, 1, 2);
        tree.make_leaf(1, -1.0);
        tree.make_leaf(2, 1.0);
        for node in 0..3 {
            tree.set_cover(node, 1.0);
        }
        forest.push_tree(tree.freeze());

        assert!(matches!(
            TreeExplainer::new(&forest),
            Err(ExplainError::AttributionUnavailable { .. })
        ));
    }

    #[test]
    fn zero_child_cover_error() {
        let mut forest = Forest::for_regression(1);
        forest.push_tree(stump(0.5, 1.0, -1.0, [0.0, 0.0, 0.0]));
        assert!(TreeExplainer::new(&forest).is_err());
    }

    #[test]
    fn reference_forest_matches_hand_computed_values() {
        let forest = testing::reference_forest();
        let explainer = TreeExplainer::new(&forest).unwrap();
        let row = testing::reference_scaled_row();

        assert_abs_diff_eq!(explainer.base_value(), 2.6, epsilon = 1e-6);
        let phi = explainer.explain_row(&row);
        for (got, want) in phi.iter().zip([0.3, 0.8, 0.4, 0.3]) {
            assert_abs_diff_eq!(*got, want, epsilon = 1e-6);
        }
    }

    #[test]
    fn repeated_feature_on_path_stays_additive() {
        // Feature 0 is split on at both levels.
        let mut tree = MutableTree::with_capacity(5);
        tree.init_root_with_n_nodes(5);
        tree.set_numeric_split(0, 0, 0.5, true, 1, 2);
        tree.set_numeric_split(1, 0, 0.2, false, 3, 4);
        tree.make_leaf(2, 3.0);
        tree.make_leaf(3, -1.0);
        tree.make_leaf(4, 2.0);
        for (node, cover) in [20.0, 12.0, 8.0, 5.0, 7.0].into_iter().enumerate() {
            tree.set_cover(node as NodeId, cover);
        }
        let mut forest = Forest::for_regression(2).with_base_score(0.5);
        forest.push_tree(tree.freeze());
        let explainer = TreeExplainer::new(&forest).unwrap();

        for x in [0.1f32, 0.3, 0.9] {
            let row = [x, 7.0];
            let phi = explainer.explain_row(&row);
            let total: f64 = phi.iter().sum::<f64>() + explainer.base_value();
            assert_abs_diff_eq!(total, forest.predict_row(&row), epsilon = 1e-9);
            // Feature 1 is never split on.
            assert_eq!(phi[1], 0.0);
        }
    }

    #[test]
    fn batch_matches_single_rows() {
        let forest = testing::reference_forest();
        let explainer = TreeExplainer::new(&forest).unwrap();
        let data = array![
            [-0.4f32, -1.0, -1.0, -0.3333],
            [0.8, 1.0, 0.5, 0.6],
            [f32::NAN, 0.0, -2.0, 1.0],
        ];

        for parallelism in [Parallelism::Sequential, Parallelism::Parallel] {
            let shap = explainer.shap_values(data.view(), parallelism);
            assert_eq!(shap.n_samples(), 3);
            assert_eq!(shap.n_features(), 4);

            let mut predictions = Vec::new();
            for (i, row) in data.rows().into_iter().enumerate() {
                let row = row.to_vec();
                assert_eq!(shap.feature_shap(i), explainer.explain_row(&row).as_slice());
                assert_eq!(shap.base_value(i), explainer.base_value());
                predictions.push(forest.predict_row(&row));
            }
            assert!(shap.verify(&predictions, 1e-9));
        }
    }
}
