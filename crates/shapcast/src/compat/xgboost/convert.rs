//! Conversion from XGBoost JSON types to native forests.

use crate::repr::{Forest, MutableTree, Tree};

use super::json::{GradientBooster, ModelTrees, Tree as XgbTree, XgbModel};

/// A booster model converted from XGBoost.
#[derive(Debug, Clone)]
pub enum Booster {
    /// Standard gradient boosted tree ensemble.
    Tree(Forest),
    /// DART ensemble; the drop weights are already baked into the leaves.
    Dart { forest: Forest, weights: Box<[f32]> },
    /// Linear (gblinear) booster: `n_features` weights followed by the bias.
    Linear { n_features: usize, weights: Box<[f32]> },
}

impl Booster {
    /// Short name of the booster family, as XGBoost spells it.
    pub fn kind(&self) -> &'static str {
        match self {
            Booster::Tree(_) => "gbtree",
            Booster::Dart { .. } => "dart",
            Booster::Linear { .. } => "gblinear",
        }
    }

    /// The tree ensemble, if this booster is tree-based.
    pub fn into_forest(self) -> Option<Forest> {
        match self {
            Booster::Tree(forest) | Booster::Dart { forest, .. } => Some(forest),
            Booster::Linear { .. } => None,
        }
    }
}

/// Error type for XGBoost model conversion.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("tree {0} has no nodes")]
    EmptyTree(usize),
    #[error(
        "invalid node index in tree {tree}: node {node} references child {child} but tree has {num_nodes} nodes"
    )]
    InvalidNodeIndex {
        tree: usize,
        node: usize,
        child: i32,
        num_nodes: usize,
    },
    #[error("tree {tree}: array `{field}` has length {actual}, expected {expected}")]
    ArrayLenMismatch {
        tree: usize,
        field: &'static str,
        actual: usize,
        expected: usize,
    },
    #[error("tree {tree}: node {node} uses a categorical split, which is not supported")]
    UnsupportedSplit { tree: usize, node: usize },
    #[error("multi-output models are not supported (num_class = {n_class}, num_target = {num_target})")]
    MultiOutput { n_class: i64, num_target: i64 },
    #[error("DART weight count {weights} does not match tree count {trees}")]
    DartWeightsMismatch { weights: usize, trees: usize },
    #[error(
        "gblinear weights length {actual} doesn't match num_features + 1 = {expected}"
    )]
    InvalidLinearWeights { actual: usize, expected: usize },
    #[error("converted forest is invalid: {0}")]
    InvalidForest(#[from] crate::repr::ForestValidationError),
}

/// Convert base_score from probability space to margin space based on objective.
///
/// XGBoost stores base_score in the output space, but the trees add up in
/// margin space.
fn prob_to_margin(base_score: f32, objective: &str) -> f32 {
    match objective {
        "binary:logistic" | "reg:logistic" => {
            let p = base_score.clamp(1e-7, 1.0 - 1e-7);
            (p / (1.0 - p)).ln()
        }
        "reg:gamma" | "reg:tweedie" | "count:poisson" => base_score.max(1e-7).ln(),
        _ => base_score,
    }
}

impl XgbModel {
    /// Number of input features declared by the learner.
    pub fn n_features(&self) -> usize {
        self.learner.learner_model_param.n_features.max(0) as usize
    }

    /// Feature names stored in the model file (empty when trained on arrays).
    pub fn feature_names(&self) -> &[String] {
        &self.learner.feature_names
    }

    /// Convert to a native [`Booster`].
    ///
    /// - `Booster::Tree` for gbtree models
    /// - `Booster::Dart` for DART models (weights baked into leaves)
    /// - `Booster::Linear` for gblinear models
    pub fn to_booster(&self) -> Result<Booster, ConversionError> {
        let param = &self.learner.learner_model_param;
        if param.n_class > 1 || param.num_target > 1 {
            return Err(ConversionError::MultiOutput {
                n_class: param.n_class,
                num_target: param.num_target,
            });
        }

        let margin_base_score = prob_to_margin(param.base_score, &self.learner.objective.name);

        match &self.learner.gradient_booster {
            GradientBooster::Gbtree { model } => {
                let forest = convert_forest(model, self.n_features(), margin_base_score)?;
                Ok(Booster::Tree(forest))
            }
            GradientBooster::Dart {
                gbtree,
                weight_drop,
            } => {
                let mut forest = convert_forest(&gbtree.model, self.n_features(), margin_base_score)?;
                if weight_drop.len() != forest.n_trees() {
                    return Err(ConversionError::DartWeightsMismatch {
                        weights: weight_drop.len(),
                        trees: forest.n_trees(),
                    });
                }
                for (tree, &w) in forest.trees_mut().zip(weight_drop.iter()) {
                    tree.scale_leaves(w);
                }
                Ok(Booster::Dart {
                    forest,
                    weights: weight_drop.clone().into_boxed_slice(),
                })
            }
            GradientBooster::Gblinear { model } => {
                let n_features = self.n_features();
                if model.weights.len() != n_features + 1 {
                    return Err(ConversionError::InvalidLinearWeights {
                        actual: model.weights.len(),
                        expected: n_features + 1,
                    });
                }
                Ok(Booster::Linear {
                    n_features,
                    weights: model.weights.clone().into_boxed_slice(),
                })
            }
        }
    }
}

fn convert_forest(
    model_trees: &ModelTrees,
    n_features: usize,
    base_score: f32,
) -> Result<Forest, ConversionError> {
    let mut forest = Forest::for_regression(n_features).with_base_score(base_score);
    for (tree_idx, xgb_tree) in model_trees.trees.iter().enumerate() {
        forest.push_tree(convert_tree(xgb_tree, tree_idx)?);
    }
    forest.validate()?;
    Ok(forest)
}

/// Convert a single XGBoost tree to a native [`Tree`] with covers.
fn convert_tree(xgb_tree: &XgbTree, tree_idx: usize) -> Result<Tree, ConversionError> {
    let num_nodes = xgb_tree.tree_param.num_nodes.max(0) as usize;
    if num_nodes == 0 {
        return Err(ConversionError::EmptyTree(tree_idx));
    }

    let check_len = |field: &'static str, actual: usize| {
        if actual == num_nodes {
            Ok(())
        } else {
            Err(ConversionError::ArrayLenMismatch {
                tree: tree_idx,
                field,
                actual,
                expected: num_nodes,
            })
        }
    };
    check_len("left_children", xgb_tree.left_children.len())?;
    check_len("right_children", xgb_tree.right_children.len())?;
    check_len("split_indices", xgb_tree.split_indices.len())?;
    check_len("split_conditions", xgb_tree.split_conditions.len())?;
    check_len("default_left", xgb_tree.default_left.len())?;
    check_len("sum_hessian", xgb_tree.sum_hessian.len())?;

    let mut tree = MutableTree::with_capacity(num_nodes);
    tree.init_root_with_n_nodes(num_nodes);

    for node_idx in 0..num_nodes {
        let node = node_idx as u32;
        let left_child = xgb_tree.left_children[node_idx];
        let right_child = xgb_tree.right_children[node_idx];
        tree.set_cover(node, xgb_tree.sum_hessian[node_idx] as f32);

        // XGBoost convention: left_child == -1 marks a leaf
        if left_child == -1 {
            tree.make_leaf(node, xgb_tree.split_conditions[node_idx]);
            continue;
        }

        for child in [left_child, right_child] {
            if child < 0 || child as usize >= num_nodes {
                return Err(ConversionError::InvalidNodeIndex {
                    tree: tree_idx,
                    node: node_idx,
                    child,
                    num_nodes,
                });
            }
        }

        if xgb_tree.split_type.get(node_idx).copied().unwrap_or(0) != 0 {
            return Err(ConversionError::UnsupportedSplit {
                tree: tree_idx,
                node: node_idx,
            });
        }

        tree.set_numeric_split(
            node,
            xgb_tree.split_indices[node_idx].max(0) as u32,
            xgb_tree.split_conditions[node_idx],
            xgb_tree.default_left[node_idx] != 0,
            left_child as u32,
            right_child as u32,
        );
    }

    Ok(tree.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stump_json(leaf_left: f32, leaf_right: f32) -> serde_json::Value {
        json!({
            "tree_param": {"num_nodes": "3", "size_leaf_vector": "1", "num_feature": "2", "num_deleted": "0"},
            "id": 0,
            "loss_changes": [1.0, 0.0, 0.0],
            "sum_hessian": [10.0, 4.0, 6.0],
            "base_weights": [0.0, 0.0, 0.0],
            "left_children": [1, -1, -1],
            "right_children": [2, -1, -1],
            "parents": [2147483647, 0, 0],
            "split_indices": [1, 0, 0],
            "split_conditions": [0.5, leaf_left, leaf_right],
            "split_type": [0, 0, 0],
            "default_left": [1, 0, 0],
            "categories": [],
            "categories_nodes": [],
            "categories_segments": [],
            "categories_sizes": []
        })
    }

    fn model_json(booster: serde_json::Value, objective: &str, base_score: &str) -> XgbModel {
        let value = json!({
            "version": [2, 0, 3],
            "learner": {
                "feature_names": [],
                "feature_types": [],
                "gradient_booster": booster,
                "objective": {"name": objective},
                "learner_model_param": {
                    "base_score": base_score,
                    "num_class": "0",
                    "num_feature": "2",
                    "num_target": "1",
                    "boost_from_average": "1"
                }
            }
        });
        serde_json::from_value(value).unwrap()
    }

    fn gbtree(trees: Vec<serde_json::Value>) -> serde_json::Value {
        let n = trees.len();
        json!({
            "name": "gbtree",
            "model": {
                "trees": trees,
                "tree_info": vec![0; n],
                "gbtree_model_param": {"num_trees": n.to_string(), "num_parallel_tree": "1"}
            }
        })
    }

    #[test]
    fn convert_gbtree_reads_leaves_and_covers() {
        let model = model_json(gbtree(vec![stump_json(-1.0, 2.0)]), "reg:squarederror", "[5E-1]");
        let booster = model.to_booster().unwrap();
        assert_eq!(booster.kind(), "gbtree");

        let forest = booster.into_forest().unwrap();
        assert_eq!(forest.n_trees(), 1);
        assert_eq!(forest.n_features(), 2);
        assert_eq!(forest.base_score(), 0.5);
        assert_eq!(forest.tree(0).covers(), Some(&[10.0, 4.0, 6.0][..]));
        assert_eq!(forest.predict_row(&[0.0, 0.1]), -0.5);
        assert_eq!(forest.predict_row(&[0.0, 0.9]), 2.5);
        // Missing goes left
        assert_eq!(forest.predict_row(&[0.0, f32::NAN]), -0.5);
    }

    #[test]
    fn logistic_base_score_is_converted_to_margin() {
        let model = model_json(gbtree(vec![stump_json(0.0, 0.0)]), "binary:logistic", "0.5");
        let forest = model.to_booster().unwrap().into_forest().unwrap();
        assert!(forest.base_score().abs() < 1e-6);
    }

    #[test]
    fn dart_weights_are_baked_into_leaves() {
        let booster = json!({
            "name": "dart",
            "gbtree": gbtree(vec![stump_json(-1.0, 2.0)]),
            "weight_drop": [0.5]
        });
        let model = model_json(booster, "reg:squarederror", "0");
        match model.to_booster().unwrap() {
            Booster::Dart { forest, weights } => {
                assert_eq!(&*weights, &[0.5]);
                assert_eq!(forest.predict_row(&[0.0, 0.9]), 1.0);
            }
            other => panic!("expected dart, got {}", other.kind()),
        }
    }

    #[test]
    fn gblinear_converts_to_linear_variant() {
        let booster = json!({"name": "gblinear", "model": {"weights": [0.1, 0.2, 0.3]}});
        let model = model_json(booster, "reg:squarederror", "0.5");
        let booster = model.to_booster().unwrap();
        assert_eq!(booster.kind(), "gblinear");
        assert!(booster.into_forest().is_none());
    }

    #[test]
    fn categorical_split_is_rejected() {
        let mut tree = stump_json(0.0, 1.0);
        tree["split_type"] = json!([1, 0, 0]);
        let model = model_json(gbtree(vec![tree]), "reg:squarederror", "0");
        assert!(matches!(
            model.to_booster(),
            Err(ConversionError::UnsupportedSplit { tree: 0, node: 0 })
        ));
    }

    #[test]
    fn out_of_range_child_is_rejected() {
        let mut tree = stump_json(0.0, 1.0);
        tree["right_children"] = json!([9, -1, -1]);
        let model = model_json(gbtree(vec![tree]), "reg:squarederror", "0");
        assert!(matches!(
            model.to_booster(),
            Err(ConversionError::InvalidNodeIndex { child: 9, .. })
        ));
    }

    #[test]
    fn short_cover_array_is_rejected() {
        let mut tree = stump_json(0.0, 1.0);
        tree["sum_hessian"] = json!([10.0]);
        let model = model_json(gbtree(vec![tree]), "reg:squarederror", "0");
        assert!(matches!(
            model.to_booster(),
            Err(ConversionError::ArrayLenMismatch { field: "sum_hessian", .. })
        ));
    }
}
