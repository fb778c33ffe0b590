//! Shared fixtures for unit tests, integration tests and benchmarks.
//!
//! The reference model is small enough to explain by hand:
//!
//! ```text
//! tree 0 (cover)                               tree 1
//! [0] Sales < -0.5 (100)                       [0] season < 0 (100)
//!   [1] Discount < 0 (60)                        [1] leaf  0.4 (50)
//!     [3] leaf  2.0 (30)                         [2] leaf -0.2 (50)
//!     [4] leaf  1.0 (30)
//!   [2] Days < 0 (40)
//!     [5] leaf  0.5 (10)
//!     [6] leaf -1.5 (30)
//! ```
//!
//! With `base_score = 2.0` the expected value is `2.6`, and the reference
//! request (season 1, Sales 100, discount 10, 3 shipping days) forecasts `4.4`
//! with contributions `[0.3, 0.8, 0.4, 0.3]`.

mod cases;

use std::path::PathBuf;

pub use cases::{ExpectedExplanation, TestInput};

use crate::preprocess::{demand_feature_names, DemandRequest, Scaler};
use crate::repr::{Forest, MutableTree, NodeId, Tree};
use crate::TrainedModel;

/// Directory holding JSON fixtures (`tests/test-cases`).
pub fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/test-cases")
}

pub fn feature_names() -> Vec<String> {
    demand_feature_names()
}

pub fn reference_scaler() -> Scaler {
    Scaler::new(
        feature_names(),
        vec![1.5, 200.0, 20.0, 3.5],
        vec![1.25, 100.0, 10.0, 1.5],
    )
    .expect("reference scaler statistics are valid")
}

fn with_covers(mut tree: MutableTree, covers: &[f32]) -> Tree {
    for (node, &cover) in covers.iter().enumerate() {
        tree.set_cover(node as NodeId, cover);
    }
    tree.freeze()
}

pub fn reference_forest() -> Forest {
    let mut t0 = MutableTree::with_capacity(7);
    t0.init_root_with_n_nodes(7);
    t0.set_numeric_split(0, 1, -0.5, true, 1, 2);
    t0.set_numeric_split(1, 2, 0.0, true, 3, 4);
    t0.set_numeric_split(2, 3, 0.0, true, 5, 6);
    t0.make_leaf(3, 2.0);
    t0.make_leaf(4, 1.0);
    t0.make_leaf(5, 0.5);
    t0.make_leaf(6, -1.5);

    let mut t1 = MutableTree::with_capacity(3);
    t1.init_root_with_n_nodes(3);
    t1.set_numeric_split(0, 0, 0.0, true, 1, 2);
    t1.make_leaf(1, 0.4);
    t1.make_leaf(2, -0.2);

    let mut forest = Forest::for_regression(4).with_base_score(2.0);
    forest.push_tree(with_covers(t0, &[100.0, 60.0, 40.0, 30.0, 30.0, 10.0, 30.0]));
    forest.push_tree(with_covers(t1, &[100.0, 50.0, 50.0]));
    forest
}

/// The reference request after scaling with [`reference_scaler`].
pub fn reference_scaled_row() -> [f32; 4] {
    [-0.4, -1.0, -1.0, -1.0 / 3.0]
}

pub fn reference_request() -> DemandRequest {
    DemandRequest {
        season: 1,
        sales: 100.0,
        order_item_discount: 10.0,
        days_for_shipping: 3.0,
    }
}

pub fn reference_model() -> TrainedModel {
    TrainedModel::from_parts(reference_forest(), reference_scaler(), feature_names())
        .expect("reference artifact parts are consistent")
}
