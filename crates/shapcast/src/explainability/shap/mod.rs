//! SHAP (SHapley Additive exPlanations) for tree ensembles.
//!
//! - [`TreeExplainer`]: exact path-dependent TreeSHAP over a [`Forest`](crate::repr::Forest)
//! - [`ShapValues`]: per-sample, per-feature attributions plus base value

mod path;
mod tree_explainer;
mod values;

pub use path::{PathElement, PathState};
pub use tree_explainer::TreeExplainer;
pub use values::ShapValues;
