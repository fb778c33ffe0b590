//! Feature attribution for demand forecasts.
//!
//! [`TreeExplainer`] computes exact SHAP values for a forest; [`explain`]
//! turns them into an [`AttributionResult`] for one prepared request and
//! applies the [`DominanceCheck`].

mod attribution;
pub mod shap;

pub use attribution::{
    explain, explain_with, AttributionResult, Contribution, DominanceCheck, BIAS_WARNING,
    DEFAULT_DOMINANCE_THRESHOLD,
};
pub use shap::{ShapValues, TreeExplainer};

/// Errors raised while explaining a prediction.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExplainError {
    /// The model cannot be explained with TreeSHAP.
    #[error("attribution unavailable: {reason}")]
    AttributionUnavailable { reason: String },

    #[error("feature count mismatch: expected {expected}, got {actual}")]
    FeatureCountMismatch { expected: usize, actual: usize },
}
