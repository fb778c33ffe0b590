//! Per-request attribution result and the dominance heuristic.

use serde::{Deserialize, Serialize};

use super::{ExplainError, TreeExplainer};
use crate::preprocess::ScaledVector;

/// Share of total absolute attribution above which a single feature is
/// flagged as dominating the prediction.
pub const DEFAULT_DOMINANCE_THRESHOLD: f64 = 0.7;

/// Warning attached to a prediction that trips the [`DominanceCheck`].
pub const BIAS_WARNING: &str = "Potential bias: Single feature dominates prediction";

/// Signed push of one feature relative to the base value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub feature: String,
    pub value: f64,
}

/// Forecast for one input together with its exact attributions.
///
/// `contributions` follow the model's feature order and satisfy
/// `sum(contributions) + base_value ≈ forecast`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionResult {
    pub forecast: f64,
    pub base_value: f64,
    pub contributions: Vec<Contribution>,
    pub warning: Option<String>,
}

impl AttributionResult {
    /// Contribution with the largest magnitude. Ties keep the first feature.
    pub fn top_factor(&self) -> Option<&Contribution> {
        self.contributions.iter().fold(None, |best: Option<&Contribution>, c| match best {
            Some(b) if b.value.abs() >= c.value.abs() => Some(b),
            _ => Some(c),
        })
    }

    /// `|Σc + base − forecast| ≤ tolerance · max(1, |forecast|)`.
    pub fn verify_additivity(&self, tolerance: f64) -> bool {
        let total: f64 = self.contributions.iter().map(|c| c.value).sum::<f64>() + self.base_value;
        (total - self.forecast).abs() <= tolerance * self.forecast.abs().max(1.0)
    }
}

/// Flags predictions where one feature explains most of the total absolute
/// attribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DominanceCheck {
    threshold: f64,
}

impl Default for DominanceCheck {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_DOMINANCE_THRESHOLD,
        }
    }
}

impl DominanceCheck {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    #[inline]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Ratio of the largest absolute value to the sum of absolute values.
    ///
    /// `None` when every value is zero.
    pub fn dominance(values: &[f64]) -> Option<f64> {
        let total: f64 = values.iter().map(|v| v.abs()).sum();
        if total <= 0.0 {
            return None;
        }
        let max_abs = values.iter().fold(0.0f64, |m, v| m.max(v.abs()));
        Some(max_abs / total)
    }

    /// [`BIAS_WARNING`] iff the dominance ratio strictly exceeds the threshold.
    pub fn evaluate(&self, values: &[f64]) -> Option<&'static str> {
        match Self::dominance(values) {
            Some(ratio) if ratio > self.threshold => Some(BIAS_WARNING),
            _ => None,
        }
    }
}

/// Explain one prepared vector with the default dominance threshold.
pub fn explain(
    explainer: &TreeExplainer<'_>,
    scaled: &ScaledVector,
    feature_names: &[String],
) -> Result<AttributionResult, ExplainError> {
    explain_with(explainer, scaled, feature_names, &DominanceCheck::default())
}

/// Explain one prepared vector: forecast, TreeSHAP contributions in
/// `feature_names` order and an optional bias warning.
pub fn explain_with(
    explainer: &TreeExplainer<'_>,
    scaled: &ScaledVector,
    feature_names: &[String],
    check: &DominanceCheck,
) -> Result<AttributionResult, ExplainError> {
    let row = scaled.as_slice();
    if row.len() != feature_names.len() {
        return Err(ExplainError::FeatureCountMismatch {
            expected: feature_names.len(),
            actual: row.len(),
        });
    }
    if row.len() != explainer.n_features() {
        return Err(ExplainError::FeatureCountMismatch {
            expected: explainer.n_features(),
            actual: row.len(),
        });
    }

    let forecast = explainer.forest().predict_row(row);
    let phi = explainer.explain_row(row);
    let warning = check.evaluate(&phi);

    let contributions = feature_names
        .iter()
        .zip(&phi)
        .map(|(feature, &value)| Contribution {
            feature: feature.clone(),
            value,
        })
        .collect();

    tracing::debug!(forecast, base_value = explainer.base_value(), ?phi, "explained prediction");
    if let Some(message) = warning {
        tracing::warn!(
            forecast,
            ratio = ?DominanceCheck::dominance(&phi),
            threshold = check.threshold(),
            "{message}"
        );
    }

    Ok(AttributionResult {
        forecast,
        base_value: explainer.base_value(),
        contributions,
        warning: warning.map(str::to_owned),
    })
}
