//! Request-level façade: validate, prepare, forecast and explain.

use std::sync::Arc;

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::config::ExplainConfig;
use crate::error::Result;
use crate::explainability::{
    explain_with, AttributionResult, Contribution, DominanceCheck, ExplainError, ShapValues,
    TreeExplainer,
};
use crate::model::TrainedModel;
use crate::preprocess::{prepare, DemandRequest, RawRecord};
use crate::utils::Parallelism;

/// One `{feature, value}` pair of the outbound response.
pub type ShapEntry = Contribution;

/// Outbound prediction body.
///
/// ```json
/// {"forecast": 4.4, "shap_values": [{"feature": "season", "value": 0.3}, ...]}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub forecast: f64,
    pub shap_values: Vec<ShapEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl From<AttributionResult> for PredictionResponse {
    fn from(result: AttributionResult) -> Self {
        Self {
            forecast: result.forecast,
            shap_values: result.contributions,
            warning: result.warning,
        }
    }
}

/// Forecasts demand and explains each forecast.
///
/// Built once at start-up around a shared [`TrainedModel`]; every call is
/// independent and read-only, so one instance can serve many threads.
#[derive(Debug, Clone)]
pub struct DemandForecaster {
    model: Arc<TrainedModel>,
    config: ExplainConfig,
    check: DominanceCheck,
    base_value: f64,
    max_depth: usize,
}

impl DemandForecaster {
    /// Validate the configuration and prepare the explainer.
    ///
    /// Fails with [`ExplainError::AttributionUnavailable`] if the forest
    /// cannot be explained.
    pub fn new(model: Arc<TrainedModel>, config: ExplainConfig) -> Result<Self> {
        config.validate()?;
        let explainer = TreeExplainer::new(model.forest())?;
        let (base_value, max_depth) = (explainer.base_value(), explainer.max_depth());

        tracing::info!(
            base_value,
            dominance_threshold = config.dominance_threshold,
            "demand forecaster ready"
        );

        Ok(Self {
            check: config.dominance_check(),
            model,
            config,
            base_value,
            max_depth,
        })
    }

    pub fn model(&self) -> &TrainedModel {
        &self.model
    }

    pub fn config(&self) -> &ExplainConfig {
        &self.config
    }

    /// Expected forecast under the training distribution.
    pub fn base_value(&self) -> f64 {
        self.base_value
    }

    fn explainer(&self) -> TreeExplainer<'_> {
        TreeExplainer::from_validated(self.model.forest(), self.base_value, self.max_depth)
    }

    /// Validate a typed request, then forecast and explain it.
    pub fn predict(&self, request: &DemandRequest) -> Result<PredictionResponse> {
        request.validate()?;
        self.predict_record(&request.into_record())
    }

    /// Forecast and explain a record keyed by training column names.
    pub fn predict_record(&self, record: &RawRecord) -> Result<PredictionResponse> {
        Ok(self.attribute(record)?.into())
    }

    /// Full attribution result, including the base value.
    pub fn attribute(&self, record: &RawRecord) -> Result<AttributionResult> {
        let scaled = prepare(record, self.model.scaler(), self.model.feature_names())?;
        let result = explain_with(&self.explainer(), &scaled, self.model.feature_names(), &self.check)?;

        if !result.verify_additivity(self.config.additivity_tolerance) {
            tracing::warn!(
                forecast = result.forecast,
                base_value = result.base_value,
                tolerance = self.config.additivity_tolerance,
                "contributions do not add up to the forecast"
            );
        }
        Ok(result)
    }

    /// Explain a batch of raw (unscaled) rows in training column order.
    pub fn explain_rows(&self, rows: ArrayView2<'_, f32>, parallelism: Parallelism) -> Result<ShapValues> {
        let n_features = self.model.n_features();
        if rows.ncols() != n_features {
            return Err(ExplainError::FeatureCountMismatch {
                expected: n_features,
                actual: rows.ncols(),
            }
            .into());
        }

        let scaler = self.model.scaler();
        let scaled = Array2::from_shape_fn(rows.dim(), |(i, j)| {
            scaler.transform_value(j, rows[[i, j]] as f64)
        });

        tracing::debug!(n_rows = rows.nrows(), ?parallelism, "explaining batch");
        Ok(self.explainer().shap_values(scaled.view(), parallelism))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::explainability::BIAS_WARNING;
    use crate::preprocess::PrepareError;
    use crate::testing;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn forecaster() -> DemandForecaster {
        DemandForecaster::new(Arc::new(testing::reference_model()), ExplainConfig::default()).unwrap()
    }

    #[test]
    fn is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DemandForecaster>();
    }

    #[test]
    fn predicts_reference_request() {
        let response = forecaster().predict(&testing::reference_request()).unwrap();

        assert_abs_diff_eq!(response.forecast, 4.4, epsilon = 1e-6);
        let values: Vec<f64> = response.shap_values.iter().map(|e| e.value).collect();
        for (got, want) in values.iter().zip([0.3, 0.8, 0.4, 0.3]) {
            assert_abs_diff_eq!(*got, want, epsilon = 1e-6);
        }
        assert_eq!(response.warning, None);
    }

    #[test]
    fn warning_omitted_from_json_when_absent() {
        let response = forecaster().predict(&testing::reference_request()).unwrap();
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("warning").is_none());
        assert_eq!(json["shap_values"][1]["feature"], "Sales");
    }

    #[test]
    fn low_threshold_attaches_warning() {
        let config = ExplainConfig::builder().dominance_threshold(0.3).build().unwrap();
        let forecaster = DemandForecaster::new(Arc::new(testing::reference_model()), config).unwrap();
        let response = forecaster.predict(&testing::reference_request()).unwrap();

        assert_eq!(response.warning.as_deref(), Some(BIAS_WARNING));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["warning"], BIAS_WARNING);
    }

    #[test]
    fn invalid_season_is_client_error() {
        let request = DemandRequest {
            season: 5,
            ..testing::reference_request()
        };
        let err = forecaster().predict(&request).unwrap_err();
        assert!(err.is_client_error());
        assert!(matches!(err, Error::Prepare(PrepareError::InvalidValue { .. })));
    }

    #[test]
    fn repeated_calls_are_identical() {
        let forecaster = forecaster();
        let a = forecaster.predict(&testing::reference_request()).unwrap();
        let b = forecaster.predict(&testing::reference_request()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn explain_rows_scales_raw_input() {
        let forecaster = forecaster();
        let rows = array![[1.0f32, 100.0, 10.0, 3.0], [3.0, 350.0, 25.0, 6.0]];
        let shap = forecaster.explain_rows(rows.view(), Parallelism::Sequential).unwrap();

        assert_eq!(shap.n_samples(), 2);
        let single = forecaster.predict(&testing::reference_request()).unwrap();
        for (j, entry) in single.shap_values.iter().enumerate() {
            assert_abs_diff_eq!(shap.get(0, j), entry.value, epsilon = 1e-9);
        }
        assert_abs_diff_eq!(shap.base_value(1), 2.6, epsilon = 1e-6);
    }

    #[test]
    fn explain_rows_checks_width() {
        let rows = array![[1.0f32, 100.0]];
        let err = forecaster()
            .explain_rows(rows.view(), Parallelism::Sequential)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Explain(ExplainError::FeatureCountMismatch { expected: 4, actual: 2 })
        ));
    }
}
