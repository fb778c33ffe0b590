//! shapcast: demand forecasting with exact feature attributions.
//!
//! Loads a gradient-boosted tree ensemble trained on
//! `season`, `Sales`, `Order Item Discount` and `Days for shipping (real)`,
//! predicts order quantity for one request and explains the prediction with
//! exact TreeSHAP values.
//!
//! # Key Types
//!
//! - [`TrainedModel`] - Forest + scaler + feature names, loaded together
//! - [`DemandForecaster`] - Request → forecast, contributions, bias warning
//! - [`TreeExplainer`] - TreeSHAP over a [`Forest`]
//! - [`Scaler`] - Stored standard-scaling transform
//!
//! # Pipeline
//!
//! ```text
//! DemandRequest ─validate─▶ RawRecord ─prepare─▶ ScaledVector
//!     ─▶ Forest inference + TreeSHAP ─▶ DominanceCheck ─▶ PredictionResponse
//! ```
//!
//! # Loading XGBoost Models
//!
//! Use [`compat::xgboost::XgbModel`] to parse JSON models and
//! [`compat::xgboost::Booster`] to convert them into native forests.

// Re-export approx traits for users who want to compare attributions
pub use approx;

pub mod compat;
pub mod config;
pub mod error;
pub mod explainability;
pub mod model;
pub mod preprocess;
pub mod repr;
pub mod service;
pub mod testing;
pub mod utils;

// =============================================================================
// Convenience Re-exports
// =============================================================================

pub use config::{ConfigError, ExplainConfig, ServiceConfig};
pub use error::{Error, Result};
pub use explainability::{
    explain, explain_with, AttributionResult, Contribution, DominanceCheck, ExplainError, ShapValues,
    TreeExplainer, BIAS_WARNING, DEFAULT_DOMINANCE_THRESHOLD,
};
pub use model::{ArtifactError, TrainedModel};
pub use preprocess::{
    prepare, DemandRequest, PrepareError, RawRecord, Scaler, ScaledVector, Season,
    DEMAND_FEATURES,
};
pub use repr::{Forest, Tree};
pub use service::{DemandForecaster, PredictionResponse, ShapEntry};
pub use utils::Parallelism;
