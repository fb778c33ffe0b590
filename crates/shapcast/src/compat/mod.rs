//! Loaders for models trained by other gradient boosting libraries.
//!
//! Only XGBoost's JSON format is supported; it is the format the demand
//! model is exported in.

pub mod xgboost;
