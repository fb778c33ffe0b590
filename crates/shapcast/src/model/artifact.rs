//! Loading and validating the trained artifact.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::compat::xgboost::{ConversionError, XgbModel};
use crate::explainability::ExplainError;
use crate::preprocess::{Scaler, ScalerError};
use crate::repr::{Forest, ForestValidationError};

/// Errors raised while loading the model artifact.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("failed to read model '{path}': {source}")]
    ReadModel {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open scaler '{path}': {source}")]
    ReadScaler {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse scaler '{path}': {source}")]
    ParseScaler {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error("invalid scaler: {0}")]
    Scaler(#[from] ScalerError),

    #[error("invalid forest: {0}")]
    Forest(#[from] ForestValidationError),

    /// The booster cannot be explained (e.g. gblinear).
    #[error(transparent)]
    Attribution(#[from] ExplainError),

    /// Model, scaler and feature names disagree.
    #[error("artifact mismatch: {reason}")]
    ArtifactMismatch { reason: String },
}

/// Short description of a loaded artifact, logged at start-up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactSummary {
    pub booster: &'static str,
    pub n_trees: usize,
    pub n_features: usize,
    pub max_depth: usize,
    pub base_score: f32,
}

/// Tree ensemble, scaler and training column order of one trained model.
///
/// Immutable once built; share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct TrainedModel {
    forest: Forest,
    scaler: Scaler,
    feature_names: Vec<String>,
    booster: &'static str,
}

impl TrainedModel {
    /// Assemble a model from in-memory parts, checking that they agree.
    pub fn from_parts(
        forest: Forest,
        scaler: Scaler,
        feature_names: Vec<String>,
    ) -> Result<Self, ArtifactError> {
        forest.validate()?;
        scaler.validate()?;

        if forest.n_features() != feature_names.len() {
            return Err(ArtifactError::ArtifactMismatch {
                reason: format!(
                    "model has {} features but {} feature names were given",
                    forest.n_features(),
                    feature_names.len()
                ),
            });
        }
        if scaler.feature_names() != feature_names.as_slice() {
            return Err(ArtifactError::ArtifactMismatch {
                reason: format!(
                    "scaler features {:?} do not match model features {:?}",
                    scaler.feature_names(),
                    feature_names
                ),
            });
        }

        Ok(Self {
            forest,
            scaler,
            feature_names,
            booster: "gbtree",
        })
    }

    /// Load an XGBoost JSON model and its scaler.
    ///
    /// The scaler's feature names define the column order. If the model file
    /// embeds feature names they must match. Non-tree boosters are rejected
    /// with [`ExplainError::AttributionUnavailable`].
    pub fn load(
        model_path: impl AsRef<Path>,
        scaler_path: impl AsRef<Path>,
    ) -> Result<Self, ArtifactError> {
        let model_path = model_path.as_ref();
        let scaler_path = scaler_path.as_ref();

        let xgb = XgbModel::from_file(model_path).map_err(|source| ArtifactError::ReadModel {
            path: model_path.to_path_buf(),
            source,
        })?;
        let booster = xgb.to_booster()?;
        let kind = booster.kind();
        let forest = booster
            .into_forest()
            .ok_or_else(|| ExplainError::AttributionUnavailable {
                reason: format!("{kind} booster is not a tree ensemble"),
            })?;

        let scaler = Self::read_scaler(scaler_path)?;
        let feature_names = scaler.feature_names().to_vec();
        let embedded = xgb.feature_names();
        if !embedded.is_empty() && embedded != feature_names.as_slice() {
            return Err(ArtifactError::ArtifactMismatch {
                reason: format!(
                    "model file feature names {embedded:?} do not match scaler features {feature_names:?}"
                ),
            });
        }

        let mut model = Self::from_parts(forest, scaler, feature_names)?;
        model.booster = kind;

        let summary = model.summary();
        tracing::info!(
            model = %model_path.display(),
            scaler = %scaler_path.display(),
            booster = summary.booster,
            n_trees = summary.n_trees,
            n_features = summary.n_features,
            max_depth = summary.max_depth,
            base_score = summary.base_score,
            "loaded model artifact"
        );
        Ok(model)
    }

    fn read_scaler(path: &Path) -> Result<Scaler, ArtifactError> {
        let file = File::open(path).map_err(|source| ArtifactError::ReadScaler {
            path: path.to_path_buf(),
            source,
        })?;
        let scaler =
            Scaler::from_reader(BufReader::new(file)).map_err(|source| ArtifactError::ParseScaler {
                path: path.to_path_buf(),
                source,
            })?;
        scaler.validate()?;
        Ok(scaler)
    }

    #[inline]
    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    #[inline]
    pub fn scaler(&self) -> &Scaler {
        &self.scaler
    }

    #[inline]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// XGBoost booster family the forest came from.
    #[inline]
    pub fn booster(&self) -> &'static str {
        self.booster
    }

    pub fn summary(&self) -> ArtifactSummary {
        ArtifactSummary {
            booster: self.booster,
            n_trees: self.forest.n_trees(),
            n_features: self.forest.n_features(),
            max_depth: self.forest.max_depth(),
            base_score: self.forest.base_score(),
        }
    }
}
