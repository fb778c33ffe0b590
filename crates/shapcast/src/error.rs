//! Crate-level error type.

use crate::config::ConfigError;
use crate::explainability::ExplainError;
use crate::model::ArtifactError;
use crate::preprocess::PrepareError;

/// Any error produced by the forecasting pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Prepare(#[from] PrepareError),

    #[error(transparent)]
    Explain(#[from] ExplainError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// True for errors caused by the request itself (bad schema or value),
    /// false for configuration and artifact problems.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::Prepare(PrepareError::SchemaMismatch { .. } | PrepareError::InvalidValue { .. })
        )
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
