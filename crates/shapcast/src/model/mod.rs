//! Trained artifact: forest, scaler and feature names loaded together.

mod artifact;

pub use artifact::{ArtifactError, ArtifactSummary, TrainedModel};
