//! Standard scaling fitted at training time and replayed at inference.

use std::io::{Read, Write};

use ndarray::{ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Errors from fitting, loading or applying a [`Scaler`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScalerError {
    #[error("scaler has {names} feature names but {mean} means and {scale} scales")]
    LengthMismatch {
        names: usize,
        mean: usize,
        scale: usize,
    },

    #[error("scaler statistic for feature '{feature}' is invalid: {reason}")]
    InvalidStatistic { feature: String, reason: String },

    #[error("cannot fit a scaler on zero rows")]
    EmptyInput,

    #[error("row has {actual} values but the scaler expects {expected}")]
    RowWidth { expected: usize, actual: usize },
}

/// Per-feature `(x - mean) / scale` transform.
///
/// Serialized as `{"feature_names": [...], "mean": [...], "scale": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    feature_names: Vec<String>,
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl Scaler {
    /// Build a scaler from stored statistics. A zero scale becomes 1.
    pub fn new(
        feature_names: Vec<String>,
        mean: Vec<f64>,
        scale: Vec<f64>,
    ) -> Result<Self, ScalerError> {
        let scaler = Self {
            feature_names,
            mean,
            scale,
        };
        scaler.validate()?;
        Ok(scaler.normalized())
    }

    /// Fit population mean and standard deviation (ddof = 0) per column.
    ///
    /// `rows` is sample-major with one column per entry of `feature_names`.
    pub fn fit(feature_names: Vec<String>, rows: ArrayView2<'_, f64>) -> Result<Self, ScalerError> {
        if rows.ncols() != feature_names.len() {
            return Err(ScalerError::RowWidth {
                expected: feature_names.len(),
                actual: rows.ncols(),
            });
        }
        if rows.nrows() == 0 {
            return Err(ScalerError::EmptyInput);
        }

        let n = rows.nrows() as f64;
        let mut mean = Vec::with_capacity(rows.ncols());
        let mut scale = Vec::with_capacity(rows.ncols());
        for column in rows.axis_iter(Axis(1)) {
            let m = column.sum() / n;
            let var = column.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / n;
            mean.push(m);
            scale.push(var.sqrt());
        }

        Self::new(feature_names, mean, scale)
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, serde_json::Error> {
        let scaler: Scaler = serde_json::from_reader(reader)?;
        Ok(scaler.normalized())
    }

    pub fn to_writer(&self, writer: impl Write) -> Result<(), serde_json::Error> {
        serde_json::to_writer_pretty(writer, self)
    }

    /// Check that the three arrays line up and every statistic is finite.
    pub fn validate(&self) -> Result<(), ScalerError> {
        if self.mean.len() != self.feature_names.len() || self.scale.len() != self.feature_names.len()
        {
            return Err(ScalerError::LengthMismatch {
                names: self.feature_names.len(),
                mean: self.mean.len(),
                scale: self.scale.len(),
            });
        }
        for (i, name) in self.feature_names.iter().enumerate() {
            if !self.mean[i].is_finite() {
                return Err(ScalerError::InvalidStatistic {
                    feature: name.clone(),
                    reason: format!("mean is {}", self.mean[i]),
                });
            }
            if !self.scale[i].is_finite() || self.scale[i] < 0.0 {
                return Err(ScalerError::InvalidStatistic {
                    feature: name.clone(),
                    reason: format!("scale is {}", self.scale[i]),
                });
            }
        }
        Ok(())
    }

    fn normalized(mut self) -> Self {
        for s in &mut self.scale {
            if *s == 0.0 {
                *s = 1.0;
            }
        }
        self
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    /// Column index of a feature name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.feature_names.iter().position(|n| n == name)
    }

    /// Scale one value of the feature at `index`.
    #[inline]
    pub fn transform_value(&self, index: usize, value: f64) -> f32 {
        ((value - self.mean[index]) / self.scale[index]) as f32
    }

    /// Scale a full row given in the scaler's own feature order.
    pub fn transform_row(&self, row: &[f64]) -> Result<Vec<f32>, ScalerError> {
        self.check_width(row.len())?;
        Ok(row
            .iter()
            .enumerate()
            .map(|(i, &x)| self.transform_value(i, x))
            .collect())
    }

    /// Map a scaled row back to raw units.
    pub fn inverse_transform_row(&self, row: &[f32]) -> Result<Vec<f64>, ScalerError> {
        self.check_width(row.len())?;
        Ok(row
            .iter()
            .enumerate()
            .map(|(i, &z)| z as f64 * self.scale[i] + self.mean[i])
            .collect())
    }

    fn check_width(&self, actual: usize) -> Result<(), ScalerError> {
        if actual != self.n_features() {
            return Err(ScalerError::RowWidth {
                expected: self.n_features(),
                actual,
            });
        }
        Ok(())
    }
}
