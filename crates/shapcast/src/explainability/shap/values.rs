//! SHAP values container.
//!
//! Stores SHAP values for a batch of samples with proper indexing
//! and verification utilities.

/// Container for SHAP values of a single-output model.
///
/// Layout is `[samples × (features + 1)]` where +1 is for the base value.
#[derive(Clone, Debug, PartialEq)]
pub struct ShapValues {
    /// Flat storage: [sample][feature + base]
    values: Vec<f64>,
    n_samples: usize,
    n_features: usize,
}

impl ShapValues {
    /// Create a new ShapValues container initialized to zeros.
    pub fn zeros(n_samples: usize, n_features: usize) -> Self {
        Self {
            values: vec![0.0; n_samples * (n_features + 1)],
            n_samples,
            n_features,
        }
    }

    #[inline]
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Number of features (not including base value).
    #[inline]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Width of one sample's row.
    #[inline]
    pub fn row_len(&self) -> usize {
        self.n_features + 1
    }

    #[inline]
    fn index(&self, sample: usize, feature: usize) -> usize {
        sample * self.row_len() + feature
    }

    #[inline]
    pub fn get(&self, sample: usize, feature: usize) -> f64 {
        self.values[self.index(sample, feature)]
    }

    /// Base value is stored at feature index = n_features.
    #[inline]
    pub fn base_value(&self, sample: usize) -> f64 {
        self.get(sample, self.n_features)
    }

    /// Feature SHAP values followed by the base value for one sample.
    pub fn sample(&self, sample: usize) -> &[f64] {
        let start = sample * self.row_len();
        &self.values[start..start + self.row_len()]
    }

    /// Feature SHAP values only (excluding base) for a sample.
    pub fn feature_shap(&self, sample: usize) -> &[f64] {
        &self.sample(sample)[..self.n_features]
    }

    /// Flat mutable storage, one `row_len()` chunk per sample.
    pub(crate) fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.values
    }

    /// Verify that SHAP values satisfy the sum property.
    ///
    /// For each sample: `sum(shap_values) + base_value ≈ prediction`.
    pub fn verify(&self, predictions: &[f64], tolerance: f64) -> bool {
        if predictions.len() != self.n_samples {
            return false;
        }
        predictions.iter().enumerate().all(|(sample, &pred)| {
            let sum: f64 = self.sample(sample).iter().sum();
            (sum - pred).abs() <= tolerance
        })
    }
}
