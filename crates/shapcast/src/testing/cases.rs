//! JSON fixture formats under `tests/test-cases`.

use serde::Deserialize;

/// Raw input rows for a test case.
///
/// ```json
/// {"feature_names": ["season", "Sales", ...], "features": [[1, 100.0, 10.0, 3.0]]}
/// ```
///
/// Use `null` to represent a missing value.
#[derive(Debug, Deserialize)]
pub struct TestInput {
    pub feature_names: Vec<String>,
    pub features: Vec<Vec<Option<f64>>>,
}

impl TestInput {
    /// Rows as `f64`, mapping `None` to NaN.
    pub fn to_f64_rows(&self) -> Vec<Vec<f64>> {
        self.features
            .iter()
            .map(|row| row.iter().map(|x| x.unwrap_or(f64::NAN)).collect())
            .collect()
    }

    /// Row-major flat `f32` values, mapping `None` to NaN.
    pub fn to_flat_f32(&self) -> Vec<f32> {
        self.features
            .iter()
            .flat_map(|row| row.iter().map(|x| x.map_or(f32::NAN, |v| v as f32)))
            .collect()
    }
}

/// Recorded explanation of one input row.
#[derive(Debug, Deserialize)]
pub struct ExpectedExplanation {
    pub forecast: f64,
    pub base_value: f64,
    /// Contributions in training feature order.
    pub contributions: Vec<f64>,
    #[serde(default)]
    pub warning: Option<String>,
}
