//! Raw record → ordered, scaled feature vector.

use serde::Serialize;
use serde_json::Value;

use super::{RawRecord, Scaler};

/// Errors raised while turning a record into model input.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PrepareError {
    #[error("schema mismatch: missing {missing:?}, unexpected {unexpected:?}")]
    SchemaMismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    #[error("invalid value for '{feature}': {reason}")]
    InvalidValue { feature: String, reason: String },

    /// The scaler carries no statistics for a feature the model expects.
    #[error("scaler has no statistics for feature '{feature}'")]
    UnscaledFeature { feature: String },
}

/// Scaled model input in training column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ScaledVector(Vec<f32>);

impl ScaledVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Order `record` by `feature_names` and apply the scaler's forward transform.
///
/// Every name must be present and the record may carry nothing else. Values
/// may be JSON numbers or numeric strings; anything else, or a non-finite
/// result, is rejected. No range checks are made here.
pub fn prepare(
    record: &RawRecord,
    scaler: &Scaler,
    feature_names: &[String],
) -> Result<ScaledVector, PrepareError> {
    schema_diff(record, feature_names)?;

    let mut scaled = Vec::with_capacity(feature_names.len());
    for name in feature_names {
        let raw = match record.get(name) {
            Some(value) => coerce_number(name, value)?,
            None => {
                return Err(PrepareError::SchemaMismatch {
                    missing: vec![name.clone()],
                    unexpected: Vec::new(),
                })
            }
        };
        let index = scaler
            .index_of(name)
            .ok_or_else(|| PrepareError::UnscaledFeature { feature: name.clone() })?;
        let value = scaler.transform_value(index, raw);
        if !value.is_finite() {
            return Err(PrepareError::InvalidValue {
                feature: name.clone(),
                reason: format!("scaled value {raw} is not finite as f32"),
            });
        }
        scaled.push(value);
    }

    Ok(ScaledVector(scaled))
}

/// Fail with both the missing and the unexpected names, if any.
pub(crate) fn schema_diff(record: &RawRecord, expected: &[String]) -> Result<(), PrepareError> {
    let missing: Vec<String> = expected
        .iter()
        .filter(|name| record.get(name).is_none())
        .cloned()
        .collect();
    let unexpected: Vec<String> = record
        .names()
        .filter(|name| !expected.iter().any(|e| e == name))
        .map(str::to_owned)
        .collect();

    if missing.is_empty() && unexpected.is_empty() {
        Ok(())
    } else {
        Err(PrepareError::SchemaMismatch { missing, unexpected })
    }
}

/// Numbers and numeric strings coerce to a finite `f64`.
pub(crate) fn coerce_number(feature: &str, value: &Value) -> Result<f64, PrepareError> {
    let invalid = |reason: String| PrepareError::InvalidValue {
        feature: feature.to_string(),
        reason,
    };

    let number = match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| invalid(format!("{n} is not representable as a float")))?,
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| invalid(format!("'{s}' is not a number")))?,
        Value::Null => return Err(invalid("value is null".into())),
        Value::Bool(_) => return Err(invalid("expected a number, got a boolean".into())),
        Value::Array(_) => return Err(invalid("expected a number, got an array".into())),
        Value::Object(_) => return Err(invalid("expected a number, got an object".into())),
    };

    if number.is_finite() {
        Ok(number)
    } else {
        Err(invalid(format!("{number} is not finite")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use approx::assert_abs_diff_eq;
    use rstest::rstest;
    use serde_json::json;

    fn record() -> RawRecord {
        RawRecord::new()
            .with("season", 1)
            .with("Sales", 100.0)
            .with("Order Item Discount", 10.0)
            .with("Days for shipping (real)", 3.0)
    }

    #[test]
    fn prepares_in_feature_order() {
        let scaler = testing::reference_scaler();
        let names = testing::feature_names();
        let scaled = prepare(&record(), &scaler, &names).unwrap();

        for (got, want) in scaled.as_slice().iter().zip(testing::reference_scaled_row()) {
            assert_abs_diff_eq!(*got, want, epsilon = 1e-6);
        }
    }

    #[test]
    fn order_follows_names_not_scaler() {
        let scaler = testing::reference_scaler();
        let mut names = testing::feature_names();
        names.reverse();
        let scaled = prepare(&record(), &scaler, &names).unwrap();

        // Sales is second in training order, third when reversed.
        assert_abs_diff_eq!(scaled.as_slice()[2], -1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(scaled.as_slice()[0], -1.0 / 3.0, epsilon = 1e-6);
    }

    #[test]
    fn missing_feature_is_schema_mismatch() {
        let mut rec = record();
        rec.remove("Sales");
        let err = prepare(&rec, &testing::reference_scaler(), &testing::feature_names()).unwrap_err();
        assert_eq!(
            err,
            PrepareError::SchemaMismatch {
                missing: vec!["Sales".into()],
                unexpected: vec![],
            }
        );
    }

    #[test]
    fn extra_feature_is_schema_mismatch() {
        let rec = record().with("Order Region", "Western Europe");
        let err = prepare(&rec, &testing::reference_scaler(), &testing::feature_names()).unwrap_err();
        assert_eq!(
            err,
            PrepareError::SchemaMismatch {
                missing: vec![],
                unexpected: vec!["Order Region".into()],
            }
        );
    }

    #[rstest]
    #[case::text(json!("abc"))]
    #[case::null(json!(null))]
    #[case::boolean(json!(true))]
    #[case::array(json!([1.0]))]
    #[case::object(json!({"v": 1.0}))]
    #[case::overflowing_string(json!("1e400"))]
    fn non_numeric_is_invalid_value(#[case] sales: Value) {
        let rec = record().with("Sales", sales);
        match prepare(&rec, &testing::reference_scaler(), &testing::feature_names()) {
            Err(PrepareError::InvalidValue { feature, .. }) => assert_eq!(feature, "Sales"),
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn numeric_string_coerces() {
        let rec = record().with("Sales", "100");
        let scaled = prepare(&rec, &testing::reference_scaler(), &testing::feature_names()).unwrap();
        assert_abs_diff_eq!(scaled.as_slice()[1], -1.0, epsilon = 1e-6);
    }

    #[test]
    fn out_of_range_season_is_not_checked_here() {
        let rec = record().with("season", 5);
        assert!(prepare(&rec, &testing::reference_scaler(), &testing::feature_names()).is_ok());
    }

    #[test]
    fn feature_without_scaler_statistics() {
        let scaler = testing::reference_scaler();
        let mut names = testing::feature_names();
        names[0] = "month".into();
        let mut rec = record().with("month", 4);
        rec.remove("season");
        assert_eq!(
            prepare(&rec, &scaler, &names),
            Err(PrepareError::UnscaledFeature { feature: "month".into() })
        );
    }
}
