//! Inbound records: the untyped name → value map and the typed request.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::prepare::{coerce_number, schema_diff, PrepareError};
use super::{Season, DEMAND_FEATURES};

/// Wire field names of a demand request, paired with the training column
/// each one feeds.
pub const DEMAND_WIRE_FIELDS: [(&str, &str); 4] = [
    ("season", DEMAND_FEATURES[0]),
    ("Sales", DEMAND_FEATURES[1]),
    ("Order_Item_Discount", DEMAND_FEATURES[2]),
    ("Days_for_shipping_real", DEMAND_FEATURES[3]),
];

/// Shipping days above this are accepted but unusual.
pub const RECOMMENDED_MAX_SHIPPING_DAYS: f64 = 10.0;

/// Named feature values of one observation, before ordering and scaling.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(Map<String, Value>);

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Typed demand request as received on the wire.
///
/// ```text
/// {"season": 1, "Sales": 100.0, "Order_Item_Discount": 10.0, "Days_for_shipping_real": 3.0}
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DemandRequest {
    pub season: i64,
    #[serde(rename = "Sales")]
    pub sales: f64,
    #[serde(rename = "Order_Item_Discount")]
    pub order_item_discount: f64,
    #[serde(rename = "Days_for_shipping_real")]
    pub days_for_shipping: f64,
}

impl DemandRequest {
    /// Parse a request from wire-named values, with the same schema and
    /// coercion rules as [`prepare`](super::prepare).
    pub fn from_wire(record: &RawRecord) -> Result<Self, PrepareError> {
        let wire: Vec<String> = DEMAND_WIRE_FIELDS.iter().map(|(w, _)| w.to_string()).collect();
        schema_diff(record, &wire)?;

        let value = |name: &str| -> Result<f64, PrepareError> {
            match record.get(name) {
                Some(v) => coerce_number(name, v),
                None => Err(PrepareError::SchemaMismatch {
                    missing: vec![name.to_string()],
                    unexpected: Vec::new(),
                }),
            }
        };

        let season = value("season")?;
        if season.fract() != 0.0 {
            return Err(PrepareError::InvalidValue {
                feature: "season".into(),
                reason: format!("expected an integer season code, got {season}"),
            });
        }

        Ok(Self {
            season: season as i64,
            sales: value("Sales")?,
            order_item_discount: value("Order_Item_Discount")?,
            days_for_shipping: value("Days_for_shipping_real")?,
        })
    }

    /// Request-level checks the preparer does not make: a known season code
    /// and finite, non-negative amounts.
    pub fn validate(&self) -> Result<(), PrepareError> {
        if Season::from_index(self.season).is_none() {
            return Err(PrepareError::InvalidValue {
                feature: "season".into(),
                reason: format!("season must be one of 0, 1, 2, 3, got {}", self.season),
            });
        }

        for (name, value) in [
            ("Sales", self.sales),
            ("Order_Item_Discount", self.order_item_discount),
            ("Days_for_shipping_real", self.days_for_shipping),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(PrepareError::InvalidValue {
                    feature: name.into(),
                    reason: format!("expected a finite non-negative number, got {value}"),
                });
            }
        }

        if self.days_for_shipping > RECOMMENDED_MAX_SHIPPING_DAYS {
            tracing::debug!(
                days = self.days_for_shipping,
                "shipping days above recommended maximum of {RECOMMENDED_MAX_SHIPPING_DAYS}"
            );
        }
        Ok(())
    }

    pub fn season(&self) -> Option<Season> {
        Season::from_index(self.season)
    }

    /// Record keyed by training column names.
    pub fn into_record(self) -> RawRecord {
        RawRecord::from_iter([
            (DEMAND_FEATURES[0], Value::from(self.season)),
            (DEMAND_FEATURES[1], Value::from(self.sales)),
            (DEMAND_FEATURES[2], Value::from(self.order_item_discount)),
            (DEMAND_FEATURES[3], Value::from(self.days_for_shipping)),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn request() -> DemandRequest {
        DemandRequest {
            season: 1,
            sales: 100.0,
            order_item_discount: 10.0,
            days_for_shipping: 3.0,
        }
    }

    #[test]
    fn deserializes_wire_names() {
        let req: DemandRequest = serde_json::from_value(json!({
            "season": 1, "Sales": 100.0, "Order_Item_Discount": 10.0, "Days_for_shipping_real": 3.0
        }))
        .unwrap();
        assert_eq!(req, request());
    }

    #[test]
    fn into_record_uses_training_names() {
        let record = request().into_record();
        let mut names: Vec<_> = record.names().collect();
        names.sort_unstable();
        let mut expected = DEMAND_FEATURES.to_vec();
        expected.sort_unstable();
        assert_eq!(names, expected);
        assert_eq!(record.get("Sales"), Some(&json!(100.0)));
    }

    #[rstest]
    #[case::season_too_high(DemandRequest { season: 5, ..request() }, "season")]
    #[case::season_negative(DemandRequest { season: -1, ..request() }, "season")]
    #[case::negative_sales(DemandRequest { sales: -1.0, ..request() }, "Sales")]
    #[case::nan_discount(DemandRequest { order_item_discount: f64::NAN, ..request() }, "Order_Item_Discount")]
    #[case::infinite_days(DemandRequest { days_for_shipping: f64::INFINITY, ..request() }, "Days_for_shipping_real")]
    fn validate_rejects(#[case] req: DemandRequest, #[case] field: &str) {
        match req.validate() {
            Err(PrepareError::InvalidValue { feature, .. }) => assert_eq!(feature, field),
            other => panic!("expected InvalidValue for {field}, got {other:?}"),
        }
    }

    #[test]
    fn long_shipping_is_accepted() {
        let req = DemandRequest {
            days_for_shipping: 25.0,
            ..request()
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn from_wire_coerces_numeric_strings() {
        let record = RawRecord::new()
            .with("season", "2")
            .with("Sales", 150)
            .with("Order_Item_Discount", " 7.5 ")
            .with("Days_for_shipping_real", 4.0);
        let req = DemandRequest::from_wire(&record).unwrap();
        assert_eq!(req.season, 2);
        assert_eq!(req.sales, 150.0);
        assert_eq!(req.order_item_discount, 7.5);
    }

    #[test]
    fn from_wire_reports_schema_problems() {
        let record = RawRecord::new()
            .with("season", 1)
            .with("Order_Item_Discount", 10.0)
            .with("Days_for_shipping_real", 3.0)
            .with("Region", "EU");
        assert_eq!(
            DemandRequest::from_wire(&record),
            Err(PrepareError::SchemaMismatch {
                missing: vec!["Sales".into()],
                unexpected: vec!["Region".into()],
            })
        );
    }

    #[test]
    fn from_wire_rejects_fractional_season() {
        let record = RawRecord::new()
            .with("season", 1.5)
            .with("Sales", 100.0)
            .with("Order_Item_Discount", 10.0)
            .with("Days_for_shipping_real", 3.0);
        assert!(matches!(
            DemandRequest::from_wire(&record),
            Err(PrepareError::InvalidValue { .. })
        ));
    }
}
