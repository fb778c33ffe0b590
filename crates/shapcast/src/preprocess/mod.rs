//! Request preparation: schema checks, ordering and standard scaling.
//!
//! ```text
//! DemandRequest ─validate/into_record─▶ RawRecord ─prepare(scaler, names)─▶ ScaledVector
//! ```

mod prepare;
mod record;
mod scaler;
mod season;

pub use prepare::{prepare, PrepareError, ScaledVector};
pub use record::{DemandRequest, RawRecord, DEMAND_WIRE_FIELDS, RECOMMENDED_MAX_SHIPPING_DAYS};
pub use scaler::{Scaler, ScalerError};
pub use season::Season;

/// Training column names, in the order the model expects them.
pub const DEMAND_FEATURES: [&str; 4] = [
    "season",
    "Sales",
    "Order Item Discount",
    "Days for shipping (real)",
];

/// [`DEMAND_FEATURES`] as owned strings.
pub fn demand_feature_names() -> Vec<String> {
    DEMAND_FEATURES.iter().map(|s| s.to_string()).collect()
}
