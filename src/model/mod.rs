//! Transfer shapes
//!
//! Create / Update / Response types for every entity family, plus the
//! pagination and page types shared by all list operations.
//!
//! Update shapes distinguish an absent field from an explicit `null`:
//! non-null columns are `Option<T>` (absent = keep), nullable columns are
//! `Option<Option<T>>` (absent = keep, `null` = clear).

/// Move every field present in an update patch onto its target
macro_rules! apply_patch {
    ($patch:expr => $target:expr; $($field:ident),* $(,)?) => {
        $(
            if let Some(value) = $patch.$field.take() {
                $target.$field = value;
            }
        )*
    };
}

pub mod experiment;
pub mod metric;
pub mod segment;

pub use experiment::{Experiment, ExperimentCreate, ExperimentUpdate, MetricRef, Variant};
pub use metric::{
    DataPointCreate, Metric, MetricCreate, MetricDataPoint, MetricStats, MetricUpdate,
    TimeSeriesPoint,
};
pub use segment::{
    Campaign, CampaignCreate, CampaignSummary, Segment, SegmentCreate, SegmentStats,
    SegmentUpdate,
};

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Largest page a list operation will return
pub const MAX_PAGE_SIZE: i64 = 100;

/// Page size used when the caller does not give one
pub const DEFAULT_PAGE_SIZE: i64 = 100;

/// A payload or parameter was rejected before reaching the store
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Offset pagination, validated on construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    skip: i64,
    limit: i64,
}

impl Pagination {
    /// Build a pagination window; `skip` must be non-negative and `limit` in `1..=100`
    pub fn new(skip: i64, limit: i64) -> Result<Self, ValidationError> {
        if skip < 0 {
            return Err(ValidationError::new("skip must be greater than or equal to 0"));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            return Err(ValidationError::new(format!(
                "limit must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }
        Ok(Self { skip, limit })
    }

    pub fn skip(&self) -> i64 {
        self.skip
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

/// One page of a filtered listing
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    /// Number of rows matching the filters, ignoring pagination
    pub total: i64,
    pub items: Vec<T>,
}

/// Deserialize a nullable column in an update payload
///
/// Used with `#[serde(default)]`: a missing key stays `None`, while `null`
/// becomes `Some(None)`.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

pub(crate) fn require_non_empty(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(format!("{} must not be empty", field)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "nullable")]
        note: Option<Option<String>>,
    }

    #[test]
    fn test_nullable_distinguishes_absent_from_null() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.note, None);

        let null: Patch = serde_json::from_str(r#"{"note": null}"#).unwrap();
        assert_eq!(null.note, Some(None));

        let set: Patch = serde_json::from_str(r#"{"note": "hi"}"#).unwrap();
        assert_eq!(set.note, Some(Some("hi".to_string())));
    }

    #[test]
    fn test_pagination_bounds() {
        assert!(Pagination::new(0, 1).is_ok());
        assert!(Pagination::new(10, 100).is_ok());
        assert!(Pagination::new(-1, 10).is_err());
        assert!(Pagination::new(0, 0).is_err());
        assert!(Pagination::new(0, 101).is_err());

        let default = Pagination::default();
        assert_eq!(default.skip(), 0);
        assert_eq!(default.limit(), 100);
    }

    #[test]
    fn test_require_non_empty() {
        assert!(require_non_empty("name", "Revenue").is_ok());
        assert_eq!(
            require_non_empty("name", "  ").unwrap_err().to_string(),
            "name must not be empty"
        );
    }
}
