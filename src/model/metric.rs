//! Metric shapes

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use super::{require_non_empty, ValidationError};

/// Status given to metrics created without one
pub const DEFAULT_STATUS: &str = "inactive";

/// Version given to metrics created without one
pub const DEFAULT_VERSION: &str = "v1.0.0";

/// A tracked performance metric
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metric {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    /// Current value, only ever set by an update
    pub value: Option<f64>,
    /// Unit of measurement, only ever set by an update
    pub unit: Option<String>,
    pub category: Option<String>,
    /// Free-form status; `active`, `inactive` and `warning` are counted by the stats endpoint
    pub status: String,
    pub version: String,
    pub owner: Option<String>,
    pub priority: Option<String>,
    pub calculation_logic: Option<String>,
    pub alert_settings: Option<String>,
    pub data_source: Option<String>,
    pub aggregation_period: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create metric request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricCreate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Defaults to `inactive`
    #[serde(default)]
    pub status: Option<String>,
    /// Defaults to `v1.0.0`
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub calculation_logic: Option<String>,
    #[serde(default)]
    pub alert_settings: Option<String>,
    #[serde(default)]
    pub data_source: Option<String>,
    #[serde(default)]
    pub aggregation_period: Option<String>,
}

impl MetricCreate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("name", &self.name)
    }
}

/// Update metric request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "crate::model::nullable")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::model::nullable")]
    pub value: Option<Option<f64>>,
    #[serde(default, deserialize_with = "crate::model::nullable")]
    pub unit: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::model::nullable")]
    pub category: Option<Option<String>>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default, deserialize_with = "crate::model::nullable")]
    pub owner: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::model::nullable")]
    pub priority: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::model::nullable")]
    pub calculation_logic: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::model::nullable")]
    pub alert_settings: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::model::nullable")]
    pub data_source: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::model::nullable")]
    pub aggregation_period: Option<Option<String>>,
}

impl MetricUpdate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            require_non_empty("name", name)?;
        }
        Ok(())
    }

    /// Overwrite the fields present in this patch
    pub fn apply(&mut self, metric: &mut Metric) {
        apply_patch!(
            self => metric;
            name,
            description,
            value,
            unit,
            category,
            status,
            version,
            owner,
            priority,
            calculation_logic,
            alert_settings,
            data_source,
            aggregation_period,
        );
    }
}

/// One historical observation of a metric
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricDataPoint {
    pub id: i64,
    pub metric_id: i64,
    pub value: f64,
    /// When the value was observed
    pub timestamp: DateTime<Utc>,
    /// When the row was inserted
    pub created_at: DateTime<Utc>,
}

/// Record data point request
#[derive(Debug, Clone, Deserialize)]
pub struct DataPointCreate {
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

impl DataPointCreate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.value.is_finite() {
            return Err(ValidationError::new("value must be a finite number"));
        }
        // Stored text only sorts chronologically with four-digit years
        if !(0..=9999).contains(&self.timestamp.year()) {
            return Err(ValidationError::new(
                "timestamp year must be between 0000 and 9999",
            ));
        }
        Ok(())
    }
}

/// A point of a metric time series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Metric counts by status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricStats {
    pub total: i64,
    pub active: i64,
    pub inactive: i64,
    pub warning: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Metric {
        let now = Utc::now();
        Metric {
            id: 1,
            name: "Conversion Rate".to_string(),
            description: Some("Orders / sessions".to_string()),
            value: Some(3.2),
            unit: Some("%".to_string()),
            category: Some("sales".to_string()),
            status: "active".to_string(),
            version: DEFAULT_VERSION.to_string(),
            owner: None,
            priority: None,
            calculation_logic: None,
            alert_settings: None,
            data_source: None,
            aggregation_period: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_create_ignores_value_and_unit() {
        let create: MetricCreate =
            serde_json::from_str(r#"{"name": "Revenue", "value": 10.0, "unit": "USD"}"#).unwrap();
        assert_eq!(create.name, "Revenue");
        assert!(create.status.is_none());
    }

    #[test]
    fn test_create_requires_name() {
        assert!(serde_json::from_str::<MetricCreate>(r#"{"category": "sales"}"#).is_err());

        let blank = MetricCreate {
            name: " ".to_string(),
            ..Default::default()
        };
        assert!(blank.validate().is_err());
    }

    #[test]
    fn test_update_applies_only_present_fields() {
        let mut metric = sample();
        let mut patch: MetricUpdate =
            serde_json::from_str(r#"{"status": "warning", "description": null}"#).unwrap();

        patch.apply(&mut metric);

        assert_eq!(metric.status, "warning");
        assert_eq!(metric.description, None);
        assert_eq!(metric.value, Some(3.2));
        assert_eq!(metric.unit.as_deref(), Some("%"));
        assert_eq!(metric.name, "Conversion Rate");
    }

    #[test]
    fn test_datapoint_rejects_five_digit_years() {
        let far: DataPointCreate =
            serde_json::from_str(r#"{"value": 1.0, "timestamp": "+10000-01-01T00:00:00Z"}"#)
                .unwrap();
        assert!(far.validate().is_err());

        let edge: DataPointCreate =
            serde_json::from_str(r#"{"value": 1.0, "timestamp": "9999-12-31T23:59:59Z"}"#)
                .unwrap();
        assert!(edge.validate().is_ok());

        let nan = DataPointCreate {
            value: f64::NAN,
            ..edge
        };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_update_rejects_blank_name() {
        let patch: MetricUpdate = serde_json::from_str(r#"{"name": ""}"#).unwrap();
        assert!(patch.validate().is_err());
    }
}
