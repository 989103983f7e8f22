//! Experiment shapes
//!
//! Metric references and variants are typed lists here and only become JSON text
//! at the storage boundary. Metric ids are not checked against the metrics table.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::{require_non_empty, ValidationError};

pub const DEFAULT_EXPERIMENT_TYPE: &str = "A/B Test";
pub const DEFAULT_STATUS: &str = "draft";
pub const DEFAULT_EXPERIMENT_UNIT: &str = "User";
pub const DEFAULT_SIGNIFICANCE_LEVEL: f64 = 0.05;
pub const DEFAULT_STATISTICAL_POWER: f64 = 0.8;

/// An A/B test definition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Experiment {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub owner: String,
    pub team: Option<String>,
    pub experiment_type: String,
    pub status: String,
    pub objective: Option<String>,
    pub background: Option<String>,
    pub hypothesis: String,
    pub expected_impact: Option<String>,
    pub ice_impact: Option<i64>,
    pub ice_confidence: Option<i64>,
    pub ice_ease: Option<i64>,
    pub primary_metric_ids: Vec<i64>,
    pub secondary_metric_ids: Vec<i64>,
    pub guardrail_metric_ids: Vec<i64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub target_segment_id: i64,
    pub variants: Vec<Variant>,
    pub experiment_unit: String,
    pub significance_level: f64,
    pub statistical_power: f64,
    pub minimum_detectable_effect: Option<f64>,
    /// Free text, never computed
    pub sample_size: Option<String>,
    pub conditions: Option<String>,
    pub confounding_factors: Option<String>,
    pub progress: f64,
    pub days_left: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One arm of an experiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Share of traffic in percent; allocations are not required to sum to 100
    pub traffic_allocation: f64,
}

impl Variant {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("variant name", &self.name)?;
        if !self.traffic_allocation.is_finite() || self.traffic_allocation < 0.0 {
            return Err(ValidationError::new(format!(
                "variant '{}' traffic_allocation must be a non-negative number",
                self.name
            )));
        }
        Ok(())
    }
}

fn validate_variants(variants: &[Variant]) -> Result<(), ValidationError> {
    variants.iter().try_for_each(Variant::validate)
}

/// A metric id as found in a stored or submitted list
///
/// Decodes from either a JSON integer or a numeric string (`1` or `"1"`),
/// and always encodes as an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MetricRef(pub i64);

impl From<MetricRef> for i64 {
    fn from(id: MetricRef) -> Self {
        id.0
    }
}

impl<'de> Deserialize<'de> for MetricRef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Int(id) => Ok(MetricRef(id)),
            Raw::Text(text) => text
                .trim()
                .parse()
                .map(MetricRef)
                .map_err(|_| serde::de::Error::custom(format!("invalid metric id: {:?}", text))),
        }
    }
}

fn metric_ids<'de, D>(deserializer: D) -> Result<Vec<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let ids = Vec::<MetricRef>::deserialize(deserializer)?;
    Ok(ids.into_iter().map(i64::from).collect())
}

fn optional_metric_ids<'de, D>(deserializer: D) -> Result<Option<Vec<i64>>, D::Error>
where
    D: Deserializer<'de>,
{
    let ids = Option::<Vec<MetricRef>>::deserialize(deserializer)?;
    Ok(ids.map(|ids| ids.into_iter().map(i64::from).collect()))
}

/// Create experiment request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExperimentCreate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub owner: String,
    #[serde(default)]
    pub team: Option<String>,
    /// Defaults to `A/B Test`
    #[serde(default)]
    pub experiment_type: Option<String>,
    /// Defaults to `draft`
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub objective: Option<String>,
    #[serde(default)]
    pub background: Option<String>,
    pub hypothesis: String,
    #[serde(default)]
    pub expected_impact: Option<String>,
    #[serde(default)]
    pub ice_impact: Option<i64>,
    #[serde(default)]
    pub ice_confidence: Option<i64>,
    #[serde(default)]
    pub ice_ease: Option<i64>,
    #[serde(default, deserialize_with = "metric_ids")]
    pub primary_metric_ids: Vec<i64>,
    #[serde(default, deserialize_with = "metric_ids")]
    pub secondary_metric_ids: Vec<i64>,
    #[serde(default, deserialize_with = "metric_ids")]
    pub guardrail_metric_ids: Vec<i64>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    pub target_segment_id: i64,
    pub variants: Vec<Variant>,
    /// Defaults to `User`
    #[serde(default)]
    pub experiment_unit: Option<String>,
    /// Defaults to 0.05
    #[serde(default)]
    pub significance_level: Option<f64>,
    /// Defaults to 0.8
    #[serde(default)]
    pub statistical_power: Option<f64>,
    #[serde(default)]
    pub minimum_detectable_effect: Option<f64>,
    #[serde(default)]
    pub sample_size: Option<String>,
    #[serde(default)]
    pub conditions: Option<String>,
    #[serde(default)]
    pub confounding_factors: Option<String>,
}

impl ExperimentCreate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("name", &self.name)?;
        require_non_empty("owner", &self.owner)?;
        require_non_empty("hypothesis", &self.hypothesis)?;
        validate_variants(&self.variants)
    }
}

/// Update experiment request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExperimentUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "crate::model::nullable")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default, deserialize_with = "crate::model::nullable")]
    pub team: Option<Option<String>>,
    #[serde(default)]
    pub experiment_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "crate::model::nullable")]
    pub objective: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::model::nullable")]
    pub background: Option<Option<String>>,
    #[serde(default)]
    pub hypothesis: Option<String>,
    #[serde(default, deserialize_with = "crate::model::nullable")]
    pub expected_impact: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::model::nullable")]
    pub ice_impact: Option<Option<i64>>,
    #[serde(default, deserialize_with = "crate::model::nullable")]
    pub ice_confidence: Option<Option<i64>>,
    #[serde(default, deserialize_with = "crate::model::nullable")]
    pub ice_ease: Option<Option<i64>>,
    #[serde(default, deserialize_with = "optional_metric_ids")]
    pub primary_metric_ids: Option<Vec<i64>>,
    #[serde(default, deserialize_with = "optional_metric_ids")]
    pub secondary_metric_ids: Option<Vec<i64>>,
    #[serde(default, deserialize_with = "optional_metric_ids")]
    pub guardrail_metric_ids: Option<Vec<i64>>,
    #[serde(default, deserialize_with = "crate::model::nullable")]
    pub start_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "crate::model::nullable")]
    pub end_date: Option<Option<NaiveDate>>,
    #[serde(default)]
    pub target_segment_id: Option<i64>,
    #[serde(default)]
    pub variants: Option<Vec<Variant>>,
    #[serde(default)]
    pub experiment_unit: Option<String>,
    #[serde(default)]
    pub significance_level: Option<f64>,
    #[serde(default)]
    pub statistical_power: Option<f64>,
    #[serde(default, deserialize_with = "crate::model::nullable")]
    pub minimum_detectable_effect: Option<Option<f64>>,
    #[serde(default, deserialize_with = "crate::model::nullable")]
    pub sample_size: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::model::nullable")]
    pub conditions: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::model::nullable")]
    pub confounding_factors: Option<Option<String>>,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default, deserialize_with = "crate::model::nullable")]
    pub days_left: Option<Option<i64>>,
}

impl ExperimentUpdate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            require_non_empty("name", name)?;
        }
        if let Some(owner) = &self.owner {
            require_non_empty("owner", owner)?;
        }
        if let Some(hypothesis) = &self.hypothesis {
            require_non_empty("hypothesis", hypothesis)?;
        }
        if let Some(variants) = &self.variants {
            validate_variants(variants)?;
        }
        Ok(())
    }

    /// Overwrite the fields present in this patch
    pub fn apply(&mut self, experiment: &mut Experiment) {
        apply_patch!(
            self => experiment;
            name,
            description,
            owner,
            team,
            experiment_type,
            status,
            objective,
            background,
            hypothesis,
            expected_impact,
            ice_impact,
            ice_confidence,
            ice_ease,
            primary_metric_ids,
            secondary_metric_ids,
            guardrail_metric_ids,
            start_date,
            end_date,
            target_segment_id,
            variants,
            experiment_unit,
            significance_level,
            statistical_power,
            minimum_detectable_effect,
            sample_size,
            conditions,
            confounding_factors,
            progress,
            days_left,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_ref_accepts_numbers_and_numeric_strings() {
        let ids: Vec<MetricRef> = serde_json::from_str(r#"[1, "2", " 3 "]"#).unwrap();
        assert_eq!(ids, vec![MetricRef(1), MetricRef(2), MetricRef(3)]);

        assert!(serde_json::from_str::<Vec<MetricRef>>(r#"["abc"]"#).is_err());
        assert_eq!(serde_json::to_string(&ids).unwrap(), "[1,2,3]");
    }

    #[test]
    fn test_create_decodes_legacy_metric_ids() {
        let create: ExperimentCreate = serde_json::from_str(
            r#"{
                "name": "Checkout button color",
                "owner": "growth",
                "hypothesis": "Green converts better",
                "target_segment_id": 1,
                "primary_metric_ids": ["4"],
                "secondary_metric_ids": [5, "6"],
                "variants": [
                    {"name": "Control", "traffic_allocation": 50},
                    {"name": "Green", "description": "green button", "traffic_allocation": 50}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(create.primary_metric_ids, vec![4]);
        assert_eq!(create.secondary_metric_ids, vec![5, 6]);
        assert!(create.guardrail_metric_ids.is_empty());
        assert_eq!(create.variants[0].description, "");
        assert!(create.validate().is_ok());
    }

    #[test]
    fn test_create_requires_target_segment() {
        let result = serde_json::from_str::<ExperimentCreate>(
            r#"{"name": "x", "owner": "y", "hypothesis": "z", "variants": []}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_variant_validation() {
        let negative = Variant {
            name: "B".to_string(),
            description: String::new(),
            traffic_allocation: -5.0,
        };
        assert!(negative.validate().is_err());

        let unnamed = Variant {
            name: String::new(),
            description: String::new(),
            traffic_allocation: 50.0,
        };
        assert!(unnamed.validate().is_err());

        // Allocations need not sum to 100
        let create = ExperimentCreate {
            name: "x".to_string(),
            owner: "y".to_string(),
            hypothesis: "z".to_string(),
            variants: vec![Variant {
                name: "A".to_string(),
                description: String::new(),
                traffic_allocation: 30.0,
            }],
            ..Default::default()
        };
        assert!(create.validate().is_ok());
    }

    #[test]
    fn test_update_distinguishes_null_from_absent() {
        let patch: ExperimentUpdate =
            serde_json::from_str(r#"{"end_date": null, "progress": 42.5}"#).unwrap();

        assert_eq!(patch.end_date, Some(None));
        assert_eq!(patch.start_date, None);
        assert_eq!(patch.progress, Some(42.5));
        assert!(patch.primary_metric_ids.is_none());
    }

    #[test]
    fn test_update_rejects_blank_hypothesis() {
        let patch: ExperimentUpdate = serde_json::from_str(r#"{"hypothesis": ""}"#).unwrap();
        assert!(patch.validate().is_err());
    }
}
