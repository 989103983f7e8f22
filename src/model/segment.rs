//! Segment and campaign shapes

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{require_non_empty, ValidationError};

/// Status given to campaigns created without one
pub const DEFAULT_CAMPAIGN_STATUS: &str = "active";

/// A customer segment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub owner: Option<String>,
    pub category: Option<String>,
    pub tags: Option<String>,
    pub refresh_period: Option<String>,
    /// Stored as-is, never executed
    pub query_definition: Option<String>,
    pub customer_count: Option<i64>,
    pub metric1_value: Option<String>,
    pub metric1_label: Option<String>,
    pub metric2_value: Option<String>,
    pub metric2_label: Option<String>,
    pub metric3_value: Option<String>,
    pub metric3_label: Option<String>,
    pub metric4_value: Option<String>,
    pub metric4_label: Option<String>,
    pub last_touch_channel: Option<String>,
    pub last_touch_date: Option<NaiveDate>,
    /// Linked campaigns, in link order
    pub campaigns: Vec<CampaignSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create segment request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SegmentCreate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub refresh_period: Option<String>,
    #[serde(default)]
    pub query_definition: Option<String>,
    #[serde(default)]
    pub customer_count: Option<i64>,
    #[serde(default)]
    pub metric1_value: Option<String>,
    #[serde(default)]
    pub metric1_label: Option<String>,
    #[serde(default)]
    pub metric2_value: Option<String>,
    #[serde(default)]
    pub metric2_label: Option<String>,
    #[serde(default)]
    pub metric3_value: Option<String>,
    #[serde(default)]
    pub metric3_label: Option<String>,
    #[serde(default)]
    pub metric4_value: Option<String>,
    #[serde(default)]
    pub metric4_label: Option<String>,
    #[serde(default)]
    pub last_touch_channel: Option<String>,
    #[serde(default)]
    pub last_touch_date: Option<NaiveDate>,
    /// Campaigns to link on creation
    #[serde(default)]
    pub campaign_ids: Vec<i64>,
}

impl SegmentCreate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("name", &self.name)?;
        validate_customer_count(self.customer_count)
    }
}

/// Update segment request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SegmentUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "crate::model::nullable")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::model::nullable")]
    pub owner: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::model::nullable")]
    pub category: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::model::nullable")]
    pub tags: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::model::nullable")]
    pub refresh_period: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::model::nullable")]
    pub query_definition: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::model::nullable")]
    pub customer_count: Option<Option<i64>>,
    #[serde(default, deserialize_with = "crate::model::nullable")]
    pub metric1_value: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::model::nullable")]
    pub metric1_label: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::model::nullable")]
    pub metric2_value: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::model::nullable")]
    pub metric2_label: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::model::nullable")]
    pub metric3_value: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::model::nullable")]
    pub metric3_label: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::model::nullable")]
    pub metric4_value: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::model::nullable")]
    pub metric4_label: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::model::nullable")]
    pub last_touch_channel: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::model::nullable")]
    pub last_touch_date: Option<Option<NaiveDate>>,
    /// Replaces the whole set of linked campaigns when present
    #[serde(default)]
    pub campaign_ids: Option<Vec<i64>>,
}

impl SegmentUpdate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            require_non_empty("name", name)?;
        }
        if let Some(count) = self.customer_count {
            validate_customer_count(count)?;
        }
        Ok(())
    }

    /// Overwrite the column fields present in this patch
    ///
    /// `campaign_ids` is left for the caller, which owns the link table.
    pub fn apply(&mut self, segment: &mut Segment) {
        apply_patch!(
            self => segment;
            name,
            description,
            owner,
            category,
            tags,
            refresh_period,
            query_definition,
            customer_count,
            metric1_value,
            metric1_label,
            metric2_value,
            metric2_label,
            metric3_value,
            metric3_label,
            metric4_value,
            metric4_label,
            last_touch_channel,
            last_touch_date,
        );
    }
}

fn validate_customer_count(count: Option<i64>) -> Result<(), ValidationError> {
    match count {
        Some(n) if n < 0 => Err(ValidationError::new(
            "customer_count must be greater than or equal to 0",
        )),
        _ => Ok(()),
    }
}

/// A marketing campaign
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Campaign {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Campaign as embedded in a segment response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CampaignSummary {
    pub id: i64,
    pub name: String,
}

/// Create campaign request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CampaignCreate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Defaults to `active`
    #[serde(default)]
    pub status: Option<String>,
}

impl CampaignCreate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("name", &self.name)
    }
}

/// Segment totals
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SegmentStats {
    pub total_segments: i64,
    pub total_customers: i64,
    /// Customers in `retention` segments
    pub active_customers: i64,
    /// Customers in `reactivation` segments
    pub at_risk_customers: i64,
}
