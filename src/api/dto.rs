//! Data Transfer Objects
//!
//! Query parameters and the small response bodies owned by the HTTP layer.
//! Entity request/response bodies live in [`crate::model`].

use serde::{Deserialize, Serialize};

use crate::model::{Pagination, ValidationError, DEFAULT_PAGE_SIZE};
use crate::service::stats::{DEFAULT_TIMESERIES_LIMIT, MAX_TIMESERIES_LIMIT};
use crate::service::{CampaignFilter, ExperimentFilter, MetricFilter, SegmentFilter};

/// Query string of every list endpoint
///
/// Filters an entity does not support are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub skip: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
    /// Substring of name or description
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl ListParams {
    /// Validated pagination window (skip 0, limit 100 by default)
    pub fn pagination(&self) -> Result<Pagination, ValidationError> {
        Pagination::new(
            self.skip.unwrap_or(0),
            self.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        )
    }

    pub fn metric_filter(self) -> MetricFilter {
        MetricFilter {
            search: self.search,
            category: self.category,
            status: self.status,
        }
    }

    pub fn segment_filter(self) -> SegmentFilter {
        SegmentFilter {
            search: self.search,
            category: self.category,
        }
    }

    pub fn campaign_filter(self) -> CampaignFilter {
        CampaignFilter {
            search: self.search,
            status: self.status,
        }
    }

    pub fn experiment_filter(self) -> ExperimentFilter {
        ExperimentFilter {
            search: self.search,
            status: self.status,
        }
    }
}

/// Query string of the time series endpoint
#[derive(Debug, Default, Deserialize)]
pub struct TimeSeriesParams {
    #[serde(default)]
    pub limit: Option<i64>,
}

impl TimeSeriesParams {
    /// Number of points to return, 30 by default, at most 365
    pub fn limit(&self) -> Result<i64, ValidationError> {
        let limit = self.limit.unwrap_or(DEFAULT_TIMESERIES_LIMIT);
        if !(1..=MAX_TIMESERIES_LIMIT).contains(&limit) {
            return Err(ValidationError::new(format!(
                "limit must be between 1 and {}",
                MAX_TIMESERIES_LIMIT
            )));
        }
        Ok(limit)
    }
}

/// Plain message body (root and delete responses)
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "healthy" or "unhealthy"
    pub status: String,
    /// "ok" or "error"
    pub database: String,
    pub uptime_seconds: u64,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_params_defaults() {
        let params = ListParams::default();
        let pagination = params.pagination().unwrap();
        assert_eq!(pagination.skip(), 0);
        assert_eq!(pagination.limit(), 100);
    }

    #[test]
    fn test_list_params_out_of_range() {
        let params = ListParams {
            limit: Some(500),
            ..Default::default()
        };
        assert!(params.pagination().is_err());

        let params = ListParams {
            skip: Some(-3),
            ..Default::default()
        };
        assert!(params.pagination().is_err());
    }

    #[test]
    fn test_timeseries_limit() {
        assert_eq!(TimeSeriesParams::default().limit().unwrap(), 30);
        assert_eq!(TimeSeriesParams { limit: Some(365) }.limit().unwrap(), 365);
        assert!(TimeSeriesParams { limit: Some(0) }.limit().is_err());
        assert!(TimeSeriesParams { limit: Some(366) }.limit().is_err());
    }
}
