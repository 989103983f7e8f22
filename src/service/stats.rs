//! Aggregations
//!
//! Summary counts for the dashboards and the time series of a single metric.
//! None of these are paginated.

use rusqlite::Connection;

use super::ServiceResult;
use crate::model::{MetricStats, SegmentStats, TimeSeriesPoint, ValidationError};
use crate::store::codec;

/// Points returned by [`StatsService::timeseries`] when no limit is given
pub const DEFAULT_TIMESERIES_LIMIT: i64 = 30;

/// Largest accepted time series limit
pub const MAX_TIMESERIES_LIMIT: i64 = 365;

/// Segment category counted as active customers
pub const RETENTION_CATEGORY: &str = "retention";

/// Segment category counted as at-risk customers
pub const REACTIVATION_CATEGORY: &str = "reactivation";

/// Read-only aggregations over metrics and segments
pub struct StatsService;

impl StatsService {
    /// Count metrics by status; unknown statuses only count toward `total`
    pub fn metric_stats(conn: &Connection) -> ServiceResult<MetricStats> {
        let stats = conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN status = 'active' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN status = 'inactive' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN status = 'warning' THEN 1 ELSE 0 END), 0)
             FROM metrics",
            [],
            |row| {
                Ok(MetricStats {
                    total: row.get(0)?,
                    active: row.get(1)?,
                    inactive: row.get(2)?,
                    warning: row.get(3)?,
                })
            },
        )?;

        tracing::debug!(total = stats.total, "Computed metric stats");
        Ok(stats)
    }

    /// Sum customer counts across segments; a missing count adds nothing
    ///
    /// Sums saturate at `i64::MAX` rather than failing on overflow.
    pub fn segment_stats(conn: &Connection) -> ServiceResult<SegmentStats> {
        let stats = conn.query_row(
            "SELECT COUNT(*),
                    CAST(TOTAL(customer_count) AS INTEGER),
                    CAST(TOTAL(CASE WHEN category = ?1 THEN customer_count END) AS INTEGER),
                    CAST(TOTAL(CASE WHEN category = ?2 THEN customer_count END) AS INTEGER)
             FROM segments",
            [RETENTION_CATEGORY, REACTIVATION_CATEGORY],
            |row| {
                Ok(SegmentStats {
                    total_segments: row.get(0)?,
                    total_customers: row.get(1)?,
                    active_customers: row.get(2)?,
                    at_risk_customers: row.get(3)?,
                })
            },
        )?;

        tracing::debug!(total = stats.total_segments, "Computed segment stats");
        Ok(stats)
    }

    /// The latest `limit` points of a metric, oldest first
    ///
    /// Does not check that the metric exists; an unknown id yields an empty series.
    pub fn timeseries(
        conn: &Connection,
        metric_id: i64,
        limit: i64,
    ) -> ServiceResult<Vec<TimeSeriesPoint>> {
        if !(1..=MAX_TIMESERIES_LIMIT).contains(&limit) {
            return Err(ValidationError::new(format!(
                "limit must be between 1 and {}",
                MAX_TIMESERIES_LIMIT
            ))
            .into());
        }

        let mut stmt = conn.prepare_cached(
            "SELECT timestamp, value FROM metric_data_points
             WHERE metric_id = ?1
             ORDER BY timestamp DESC, id DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map([metric_id, limit], |row| {
            Ok(TimeSeriesPoint {
                timestamp: codec::get_timestamp(row, 0)?,
                value: row.get(1)?,
            })
        })?;

        let mut points = Vec::new();
        for row in rows {
            points.push(row?);
        }
        points.reverse();

        tracing::debug!(metric_id, points = points.len(), "Fetched time series");
        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DataPointCreate, MetricCreate, MetricUpdate, SegmentCreate};
    use crate::service::testing::open_db;
    use crate::service::{MetricService, SegmentService, ServiceError};
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn test_metric_stats_buckets() {
        let (db, _dir) = open_db();
        let conn = db.session().unwrap();

        let empty = StatsService::metric_stats(&conn).unwrap();
        assert_eq!(empty, MetricStats::default());

        for status in [Some("active"), Some("active"), None, Some("warning"), Some("retired")] {
            MetricService::create(
                &conn,
                MetricCreate {
                    name: "m".to_string(),
                    status: status.map(str::to_string),
                    ..Default::default()
                },
            )
            .unwrap();
        }

        let stats = StatsService::metric_stats(&conn).unwrap();
        assert_eq!(
            stats,
            MetricStats {
                total: 5,
                active: 2,
                inactive: 1,
                warning: 1,
            }
        );
    }

    #[test]
    fn test_segment_stats_scenario() {
        let (db, _dir) = open_db();
        let conn = db.session().unwrap();

        for (name, category, count) in [
            ("Loyal Customers", "retention", Some(1000)),
            ("Dormant", "reactivation", Some(500)),
        ] {
            SegmentService::create(
                &conn,
                SegmentCreate {
                    name: name.to_string(),
                    category: Some(category.to_string()),
                    customer_count: count,
                    ..Default::default()
                },
            )
            .unwrap();
        }

        let stats = StatsService::segment_stats(&conn).unwrap();
        assert_eq!(
            stats,
            SegmentStats {
                total_segments: 2,
                total_customers: 1500,
                active_customers: 1000,
                at_risk_customers: 500,
            }
        );
    }

    #[test]
    fn test_segment_stats_null_counts() {
        let (db, _dir) = open_db();
        let conn = db.session().unwrap();

        SegmentService::create(
            &conn,
            SegmentCreate {
                name: "Unsized".to_string(),
                category: Some("retention".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

        let stats = StatsService::segment_stats(&conn).unwrap();
        assert_eq!(stats.total_segments, 1);
        assert_eq!(stats.total_customers, 0);
        assert_eq!(stats.active_customers, 0);
    }

    #[test]
    fn test_segment_stats_saturate_on_huge_counts() {
        let (db, _dir) = open_db();
        let conn = db.session().unwrap();

        for count in [i64::MAX, 1] {
            SegmentService::create(
                &conn,
                SegmentCreate {
                    name: "Huge".to_string(),
                    category: Some("retention".to_string()),
                    customer_count: Some(count),
                    ..Default::default()
                },
            )
            .unwrap();
        }

        let stats = StatsService::segment_stats(&conn).unwrap();
        assert_eq!(stats.total_segments, 2);
        assert_eq!(stats.total_customers, i64::MAX);
        assert_eq!(stats.active_customers, i64::MAX);
        assert_eq!(stats.at_risk_customers, 0);
    }

    #[test]
    fn test_timeseries_latest_points_ascending() {
        let (db, _dir) = open_db();
        let conn = db.session().unwrap();
        let metric = MetricService::create(
            &conn,
            MetricCreate {
                name: "Revenue".to_string(),
                ..Default::default()
            },
        )
        .unwrap();
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        // Recorded out of order on purpose
        for day in [3, 1, 5, 2, 4] {
            MetricService::record_point(
                &conn,
                metric.id,
                DataPointCreate {
                    value: f64::from(day),
                    timestamp: t0 + Duration::days(i64::from(day)),
                },
            )
            .unwrap();
        }

        let series = StatsService::timeseries(&conn, metric.id, 3).unwrap();
        let values: Vec<f64> = series.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![3.0, 4.0, 5.0]);
        assert_eq!(series[0].timestamp, t0 + Duration::days(3));

        let all = StatsService::timeseries(&conn, metric.id, DEFAULT_TIMESERIES_LIMIT).unwrap();
        assert_eq!(all.len(), 5);
    }

    #[test]
    fn test_timeseries_never_stores_five_digit_years() {
        let (db, _dir) = open_db();
        let conn = db.session().unwrap();
        let metric = MetricService::create(
            &conn,
            MetricCreate {
                name: "Signups".to_string(),
                ..Default::default()
            },
        )
        .unwrap();

        let recent = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        MetricService::record_point(
            &conn,
            metric.id,
            DataPointCreate {
                value: 1.0,
                timestamp: recent,
            },
        )
        .unwrap();

        let far = Utc.with_ymd_and_hms(10000, 1, 1, 0, 0, 0).unwrap();
        let rejected = MetricService::record_point(
            &conn,
            metric.id,
            DataPointCreate {
                value: 2.0,
                timestamp: far,
            },
        );
        assert!(matches!(rejected, Err(ServiceError::Validation(_))));

        let series = StatsService::timeseries(&conn, metric.id, 1).unwrap();
        assert_eq!(
            series,
            vec![TimeSeriesPoint {
                timestamp: recent,
                value: 1.0,
            }]
        );
    }

    #[test]
    fn test_timeseries_limit_bounds() {
        let (db, _dir) = open_db();
        let conn = db.session().unwrap();

        assert!(StatsService::timeseries(&conn, 1, 365).unwrap().is_empty());
        assert!(matches!(
            StatsService::timeseries(&conn, 1, 0),
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            StatsService::timeseries(&conn, 1, 366),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn test_stats_follow_updates() {
        let (db, _dir) = open_db();
        let conn = db.session().unwrap();
        let metric = MetricService::create(
            &conn,
            MetricCreate {
                name: "Latency".to_string(),
                ..Default::default()
            },
        )
        .unwrap();

        MetricService::update(
            &conn,
            metric.id,
            MetricUpdate {
                status: Some("warning".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

        let stats = StatsService::metric_stats(&conn).unwrap();
        assert_eq!(stats.inactive, 0);
        assert_eq!(stats.warning, 1);
    }
}
