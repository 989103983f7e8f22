//! Metric queries and data point recording

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use super::{fetch_page, next_updated_at, write_transaction, Filter, ListOrder, ServiceResult};
use crate::model::metric::{DEFAULT_STATUS, DEFAULT_VERSION};
use crate::model::{
    DataPointCreate, Metric, MetricCreate, MetricDataPoint, MetricUpdate, Page, Pagination,
};
use crate::store::codec;

const COLUMNS: &str = "id, name, description, value, unit, category, status, version, owner, \
    priority, calculation_logic, alert_settings, data_source, aggregation_period, \
    created_at, updated_at";

const POINT_COLUMNS: &str = "id, metric_id, value, timestamp, created_at";

/// Filters accepted by [`MetricService::list`]
#[derive(Debug, Clone, Default)]
pub struct MetricFilter {
    /// Substring of name or description
    pub search: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
}

impl MetricFilter {
    fn to_filter(&self) -> Filter {
        Filter::new()
            .search(self.search.as_deref(), &["name", "description"])
            .eq("category", self.category.as_deref())
            .eq("status", self.status.as_deref())
    }
}

/// Metric CRUD
pub struct MetricService;

impl MetricService {
    /// List metrics in insertion order
    pub fn list(
        conn: &Connection,
        pagination: Pagination,
        filter: &MetricFilter,
    ) -> ServiceResult<Page<Metric>> {
        fetch_page(
            conn,
            "metrics",
            COLUMNS,
            &filter.to_filter(),
            ListOrder::StoreNative,
            pagination,
            metric_from_row,
        )
    }

    pub fn get(conn: &Connection, id: i64) -> ServiceResult<Option<Metric>> {
        let sql = format!("SELECT {} FROM metrics WHERE id = ?1", COLUMNS);
        Ok(conn.query_row(&sql, [id], metric_from_row).optional()?)
    }

    pub fn exists(conn: &Connection, id: i64) -> ServiceResult<bool> {
        let found = conn
            .query_row("SELECT 1 FROM metrics WHERE id = ?1", [id], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    pub fn create(conn: &Connection, payload: MetricCreate) -> ServiceResult<Metric> {
        payload.validate()?;

        let now = codec::now();
        let stamp = codec::encode_timestamp(&now);
        let status = payload.status.unwrap_or_else(|| DEFAULT_STATUS.to_string());
        let version = payload.version.unwrap_or_else(|| DEFAULT_VERSION.to_string());

        conn.execute(
            "INSERT INTO metrics (name, description, category, status, version, owner, priority,
                                  calculation_logic, alert_settings, data_source,
                                  aggregation_period, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
            params![
                payload.name,
                payload.description,
                payload.category,
                status,
                version,
                payload.owner,
                payload.priority,
                payload.calculation_logic,
                payload.alert_settings,
                payload.data_source,
                payload.aggregation_period,
                stamp,
            ],
        )?;
        let id = conn.last_insert_rowid();

        info!(metric_id = id, name = %payload.name, "Metric created");

        Ok(Metric {
            id,
            name: payload.name,
            description: payload.description,
            value: None,
            unit: None,
            category: payload.category,
            status,
            version,
            owner: payload.owner,
            priority: payload.priority,
            calculation_logic: payload.calculation_logic,
            alert_settings: payload.alert_settings,
            data_source: payload.data_source,
            aggregation_period: payload.aggregation_period,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn update(
        conn: &Connection,
        id: i64,
        mut patch: MetricUpdate,
    ) -> ServiceResult<Option<Metric>> {
        patch.validate()?;

        let tx = write_transaction(conn)?;
        let Some(mut metric) = Self::get(&tx, id)? else {
            return Ok(None);
        };

        patch.apply(&mut metric);
        metric.updated_at = next_updated_at(metric.updated_at);

        tx.execute(
            "UPDATE metrics
             SET name = ?1, description = ?2, value = ?3, unit = ?4, category = ?5, status = ?6,
                 version = ?7, owner = ?8, priority = ?9, calculation_logic = ?10,
                 alert_settings = ?11, data_source = ?12, aggregation_period = ?13,
                 updated_at = ?14
             WHERE id = ?15",
            params![
                metric.name,
                metric.description,
                metric.value,
                metric.unit,
                metric.category,
                metric.status,
                metric.version,
                metric.owner,
                metric.priority,
                metric.calculation_logic,
                metric.alert_settings,
                metric.data_source,
                metric.aggregation_period,
                codec::encode_timestamp(&metric.updated_at),
                id,
            ],
        )?;
        tx.commit()?;

        info!(metric_id = id, "Metric updated");
        Ok(Some(metric))
    }

    /// Delete a metric and, by cascade, all of its data points
    pub fn delete(conn: &Connection, id: i64) -> ServiceResult<bool> {
        let removed = conn.execute("DELETE FROM metrics WHERE id = ?1", [id])?;
        if removed > 0 {
            info!(metric_id = id, "Metric deleted");
        }
        Ok(removed > 0)
    }

    /// Append an observation to a metric's history
    ///
    /// Returns `None` when the metric does not exist.
    pub fn record_point(
        conn: &Connection,
        metric_id: i64,
        payload: DataPointCreate,
    ) -> ServiceResult<Option<MetricDataPoint>> {
        payload.validate()?;

        let tx = write_transaction(conn)?;
        if !Self::exists(&tx, metric_id)? {
            return Ok(None);
        }

        let created_at = codec::now();
        let timestamp = codec::truncate_micros(payload.timestamp);
        tx.execute(
            "INSERT INTO metric_data_points (metric_id, value, timestamp, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                metric_id,
                payload.value,
                codec::encode_timestamp(&timestamp),
                codec::encode_timestamp(&created_at),
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        info!(metric_id, point_id = id, "Data point recorded");

        Ok(Some(MetricDataPoint {
            id,
            metric_id,
            value: payload.value,
            timestamp,
            created_at,
        }))
    }

    pub fn get_point(conn: &Connection, id: i64) -> ServiceResult<Option<MetricDataPoint>> {
        let sql = format!(
            "SELECT {} FROM metric_data_points WHERE id = ?1",
            POINT_COLUMNS
        );
        Ok(conn.query_row(&sql, [id], point_from_row).optional()?)
    }
}

fn metric_from_row(row: &Row<'_>) -> rusqlite::Result<Metric> {
    Ok(Metric {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        value: row.get(3)?,
        unit: row.get(4)?,
        category: row.get(5)?,
        status: row.get(6)?,
        version: row.get(7)?,
        owner: row.get(8)?,
        priority: row.get(9)?,
        calculation_logic: row.get(10)?,
        alert_settings: row.get(11)?,
        data_source: row.get(12)?,
        aggregation_period: row.get(13)?,
        created_at: codec::get_timestamp(row, 14)?,
        updated_at: codec::get_timestamp(row, 15)?,
    })
}

pub(crate) fn point_from_row(row: &Row<'_>) -> rusqlite::Result<MetricDataPoint> {
    Ok(MetricDataPoint {
        id: row.get(0)?,
        metric_id: row.get(1)?,
        value: row.get(2)?,
        timestamp: codec::get_timestamp(row, 3)?,
        created_at: codec::get_timestamp(row, 4)?,
    })
}
