//! Query and aggregation services
//!
//! Stateless services, one per entity family. Every operation takes the
//! connection of the caller's session explicitly:
//!
//! ```rust,ignore
//! let session = db.session()?;
//! let page = MetricService::list(&session, Pagination::default(), &MetricFilter::default())?;
//! ```
//!
//! List operations compose a [`Filter`] into a `WHERE` clause, then run it twice:
//! once for the unpaginated count and once for the `LIMIT`/`OFFSET` page.

pub mod campaign;
pub mod experiment;
pub mod metric;
pub mod segment;
pub mod stats;

pub use campaign::{CampaignFilter, CampaignService};
pub use experiment::{ExperimentFilter, ExperimentService};
pub use metric::{MetricFilter, MetricService};
pub use segment::{SegmentFilter, SegmentService};
pub use stats::StatsService;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, ToSql, Transaction, TransactionBehavior};
use thiserror::Error;

use crate::model::{Page, Pagination, ValidationError};
use crate::store::{codec, StoreError};

/// Errors returned by service operations
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The database failed or rejected the write
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The payload was rejected before reaching the database
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl From<rusqlite::Error> for ServiceError {
    fn from(err: rusqlite::Error) -> Self {
        ServiceError::Store(err.into())
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::Store(err.into())
    }
}

/// Result type for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Row order of a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListOrder {
    /// Insertion order
    StoreNative,
    /// Most recently created first
    NewestFirst,
}

impl ListOrder {
    fn sql(self) -> &'static str {
        match self {
            ListOrder::StoreNative => "ORDER BY id ASC",
            ListOrder::NewestFirst => "ORDER BY created_at DESC, id DESC",
        }
    }
}

/// Composable `WHERE` clause over text columns
///
/// Dimensions are AND'ed together; the columns of one search dimension are OR'ed.
/// Missing or empty values add nothing.
#[derive(Debug, Default, Clone)]
pub struct Filter {
    clauses: Vec<String>,
    params: Vec<String>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Substring match of `term` against any of `columns`
    pub fn search(mut self, term: Option<&str>, columns: &[&str]) -> Self {
        let Some(term) = term.filter(|t| !t.is_empty()) else {
            return self;
        };
        if columns.is_empty() {
            return self;
        }

        let pattern = format!("%{}%", escape_like(term));
        let alternatives: Vec<String> = columns
            .iter()
            .map(|column| format!("{} LIKE ? ESCAPE '\\'", column))
            .collect();

        self.clauses.push(format!("({})", alternatives.join(" OR ")));
        self.params
            .extend(std::iter::repeat(pattern).take(columns.len()));
        self
    }

    /// Exact match of `column` against `value`
    pub fn eq(mut self, column: &str, value: Option<&str>) -> Self {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            self.clauses.push(format!("{} = ?", column));
            self.params.push(value.to_string());
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.clauses.join(" AND "))
        }
    }
}

/// Escape LIKE wildcards so the term matches literally
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Count the filtered rows, then fetch one page of them
pub(crate) fn fetch_page<T, F>(
    conn: &Connection,
    table: &str,
    columns: &str,
    filter: &Filter,
    order: ListOrder,
    pagination: Pagination,
    map_row: F,
) -> ServiceResult<Page<T>>
where
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let where_sql = filter.where_sql();

    let count_sql = format!("SELECT COUNT(*) FROM {} {}", table, where_sql);
    let total: i64 = conn.query_row(
        &count_sql,
        rusqlite::params_from_iter(filter.params.iter()),
        |row| row.get(0),
    )?;

    let page_sql = format!(
        "SELECT {} FROM {} {} {} LIMIT ? OFFSET ?",
        columns,
        table,
        where_sql,
        order.sql()
    );
    let limit = pagination.limit();
    let skip = pagination.skip();
    let mut dyn_params: Vec<&dyn ToSql> = filter
        .params
        .iter()
        .map(|param| param as &dyn ToSql)
        .collect();
    dyn_params.push(&limit);
    dyn_params.push(&skip);

    let mut statement = conn.prepare(&page_sql)?;
    let rows = statement.query_map(rusqlite::params_from_iter(dyn_params), map_row)?;
    let mut items = Vec::new();
    for row in rows {
        items.push(row?);
    }

    tracing::debug!(table, total, returned = items.len(), "Listed rows");

    Ok(Page { total, items })
}

/// Begin a write transaction that takes the write lock up front
///
/// Read-then-write sequences inside it cannot fail on lock upgrade; a locked
/// database is waited on for the busy timeout instead.
pub(crate) fn write_transaction(conn: &Connection) -> rusqlite::Result<Transaction<'_>> {
    Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
}

/// Timestamp for an update of a row last touched at `previous`
///
/// Never returns a value at or before `previous`, even if the clock has not advanced.
pub(crate) fn next_updated_at(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = codec::now();
    if now > previous {
        now
    } else {
        previous + chrono::Duration::microseconds(1)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn test_filter_skips_empty_values() {
        let filter = Filter::new()
            .search(Some(""), &["name", "description"])
            .eq("status", Some(""))
            .eq("category", None);

        assert!(filter.is_empty());
        assert_eq!(filter.where_sql(), "");
    }

    #[test]
    fn test_filter_composition() {
        let filter = Filter::new()
            .search(Some("rev"), &["name", "description"])
            .eq("status", Some("active"));

        assert_eq!(
            filter.where_sql(),
            "WHERE (name LIKE ? ESCAPE '\\' OR description LIKE ? ESCAPE '\\') AND status = ?"
        );
        assert_eq!(filter.params, vec!["%rev%", "%rev%", "active"]);
    }

    #[test]
    fn test_search_matches_wildcards_literally() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT);
             INSERT INTO t (name) VALUES ('100% organic'), ('1000 visits'), ('snake_case');",
        )
        .unwrap();

        let percent = Filter::new().search(Some("0%"), &["name"]);
        let page = fetch_page(
            &conn,
            "t",
            "name",
            &percent,
            ListOrder::StoreNative,
            Pagination::default(),
            |row| row.get::<_, String>(0),
        )
        .unwrap();
        assert_eq!(page.items, vec!["100% organic"]);

        let underscore = Filter::new().search(Some("e_c"), &["name"]);
        let page = fetch_page(
            &conn,
            "t",
            "name",
            &underscore,
            ListOrder::StoreNative,
            Pagination::default(),
            |row| row.get::<_, String>(0),
        )
        .unwrap();
        assert_eq!(page.total, 1);
    }

    #[test]
    fn test_next_updated_at_strictly_increases() {
        let future = Utc::now() + chrono::Duration::seconds(60);
        assert!(next_updated_at(future) > future);

        let past = Utc::now() - chrono::Duration::seconds(60);
        assert!(next_updated_at(past) > past);
    }
}
