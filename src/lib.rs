//! # DataHub
//!
//! Backend for a data-analytics dashboard: business metrics with their
//! time-series history, customer segments linked to marketing campaigns,
//! and A/B experiments targeting those segments.
//!
//! ## Features
//!
//! - **SQLite storage**: WAL-mode database with a small connection pool
//! - **Filtered listing**: substring search, exact-match filters and pagination
//! - **Aggregates**: metric status counts, customer totals, time series
//! - **REST API**: JSON over HTTP with Axum
//!
//! ## Modules
//!
//! - [`store`]: Connections, schema and column codecs
//! - [`model`]: Create / Update / Response shapes
//! - [`service`]: Query and aggregation services
//! - [`api`]: REST API server with Axum
//! - [`config`]: File and environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use datahub::model::{MetricCreate, Pagination};
//! use datahub::service::{MetricFilter, MetricService};
//! use datahub::store::{Database, StoreConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::open(StoreConfig::new("datahub.db"))?;
//!     let session = db.session()?;
//!
//!     let metric = MetricService::create(
//!         &session,
//!         MetricCreate {
//!             name: "Monthly Revenue".to_string(),
//!             category: Some("sales".to_string()),
//!             ..Default::default()
//!         },
//!     )?;
//!
//!     let page = MetricService::list(&session, Pagination::default(), &MetricFilter::default())?;
//!     println!("{} of {} metrics, newest id {}", page.items.len(), page.total, metric.id);
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod model;
pub mod service;
pub mod store;

// Re-export top-level types for convenience
pub use api::{build_router, serve, ApiError, AppState};

pub use config::{ApiConfig, Config, ConfigError, DatabaseConfig, LoadedConfig, LoggingConfig};

pub use model::{Page, Pagination, ValidationError};

pub use service::{
    CampaignService, ExperimentService, MetricService, SegmentService, ServiceError,
    StatsService,
};

pub use store::{Database, Session, StoreConfig, StoreError, StoreResult};
