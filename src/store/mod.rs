//! Entity store
//!
//! SQLite persistence for metrics, data points, segments, campaigns and experiments.
//!
//! # Connections
//! A [`Database`] keeps a small pool of idle connections. [`Database::session`] checks one
//! out as a [`Session`] guard which hands it back when dropped. [`Database::run`] runs a
//! closure against a session on the blocking thread pool so async handlers never block the
//! runtime.
//!
//! Every connection is opened with:
//! - `journal_mode = WAL` and `synchronous = NORMAL`
//! - `foreign_keys = ON` so cascades and references are enforced by the engine
//! - a busy timeout so concurrent writers wait instead of failing immediately
//!
//! # Example
//!
//! ```rust,ignore
//! use datahub::store::{Database, StoreConfig};
//! use datahub::service::MetricService;
//!
//! let db = Database::open(StoreConfig::new("/tmp/datahub.db"))?;
//! let session = db.session()?;
//! let metric = MetricService::get(&session, 1)?;
//! ```

pub mod codec;
pub mod error;
pub mod schema;

pub use error::{StoreError, StoreResult};

use rusqlite::{Connection, OpenFlags};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Database configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path to the SQLite file
    pub path: PathBuf,
    /// Maximum number of idle connections kept open
    pub pool_size: usize,
    /// How long a connection waits on a locked database
    pub busy_timeout_ms: u64,
}

impl StoreConfig {
    /// Create a config for the given database file with default pool settings
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("datahub.db"),
            pool_size: 8,
            busy_timeout_ms: 5_000,
        }
    }
}

/// Pooled handle to the SQLite database
pub struct Database {
    config: StoreConfig,
    idle: Mutex<Vec<Connection>>,
}

impl Database {
    /// Open (or create) the database file and make sure every table exists
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = connect(&config)?;
        schema::create_schema(&conn)?;

        tracing::info!(
            path = %config.path.display(),
            pool_size = config.pool_size,
            "Database opened"
        );

        Ok(Self {
            config,
            idle: Mutex::new(vec![conn]),
        })
    }

    /// Path of the database file
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Maximum number of idle connections
    pub fn pool_size(&self) -> usize {
        self.config.pool_size
    }

    /// Number of connections currently idle in the pool
    pub fn idle_count(&self) -> usize {
        self.idle.lock().map(|idle| idle.len()).unwrap_or(0)
    }

    /// Check out a connection for the duration of one unit of work
    pub fn session(&self) -> StoreResult<Session<'_>> {
        let pooled = self
            .idle
            .lock()
            .map_err(|e| StoreError::Pool(e.to_string()))?
            .pop();

        let conn = match pooled {
            Some(conn) => conn,
            None => connect(&self.config)?,
        };

        Ok(Session {
            conn: Some(conn),
            db: self,
        })
    }

    /// Run `f` with a fresh session on the blocking thread pool
    pub async fn run<F, T, E>(self: &Arc<Self>, f: F) -> Result<T, E>
    where
        F: FnOnce(&Connection) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<StoreError> + Send + 'static,
    {
        let db = Arc::clone(self);
        tokio::task::spawn_blocking(move || {
            let session = db.session()?;
            f(&session)
        })
        .await
        .map_err(|e| E::from(StoreError::from(e)))?
    }

    /// Round-trip a trivial query
    pub fn ping(&self) -> StoreResult<()> {
        let session = self.session()?;
        session.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }

    fn release(&self, conn: Connection) {
        // A connection still inside a transaction is not reusable
        if !conn.is_autocommit() {
            tracing::warn!("Discarding connection with an open transaction");
            return;
        }

        if let Ok(mut idle) = self.idle.lock() {
            if idle.len() < self.config.pool_size {
                idle.push(conn);
            }
        }
    }
}

/// A connection checked out of the pool, returned on drop
pub struct Session<'a> {
    conn: Option<Connection>,
    db: &'a Database,
}

impl Deref for Session<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn
            .as_ref()
            .expect("session connection is only taken on drop")
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.db.release(conn);
        }
    }
}

fn connect(config: &StoreConfig) -> StoreResult<Connection> {
    let conn = Connection::open_with_flags(
        &config.path,
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;

    conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    Ok(conn)
}
