//! # arcdata warehouse
//!
//! DuckDB-backed storage for the arcdata read-through cache.
//!
//! ## Tables
//!
//! | Table | Description |
//! |-------|-------------|
//! | `series` | One row per `(source, natural_key)` |
//! | `observations` | Dated values keyed by `(series_id, date)` |
//! | `instruments` | One row per ticker with optional metadata |
//! | `bars` | OHLCV bars keyed by `(instrument_id, bar_interval, date)` |
//! | `documents` | JSON side store keyed by `(collection, doc_key)` |
//! | `fetch_log` | Audit of remote fetches |
//!
//! Every multi-row write runs in a single transaction: it either commits as a
//! whole or leaves the store untouched.

pub mod documents;
pub mod duckdb;
pub mod fetch_log;
pub mod migrations;
pub mod models;
mod store;

use std::fs;
use std::path::{Path, PathBuf};

use ::duckdb::Connection;
use thiserror::Error;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::Date;

pub use documents::DocumentKey;
pub use duckdb::{DuckDbConnectionManager, PooledConnection, WriteConnection, IN_MEMORY};
pub use models::{
    BarRecord, DateBounds, FetchLogEntry, FetchStatus, InstrumentMetadata, InstrumentRecord,
    ObservationRecord, SeriesRecord,
};

/// Errors that can occur during warehouse operations.
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// `DuckDB` database error.
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    /// I/O error (file system operations).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Document body could not be encoded or decoded.
    #[error("document serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A connection pool lock was poisoned by a panicking holder.
    #[error("connection pool lock poisoned: {0}")]
    PoolPoisoned(&'static str),

    /// A row or argument violates a store constraint.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

/// Configuration for the warehouse database.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Root directory for arcdata state.
    pub arcdata_home: PathBuf,
    /// Path to the `DuckDB` database file, or `:memory:`.
    pub db_path: PathBuf,
    /// Maximum number of idle connections kept in the pool.
    pub max_pool_size: usize,
}

impl WarehouseConfig {
    /// Layout rooted at `home`: the database lives at `<home>/cache/arcdata.duckdb`.
    pub fn under_home(home: impl Into<PathBuf>) -> Self {
        let arcdata_home = home.into();
        let db_path = arcdata_home.join("cache").join("arcdata.duckdb");
        Self {
            arcdata_home,
            db_path,
            max_pool_size: 4,
        }
    }

    pub fn in_memory() -> Self {
        Self {
            arcdata_home: PathBuf::from("."),
            db_path: PathBuf::from(IN_MEMORY),
            max_pool_size: 2,
        }
    }

    fn is_in_memory(&self) -> bool {
        self.db_path.as_os_str() == IN_MEMORY
    }
}

/// Handle to the local store. Cheap to clone; clones share one pool.
#[derive(Clone)]
pub struct Warehouse {
    config: WarehouseConfig,
    manager: DuckDbConnectionManager,
}

impl Warehouse {
    /// Open a throwaway in-memory warehouse.
    pub fn open_in_memory() -> Result<Self, WarehouseError> {
        Self::open(WarehouseConfig::in_memory())
    }

    /// Open a warehouse with the specified configuration and apply the schema.
    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if !config.is_in_memory() {
            if let Some(parent) = config.db_path.parent() {
                fs::create_dir_all(parent)?;
            }
        }

        let manager = DuckDbConnectionManager::open(config.db_path.clone(), config.max_pool_size)?;
        let warehouse = Self { config, manager };
        warehouse.initialize()?;
        tracing::debug!(path = %warehouse.db_path().display(), "warehouse opened");
        Ok(warehouse)
    }

    /// Initialize database schema.
    pub fn initialize(&self) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire_writer()?;
        migrations::apply_migrations(&connection)?;
        Ok(())
    }

    /// Get the path to the database file.
    pub fn db_path(&self) -> &Path {
        self.manager.db_path()
    }

    pub fn config(&self) -> &WarehouseConfig {
        &self.config
    }

    fn connection(&self) -> Result<PooledConnection, WarehouseError> {
        self.manager.acquire()
    }

    /// Connection for statements that modify the store; see [`DuckDbConnectionManager::acquire_writer`].
    fn writer(&self) -> Result<WriteConnection<'_>, WarehouseError> {
        self.manager.acquire_writer()
    }
}

/// Run `work` inside one transaction, committing on success or rolling back on failure.
fn in_transaction<T>(
    connection: &Connection,
    work: impl FnOnce(&Connection) -> Result<T, WarehouseError>,
) -> Result<T, WarehouseError> {
    connection.execute_batch("BEGIN TRANSACTION")?;
    let result = work(connection);
    finalize_transaction(connection, result)
}

/// Finalize a transaction, committing on success or rolling back on failure.
fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, WarehouseError>,
) -> Result<T, WarehouseError> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            if let Err(rollback) = connection.execute_batch("ROLLBACK") {
                tracing::warn!(error = %rollback, "rollback failed");
            }
            Err(error)
        }
    }
}

const SQL_DATE: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Render a date the way `CAST(? AS DATE)` expects it.
fn date_to_sql(date: Date) -> String {
    date.format(SQL_DATE).unwrap_or_else(|_| date.to_string())
}

/// Parse a `DATE` column read back through `CAST(... AS VARCHAR)`.
fn date_from_sql(value: &str) -> Result<Date, WarehouseError> {
    Date::parse(value, SQL_DATE)
        .map_err(|error| WarehouseError::InvalidData(format!("stored date '{value}': {error}")))
}
