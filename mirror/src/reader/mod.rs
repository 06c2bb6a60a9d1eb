//! Row readers and the read side driver registry.

pub mod memory;
pub mod mysql;
mod sql;

pub use sql::{SqlEngine, SqlReader};

use std::sync::{Arc, OnceLock, RwLock};

use async_trait::async_trait;
use mirror_config::Spec;
use tokio::sync::mpsc;
use tracing::debug;

use crate::bail;
use crate::conn::ConnOpts;
use crate::error::{ErrorKind, MirrorError, MirrorResult};
use crate::types::TableRow;

/// Sending side of a row channel.
///
/// Readers publish [`TableRow`]s into the sink and close it by dropping it
/// when the read finishes, successfully or not.
pub type RowSink = mpsc::Sender<TableRow>;

/// Options for reading a single table.
#[derive(Debug, Clone, Default)]
pub struct ReadTableOpt {
    /// Quoted, qualified column projection. Empty means every column.
    pub columns: Vec<String>,
    /// Resolved SQL fragment for the `WHERE` clause.
    pub match_sql: Option<String>,
    pub sorts: Vec<SortOpt>,
    pub limit: Option<u64>,
    pub relationships: Vec<RelationshipOpt>,
}

#[derive(Debug, Clone)]
pub struct SortOpt {
    pub column: String,
    pub descending: bool,
}

/// A foreign key to expand while reading, see
/// [`mirror_config::Relationship`].
#[derive(Debug, Clone)]
pub struct RelationshipOpt {
    pub foreign_key: String,
    pub referenced_table: String,
    pub referenced_key: String,
}

/// A source of table structure, view definitions and rows.
#[async_trait]
pub trait Reader: Send + Sync {
    /// Returns all user tables, not views. Cached after the first call.
    async fn get_tables(&self) -> MirrorResult<Vec<String>>;

    /// Returns the column list of a table. Cached per table.
    async fn get_columns(&self, table: &str) -> MirrorResult<Vec<String>>;

    /// Returns DDL that recreates all tables.
    async fn get_structure(&self) -> MirrorResult<String>;

    /// Returns ordered DDL for views, lowest weight first.
    async fn get_view_definitions(&self, spec: &Spec) -> MirrorResult<String>;

    /// Produces all selected rows of a table to `sink`.
    ///
    /// The sink is closed when the call returns. Query and relationship
    /// expansion failures abort the stream; single row scan failures are
    /// logged and skipped.
    async fn read_table(&self, table: &str, sink: RowSink, opts: ReadTableOpt)
        -> MirrorResult<()>;

    async fn close(&self) -> MirrorResult<()>;
}

/// A registered read side driver.
#[async_trait]
pub trait ReaderDriver: Send + Sync {
    fn name(&self) -> &'static str;

    /// Checks whether the given DSN is supported by this driver.
    fn is_supported(&self, dsn: &str) -> bool;

    /// Opens a new connection and returns a reader for it.
    async fn new_connection(&self, opts: &ConnOpts) -> MirrorResult<Arc<dyn Reader>>;
}

static DRIVERS: OnceLock<RwLock<Vec<Arc<dyn ReaderDriver>>>> = OnceLock::new();

fn drivers() -> &'static RwLock<Vec<Arc<dyn ReaderDriver>>> {
    DRIVERS.get_or_init(|| RwLock::new(Vec::new()))
}

/// Registers a read side driver. Intended to be called once at startup.
pub fn register_driver(driver: Arc<dyn ReaderDriver>) {
    drivers()
        .write()
        .expect("reader driver registry lock poisoned")
        .push(driver);
}

/// Connects using the first registered driver that supports the DSN.
pub async fn connect(opts: &ConnOpts) -> MirrorResult<Arc<dyn Reader>> {
    let driver = {
        let drivers = drivers()
            .read()
            .expect("reader driver registry lock poisoned");
        drivers
            .iter()
            .find(|driver| driver.is_supported(&opts.dsn))
            .cloned()
    };

    match driver {
        Some(driver) => {
            debug!(driver = driver.name(), "found reader driver");
            driver.new_connection(opts).await
        }
        None => bail!(
            ErrorKind::DriverNotFound,
            "no supported reader driver found",
            opts.dsn.clone()
        ),
    }
}
