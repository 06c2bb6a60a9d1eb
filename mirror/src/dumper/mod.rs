//! Row dumpers, the dump engine and the write side driver registry.

mod engine;
pub mod memory;
pub mod mysql;
pub mod text;

pub use engine::Engine;

use std::sync::{Arc, OnceLock, RwLock};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::bail;
use crate::conn::ConnOpts;
use crate::error::{ErrorKind, MirrorError, MirrorResult};
use crate::reader::Reader;
use crate::types::TableRow;

/// A destination for structure, view DDL and rows.
///
/// `dump_table` drains the row channel and returns only after all writes are
/// flushed. The pre and post table hooks default to no-ops; destinations that
/// need setup around the data phase override them.
#[async_trait]
pub trait Dumper: Send + Sync {
    /// Writes DDL verbatim.
    async fn dump_structure(&self, sql: &str) -> MirrorResult<()>;

    /// Writes view DDL verbatim.
    async fn dump_view_definitions(&self, sql: &str) -> MirrorResult<()>;

    /// Consumes rows until the channel closes, writing each in destination
    /// specific form.
    async fn dump_table(&self, table: &str, rows: mpsc::Receiver<TableRow>) -> MirrorResult<()>;

    /// Runs before the first table dump.
    async fn pre_dump_tables(&self, _tables: &[String]) -> MirrorResult<()> {
        Ok(())
    }

    /// Runs after the last table dump.
    async fn post_dump_tables(&self, _tables: &[String]) -> MirrorResult<()> {
        Ok(())
    }

    /// Releases write side resources.
    async fn close(&self) -> MirrorResult<()>;
}

/// A registered write side driver.
#[async_trait]
pub trait DumperDriver: Send + Sync {
    fn name(&self) -> &'static str;

    /// Checks whether the given DSN is supported by this driver.
    fn is_supported(&self, dsn: &str) -> bool;

    /// Opens the destination and returns a dumper for it.
    async fn new_connection(&self, opts: &ConnOpts) -> MirrorResult<Arc<dyn Dumper>>;
}

static DRIVERS: OnceLock<RwLock<Vec<Arc<dyn DumperDriver>>>> = OnceLock::new();

fn drivers() -> &'static RwLock<Vec<Arc<dyn DumperDriver>>> {
    DRIVERS.get_or_init(|| RwLock::new(Vec::new()))
}

/// Registers a write side driver. Intended to be called once at startup.
pub fn register_driver(driver: Arc<dyn DumperDriver>) {
    drivers()
        .write()
        .expect("dumper driver registry lock poisoned")
        .push(driver);
}

/// Connects the first registered driver that supports the DSN and wires it
/// into an [`Engine`] together with the reader.
pub async fn connect(opts: &ConnOpts, reader: Arc<dyn Reader>) -> MirrorResult<Engine> {
    let driver = {
        let drivers = drivers()
            .read()
            .expect("dumper driver registry lock poisoned");
        drivers
            .iter()
            .find(|driver| driver.is_supported(&opts.dsn))
            .cloned()
    };

    match driver {
        Some(driver) => {
            debug!(driver = driver.name(), "found dumper driver");
            let dumper = driver.new_connection(opts).await?;
            Ok(Engine::new(reader, dumper))
        }
        None => bail!(
            ErrorKind::DriverNotFound,
            "no supported dumper driver found",
            opts.dsn.clone()
        ),
    }
}
