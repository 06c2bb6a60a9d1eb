//! In-memory dumper for testing and development purposes.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::conn::ConnOpts;
use crate::dumper::{Dumper, DumperDriver};
use crate::error::{ErrorKind, MirrorError, MirrorResult};
use crate::mirror_error;
use crate::types::{Row, TableRow};

#[derive(Debug, Default)]
struct Inner {
    structure: Option<String>,
    view_definitions: Option<String>,
    tables: HashMap<String, Vec<Row>>,
    /// Everything received, in arrival order across tables.
    row_log: Vec<TableRow>,
    /// Lifecycle markers: `structure`, `views`, `pre`, `dump:<t>`,
    /// `dump_done:<t>`, `post`.
    events: Vec<String>,
    in_flight: usize,
    max_in_flight: usize,
}

/// A dumper that stores everything in memory.
///
/// [`MemoryDumper`] records structure and view SQL, the rows written per
/// table, a global arrival log and lifecycle events, which makes pipeline
/// behaviour fully observable in tests. A per table delay and injected
/// failures are available to exercise concurrency and error paths.
#[derive(Debug, Clone, Default)]
pub struct MemoryDumper {
    inner: Arc<Mutex<Inner>>,
    delay: Option<Duration>,
    fail_tables: Arc<HashSet<String>>,
}

impl MemoryDumper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleeps this long at the start of every table dump.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Makes `dump_table` fail for the given tables after draining them.
    pub fn with_failing_tables(mut self, tables: impl IntoIterator<Item = String>) -> Self {
        self.fail_tables = Arc::new(tables.into_iter().collect());
        self
    }

    pub fn structure(&self) -> Option<String> {
        self.lock().structure.clone()
    }

    pub fn view_definitions(&self) -> Option<String> {
        self.lock().view_definitions.clone()
    }

    pub fn table_rows(&self, table: &str) -> Vec<Row> {
        self.lock().tables.get(table).cloned().unwrap_or_default()
    }

    pub fn row_log(&self) -> Vec<TableRow> {
        self.lock().row_log.clone()
    }

    pub fn events(&self) -> Vec<String> {
        self.lock().events.clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.lock().max_in_flight
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("memory dumper lock poisoned")
    }
}

#[async_trait]
impl Dumper for MemoryDumper {
    async fn dump_structure(&self, sql: &str) -> MirrorResult<()> {
        let mut inner = self.lock();
        inner.structure = Some(sql.to_owned());
        inner.events.push("structure".to_owned());
        Ok(())
    }

    async fn dump_view_definitions(&self, sql: &str) -> MirrorResult<()> {
        let mut inner = self.lock();
        inner.view_definitions = Some(sql.to_owned());
        inner.events.push("views".to_owned());
        Ok(())
    }

    async fn dump_table(
        &self,
        table: &str,
        mut rows: mpsc::Receiver<TableRow>,
    ) -> MirrorResult<()> {
        {
            let mut inner = self.lock();
            inner.events.push(format!("dump:{table}"));
            inner.in_flight += 1;
            inner.max_in_flight = inner.max_in_flight.max(inner.in_flight);
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let mut received = 0usize;
        while let Some(item) = rows.recv().await {
            received += 1;
            let mut inner = self.lock();
            inner
                .tables
                .entry(item.table.clone())
                .or_default()
                .push(item.row.clone());
            inner.row_log.push(item);
        }

        debug!(table, received, "memory dump drained");

        {
            let mut inner = self.lock();
            inner.in_flight -= 1;
            inner.events.push(format!("dump_done:{table}"));
        }

        if self.fail_tables.contains(table) {
            return Err(mirror_error!(
                ErrorKind::DumpWriteFailed,
                "table dump failure injected",
                table
            ));
        }

        Ok(())
    }

    async fn pre_dump_tables(&self, _tables: &[String]) -> MirrorResult<()> {
        self.lock().events.push("pre".to_owned());
        Ok(())
    }

    async fn post_dump_tables(&self, _tables: &[String]) -> MirrorResult<()> {
        self.lock().events.push("post".to_owned());
        Ok(())
    }

    async fn close(&self) -> MirrorResult<()> {
        Ok(())
    }
}

/// Write side driver for the `memory://` DSN.
pub struct MemoryDumperDriver;

#[async_trait]
impl DumperDriver for MemoryDumperDriver {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn is_supported(&self, dsn: &str) -> bool {
        dsn.starts_with("memory://")
    }

    async fn new_connection(&self, _opts: &ConnOpts) -> MirrorResult<Arc<dyn Dumper>> {
        Ok(Arc::new(MemoryDumper::new()))
    }
}
