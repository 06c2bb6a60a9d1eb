//! In-memory reader for testing and development purposes.

use std::collections::HashSet;

use async_trait::async_trait;
use mirror_config::Spec;
use tracing::debug;

use crate::bail;
use crate::error::{ErrorKind, MirrorError, MirrorResult};
use crate::reader::{ReadTableOpt, Reader, RowSink};
use crate::types::{Row, TableRow};

/// A table held by a [`MemoryReader`].
#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

/// A reader over fixed in-memory tables.
///
/// [`MemoryReader`] makes pipeline behaviour observable without a database:
/// it serves canned structure and view DDL, emits its rows in insertion
/// order, and can be told to fail specific tables to exercise error paths.
#[derive(Debug, Clone, Default)]
pub struct MemoryReader {
    tables: Vec<MemoryTable>,
    structure: String,
    view_definitions: String,
    fail_tables: HashSet<String>,
}

impl MemoryReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_structure(mut self, structure: impl Into<String>) -> Self {
        self.structure = structure.into();
        self
    }

    pub fn with_view_definitions(mut self, sql: impl Into<String>) -> Self {
        self.view_definitions = sql.into();
        self
    }

    pub fn with_table(mut self, table: MemoryTable) -> Self {
        self.tables.push(table);
        self
    }

    /// Makes `read_table` fail for the given table.
    pub fn with_failing_table(mut self, table: impl Into<String>) -> Self {
        self.fail_tables.insert(table.into());
        self
    }

    fn find(&self, name: &str) -> Option<&MemoryTable> {
        self.tables.iter().find(|table| table.name == name)
    }
}

#[async_trait]
impl Reader for MemoryReader {
    async fn get_tables(&self) -> MirrorResult<Vec<String>> {
        Ok(self.tables.iter().map(|table| table.name.clone()).collect())
    }

    async fn get_columns(&self, table: &str) -> MirrorResult<Vec<String>> {
        match self.find(table) {
            Some(table) => Ok(table.columns.clone()),
            None => bail!(ErrorKind::QueryFailed, "unknown table", table),
        }
    }

    async fn get_structure(&self) -> MirrorResult<String> {
        Ok(self.structure.clone())
    }

    async fn get_view_definitions(&self, _spec: &Spec) -> MirrorResult<String> {
        Ok(self.view_definitions.clone())
    }

    async fn read_table(
        &self,
        table: &str,
        sink: RowSink,
        opts: ReadTableOpt,
    ) -> MirrorResult<()> {
        if self.fail_tables.contains(table) {
            bail!(ErrorKind::QueryFailed, "table read failure injected", table);
        }

        let Some(found) = self.find(table) else {
            bail!(ErrorKind::QueryFailed, "unknown table", table);
        };

        let limit = opts.limit.unwrap_or(u64::MAX) as usize;
        for row in found.rows.iter().take(limit) {
            if sink
                .send(TableRow::new(found.name.clone(), row.clone()))
                .await
                .is_err()
            {
                debug!(table, "row sink closed early");
                break;
            }
        }

        Ok(())
    }

    async fn close(&self) -> MirrorResult<()> {
        Ok(())
    }
}
