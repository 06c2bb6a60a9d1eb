//! Textual SQL dumper writing to stdout, stderr or a file.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex};

use crate::bail;
use crate::conn::ConnOpts;
use crate::dumper::{Dumper, DumperDriver};
use crate::error::{ErrorKind, MirrorError, MirrorResult};
use crate::mirror_error;
use crate::types::{quote_identifier, TableRow};

/// Write side driver for `os://stdout`, `os://stderr` and `file://` DSNs.
pub struct TextDumperDriver;

#[async_trait]
impl DumperDriver for TextDumperDriver {
    fn name(&self) -> &'static str {
        "text"
    }

    fn is_supported(&self, dsn: &str) -> bool {
        let dsn = dsn.trim_end_matches('/');
        dsn == "os://stdout" || dsn == "os://stderr" || dsn.starts_with("file://")
    }

    async fn new_connection(&self, opts: &ConnOpts) -> MirrorResult<Arc<dyn Dumper>> {
        Ok(Arc::new(TextDumper::open(&opts.dsn).await?))
    }
}

type Writer = Box<dyn AsyncWrite + Send + Unpin>;

/// Writes DDL and row `INSERT` statements as SQL text.
///
/// Concurrent table dumps share one output stream; each statement is written
/// under a lock so statements never interleave mid-line.
pub struct TextDumper {
    writer: Arc<Mutex<Writer>>,
}

impl TextDumper {
    pub async fn open(dsn: &str) -> MirrorResult<Self> {
        let dsn = dsn.trim_end_matches('/');

        let writer: Writer = if dsn == "os://stdout" {
            Box::new(tokio::io::stdout())
        } else if dsn == "os://stderr" {
            Box::new(tokio::io::stderr())
        } else if let Some(path) = dsn.strip_prefix("file://") {
            Box::new(tokio::fs::File::create(path).await.map_err(|err| {
                mirror_error!(ErrorKind::IoError, "failed to create dump file", err)
            })?)
        } else {
            bail!(ErrorKind::ConfigError, "unsupported text dump DSN", dsn);
        };

        Ok(Self {
            writer: Arc::new(Mutex::new(writer)),
        })
    }

    async fn write_all(&self, text: &str) -> MirrorResult<()> {
        let mut writer = self.writer.lock().await;
        writer
            .write_all(text.as_bytes())
            .await
            .map_err(|err| mirror_error!(ErrorKind::DumpWriteFailed, "failed to write dump", err))
    }
}

#[async_trait]
impl Dumper for TextDumper {
    async fn dump_structure(&self, sql: &str) -> MirrorResult<()> {
        self.write_all(sql).await?;
        self.write_all("\n").await
    }

    async fn dump_view_definitions(&self, sql: &str) -> MirrorResult<()> {
        self.write_all(sql).await?;
        self.write_all("\n").await
    }

    async fn dump_table(
        &self,
        _table: &str,
        mut rows: mpsc::Receiver<TableRow>,
    ) -> MirrorResult<()> {
        while let Some(item) = rows.recv().await {
            let statement = insert_statement(&item)?;
            self.write_all(&statement).await?;
        }

        let mut writer = self.writer.lock().await;
        writer
            .flush()
            .await
            .map_err(|err| mirror_error!(ErrorKind::DumpWriteFailed, "failed to flush dump", err))
    }

    async fn close(&self) -> MirrorResult<()> {
        let mut writer = self.writer.lock().await;
        writer
            .flush()
            .await
            .map_err(|err| mirror_error!(ErrorKind::DumpWriteFailed, "failed to flush dump", err))
    }
}

/// Renders one row as a single row `INSERT` statement.
fn insert_statement(item: &TableRow) -> MirrorResult<String> {
    let columns = item
        .row
        .columns()
        .map(quote_identifier)
        .collect::<Vec<_>>()
        .join(", ");
    let values = item
        .row
        .iter()
        .map(|(_, cell)| cell.to_sql_literal())
        .collect::<MirrorResult<Vec<_>>>()?
        .join(", ");

    Ok(format!(
        "INSERT INTO {} ({columns}) VALUES ({values});\n",
        quote_identifier(&item.table)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Cell, Row};

    #[test]
    fn test_driver_dsn_support() {
        let driver = TextDumperDriver;
        assert!(driver.is_supported("os://stdout"));
        assert!(driver.is_supported("os://stdout/"));
        assert!(driver.is_supported("os://stderr"));
        assert!(driver.is_supported("file:///tmp/dump.sql"));
        assert!(!driver.is_supported("mysql://localhost/app"));
    }

    #[test]
    fn test_insert_statement() {
        let item = TableRow::new(
            "users",
            Row::from_pairs([
                ("id", Cell::I64(1)),
                ("email", Cell::String("a@b".to_owned())),
                ("deleted_at", Cell::Null),
            ]),
        );

        assert_eq!(
            insert_statement(&item).unwrap(),
            "INSERT INTO `users` (`id`, `email`, `deleted_at`) VALUES (1, 'a@b', NULL);\n"
        );
    }

    #[test]
    fn test_insert_statement_rejects_non_finite_floats() {
        let item = TableRow::new("m", Row::from_pairs([("value", Cell::F64(f64::NAN))]));
        let err = insert_statement(&item).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCellValue);
    }
}
