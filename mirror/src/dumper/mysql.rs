//! MySQL destination dumper.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mysql_async::prelude::Queryable;
use mysql_async::{Opts, OptsBuilder, Pool, PoolConstraints, PoolOpts};
use tokio::sync::mpsc;
use tracing::debug;

use crate::conn::ConnOpts;
use crate::dumper::{Dumper, DumperDriver};
use crate::error::{ErrorKind, MirrorError, MirrorResult};
use crate::mirror_error;
use crate::types::{quote_identifier, Row, TableRow};

/// Rows gathered into one multi row `INSERT`.
const INSERT_BATCH_SIZE: usize = 100;

/// Write side driver for `mysql://` DSNs.
pub struct MysqlDumperDriver;

#[async_trait]
impl DumperDriver for MysqlDumperDriver {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn is_supported(&self, dsn: &str) -> bool {
        dsn.starts_with("mysql://")
    }

    async fn new_connection(&self, opts: &ConnOpts) -> MirrorResult<Arc<dyn Dumper>> {
        Ok(Arc::new(MysqlDumper::connect(opts)?))
    }
}

/// Writes structure and rows into another MySQL database.
pub struct MysqlDumper {
    pool: Pool,
    timeout: Duration,
}

impl MysqlDumper {
    pub fn connect(opts: &ConnOpts) -> MirrorResult<Self> {
        let url_opts = Opts::from_url(&opts.dsn)
            .map_err(|err| mirror_error!(ErrorKind::ConfigError, "invalid MySQL DSN", err))?;

        let constraints = PoolConstraints::new(opts.max_idle_conns, opts.max_conns.max(1))
            .ok_or_else(|| {
                mirror_error!(
                    ErrorKind::ConfigError,
                    "max idle connections exceeds max connections"
                )
            })?;

        let mut builder = OptsBuilder::from_opts(url_opts)
            .pool_opts(PoolOpts::default().with_constraints(constraints));
        if !opts.max_conn_lifetime.is_zero() {
            builder = builder.conn_ttl(Some(opts.max_conn_lifetime));
        }

        Ok(Self {
            pool: Pool::new(builder),
            timeout: opts.timeout,
        })
    }

    async fn with_timeout<T, F>(&self, fut: F) -> MirrorResult<T>
    where
        F: std::future::Future<Output = MirrorResult<T>>,
    {
        if self.timeout.is_zero() {
            return fut.await;
        }

        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(mirror_error!(
                ErrorKind::OperationTimedOut,
                "database operation timed out",
                format!("{:?}", self.timeout)
            )),
        }
    }

    /// Executes a script statement by statement.
    async fn run_script(&self, sql: &str) -> MirrorResult<()> {
        let mut conn = self.pool.get_conn().await?;

        for statement in sql_statements(sql) {
            self.with_timeout(async {
                conn.query_drop(&statement)
                    .await
                    .map_err(|err| mirror_error!(ErrorKind::DumpWriteFailed, "failed to execute statement", err))
            })
            .await?;
        }

        Ok(())
    }

    async fn insert_batch(
        &self,
        conn: &mut mysql_async::Conn,
        table: &str,
        batch: &[Row],
    ) -> MirrorResult<()> {
        let Some(first) = batch.first() else {
            return Ok(());
        };

        let columns = first
            .columns()
            .map(quote_identifier)
            .collect::<Vec<_>>()
            .join(", ");

        let mut tuples = Vec::with_capacity(batch.len());
        for row in batch {
            let values = row
                .iter()
                .map(|(_, cell)| cell.to_sql_literal())
                .collect::<MirrorResult<Vec<_>>>()?
                .join(", ");
            tuples.push(format!("({values})"));
        }

        let statement = format!(
            "INSERT INTO {} ({columns}) VALUES {}",
            quote_identifier(table),
            tuples.join(", ")
        );

        self.with_timeout(async {
            conn.query_drop(&statement).await.map_err(|err| {
                mirror_error!(ErrorKind::DumpWriteFailed, "failed to insert rows", err)
            })
        })
        .await
    }
}

#[async_trait]
impl Dumper for MysqlDumper {
    async fn dump_structure(&self, sql: &str) -> MirrorResult<()> {
        self.run_script(sql).await
    }

    async fn dump_view_definitions(&self, sql: &str) -> MirrorResult<()> {
        self.run_script(sql).await
    }

    async fn dump_table(
        &self,
        table: &str,
        mut rows: mpsc::Receiver<TableRow>,
    ) -> MirrorResult<()> {
        let mut conn = self.pool.get_conn().await?;

        // Rows of referenced tables arrive before the row that points at
        // them, so key checks stay off for this connection.
        conn.query_drop("SET FOREIGN_KEY_CHECKS=0")
            .await
            .map_err(MirrorError::from)?;

        let mut batch: Vec<Row> = Vec::with_capacity(INSERT_BATCH_SIZE);
        let mut batch_table = table.to_owned();
        let mut written = 0usize;

        while let Some(item) = rows.recv().await {
            // Relationship expansion interleaves other tables into the
            // stream; flush whenever the target table changes.
            if item.table != batch_table || batch.len() >= INSERT_BATCH_SIZE {
                self.insert_batch(&mut conn, &batch_table, &batch).await?;
                written += batch.len();
                batch.clear();
                batch_table = item.table.clone();
            }
            batch.push(item.row);
        }

        self.insert_batch(&mut conn, &batch_table, &batch).await?;
        written += batch.len();

        debug!(table, written, "table rows written");

        Ok(())
    }

    async fn pre_dump_tables(&self, _tables: &[String]) -> MirrorResult<()> {
        self.run_script("SET FOREIGN_KEY_CHECKS=0;\n").await
    }

    async fn post_dump_tables(&self, _tables: &[String]) -> MirrorResult<()> {
        self.run_script("SET FOREIGN_KEY_CHECKS=1;\n").await
    }

    async fn close(&self) -> MirrorResult<()> {
        self.pool.clone().disconnect().await?;
        Ok(())
    }
}

/// Splits a dump script into executable statements, dropping comment lines.
fn sql_statements(sql: &str) -> Vec<String> {
    let without_comments = sql
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n");

    without_comments
        .split(';')
        .map(str::trim)
        .filter(|statement| !statement.is_empty())
        .map(str::to_owned)
        .collect()
}
