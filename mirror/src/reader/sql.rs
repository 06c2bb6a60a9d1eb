use std::collections::HashMap;
use std::fmt::Write;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use mirror_config::Spec;
use tokio::sync::{mpsc, OnceCell};
use tracing::debug;

use crate::error::{ErrorKind, MirrorError, MirrorResult};
use crate::mirror_error;
use crate::reader::{ReadTableOpt, Reader, RelationshipOpt, RowSink};
use crate::types::{Row, TableRow};

/// Capability contract of a SQL dialect.
///
/// The engine supplies connections, identifier quoting and the discovery
/// queries; [`SqlReader`] builds the shared read behaviour on top of it.
#[async_trait]
pub trait SqlEngine: Send + Sync + 'static {
    /// Returns the names of all user tables.
    async fn fetch_tables(&self) -> MirrorResult<Vec<String>>;

    /// Returns the names of all views.
    async fn fetch_views(&self) -> MirrorResult<Vec<String>>;

    /// Returns the column names of a table in definition order.
    async fn fetch_columns(&self, table: &str) -> MirrorResult<Vec<String>>;

    /// Returns DDL recreating all tables, including the dump preamble.
    async fn fetch_structure(&self) -> MirrorResult<String>;

    /// Returns the body of a view definition.
    async fn fetch_view_body(&self, view: &str) -> MirrorResult<String>;

    /// Returns the comment block and session setup emitted before DDL.
    async fn preamble(&self) -> MirrorResult<String>;

    /// Quotes an identifier for this dialect.
    fn quote_identifier(&self, name: &str) -> String;

    /// Runs a query and streams decoded rows into `out`.
    ///
    /// Rows that fail to decode are logged and skipped. A closed `out`
    /// channel stops the stream without error.
    async fn stream_rows(&self, sql: &str, out: mpsc::Sender<Row>) -> MirrorResult<()>;

    /// Runs a query and collects all decoded rows.
    async fn query_rows(&self, sql: &str) -> MirrorResult<Vec<Row>> {
        let (tx, mut rx) = mpsc::channel(16);

        let (streamed, rows) = tokio::join!(self.stream_rows(sql, tx), async move {
            let mut rows = Vec::new();
            while let Some(row) = rx.recv().await {
                rows.push(row);
            }
            rows
        });
        streamed?;

        Ok(rows)
    }

    async fn close(&self) -> MirrorResult<()>;
}

/// Generic reader over a [`SqlEngine`].
///
/// Holds the table list and per table column caches; concurrent reads share
/// them, tolerating a rare benign double fetch.
pub struct SqlReader<E> {
    engine: Arc<E>,
    tables: OnceCell<Vec<String>>,
    columns: RwLock<HashMap<String, Arc<Vec<String>>>>,
}

impl<E: SqlEngine> SqlReader<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine: Arc::new(engine),
            tables: OnceCell::new(),
            columns: RwLock::new(HashMap::new()),
        }
    }

    async fn columns_for(&self, table: &str) -> MirrorResult<Arc<Vec<String>>> {
        if let Some(columns) = self
            .columns
            .read()
            .expect("column cache lock poisoned")
            .get(table)
        {
            return Ok(Arc::clone(columns));
        }

        let fetched = self.engine.fetch_columns(table).await?;
        if fetched.is_empty() {
            // Dialects report unknown tables as empty column lists.
            return Err(mirror_error!(
                ErrorKind::QueryFailed,
                "no columns found for table",
                table
            ));
        }

        let fetched = Arc::new(fetched);
        let mut cache = self.columns.write().expect("column cache lock poisoned");
        Ok(Arc::clone(
            cache.entry(table.to_owned()).or_insert(fetched),
        ))
    }

    fn format_column(&self, table: &str, column: &str) -> String {
        format!(
            "{}.{}",
            self.engine.quote_identifier(table),
            self.engine.quote_identifier(column)
        )
    }

    fn build_select(&self, table: &str, opts: &ReadTableOpt) -> String {
        let mut sql = format!(
            "SELECT {} FROM {}",
            opts.columns.join(", "),
            self.engine.quote_identifier(table)
        );

        if let Some(match_sql) = &opts.match_sql {
            let _ = write!(sql, " WHERE {match_sql}");
        }

        if !opts.sorts.is_empty() {
            let sorts = opts
                .sorts
                .iter()
                .map(|sort| {
                    format!(
                        "{} {}",
                        self.engine.quote_identifier(&sort.column),
                        if sort.descending { "DESC" } else { "ASC" }
                    )
                })
                .collect::<Vec<_>>()
                .join(", ");
            let _ = write!(sql, " ORDER BY {sorts}");
        }

        if let Some(limit) = opts.limit {
            let _ = write!(sql, " LIMIT {limit}");
        }

        sql
    }

    /// Emits all rows of the referenced table matching the parent's foreign
    /// key value, before the parent row itself.
    async fn publish_related(
        &self,
        relationship: &RelationshipOpt,
        parent: &Row,
        sink: &RowSink,
    ) -> MirrorResult<()> {
        let Some(cell) = parent.get(&relationship.foreign_key) else {
            debug!(
                foreign_key = %relationship.foreign_key,
                "foreign key column missing from row, skipping expansion"
            );
            return Ok(());
        };
        if cell.is_null() {
            return Ok(());
        }

        let key_literal = cell.to_sql_literal()?;
        let columns = self.columns_for(&relationship.referenced_table).await?;

        let projection = columns
            .iter()
            .map(|column| self.format_column(&relationship.referenced_table, column))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {projection} FROM {} WHERE {} = {key_literal}",
            self.engine.quote_identifier(&relationship.referenced_table),
            self.engine.quote_identifier(&relationship.referenced_key),
        );

        let rows = self.engine.query_rows(&sql).await?;
        for row in rows {
            if sink
                .send(TableRow::new(relationship.referenced_table.clone(), row))
                .await
                .is_err()
            {
                break;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl<E: SqlEngine> Reader for SqlReader<E> {
    async fn get_tables(&self) -> MirrorResult<Vec<String>> {
        let tables = self
            .tables
            .get_or_try_init(|| async { self.engine.fetch_tables().await })
            .await?;

        Ok(tables.clone())
    }

    async fn get_columns(&self, table: &str) -> MirrorResult<Vec<String>> {
        Ok(self.columns_for(table).await?.as_ref().clone())
    }

    async fn get_structure(&self) -> MirrorResult<String> {
        self.engine.fetch_structure().await
    }

    async fn get_view_definitions(&self, spec: &Spec) -> MirrorResult<String> {
        let views = self.engine.fetch_views().await?;

        // Stable sort: equal weights keep the discovery order.
        let mut weighted: Vec<(i64, String)> = views
            .into_iter()
            .map(|view| {
                let weight = spec.views.get(&view).copied().unwrap_or(i64::MAX);
                (weight, view)
            })
            .collect();
        weighted.sort_by_key(|(weight, _)| *weight);

        let mut sql = self.engine.preamble().await?;
        for (_, view) in &weighted {
            let body = self.engine.fetch_view_body(view).await?;
            let _ = writeln!(
                sql,
                "CREATE OR REPLACE VIEW {} AS {body};",
                self.engine.quote_identifier(view)
            );
        }

        Ok(sql)
    }

    async fn read_table(
        &self,
        table: &str,
        sink: RowSink,
        mut opts: ReadTableOpt,
    ) -> MirrorResult<()> {
        debug!(table, "reading table data");

        if opts.columns.is_empty() {
            let columns = self.columns_for(table).await.map_err(|err| {
                mirror_error!(err.kind(), "failed to get columns", err)
            })?;
            opts.columns = columns
                .iter()
                .map(|column| self.format_column(table, column))
                .collect();
        }

        let sql = self.build_select(table, &opts);

        let (tx, mut rx) = mpsc::channel::<Row>(1);
        let engine = Arc::clone(&self.engine);
        let query = sql.clone();
        let producer = tokio::spawn(async move { engine.stream_rows(&query, tx).await });

        let mut expansion: MirrorResult<()> = Ok(());
        'publish: while let Some(row) = rx.recv().await {
            for relationship in &opts.relationships {
                if let Err(err) = self.publish_related(relationship, &row, &sink).await {
                    expansion = Err(err);
                    break 'publish;
                }
            }

            if sink.send(TableRow::new(table, row)).await.is_err() {
                // The consumer went away; stop reading.
                break;
            }
        }
        drop(rx);

        let produced = producer.await;
        expansion?;
        match produced {
            Ok(result) => result.map_err(|err| {
                mirror_error!(err.kind(), "failed to query rows", err)
            })?,
            Err(err) => {
                return Err(mirror_error!(
                    ErrorKind::Unknown,
                    "row producer task panicked",
                    err
                ))
            }
        }

        debug!(table, "rows published");

        Ok(())
    }

    async fn close(&self) -> MirrorResult<()> {
        self.engine.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_select_minimal() {
        let reader = SqlReader::new(NoopEngine);
        let opts = ReadTableOpt {
            columns: vec!["`users`.`id`".to_owned()],
            ..Default::default()
        };

        assert_eq!(
            reader.build_select("users", &opts),
            "SELECT `users`.`id` FROM `users`"
        );
    }

    #[test]
    fn test_build_select_full() {
        let reader = SqlReader::new(NoopEngine);
        let opts = ReadTableOpt {
            columns: vec!["`orders`.`id`".to_owned(), "`orders`.`user_id`".to_owned()],
            match_sql: Some("created_at > '2020-01-01'".to_owned()),
            sorts: vec![crate::reader::SortOpt {
                column: "id".to_owned(),
                descending: true,
            }],
            limit: Some(10),
            relationships: Vec::new(),
        };

        assert_eq!(
            reader.build_select("orders", &opts),
            "SELECT `orders`.`id`, `orders`.`user_id` FROM `orders` \
             WHERE created_at > '2020-01-01' ORDER BY `id` DESC LIMIT 10"
        );
    }

    struct NoopEngine;

    #[async_trait]
    impl SqlEngine for NoopEngine {
        async fn fetch_tables(&self) -> MirrorResult<Vec<String>> {
            Ok(Vec::new())
        }
        async fn fetch_views(&self) -> MirrorResult<Vec<String>> {
            Ok(Vec::new())
        }
        async fn fetch_columns(&self, _table: &str) -> MirrorResult<Vec<String>> {
            Ok(Vec::new())
        }
        async fn fetch_structure(&self) -> MirrorResult<String> {
            Ok(String::new())
        }
        async fn fetch_view_body(&self, _view: &str) -> MirrorResult<String> {
            Ok(String::new())
        }
        async fn preamble(&self) -> MirrorResult<String> {
            Ok(String::new())
        }
        fn quote_identifier(&self, name: &str) -> String {
            crate::types::quote_identifier(name)
        }
        async fn stream_rows(&self, _sql: &str, _out: mpsc::Sender<Row>) -> MirrorResult<()> {
            Ok(())
        }
        async fn close(&self) -> MirrorResult<()> {
            Ok(())
        }
    }
}
