use std::sync::Arc;

use mirror_config::{Spec, TableConfig};
use regex::Regex;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::bail;
use crate::dumper::Dumper;
use crate::error::{ErrorKind, MirrorError, MirrorResult};
use crate::mirror_error;
use crate::reader::{ReadTableOpt, Reader, RelationshipOpt, SortOpt};
use crate::types::TableRow;

/// Orchestrates a dump: structure first, then per table read and dump task
/// pairs under a concurrency bound, then the post hook.
pub struct Engine {
    reader: Arc<dyn Reader>,
    dumper: Arc<dyn Dumper>,
}

impl Engine {
    pub fn new(reader: Arc<dyn Reader>, dumper: Arc<dyn Dumper>) -> Self {
        Self { reader, dumper }
    }

    /// Executes the dump process.
    ///
    /// Structure and hook failures are fatal. A single table failing to read
    /// or dump is logged and does not stop the other tables. The returned
    /// future completes only after every table task has finished and the
    /// post hook has run; task panics are aggregated into the error.
    pub async fn dump(&self, spec: &Spec, concurrency: usize) -> MirrorResult<()> {
        debug!("dumping structure...");
        let structure = self
            .reader
            .get_structure()
            .await
            .map_err(|err| mirror_error!(err.kind(), "failed to get structure", err))?;
        self.dumper
            .dump_structure(&structure)
            .await
            .map_err(|err| mirror_error!(err.kind(), "failed to dump structure", err))?;
        debug!("structure was dumped");

        let tables = self.reader.get_tables().await?;

        self.dumper
            .pre_dump_tables(&tables)
            .await
            .map_err(|err| mirror_error!(err.kind(), "failed to execute pre dump tables", err))?;

        // One permit per table, held from launch until its dump task exits.
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut tasks: Vec<JoinHandle<()>> = Vec::new();

        for table in &tables {
            let config = spec.find_table(table);
            if config.is_some_and(|config| config.ignore_data) {
                debug!(table, "ignoring table data");
                continue;
            }

            let opts = read_table_opt(spec, config);

            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|err| {
                    mirror_error!(ErrorKind::Unknown, "concurrency gate closed", err)
                })?;
            let (row_tx, row_rx) = mpsc::channel::<TableRow>(1);

            let dumper = Arc::clone(&self.dumper);
            let dump_table = table.clone();
            tasks.push(tokio::spawn(async move {
                if let Err(err) = dumper.dump_table(&dump_table, row_rx).await {
                    error!(table = %dump_table, %err, "failed to dump table");
                }
                drop(permit);
            }));

            let reader = Arc::clone(&self.reader);
            let read_table = table.clone();
            tasks.push(tokio::spawn(async move {
                if let Err(err) = reader.read_table(&read_table, row_tx, opts).await {
                    error!(table = %read_table, %err, "failed to read table");
                }
            }));
        }

        let mut panics = Vec::new();
        for task in tasks {
            if let Err(err) = task.await {
                panics.push(mirror_error!(
                    ErrorKind::Unknown,
                    "table dump task panicked",
                    err
                ));
            }
        }
        if !panics.is_empty() {
            return Err(MirrorError::many(panics));
        }

        self.dumper
            .post_dump_tables(&tables)
            .await
            .map_err(|err| mirror_error!(err.kind(), "failed to execute post dump tables", err))?;

        Ok(())
    }

    /// Dumps view definitions, rewriting qualified identifiers from the
    /// source database prefix to the destination one.
    pub async fn dump_views(
        &self,
        spec: &Spec,
        source_db_prefix: &str,
        destination_db_prefix: &str,
    ) -> MirrorResult<()> {
        debug!("dumping views...");

        let sql = self
            .reader
            .get_view_definitions(spec)
            .await
            .map_err(|err| mirror_error!(err.kind(), "failed to get view definitions", err))?;

        if source_db_prefix.is_empty() {
            bail!(
                ErrorKind::ConfigError,
                "view dumping requires a source database prefix"
            );
        }

        let rewritten = rewrite_database_prefix(&sql, source_db_prefix, destination_db_prefix)?;

        self.dumper
            .dump_view_definitions(&rewritten)
            .await
            .map_err(|err| mirror_error!(err.kind(), "failed to dump view definitions", err))?;

        debug!("views were dumped");

        Ok(())
    }

    pub async fn close(&self) -> MirrorResult<()> {
        self.dumper.close().await
    }
}

/// Builds the read options for a table from its configuration.
fn read_table_opt(spec: &Spec, config: Option<&TableConfig>) -> ReadTableOpt {
    let Some(config) = config else {
        return ReadTableOpt::default();
    };

    ReadTableOpt {
        columns: Vec::new(),
        match_sql: config
            .filter
            .match_expr
            .as_ref()
            .map(|expr| spec.resolve_matcher(expr)),
        sorts: config
            .filter
            .sorts
            .iter()
            .map(|sort| SortOpt {
                column: sort.column.clone(),
                descending: sort.direction == mirror_config::SortDirection::Desc,
            })
            .collect(),
        limit: config.filter.limit,
        relationships: config
            .relationships
            .iter()
            .map(|relationship| RelationshipOpt {
                foreign_key: relationship.foreign_key.clone(),
                referenced_table: relationship.referenced_table.clone(),
                referenced_key: relationship.referenced_key.clone(),
            })
            .collect(),
    }
}

/// Rewrites every backtick qualified identifier whose schema starts with
/// `source_prefix`, substituting the prefix once per match.
fn rewrite_database_prefix(
    sql: &str,
    source_prefix: &str,
    destination_prefix: &str,
) -> MirrorResult<String> {
    let pattern = format!("`{}[^`]+?`\\.`[^`]+?`", regex::escape(source_prefix));
    let re = Regex::new(&pattern).map_err(|err| {
        mirror_error!(
            ErrorKind::ConfigError,
            "invalid source database prefix",
            err
        )
    })?;

    Ok(re
        .replace_all(sql, |caps: &regex::Captures<'_>| {
            caps[0].replacen(source_prefix, destination_prefix, 1)
        })
        .into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirror_config::{Filter, Sort, SortDirection};

    #[test]
    fn test_rewrite_database_prefix() {
        let sql = "CREATE OR REPLACE VIEW `v` AS SELECT * FROM `app_dev_shop`.`customers`;";
        let rewritten = rewrite_database_prefix(sql, "app_dev", "app_prod").unwrap();
        assert_eq!(
            rewritten,
            "CREATE OR REPLACE VIEW `v` AS SELECT * FROM `app_prod_shop`.`customers`;"
        );
    }

    #[test]
    fn test_rewrite_is_identity_for_equal_prefixes() {
        let sql = "SELECT * FROM `app_dev_shop`.`customers` JOIN `app_dev_crm`.`leads`";
        assert_eq!(
            rewrite_database_prefix(sql, "app_dev", "app_dev").unwrap(),
            sql
        );
    }

    #[test]
    fn test_rewrite_leaves_other_prefixes_alone() {
        let sql = "SELECT * FROM `other_shop`.`customers`";
        assert_eq!(
            rewrite_database_prefix(sql, "app_dev", "app_prod").unwrap(),
            sql
        );
    }

    #[test]
    fn test_rewrite_substitutes_first_occurrence_only() {
        let sql = "SELECT * FROM `app_dev_app_dev`.`t`";
        assert_eq!(
            rewrite_database_prefix(sql, "app_dev", "x").unwrap(),
            "SELECT * FROM `x_app_dev`.`t`"
        );
    }

    #[test]
    fn test_read_table_opt_resolves_matchers() {
        let mut spec = Spec::default();
        spec.matchers
            .insert("active".to_owned(), "deleted_at IS NULL".to_owned());

        let config = TableConfig {
            name: "users".to_owned(),
            filter: Filter {
                match_expr: Some("active".to_owned()),
                sorts: vec![Sort {
                    column: "id".to_owned(),
                    direction: SortDirection::Desc,
                }],
                limit: Some(50),
            },
            ..Default::default()
        };

        let opts = read_table_opt(&spec, Some(&config));
        assert_eq!(opts.match_sql.as_deref(), Some("deleted_at IS NULL"));
        assert!(opts.sorts[0].descending);
        assert_eq!(opts.limit, Some(50));
    }

    #[test]
    fn test_read_table_opt_without_config() {
        let opts = read_table_opt(&Spec::default(), None);
        assert!(opts.columns.is_empty());
        assert!(opts.match_sql.is_none());
        assert!(opts.relationships.is_empty());
    }
}
