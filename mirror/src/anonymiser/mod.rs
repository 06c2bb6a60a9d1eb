//! Anonymising reader decorator.
//!
//! [`Anonymiser`] wraps another [`Reader`] and rewrites configured cells as
//! rows flow through. Tables without anonymisation rules are delegated to the
//! wrapped reader untouched; transformed tables go through an intermediate
//! single slot channel and a forwarding task, so at most one row is in flight
//! and row order is preserved.

pub mod faker;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mirror_config::{Spec, TableConfig};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{MirrorError, MirrorResult};
use crate::expr::{self, Program, Value};
use crate::mirror_error;
use crate::reader::{ReadTableOpt, Reader, RowSink};
use crate::types::{Cell, Row, TableRow};

/// Prefix marking a literal replacement directive.
const LITERAL_PREFIX: &str = "literal:";
/// Prefix marking a conditional rule directive.
const CONDITIONAL_PREFIX: &str = "cond:";

/// Key of a compiled rule: table name and column name.
type RuleKey = (String, String);

/// A reader decorator that anonymises configured columns.
pub struct Anonymiser {
    inner: Arc<dyn Reader>,
    tables: Vec<TableConfig>,
    /// Compiled conditional rules. `None` marks a rule whose compilation
    /// failed; it never fires and is never recompiled.
    rules: Mutex<HashMap<RuleKey, Option<Arc<Program>>>>,
}

impl Anonymiser {
    pub fn new(inner: Arc<dyn Reader>, tables: Vec<TableConfig>) -> Self {
        Self {
            inner,
            tables,
            rules: Mutex::new(HashMap::new()),
        }
    }

    /// Compiles the table's conditional rules on first use and returns the
    /// live programs keyed by column.
    fn compiled_programs(&self, config: &TableConfig) -> HashMap<String, Arc<Program>> {
        let mut rules = self.rules.lock().expect("rule cache lock poisoned");
        let mut programs = HashMap::new();

        for (column, directive) in &config.anonymise {
            let Some(source) = directive.strip_prefix(CONDITIONAL_PREFIX) else {
                continue;
            };

            let key = (config.name.clone(), column.clone());
            let entry = rules.entry(key).or_insert_with(|| match expr::compile(source) {
                Ok(program) => Some(Arc::new(program)),
                Err(err) => {
                    warn!(
                        table = %config.name,
                        column = %column,
                        %err,
                        "conditional rule compilation failed, rule dropped"
                    );
                    None
                }
            });

            if let Some(program) = entry {
                programs.insert(column.clone(), Arc::clone(program));
            }
        }

        programs
    }
}

#[async_trait]
impl Reader for Anonymiser {
    async fn get_tables(&self) -> MirrorResult<Vec<String>> {
        self.inner.get_tables().await
    }

    async fn get_columns(&self, table: &str) -> MirrorResult<Vec<String>> {
        self.inner.get_columns(table).await
    }

    async fn get_structure(&self) -> MirrorResult<String> {
        self.inner.get_structure().await
    }

    async fn get_view_definitions(&self, spec: &Spec) -> MirrorResult<String> {
        self.inner.get_view_definitions(spec).await
    }

    async fn read_table(
        &self,
        table: &str,
        sink: RowSink,
        opts: ReadTableOpt,
    ) -> MirrorResult<()> {
        let Some(config) = self.tables.iter().find(|config| config.name == table) else {
            debug!(table, "table is not configured for anonymisation");
            return self.inner.read_table(table, sink, opts).await;
        };

        if config.anonymise.is_empty() {
            debug!(table, "no anonymisation directives, skipping");
            return self.inner.read_table(table, sink, opts).await;
        }

        let programs = self.compiled_programs(config);
        let directives = config.anonymise.clone();
        let table_name = config.name.clone();

        // The forwarding task owns the downstream sink. It closes it by
        // dropping it once the intermediate channel closes, which happens
        // when the wrapped reader returns.
        let (raw_tx, mut raw_rx) = mpsc::channel::<TableRow>(1);
        let forward = tokio::spawn(async move {
            while let Some(mut item) = raw_rx.recv().await {
                // Relationship expansion interleaves rows of other tables;
                // only rows of the configured table are transformed.
                if item.table == table_name {
                    apply_directives(&table_name, &mut item.row, &directives, &programs);
                }
                if sink.send(item).await.is_err() {
                    break;
                }
            }
        });

        let result = self.inner.read_table(table, raw_tx, opts).await;
        let _ = forward.await;

        result.map_err(|err| {
            mirror_error!(err.kind(), "anonymiser failed while reading table", err)
        })
    }

    async fn close(&self) -> MirrorResult<()> {
        self.inner.close().await
    }
}

/// Applies the table's directives to one row in place.
///
/// The column set and order never change: directives naming columns the row
/// does not have are ignored.
fn apply_directives(
    table: &str,
    row: &mut Row,
    directives: &std::collections::BTreeMap<String, String>,
    programs: &HashMap<String, Arc<Program>>,
) {
    for (column, directive) in directives {
        if let Some(literal) = directive.strip_prefix(LITERAL_PREFIX) {
            row.set(column, Cell::String(literal.to_owned()));
            continue;
        }

        if directive.starts_with(CONDITIONAL_PREFIX) {
            let Some(program) = programs.get(column) else {
                // Dead rule: compilation failed earlier.
                continue;
            };
            let Some(current) = row.get(column).cloned() else {
                continue;
            };

            match program.run(row, &current) {
                Ok(Value::Option(Some(replacement))) => match replacement.into_cell() {
                    Some(cell) => {
                        row.set(column, cell);
                    }
                    None => {
                        warn!(table, column, "conditional rule produced a non scalar value");
                    }
                },
                Ok(Value::Option(None)) => {}
                Ok(other) => {
                    warn!(
                        table,
                        column,
                        result = other.type_name(),
                        "conditional rule must return an option"
                    );
                }
                Err(err) => {
                    warn!(table, column, %err, "conditional rule evaluation failed");
                }
            }
            continue;
        }

        if row.get(column).is_some() {
            row.set(column, Cell::String(faker::anonymise(directive)));
        }
    }
}
