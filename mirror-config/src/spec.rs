use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Complete dump specification.
///
/// Tables not listed here are dumped in full and untransformed. The `views`
/// map assigns ordering weights to view definitions (lower weights are dumped
/// first) and `matchers` holds named SQL fragments that table filters can
/// reference by name.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Spec {
    #[serde(default)]
    pub tables: Vec<TableConfig>,
    #[serde(default)]
    pub views: HashMap<String, i64>,
    #[serde(default)]
    pub matchers: HashMap<String, String>,
}

impl Spec {
    /// Returns the configuration entry for a table, if any.
    pub fn find_table(&self, name: &str) -> Option<&TableConfig> {
        self.tables.iter().find(|table| table.name == name)
    }

    /// Resolves a filter match expression.
    ///
    /// A value naming an entry in `matchers` is substituted by that fragment;
    /// any other value is used verbatim.
    pub fn resolve_matcher(&self, match_expr: &str) -> String {
        self.matchers
            .get(match_expr)
            .cloned()
            .unwrap_or_else(|| match_expr.to_owned())
    }
}

/// Per-table dump configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TableConfig {
    pub name: String,
    /// Skips the table's rows entirely. The structure is still dumped.
    #[serde(default)]
    pub ignore_data: bool,
    #[serde(default)]
    pub filter: Filter,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    /// Column to anonymisation directive. Directives are `literal:<value>`,
    /// `cond:<expression>` or the name of a faker function. A `BTreeMap`
    /// keeps the application order deterministic.
    #[serde(default)]
    pub anonymise: BTreeMap<String, String>,
}

/// Row selection for a single table.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Filter {
    /// A SQL fragment for the `WHERE` clause, or the name of a matcher.
    #[serde(default, rename = "match")]
    pub match_expr: Option<String>,
    #[serde(default)]
    pub sorts: Vec<Sort>,
    #[serde(default)]
    pub limit: Option<u64>,
}

/// A single `ORDER BY` entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Sort {
    pub column: String,
    #[serde(default)]
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// A foreign key to expand while reading.
///
/// For every row of the configured table, all rows of `referenced_table`
/// whose `referenced_key` equals the row's `foreign_key` value are emitted
/// before the row itself.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Relationship {
    pub foreign_key: String,
    pub referenced_table: String,
    pub referenced_key: String,
}
