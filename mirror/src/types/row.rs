use super::Cell;

/// An ordered mapping from column name to [`Cell`].
///
/// Column order is preserved exactly as the reader produced it; transformers
/// rely on that to keep the output schema stable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    entries: Vec<(String, Cell)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a row from `(column, cell)` pairs, keeping their order.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, Cell)>,
        S: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(column, cell)| (column.into(), cell))
                .collect(),
        }
    }

    /// Appends a column. Callers are expected to keep names unique.
    pub fn push(&mut self, column: impl Into<String>, cell: Cell) {
        self.entries.push((column.into(), cell));
    }

    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.entries
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, cell)| cell)
    }

    /// Replaces the value of an existing column, preserving its position.
    ///
    /// Returns `false` when the column does not exist; the row is left
    /// untouched so the column set never changes through mutation.
    pub fn set(&mut self, column: &str, cell: Cell) -> bool {
        match self.entries.iter_mut().find(|(name, _)| name == column) {
            Some((_, slot)) => {
                *slot = cell;
                true
            }
            None => false,
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.entries
            .iter()
            .map(|(name, cell)| (name.as_str(), cell))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_preserved() {
        let row = Row::from_pairs([
            ("id", Cell::I64(1)),
            ("email", Cell::String("a@b".to_owned())),
            ("name", Cell::Null),
        ]);

        let columns: Vec<_> = row.columns().collect();
        assert_eq!(columns, vec!["id", "email", "name"]);
    }

    #[test]
    fn test_get_and_set() {
        let mut row = Row::from_pairs([("id", Cell::I64(1)), ("email", Cell::Null)]);

        assert_eq!(row.get("id"), Some(&Cell::I64(1)));
        assert!(row.set("email", Cell::String("x@y".to_owned())));
        assert_eq!(row.get("email"), Some(&Cell::String("x@y".to_owned())));
    }

    #[test]
    fn test_set_missing_column_is_rejected() {
        let mut row = Row::from_pairs([("id", Cell::I64(1))]);

        assert!(!row.set("ghost", Cell::Null));
        assert_eq!(row.len(), 1);
        assert!(row.get("ghost").is_none());
    }
}
