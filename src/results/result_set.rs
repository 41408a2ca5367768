use std::sync::Arc;

use crate::types::SqlValue;

use super::row::{Row, index_columns};

/// Successful outcome of one statement
///
/// `insert_id` is only reported by engines for inserts; `rows` is empty for
/// statements that return no data.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    /// Row id generated by an INSERT, when the engine reports one
    pub insert_id: Option<i64>,
    /// The number of rows affected (for DML statements)
    pub rows_affected: usize,
    /// The rows returned by the statement
    pub rows: Vec<Row>,
    column_names: Arc<Vec<String>>,
}

impl ResultSet {
    /// Build a result set from engine columns and positional row values.
    #[must_use]
    pub fn from_columns(
        insert_id: Option<i64>,
        rows_affected: usize,
        column_names: Vec<String>,
        rows: Vec<Vec<SqlValue>>,
    ) -> Self {
        let column_names = Arc::new(column_names);
        let column_index = Arc::new(index_columns(&column_names));
        let rows = rows
            .into_iter()
            .map(|values| {
                Row::with_shared_index(
                    Arc::clone(&column_names),
                    Arc::clone(&column_index),
                    values,
                )
            })
            .collect();
        Self {
            insert_id,
            rows_affected,
            rows,
            column_names,
        }
    }

    /// Get the column names for this result set
    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    #[must_use]
    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_addressable_by_name_and_position() {
        let set = ResultSet::from_columns(
            None,
            0,
            vec!["id".into(), "name".into()],
            vec![
                vec![SqlValue::Int(1), SqlValue::Text("alice".into())],
                vec![SqlValue::Int(2), SqlValue::Null],
            ],
        );

        assert_eq!(set.len(), 2);
        assert_eq!(set.column_names(), ["id", "name"]);
        let second = set.row(1).expect("second row");
        assert_eq!(second.get("id"), Some(&SqlValue::Int(2)));
        assert_eq!(second.get_by_index(1), Some(&SqlValue::Null));
        assert_eq!(second.get("missing"), None);
        assert_eq!(set.rows[0].get("name").and_then(SqlValue::as_text), Some("alice"));
    }

    #[test]
    fn duplicate_columns_resolve_to_last() {
        let row = Row::new(
            Arc::new(vec!["v".into(), "v".into()]),
            vec![SqlValue::Int(1), SqlValue::Int(2)],
        );
        assert_eq!(row.get("v"), Some(&SqlValue::Int(2)));
        assert_eq!(row.len(), 2);
    }
}
