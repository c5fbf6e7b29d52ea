use common::model::report::Column;
use std::collections::HashSet;

/// Live query columns merged with the caller's declared columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    /// Query columns first, then declared columns the query did not return.
    pub all_columns: Vec<String>,
    /// Declared columns appended after the query columns, in declared order.
    pub extra_columns: Vec<Column>,
    /// Index into a query row for each retained query column.
    pub result_positions: Vec<usize>,
}

/// Merges query result columns with declared columns.
///
/// Names are unique in `all_columns`: a query column repeated by the query keeps
/// its first occurrence, and a declared column already returned by the query is
/// not appended again.
pub fn reconcile(result_columns: &[String], declared: &[Column]) -> Reconciled {
    let mut seen: HashSet<&str> = HashSet::with_capacity(result_columns.len() + declared.len());
    let mut all_columns = Vec::with_capacity(result_columns.len() + declared.len());
    let mut result_positions = Vec::with_capacity(result_columns.len());

    for (position, name) in result_columns.iter().enumerate() {
        if seen.insert(name.as_str()) {
            all_columns.push(name.clone());
            result_positions.push(position);
        }
    }

    let mut extra_columns = Vec::new();
    for column in declared {
        if seen.insert(column.name.as_str()) {
            all_columns.push(column.name.clone());
            extra_columns.push(column.clone());
        }
    }

    Reconciled {
        all_columns,
        extra_columns,
        result_positions,
    }
}
