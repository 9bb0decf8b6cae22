use std::collections::BTreeMap;

use serde_json::Value;

/// A growable-by-index row. Assigning index `i` past the current length
/// extends the row with empty cells first, so writes can arrive sparse and
/// out of order while cells stay aligned to their column positions.
#[derive(Debug, Default)]
pub struct SparseRow {
    cells: Vec<Option<String>>,
}

impl SparseRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, index: usize, value: String) {
        if index >= self.cells.len() {
            self.cells.resize(index + 1, None);
        }
        self.cells[index] = Some(value);
    }

    /// Extend with empty cells up to `len` without overwriting anything.
    pub fn ensure_len(&mut self, len: usize) {
        if len > self.cells.len() {
            self.cells.resize(len, None);
        }
    }

    pub fn into_cells(self) -> Vec<Option<String>> {
        self.cells
    }
}

/// Build one output row from a position -> field name map and the
/// submission's data. Cells are placed strictly by column position, never by
/// encounter order, so columns cannot shift relative to their headers.
pub fn build_row(
    position_to_field: &BTreeMap<i64, String>,
    data: &serde_json::Map<String, Value>,
) -> Vec<Option<String>> {
    let mut row = SparseRow::new();
    for (&position, field) in position_to_field {
        if position < 0 {
            continue;
        }
        if let Some(value) = data.get(field) {
            row.set(position as usize, cell_value(value));
        }
    }
    // The row spans every mapped column, so trailing absent fields still
    // produce empty cells and the length is always highest position + 1.
    if let Some(&highest) = position_to_field.keys().next_back() {
        if highest >= 0 {
            row.ensure_len(highest as usize + 1);
        }
    }
    row.into_cells()
}

/// Render one submitted value as a cell. Lists are joined; everything else
/// that is not already a string is serialized.
pub fn cell_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn positions(pairs: &[(i64, &str)]) -> BTreeMap<i64, String> {
        pairs.iter().map(|(i, f)| (*i, f.to_string())).collect()
    }

    fn data(value: Value) -> serde_json::Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn sparse_row_null_fills_gaps() {
        let mut row = SparseRow::new();
        row.set(3, "d".into());
        row.set(0, "a".into());
        assert_eq!(
            row.into_cells(),
            vec![Some("a".to_string()), None, None, Some("d".to_string())]
        );
    }

    #[test]
    fn builds_by_position_not_encounter_order() {
        let pos = positions(&[(0, "name"), (2, "email")]);
        let row = build_row(&pos, &data(json!({"name": "Alice"})));
        assert_eq!(row, vec![Some("Alice".to_string()), None, None]);
    }

    #[test]
    fn absent_fields_leave_cells_empty() {
        let pos = positions(&[(0, "a"), (1, "b"), (4, "c")]);
        let row = build_row(&pos, &data(json!({"a": "1", "c": "3"})));
        assert_eq!(
            row,
            vec![
                Some("1".to_string()),
                None,
                None,
                None,
                Some("3".to_string())
            ]
        );
    }

    #[test]
    fn row_spans_all_mapped_columns_even_when_trailing_fields_are_absent() {
        let pos = positions(&[(0, "name"), (2, "email")]);
        let row = build_row(&pos, &data(json!({"name": "Alice"})));
        assert_eq!(row.len(), 3);
        assert_eq!(row, vec![Some("Alice".to_string()), None, None]);

        // Nothing submitted at all still yields a full-width empty row.
        let row = build_row(&pos, &data(json!({})));
        assert_eq!(row, vec![None, None, None]);
    }

    #[test]
    fn list_values_are_joined() {
        assert_eq!(cell_value(&json!(["x", "y"])), "x, y");
        assert_eq!(cell_value(&json!(42)), "42");
        assert_eq!(cell_value(&json!("plain")), "plain");
    }
}
