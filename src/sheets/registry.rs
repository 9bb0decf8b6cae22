use std::collections::BTreeMap;

/// Field names present in the submission but not yet mapped to a column.
/// Order follows `incoming`; duplicates are dropped.
pub fn diff_fields<'a, I>(existing: &BTreeMap<String, i64>, incoming: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut missing = Vec::new();
    for field in incoming {
        if !existing.contains_key(field) && !missing.iter().any(|f| f == field) {
            missing.push(field.to_string());
        }
    }
    missing
}

/// The maximum start index across all known column positions, or -1 when no
/// columns exist yet. New columns are always inserted to the right of this.
pub fn furthest_column_index(positions_by_field: &BTreeMap<String, i64>) -> i64 {
    positions_by_field.values().copied().max().unwrap_or(-1)
}
