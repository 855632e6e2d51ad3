//! Folds the rows a non-relational statement returns straight into
//! [`Record`]s, without going through the JOIN-aware deserializer.
//! `SELECT *` surfaces raw, physical (snake_case) column names; callers
//! of `execute_query_as_maps` expect the same camelCase field names a
//! relational query's aliases already use, so this module folds one to
//! the other. Computed-field aliases and any already-camelCase column
//! both pass through unchanged, since the fold is a no-op on a name with
//! no underscores.

use driver_adapter::SqlResultSet;
use query_builder::{Record, RecordValue};

pub(crate) fn snake_to_camel(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for ch in name.chars() {
        if ch == '_' {
            upper_next = true;
            continue;
        }
        if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// Builds flat [`Record`]s (no relation nesting) from a result set whose
/// columns are plain table columns rather than JOIN-aliased ones.
pub(crate) fn flat_records(result: &SqlResultSet) -> Vec<Record> {
    result
        .rows
        .iter()
        .map(|row| {
            result
                .column_names
                .iter()
                .zip(row.iter())
                .map(|(name, value)| (snake_to_camel(name), RecordValue::Scalar(value.clone())))
                .collect::<Record>()
        })
        .collect()
}
