//! Decoding of the flat bulk-edit form into a row/column grid.
//!
//! Every edited cell arrives as its own field named `data[<row>][<COLUMN>]`.
//! The grammar is strict: the row is a canonical non-negative integer and the
//! column is a non-empty token without brackets. Anything else is not a cell
//! and is skipped. Values are kept verbatim; typing happens when the update
//! is synthesized.

use std::collections::BTreeMap;

/// Form field carrying the target table, consumed before the cells.
pub const TABLE_FIELD: &str = "table";

const KEY_PREFIX: &str = "data[";

/// Submitted values keyed by row index, then column name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditGrid {
    rows: BTreeMap<usize, BTreeMap<String, String>>,
}

impl EditGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one cell. A repeated cell keeps the last value.
    pub fn insert(&mut self, row: usize, column: impl Into<String>, value: impl Into<String>) {
        self.rows
            .entry(row)
            .or_default()
            .insert(column.into(), value.into());
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        self.rows.get(&row)?.get(column).map(String::as_str)
    }

    /// Rows in ascending index order.
    pub fn rows(&self) -> impl Iterator<Item = (usize, &BTreeMap<String, String>)> {
        self.rows.iter().map(|(index, cells)| (*index, cells))
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Name of the form field for one cell.
pub fn field_key(row: usize, column: &str) -> String {
    format!("{KEY_PREFIX}{row}][{column}]")
}

/// Split `data[<row>][<COLUMN>]` into its parts, or `None` if `key` is not
/// exactly of that shape.
pub fn parse_field_key(key: &str) -> Option<(usize, &str)> {
    let rest = key.strip_prefix(KEY_PREFIX)?;
    let (row, rest) = rest.split_once("][")?;
    let column = rest.strip_suffix(']')?;

    if row.is_empty() || !row.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if row.len() > 1 && row.starts_with('0') {
        return None;
    }
    if column.is_empty() || column.contains(['[', ']']) {
        return None;
    }
    Some((row.parse().ok()?, column))
}

/// Build an [`EditGrid`] from flat form fields, in submission order.
/// Fields that are not cells (the table name, buttons, tokens) are ignored.
pub fn parse<I, K, V>(fields: I) -> EditGrid
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
{
    let mut grid = EditGrid::new();
    for (key, value) in fields {
        if let Some((row, column)) = parse_field_key(key.as_ref()) {
            grid.insert(row, column, value);
        }
    }
    grid
}

/// Take the [`TABLE_FIELD`] out of a submission, returning it and the rest.
pub fn take_table_field(fields: Vec<(String, String)>) -> (Option<String>, Vec<(String, String)>) {
    let mut table = None;
    let mut rest = Vec::with_capacity(fields.len());
    for (key, value) in fields {
        if key == TABLE_FIELD {
            table = Some(value);
        } else {
            rest.push((key, value));
        }
    }
    (table, rest)
}
