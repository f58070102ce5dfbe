use crate::db::dialect::{format_date, parse_date};
use crate::service::form_payload::field_key;
use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use std::fmt;

/// Coarse type of a column, enough to decide how an edit is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TypeCategory {
    Text,
    Number,
    Date,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnMetadata {
    pub name: String,
    #[serde(rename = "type")]
    pub type_category: TypeCategory,
    /// Type name usable in a `CAST`, as the catalog reports it. Empty when
    /// unknown.
    #[serde(skip)]
    pub native_type: String,
}

impl ColumnMetadata {
    pub fn new(name: impl Into<String>, type_category: TypeCategory) -> Self {
        Self {
            name: name.into(),
            type_category,
            native_type: String::new(),
        }
    }

    pub fn with_native_type(mut self, native_type: impl Into<String>) -> Self {
        self.native_type = native_type.into();
        self
    }
}

/// One cell of a generically read table.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Text(String),
    /// Decimal text exactly as the database rendered it.
    Number(String),
    Date(NaiveDate),
    Other(String),
}

impl CellValue {
    /// Interpret the text rendering of a cell using its column's category.
    pub fn from_db(raw: Option<String>, category: TypeCategory) -> Self {
        let Some(raw) = raw else {
            return CellValue::Null;
        };
        match category {
            TypeCategory::Text => CellValue::Text(raw),
            TypeCategory::Number => CellValue::Number(raw.trim().to_string()),
            TypeCategory::Date => decode_date(&raw)
                .map(CellValue::Date)
                .unwrap_or(CellValue::Other(raw)),
            TypeCategory::Other => CellValue::Other(raw),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

// Databases hand DATE/TIMESTAMP back as ISO text; keep the date part.
fn decode_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    trimmed
        .get(..10)
        .and_then(|head| NaiveDate::parse_from_str(head, "%Y-%m-%d").ok())
        .or_else(|| parse_date(trimmed))
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Text(s) | CellValue::Number(s) | CellValue::Other(s) => f.write_str(s),
            CellValue::Date(d) => f.write_str(&format_date(*d)),
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Null => serializer.serialize_none(),
            other => serializer.collect_str(other),
        }
    }
}

/// All rows of one table, cells in the same order as `columns`.
#[derive(Debug, Clone, Serialize)]
pub struct TableSnapshot {
    pub table: String,
    pub columns: Vec<ColumnMetadata>,
    pub rows: Vec<Vec<CellValue>>,
}

impl TableSnapshot {
    /// The flat `data[i][COLUMN]` fields an edit form posts back, in row then
    /// column order. NULL cells become empty strings.
    pub fn form_fields(&self) -> Vec<(String, String)> {
        self.rows
            .iter()
            .enumerate()
            .flat_map(|(row_index, row)| {
                self.columns
                    .iter()
                    .zip(row)
                    .map(move |(column, cell)| (field_key(row_index, &column.name), cell.to_string()))
            })
            .collect()
    }
}
