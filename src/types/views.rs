//! JSON bodies handed to whatever renders the console's pages.

use serde::Serialize;

use crate::db::models::{CellValue, ColumnMetadata, TableSnapshot};

/// Shown for every failed login, whatever the cause.
pub const LOGIN_FAILED: &str = "Invalid username or password";

#[derive(Debug, Serialize)]
pub struct LoginView {
    pub error: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct HomeView {
    pub modules: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct TablesView {
    pub module: String,
    pub tables: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct FormField {
    pub name: String,
    pub value: String,
}

/// A table as rendered for editing. `fields` are the exact names and values
/// an edit form posts back to `/update-table`.
#[derive(Debug, Serialize)]
pub struct TableView {
    pub table: String,
    pub columns: Vec<ColumnMetadata>,
    pub rows: Vec<Vec<CellValue>>,
    pub fields: Vec<FormField>,
}

impl From<TableSnapshot> for TableView {
    fn from(snapshot: TableSnapshot) -> Self {
        let fields = snapshot
            .form_fields()
            .into_iter()
            .map(|(name, value)| FormField { name, value })
            .collect();
        Self {
            table: snapshot.table,
            columns: snapshot.columns,
            rows: snapshot.rows,
            fields,
        }
    }
}
