//! Runtime discovery of a table's columns and their type categories.

use crate::db::catalog::AllowedTable;
use crate::db::dialect::Dialect;
use crate::db::models::{ColumnMetadata, TypeCategory};
use crate::error::ConsoleError;
use sqlx::AnyConnection;
use tracing::debug;

/// Map a catalog type name onto a [`TypeCategory`]. Precision and modifiers
/// (`NUMBER(10,2)`, `VARCHAR(40)`) are ignored; unknown names are `Other`.
pub fn type_category(native: &str) -> TypeCategory {
    let base = native
        .split('(')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_uppercase();
    match base.as_str() {
        "CHAR" | "NCHAR" | "CHARACTER" | "VARCHAR" | "VARCHAR2" | "NVARCHAR" | "NVARCHAR2"
        | "CHARACTER VARYING" | "TEXT" | "CLOB" | "NCLOB" | "CITEXT" | "NAME" => {
            TypeCategory::Text
        }
        "NUMBER" | "NUMERIC" | "DECIMAL" | "INT" | "INTEGER" | "SMALLINT" | "BIGINT"
        | "TINYINT" | "MEDIUMINT" | "INT2" | "INT4" | "INT8" | "REAL" | "FLOAT" | "FLOAT4"
        | "FLOAT8" | "DOUBLE" | "DOUBLE PRECISION" | "BINARY_FLOAT" | "BINARY_DOUBLE" => {
            TypeCategory::Number
        }
        "DATE" => TypeCategory::Date,
        // DATETIME and TIMESTAMP carry a time of day that DD-MON-YYYY would drop.
        _ => TypeCategory::Other,
    }
}

/// A registered table with the columns the catalog reports for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    /// The registry entry respelled exactly as the catalog has it.
    pub table: AllowedTable,
    pub columns: Vec<ColumnMetadata>,
}

/// Describe `table` from the catalog, columns in declaration order.
///
/// The name is uppercased before the lookup. A missing table and a table the
/// caller may not read both come back as [`ConsoleError::Schema`].
pub async fn describe(
    conn: &mut AnyConnection,
    dialect: Dialect,
    table: &str,
) -> Result<Vec<ColumnMetadata>, ConsoleError> {
    lookup(conn, dialect, table).await.map(|(_, columns)| columns)
}

/// [`describe`] for a registered table, keeping the catalog's spelling of
/// its name for every statement built from it.
pub async fn describe_table(
    conn: &mut AnyConnection,
    dialect: Dialect,
    table: &AllowedTable,
) -> Result<TableSchema, ConsoleError> {
    let (catalog_name, columns) = lookup(conn, dialect, table.as_str()).await?;
    Ok(TableSchema {
        table: table.respelled(catalog_name),
        columns,
    })
}

type CatalogRow = (String, String, Option<String>, Option<String>);

async fn lookup(
    conn: &mut AnyConnection,
    dialect: Dialect,
    table: &str,
) -> Result<(String, Vec<ColumnMetadata>), ConsoleError> {
    let normalized = table.trim().to_uppercase();
    let rows: Vec<CatalogRow> = sqlx::query_as(dialect.describe_sql())
        .bind(normalized.clone())
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| {
            debug!(table = %normalized, error = %e, "catalog lookup failed");
            ConsoleError::Schema(normalized.clone())
        })?;

    let Some(catalog_name) = pick_table(&rows, table.trim()) else {
        return Err(ConsoleError::Schema(normalized));
    };

    let columns: Vec<ColumnMetadata> = rows
        .iter()
        .filter(|(name, ..)| *name == catalog_name)
        .map(|(_, column, data_type, cast_type)| {
            let category = type_category(data_type.as_deref().unwrap_or_default());
            ColumnMetadata::new(column.clone(), category)
                .with_native_type(cast_type.clone().unwrap_or_default())
        })
        .collect();
    debug!(table = %catalog_name, columns = columns.len(), "described table");
    Ok((catalog_name, columns))
}

// Names differing only in case all match the uppercased lookup; the exact
// spelling wins, otherwise the first in catalog order.
fn pick_table(rows: &[CatalogRow], requested: &str) -> Option<String> {
    rows.iter()
        .find(|(name, ..)| name == requested)
        .or_else(|| rows.first())
        .map(|(name, ..)| name.clone())
}
