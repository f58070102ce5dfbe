use crate::db::catalog::AllowedTable;
use crate::db::dialect::Dialect;
use crate::db::models::{CellValue, ColumnMetadata, TableSnapshot};
use crate::db::schema::{TableSchema, describe_table};
use crate::error::ConsoleError;
use sqlx::{AnyConnection, Row};
use tracing::info;

/// Read every row of `table` together with its introspected columns.
///
/// No paging: the whole table is loaded. Each column is selected as text so
/// that any backend type survives the `Any` driver, then re-typed per
/// [`ColumnMetadata`].
pub async fn read_table(
    conn: &mut AnyConnection,
    dialect: Dialect,
    table: &AllowedTable,
) -> Result<TableSnapshot, ConsoleError> {
    let TableSchema { table, columns } = describe_table(conn, dialect, table).await?;
    let sql = select_sql(dialect, &table, &columns);

    let rows = sqlx::query(&sql)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| ConsoleError::Query(format!("{table}: {e}")))?;

    let mut cells = Vec::with_capacity(rows.len());
    for row in rows {
        let mut values = Vec::with_capacity(columns.len());
        for (index, column) in columns.iter().enumerate() {
            let raw: Option<String> = row
                .try_get(index)
                .map_err(|e| ConsoleError::Query(format!("{table}.{}: {e}", column.name)))?;
            values.push(CellValue::from_db(raw, column.type_category));
        }
        cells.push(values);
    }

    info!(table = %table, columns = columns.len(), rows = cells.len(), "read table");
    Ok(TableSnapshot {
        table: table.to_string(),
        columns,
        rows: cells,
    })
}

fn select_sql(dialect: Dialect, table: &AllowedTable, columns: &[ColumnMetadata]) -> String {
    let projection = columns
        .iter()
        .map(|c| format!("CAST({} AS TEXT)", dialect.quote_ident(&c.name)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("SELECT {projection} FROM {}", dialect.quote_ident(table.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::TypeCategory;

    #[test]
    fn postgres_select_keeps_catalog_case() {
        let table = AllowedTable::registered("Mixed");
        let columns = vec![
            ColumnMetadata::new("ORG_ID", TypeCategory::Number),
            ColumnMetadata::new("firstName", TypeCategory::Text),
        ];
        assert_eq!(
            select_sql(Dialect::Postgres, &table, &columns),
            r#"SELECT CAST("ORG_ID" AS TEXT), CAST("firstName" AS TEXT) FROM "Mixed""#
        );
        assert_eq!(
            select_sql(Dialect::Sqlite, &table, &columns),
            "SELECT CAST(ORG_ID AS TEXT), CAST(firstName AS TEXT) FROM Mixed"
        );
    }
}
