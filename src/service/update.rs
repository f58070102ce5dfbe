//! Turns an [`EditGrid`] into per-row parameterized UPDATE statements and
//! runs them as one all-or-nothing transaction.
//!
//! Identifiers in the SQL text come only from introspected metadata and the
//! registry-checked table name; every submitted value is bound.

use crate::db::dialect::{Dialect, SQL_DATE_FORMAT, parse_date, quote_ident};
use crate::db::models::{ColumnMetadata, TypeCategory};
use crate::db::schema::TableSchema;
use crate::error::{ConsoleError, UpdateError};
use crate::service::form_payload::EditGrid;
use sqlx::any::AnyArguments;
use sqlx::query::Query;
use sqlx::{Any, AnyConnection, Connection};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, warn};

/// A value ready to bind, already coerced for its column.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(Option<String>),
    Integer(Option<i64>),
    Real(f64),
}

#[derive(Debug, Clone, PartialEq)]
struct Assignment {
    column: String,
    category: TypeCategory,
    native_type: String,
}

impl Assignment {
    fn for_column(column: &ColumnMetadata) -> Self {
        Self {
            column: column.name.clone(),
            category: column.type_category,
            native_type: column.native_type.clone(),
        }
    }

    fn render(&self, dialect: Dialect, index: usize) -> String {
        let placeholder = dialect.placeholder(index);
        format!(
            "{}={}",
            dialect.quote_ident(&self.column),
            dialect.bind_expr(&placeholder, self.category, &self.native_type)
        )
    }
}

/// `UPDATE <table> SET <col> = <param>, ... WHERE <key> = <param>` for one row.
///
/// `Display` gives the canonical named-parameter form used in logs, e.g.
/// `UPDATE t SET NAME=:NAME, HIRED=TO_DATE(:HIRED,'DD-MON-YYYY') WHERE ORG_ID=:ORG_ID`.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    table: String,
    assignments: Vec<Assignment>,
    key: Assignment,
}

impl UpdateStatement {
    /// Columns assigned by this statement, in table order.
    pub fn set_columns(&self) -> impl Iterator<Item = &str> {
        self.assignments.iter().map(|a| a.column.as_str())
    }

    pub fn key_column(&self) -> &str {
        &self.key.column
    }

    /// SQL text with numbered placeholders: SET values first, key last.
    pub fn render(&self, dialect: Dialect) -> String {
        let set = self
            .assignments
            .iter()
            .enumerate()
            .map(|(i, a)| a.render(dialect, i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "UPDATE {} SET {} WHERE {}",
            dialect.quote_ident(&self.table),
            set,
            self.key.render(dialect, self.assignments.len() + 1)
        )
    }
}

impl fmt::Display for UpdateStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UPDATE {} SET ", quote_ident(&self.table))?;
        for (i, a) in self.assignments.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            let column = quote_ident(&a.column);
            match a.category {
                TypeCategory::Date => {
                    write!(f, "{column}=TO_DATE(:{},'{SQL_DATE_FORMAT}')", a.column)?
                }
                _ => write!(f, "{column}=:{}", a.column)?,
            }
        }
        write!(
            f,
            " WHERE {}=:{}",
            quote_ident(&self.key.column),
            self.key.column
        )
    }
}

/// A row's statement together with its coerced parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedUpdate {
    pub row: usize,
    pub statement: UpdateStatement,
    pub params: Vec<SqlParam>,
}

/// Builds statements for one table against its introspected columns.
pub struct UpdateSynthesizer<'a> {
    table: &'a str,
    columns: &'a [ColumnMetadata],
    key: &'a ColumnMetadata,
}

impl<'a> UpdateSynthesizer<'a> {
    /// Fails with `NoIdentifyingColumn` when `identifying_column` is not one
    /// of `columns` (compared without regard to case).
    pub fn new(
        table: &'a str,
        columns: &'a [ColumnMetadata],
        identifying_column: &str,
    ) -> Result<Self, UpdateError> {
        let key = columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(identifying_column))
            .ok_or_else(|| UpdateError::NoIdentifyingColumn(identifying_column.to_string()))?;
        Ok(Self {
            table,
            columns,
            key,
        })
    }

    /// Statement for one submitted row, or `None` when the row sets nothing
    /// besides the identifying column.
    pub fn synthesize(
        &self,
        row: usize,
        cells: &BTreeMap<String, String>,
    ) -> Result<Option<UpdateStatement>, UpdateError> {
        if let Some(unknown) = cells
            .keys()
            .find(|name| !self.columns.iter().any(|c| &c.name == *name))
        {
            return Err(UpdateError::UnknownColumn {
                row,
                column: unknown.clone(),
            });
        }

        let assignments: Vec<Assignment> = self
            .columns
            .iter()
            .filter(|c| c.name != self.key.name && cells.contains_key(&c.name))
            .map(Assignment::for_column)
            .collect();

        if assignments.is_empty() {
            return Ok(None);
        }
        Ok(Some(UpdateStatement {
            table: self.table.to_string(),
            assignments,
            key: Assignment::for_column(self.key),
        }))
    }

    /// Coerce the row's values in placeholder order.
    pub fn bind_values(
        &self,
        row: usize,
        statement: &UpdateStatement,
        cells: &BTreeMap<String, String>,
        dialect: Dialect,
    ) -> Result<Vec<SqlParam>, UpdateError> {
        let mut params = Vec::with_capacity(statement.assignments.len() + 1);
        for a in &statement.assignments {
            let value = cells.get(&a.column).map(String::as_str).unwrap_or_default();
            params.push(coerce(row, &a.column, a.category, value, dialect)?);
        }
        let key_value = cells
            .get(&statement.key.column)
            .ok_or_else(|| UpdateError::MissingKeyValue {
                row,
                column: statement.key.column.clone(),
            })?;
        params.push(coerce(
            row,
            &statement.key.column,
            statement.key.category,
            key_value,
            dialect,
        )?);
        Ok(params)
    }

    /// Validate and coerce the whole grid, rows in ascending order. Nothing
    /// touches the database here, so a bad row rejects the batch up front.
    pub fn plan(&self, grid: &EditGrid, dialect: Dialect) -> Result<Vec<PlannedUpdate>, UpdateError> {
        let mut planned = Vec::with_capacity(grid.row_count());
        for (row, cells) in grid.rows() {
            let Some(statement) = self.synthesize(row, cells)? else {
                debug!(row, "row sets no columns; skipped");
                continue;
            };
            let params = self.bind_values(row, &statement, cells, dialect)?;
            planned.push(PlannedUpdate {
                row,
                statement,
                params,
            });
        }
        Ok(planned)
    }
}

/// Type a submitted string for its column.
pub fn coerce(
    row: usize,
    column: &str,
    category: TypeCategory,
    value: &str,
    dialect: Dialect,
) -> Result<SqlParam, UpdateError> {
    match category {
        TypeCategory::Text => Ok(SqlParam::Text(Some(value.to_string()))),
        // Rendered NULLs come back empty, and no cast accepts ''.
        TypeCategory::Other if value.is_empty() => Ok(SqlParam::Text(None)),
        TypeCategory::Other => Ok(SqlParam::Text(Some(value.to_string()))),
        TypeCategory::Number => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Ok(SqlParam::Integer(None));
            }
            if let Ok(n) = trimmed.parse::<i64>() {
                return Ok(SqlParam::Integer(Some(n)));
            }
            match trimmed.parse::<f64>() {
                Ok(n) if n.is_finite() => Ok(SqlParam::Real(n)),
                _ => Err(UpdateError::InvalidNumber {
                    row,
                    column: column.to_string(),
                    value: value.to_string(),
                }),
            }
        }
        TypeCategory::Date => {
            if value.trim().is_empty() {
                return Ok(SqlParam::Text(None));
            }
            parse_date(value)
                .map(|date| SqlParam::Text(Some(dialect.date_param(date))))
                .ok_or_else(|| UpdateError::InvalidDate {
                    row,
                    column: column.to_string(),
                    value: value.to_string(),
                })
        }
    }
}

fn bind_param<'q>(
    query: Query<'q, Any, AnyArguments<'q>>,
    param: SqlParam,
) -> Query<'q, Any, AnyArguments<'q>> {
    match param {
        SqlParam::Text(v) => query.bind(v),
        SqlParam::Integer(v) => query.bind(v),
        SqlParam::Real(v) => query.bind(v),
    }
}

/// Apply `grid` to `schema`'s table in a single transaction and return the
/// number of rows the database reports as updated. Any failing row rolls back
/// the batch.
pub async fn apply(
    conn: &mut AnyConnection,
    dialect: Dialect,
    schema: &TableSchema,
    grid: &EditGrid,
    identifying_column: &str,
) -> Result<u64, ConsoleError> {
    let table = &schema.table;
    let synthesizer = UpdateSynthesizer::new(table.as_str(), &schema.columns, identifying_column)?;
    let planned = synthesizer.plan(grid, dialect)?;
    if planned.is_empty() {
        info!(table = %table, "update batch had nothing to apply");
        return Ok(0);
    }

    let statements = planned.len();
    let mut tx = conn.begin().await?;
    let mut updated = 0u64;
    for PlannedUpdate {
        row,
        statement,
        params,
    } in planned
    {
        debug!(row, statement = %statement, "executing update");
        let sql = statement.render(dialect);
        let query = params
            .into_iter()
            .fold(sqlx::query(&sql), bind_param);
        let outcome = query.execute(&mut *tx).await;
        match outcome {
            Ok(result) => updated += result.rows_affected(),
            Err(source) => {
                if let Err(e) = tx.rollback().await {
                    warn!(error = %e, "rollback after failed update errored");
                }
                return Err(UpdateError::ExecutionFailed { row, source }.into());
            }
        }
    }
    tx.commit().await?;

    info!(table = %table, statements, updated, "update batch committed");
    Ok(updated)
}
