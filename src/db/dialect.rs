//! SQL dialect differences the console has to care about.
//!
//! Both supported backends are reached through sqlx's `Any` driver and both
//! accept numbered `$n` placeholders; they differ in how the catalog is
//! queried and in how a `DD-MON-YYYY` value becomes a DATE.

use crate::db::models::TypeCategory;
use crate::error::ConsoleError;
use chrono::NaiveDate;

/// Format every DATE cell is rendered in and every DATE edit must match.
pub const SQL_DATE_FORMAT: &str = "DD-MON-YYYY";
const CHRONO_DATE_FORMAT: &str = "%d-%b-%Y";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

impl Dialect {
    /// Pick the dialect from the URL scheme of a connect target.
    pub fn from_target(target: &str) -> Result<Self, ConsoleError> {
        let scheme = target
            .split_once(':')
            .map(|(scheme, _)| scheme.to_ascii_lowercase());
        match scheme.as_deref() {
            Some("postgres" | "postgresql") => Ok(Dialect::Postgres),
            Some("sqlite") => Ok(Dialect::Sqlite),
            _ => Err(ConsoleError::Config(
                "connect_target must be a postgres:// or sqlite: URL".to_string(),
            )),
        }
    }

    /// Catalog query returning `(table_name, column_name, data_type,
    /// cast_type)`, grouped by table and in declaration order. `$1` is the
    /// uppercased table name; names come back spelled as the catalog has them.
    pub fn describe_sql(self) -> &'static str {
        match self {
            Dialect::Postgres => {
                r#"SELECT CAST(table_name AS TEXT) AS table_name,
                          CAST(column_name AS TEXT) AS column_name,
                          CAST(data_type AS TEXT) AS data_type,
                          CAST(CASE WHEN data_type IN ('USER-DEFINED', 'ARRAY')
                                    THEN quote_ident(udt_schema) || '.' || quote_ident(udt_name)
                                    ELSE data_type END AS TEXT) AS cast_type
                   FROM information_schema.columns
                   WHERE table_schema = current_schema() AND UPPER(table_name) = $1
                   ORDER BY table_name, ordinal_position"#
            }
            Dialect::Sqlite => {
                r#"SELECT m.name AS table_name, p.name AS column_name,
                          p.type AS data_type, p.type AS cast_type
                   FROM sqlite_master AS m JOIN pragma_table_info(m.name) AS p
                   WHERE m.type IN ('table', 'view') AND UPPER(m.name) = $1
                   ORDER BY m.name, p.cid"#
            }
        }
    }

    /// Emit a catalog-spelled identifier. PostgreSQL folds bare names to
    /// lowercase, so there every identifier is quoted exactly as spelled.
    pub fn quote_ident(self, name: &str) -> String {
        match self {
            Dialect::Postgres => quoted(name),
            Dialect::Sqlite => quote_ident(name),
        }
    }

    pub fn placeholder(self, index: usize) -> String {
        format!("${index}")
    }

    /// Wrap a bound parameter so the database stores it as a DATE.
    pub fn date_expr(self, placeholder: &str) -> String {
        match self {
            Dialect::Postgres => format!("TO_DATE({placeholder}, '{SQL_DATE_FORMAT}')"),
            Dialect::Sqlite => format!("date({placeholder})"),
        }
    }

    /// Value expression for one bound parameter of a column. DATE goes
    /// through [`Dialect::date_expr`]; on PostgreSQL other non-text columns
    /// are cast from the bound text to their native type.
    pub fn bind_expr(self, placeholder: &str, category: TypeCategory, native_type: &str) -> String {
        match (self, category) {
            (_, TypeCategory::Date) => self.date_expr(placeholder),
            (Dialect::Postgres, TypeCategory::Other) if !native_type.trim().is_empty() => {
                format!("CAST({placeholder} AS {native_type})")
            }
            _ => placeholder.to_string(),
        }
    }

    /// Text bound for a validated date; must agree with [`Dialect::date_expr`].
    pub fn date_param(self, date: NaiveDate) -> String {
        match self {
            Dialect::Postgres => format_date(date),
            Dialect::Sqlite => date.format("%Y-%m-%d").to_string(),
        }
    }
}

/// Render a date the way the console displays it, e.g. `01-JAN-2020`.
pub fn format_date(date: NaiveDate) -> String {
    date.format(CHRONO_DATE_FORMAT).to_string().to_ascii_uppercase()
}

/// Parse a `DD-MON-YYYY` value; the month abbreviation is case-insensitive.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), CHRONO_DATE_FORMAT).ok()
}

/// Identifier as shown in logs and used on SQLite: plain names stay bare,
/// anything else is double-quoted.
pub fn quote_ident(name: &str) -> String {
    if is_plain_identifier(name) {
        name.to_string()
    } else {
        quoted(name)
    }
}

fn quoted(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
