//! The `TABLEINFO` registry: which tables the console exposes, grouped by
//! module. It doubles as the allow-list for every table name that ends up
//! interpolated into SQL text.

use crate::error::ConsoleError;
use sqlx::AnyConnection;
use std::fmt;
use tracing::warn;

const LIST_MODULES: &str =
    "SELECT DISTINCT CAST(MODULE AS TEXT) AS module FROM TABLEINFO ORDER BY 1";
const LIST_TABLES: &str = "SELECT CAST(TABLE_NAME AS TEXT) AS table_name FROM TABLEINFO \
     WHERE MODULE = $1 ORDER BY 1";
const LIST_ALL_TABLES: &str = "SELECT DISTINCT CAST(TABLE_NAME AS TEXT) AS table_name FROM TABLEINFO";

/// A table name taken from the registry, never from the request.
///
/// Only [`allow_table`] constructs one, so holding an `AllowedTable` means the
/// name was matched against server-controlled data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedTable(String);

impl AllowedTable {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[cfg(test)]
    pub(crate) fn registered(name: &str) -> AllowedTable {
        AllowedTable(name.to_string())
    }

    /// Same table under the catalog's spelling. Only a case-insensitive
    /// match may replace the registry name.
    pub(crate) fn respelled(&self, catalog_name: String) -> AllowedTable {
        if catalog_name.eq_ignore_ascii_case(&self.0) {
            AllowedTable(catalog_name)
        } else {
            self.clone()
        }
    }
}

impl fmt::Display for AllowedTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub async fn list_modules(conn: &mut AnyConnection) -> Result<Vec<String>, ConsoleError> {
    let rows: Vec<(Option<String>,)> = sqlx::query_as(LIST_MODULES)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| ConsoleError::Query(format!("module listing: {e}")))?;
    Ok(rows.into_iter().filter_map(|(m,)| m).collect())
}

pub async fn list_tables(
    conn: &mut AnyConnection,
    module: &str,
) -> Result<Vec<String>, ConsoleError> {
    let rows: Vec<(Option<String>,)> = sqlx::query_as(LIST_TABLES)
        .bind(module.to_string())
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| ConsoleError::Query(format!("table listing: {e}")))?;
    Ok(rows.into_iter().filter_map(|(t,)| t).collect())
}

/// Resolve `requested` against the registry. The match ignores case and
/// surrounding whitespace; the registry's spelling is what is returned.
pub async fn allow_table(
    conn: &mut AnyConnection,
    requested: &str,
) -> Result<AllowedTable, ConsoleError> {
    let rows: Vec<(Option<String>,)> = sqlx::query_as(LIST_ALL_TABLES)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| ConsoleError::Query(format!("table registry: {e}")))?;
    let registered = rows.into_iter().filter_map(|(t,)| t);
    match_registered(registered, requested).ok_or_else(|| {
        warn!(requested = %requested, "rejected table outside the registry");
        ConsoleError::TableNotAllowed(requested.to_string())
    })
}

fn match_registered(
    registered: impl IntoIterator<Item = String>,
    requested: &str,
) -> Option<AllowedTable> {
    let wanted = requested.trim();
    if wanted.is_empty() {
        return None;
    }
    registered
        .into_iter()
        .find(|name| name.trim().eq_ignore_ascii_case(wanted))
        .map(|name| AllowedTable(name.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Vec<String> {
        vec!["EMPLOYEES".into(), "ORGS".into()]
    }

    #[test]
    fn registered_names_resolve_to_registry_spelling() {
        let t = match_registered(registry(), " employees ").expect("registered");
        assert_eq!(t.as_str(), "EMPLOYEES");
    }

    #[test]
    fn injection_attempts_never_resolve() {
        assert!(match_registered(registry(), "EMPLOYEES; DROP TABLE X").is_none());
        assert!(match_registered(registry(), "USERS; DROP TABLE X").is_none());
        assert!(match_registered(registry(), "").is_none());
    }
}
