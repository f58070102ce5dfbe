#![allow(dead_code)]

use sqlx::any::install_default_drivers;
use sqlx::{AnyConnection, Connection};
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tabula_console::Credential;
use tabula_console::db::dialect::Dialect;
use tabula_console::db::provider::{self, ProviderHandle, ProviderSettings};

pub const FIXTURE_SQL: &str = r#"
CREATE TABLE TABLEINFO (
    MODULE VARCHAR(40) NOT NULL,
    TABLE_NAME VARCHAR(40) NOT NULL
);
INSERT INTO TABLEINFO (MODULE, TABLE_NAME) VALUES
    ('HR', 'EMPLOYEES'),
    ('HR', 'ORGS'),
    ('FINANCE', 'LEDGER'),
    ('OPS', 'EVENTS');
CREATE TABLE EMPLOYEES (
    ORG_ID INTEGER PRIMARY KEY,
    NAME VARCHAR(40) NOT NULL,
    HIRED DATE,
    SALARY NUMBER(10,2) CHECK (SALARY >= 0)
);
INSERT INTO EMPLOYEES (ORG_ID, NAME, HIRED, SALARY) VALUES
    (1, 'Ann', '2019-03-01', 5000.5),
    (2, 'Bob', '2020-01-01', NULL);
CREATE TABLE ORGS (
    ORG_ID INTEGER,
    TITLE TEXT
);
CREATE TABLE "Events" (
    ORG_ID INTEGER PRIMARY KEY,
    SEEN_AT TIMESTAMP,
    ACTIVE BOOLEAN,
    "firstName" TEXT
);
INSERT INTO "Events" (ORG_ID, SEEN_AT, ACTIVE, "firstName") VALUES
    (1, '2019-03-01 10:00:00', 1, 'Ann'),
    (2, NULL, NULL, 'Bob')
"#;

/// A throwaway SQLite database seeded with the console's registry and two
/// tables. Removed on drop.
pub struct Fixture {
    pub path: PathBuf,
    pub target: String,
}

impl Fixture {
    pub async fn new(tag: &str) -> Self {
        install_default_drivers();

        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before UNIX_EPOCH")
            .as_nanos();
        let mut path = std::env::temp_dir();
        path.push(format!(
            "tabula-{tag}-{}-{}.sqlite",
            std::process::id(),
            nanos
        ));

        let mut conn = AnyConnection::connect(&format!("sqlite:{}?mode=rwc", path.display()))
            .await
            .expect("create fixture database");
        for stmt in FIXTURE_SQL.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            sqlx::query(s)
                .execute(&mut conn)
                .await
                .expect("seed fixture database");
        }
        conn.close().await.expect("close seeding connection");

        let target = format!("sqlite:{}", path.display());
        Self { path, target }
    }

    pub fn credential(&self, username: &str) -> Credential {
        Credential::new(username, "secret", self.target.clone())
    }

    pub fn settings(&self, pool_size: u32) -> ProviderSettings {
        ProviderSettings {
            dialect: Dialect::Sqlite,
            pool_size,
            acquire_timeout: Duration::from_millis(300),
            close_grace: Duration::from_secs(2),
        }
    }

    /// Provider already logged in as `u1`.
    pub async fn provider(&self, pool_size: u32) -> ProviderHandle {
        let handle = provider::spawn(self.settings(pool_size))
            .await
            .expect("spawn provider");
        handle
            .login(&self.credential("u1"))
            .await
            .expect("fixture login");
        handle
    }

    /// `(ORG_ID, NAME, HIRED, SALARY)` straight from the file, by ORG_ID.
    pub async fn employees(&self) -> Vec<(i64, String, Option<String>, Option<String>)> {
        let mut conn = AnyConnection::connect(&self.target)
            .await
            .expect("open fixture database");
        let rows = sqlx::query_as(
            "SELECT ORG_ID, NAME, CAST(HIRED AS TEXT), CAST(SALARY AS TEXT) \
             FROM EMPLOYEES ORDER BY ORG_ID",
        )
        .fetch_all(&mut conn)
        .await
        .expect("read employees");
        conn.close().await.expect("close reader");
        rows
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
