use axum::response::{IntoResponse, Redirect};
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;
use tracing::warn;

/// Where a browser lands after a failure the console will not explain.
pub const LOGIN_PATH: &str = "/login";
pub const HOME_PATH: &str = "/home";

#[derive(Debug, ThisError)]
pub enum ConsoleError {
    /// Bad credentials or an unreachable database; the two are not told apart.
    #[error("authentication failed")]
    Auth,

    #[error("connection pool exhausted")]
    PoolExhausted,

    #[error("connection pool closed")]
    PoolClosed,

    /// Unknown table or no catalog privilege; the two are not told apart.
    #[error("schema lookup failed for {0}")]
    Schema(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("table is not registered: {0:?}")]
    TableNotAllowed(String),

    #[error("update rejected: {0}")]
    Update(#[from] UpdateError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("Ractor error: {0}")]
    Actor(String),

    #[error("Database error: {0}")]
    Database(#[from] SqlxError),
}

#[derive(Debug, ThisError)]
pub enum UpdateError {
    #[error("row {row}: {column} is not a DD-MON-YYYY date: {value:?}")]
    InvalidDate {
        row: usize,
        column: String,
        value: String,
    },

    #[error("row {row}: {column} is not a number: {value:?}")]
    InvalidNumber {
        row: usize,
        column: String,
        value: String,
    },

    #[error("row {row}: unknown column {column:?}")]
    UnknownColumn { row: usize, column: String },

    #[error("identifying column {0} is not part of the table")]
    NoIdentifyingColumn(String),

    #[error("row {row}: no value submitted for identifying column {column}")]
    MissingKeyValue { row: usize, column: String },

    #[error("row {row}: statement failed: {source}")]
    ExecutionFailed {
        row: usize,
        #[source]
        source: SqlxError,
    },
}

impl ConsoleError {
    /// Redirect target for this failure. Update problems go back to the
    /// landing page; everything else drops the user to the login view.
    pub fn redirect_target(&self) -> &'static str {
        match self {
            ConsoleError::Update(_) | ConsoleError::TableNotAllowed(_) => HOME_PATH,
            _ => LOGIN_PATH,
        }
    }
}

impl IntoResponse for ConsoleError {
    fn into_response(self) -> axum::response::Response {
        let target = self.redirect_target();
        warn!(error = %self, redirect = target, "request failed");
        Redirect::to(target).into_response()
    }
}
