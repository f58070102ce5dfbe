//! Database layer: connection provider, catalog access and generic table reads.
//!
//! Layout:
//! - `provider.rs`: actor owning the process-wide connection pool
//! - `dialect.rs`: per-backend SQL fragments and identifier quoting
//! - `schema.rs`: column introspection and type categories
//! - `catalog.rs`: the TABLEINFO registry and table allow-list
//! - `reader.rs`: schema-driven `SELECT` of a whole table
//! - `models.rs`: column metadata, typed cells and table snapshots

pub mod catalog;
pub mod dialect;
pub mod models;
pub mod provider;
pub mod reader;
pub mod schema;

pub use catalog::AllowedTable;
pub use dialect::Dialect;
pub use models::{CellValue, ColumnMetadata, TableSnapshot, TypeCategory};
pub use provider::{ProviderHandle, ProviderSettings};
pub use schema::TableSchema;
