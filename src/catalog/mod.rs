//! Catalog directory adapter
//!
//! The catalog is an external system: it enumerates catalogs, schemas and
//! tables, reports current comments, and accepts new ones. Every failure
//! surfaces as `AppError::External` so batch callers can isolate it per target.

pub mod postgres;
pub mod queries;

pub use postgres::PgCatalogDirectory;

use crate::error::AppError;
use crate::governance::item::ObjectPath;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A table as listed by the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSummary {
    pub table_name: String,
    pub table_type: String,
    pub column_count: i64,
    pub current_comment: Option<String>,
}

impl TableSummary {
    pub fn is_documented(&self) -> bool {
        has_comment(&self.current_comment)
    }
}

/// Column metadata used as generation context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMetadata {
    pub column_name: String,
    pub data_type: String,
    pub comment: Option<String>,
    pub ordinal_position: i32,
}

impl ColumnMetadata {
    pub fn is_documented(&self) -> bool {
        has_comment(&self.comment)
    }
}

fn has_comment(comment: &Option<String>) -> bool {
    comment.as_deref().map(|c| !c.trim().is_empty()).unwrap_or(false)
}

/// Read and comment operations the governance workflow needs from a catalog
#[async_trait]
pub trait CatalogDirectory: Send + Sync {
    async fn list_catalogs(&self) -> Result<Vec<String>, AppError>;

    async fn list_schemas(&self, catalog: &str) -> Result<Vec<String>, AppError>;

    async fn list_tables(&self, catalog: &str, schema: &str)
        -> Result<Vec<TableSummary>, AppError>;

    async fn get_columns(
        &self,
        catalog: &str,
        schema: &str,
        table: &str,
    ) -> Result<Vec<ColumnMetadata>, AppError>;

    /// Up to `limit` rows as JSON objects
    async fn sample_rows(
        &self,
        catalog: &str,
        schema: &str,
        table: &str,
        limit: usize,
    ) -> Result<Vec<serde_json::Value>, AppError>;

    /// Set the comment of a table or column
    async fn write_comment(&self, path: &ObjectPath, text: &str) -> Result<(), AppError>;
}

/// Stand-in used when no catalog connection is configured
pub struct UnavailableCatalog;

impl UnavailableCatalog {
    fn error() -> AppError {
        AppError::External("No catalog connection configured (set DATABASE_URL)".to_string())
    }
}

#[async_trait]
impl CatalogDirectory for UnavailableCatalog {
    async fn list_catalogs(&self) -> Result<Vec<String>, AppError> {
        Err(Self::error())
    }

    async fn list_schemas(&self, _catalog: &str) -> Result<Vec<String>, AppError> {
        Err(Self::error())
    }

    async fn list_tables(&self, _catalog: &str, _schema: &str) -> Result<Vec<TableSummary>, AppError> {
        Err(Self::error())
    }

    async fn get_columns(
        &self,
        _catalog: &str,
        _schema: &str,
        _table: &str,
    ) -> Result<Vec<ColumnMetadata>, AppError> {
        Err(Self::error())
    }

    async fn sample_rows(
        &self,
        _catalog: &str,
        _schema: &str,
        _table: &str,
        _limit: usize,
    ) -> Result<Vec<serde_json::Value>, AppError> {
        Err(Self::error())
    }

    async fn write_comment(&self, _path: &ObjectPath, _text: &str) -> Result<(), AppError> {
        Err(Self::error())
    }
}
