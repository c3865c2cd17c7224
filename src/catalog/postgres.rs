//! PostgreSQL catalog directory
//!
//! A single database is one catalog. Schemas and tables come from
//! `pg_catalog`; comments are written with `COMMENT ON`.

use crate::catalog::queries::{
    SqlBuilder, CURRENT_CATALOG, GET_COLUMNS, LIST_SCHEMAS, LIST_TABLES,
};
use crate::catalog::{CatalogDirectory, ColumnMetadata, TableSummary};
use crate::error::AppError;
use crate::governance::item::{validate_identifier, ObjectPath};
use async_trait::async_trait;
use deadpool_postgres::{Object, Pool};
use tracing::{debug, info};

pub struct PgCatalogDirectory {
    pool: Pool,
}

impl PgCatalogDirectory {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    async fn client(&self) -> Result<Object, AppError> {
        self.pool
            .get()
            .await
            .map_err(|e| AppError::External(format!("Catalog unreachable: {}", e)))
    }

    /// Reject catalogs other than the connected database
    async fn ensure_catalog(&self, client: &Object, catalog: &str) -> Result<(), AppError> {
        validate_identifier("catalog", catalog)?;
        let current: String = client
            .query_one(CURRENT_CATALOG, &[])
            .await
            .map_err(external)?
            .get(0);
        if current != catalog {
            return Err(AppError::External(format!(
                "Catalog '{}' is not reachable through this connection (connected to '{}')",
                catalog, current
            )));
        }
        Ok(())
    }
}

fn external(e: tokio_postgres::Error) -> AppError {
    AppError::External(format!("Catalog query failed: {}", e))
}

#[async_trait]
impl CatalogDirectory for PgCatalogDirectory {
    async fn list_catalogs(&self) -> Result<Vec<String>, AppError> {
        let client = self.client().await?;
        let current: String = client
            .query_one(CURRENT_CATALOG, &[])
            .await
            .map_err(external)?
            .get(0);
        Ok(vec![current])
    }

    async fn list_schemas(&self, catalog: &str) -> Result<Vec<String>, AppError> {
        let client = self.client().await?;
        self.ensure_catalog(&client, catalog).await?;
        let rows = client.query(LIST_SCHEMAS, &[]).await.map_err(external)?;
        Ok(rows.iter().map(|row| row.get("schema_name")).collect())
    }

    async fn list_tables(&self, catalog: &str, schema: &str) -> Result<Vec<TableSummary>, AppError> {
        validate_identifier("schema", schema)?;
        let client = self.client().await?;
        self.ensure_catalog(&client, catalog).await?;

        let rows = client.query(LIST_TABLES, &[&schema]).await.map_err(external)?;
        let tables: Vec<TableSummary> = rows
            .iter()
            .map(|row| TableSummary {
                table_name: row.get("table_name"),
                table_type: row.get("table_type"),
                column_count: row.get("column_count"),
                current_comment: row.get("current_comment"),
            })
            .collect();

        debug!("Listed {} tables in {}.{}", tables.len(), catalog, schema);
        Ok(tables)
    }

    async fn get_columns(
        &self,
        catalog: &str,
        schema: &str,
        table: &str,
    ) -> Result<Vec<ColumnMetadata>, AppError> {
        validate_identifier("schema", schema)?;
        validate_identifier("table", table)?;
        let client = self.client().await?;
        self.ensure_catalog(&client, catalog).await?;

        let rows = client
            .query(GET_COLUMNS, &[&schema, &table])
            .await
            .map_err(external)?;

        if rows.is_empty() {
            return Err(AppError::External(format!(
                "Table '{}.{}.{}' not found or has no columns",
                catalog, schema, table
            )));
        }

        Ok(rows
            .iter()
            .map(|row| ColumnMetadata {
                column_name: row.get("column_name"),
                data_type: row.get("data_type"),
                comment: row.get("comment"),
                ordinal_position: row.get("ordinal_position"),
            })
            .collect())
    }

    async fn sample_rows(
        &self,
        catalog: &str,
        schema: &str,
        table: &str,
        limit: usize,
    ) -> Result<Vec<serde_json::Value>, AppError> {
        validate_identifier("schema", schema)?;
        validate_identifier("table", table)?;
        let client = self.client().await?;
        self.ensure_catalog(&client, catalog).await?;

        let rows = client
            .query(&SqlBuilder::sample_rows(schema, table, limit), &[])
            .await
            .map_err(external)?;
        Ok(rows.iter().map(|row| row.get(0)).collect())
    }

    async fn write_comment(&self, path: &ObjectPath, text: &str) -> Result<(), AppError> {
        let client = self.client().await?;
        self.ensure_catalog(&client, &path.catalog).await?;

        client
            .execute(&SqlBuilder::comment_on(path, text), &[])
            .await
            .map_err(|e| AppError::External(format!("Failed to comment on {}: {}", path, e)))?;

        info!("Comment written on {}", path);
        Ok(())
    }
}
