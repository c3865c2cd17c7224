//! PostgreSQL-backed item store
//!
//! Rows live in `<governance_schema>.description_governance`. The open-item
//! uniqueness invariant is a partial unique index; status changes are
//! conditional updates on the expected prior status.

use crate::error::AppError;
use crate::governance::item::{validate_identifier, DescriptionItem, ItemStatus, ObjectType, Transition};
use crate::governance::store::{duplicate_open_item, ItemQuery, ItemStore, Page};
use async_trait::async_trait;
use chrono::Utc;
use deadpool_postgres::Pool;
use tokio_postgres::error::SqlState;
use tokio_postgres::Row;
use tracing::{debug, info};
use uuid::Uuid;

const COLUMNS: &str = "id, object_type, object_path, catalog_name, schema_name, table_name, \
     column_name, column_data_type, ai_generated_description, approved_description, \
     review_status, model_used, generated_at, reviewed_at, applied_at, reviewer, apply_error";

pub struct PgItemStore {
    pool: Pool,
    schema: String,
    table: String,
}

impl PgItemStore {
    pub fn new(pool: Pool, governance_schema: &str) -> Result<Self, AppError> {
        validate_identifier("governanceSchema", governance_schema)
            .map_err(|e| AppError::Config(e.to_string()))?;
        Ok(Self {
            pool,
            schema: governance_schema.to_string(),
            table: format!("\"{}\".description_governance", governance_schema),
        })
    }

    fn row_to_item(row: &Row) -> Result<DescriptionItem, AppError> {
        let object_type: String = row.get("object_type");
        let status: String = row.get("review_status");
        Ok(DescriptionItem {
            id: row.get("id"),
            object_type: object_type
                .parse()
                .map_err(|_| AppError::Internal(format!("Corrupt object_type '{}'", object_type)))?,
            object_path: row.get("object_path"),
            catalog_name: row.get("catalog_name"),
            schema_name: row.get("schema_name"),
            table_name: row.get("table_name"),
            column_name: row.get("column_name"),
            column_data_type: row.get("column_data_type"),
            ai_generated_description: row.get("ai_generated_description"),
            approved_description: row.get("approved_description"),
            status: status
                .parse()
                .map_err(|_| AppError::Internal(format!("Corrupt review_status '{}'", status)))?,
            model_used: row.get("model_used"),
            generated_at: row.get("generated_at"),
            reviewed_at: row.get("reviewed_at"),
            applied_at: row.get("applied_at"),
            reviewer: row.get("reviewer"),
            apply_error: row.get("apply_error"),
        })
    }

    fn status_filter(query: &ItemQuery) -> Vec<String> {
        query.statuses.iter().map(|s| s.as_str().to_string()).collect()
    }
}

#[async_trait]
impl ItemStore for PgItemStore {
    async fn setup(&self) -> Result<(), AppError> {
        let client = self.pool.get().await?;

        client
            .execute(&format!("CREATE SCHEMA IF NOT EXISTS \"{}\"", self.schema), &[])
            .await?;

        client
            .execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {} (
                        id UUID PRIMARY KEY,
                        object_type TEXT NOT NULL CHECK (object_type IN ('TABLE', 'COLUMN')),
                        object_path TEXT NOT NULL,
                        catalog_name TEXT NOT NULL,
                        schema_name TEXT NOT NULL,
                        table_name TEXT NOT NULL,
                        column_name TEXT,
                        column_data_type TEXT,
                        ai_generated_description TEXT NOT NULL,
                        approved_description TEXT,
                        review_status TEXT NOT NULL
                            CHECK (review_status IN ('PENDING', 'APPROVED', 'REJECTED', 'APPLIED')),
                        model_used TEXT NOT NULL,
                        generated_at TIMESTAMPTZ NOT NULL,
                        reviewed_at TIMESTAMPTZ,
                        applied_at TIMESTAMPTZ,
                        reviewer TEXT,
                        apply_error TEXT,
                        CHECK ((reviewer IS NULL) = (reviewed_at IS NULL)),
                        CHECK (review_status NOT IN ('APPROVED', 'APPLIED')
                               OR COALESCE(approved_description, '') <> '')
                    )",
                    self.table
                ),
                &[],
            )
            .await?;

        client
            .execute(
                &format!(
                    "CREATE UNIQUE INDEX IF NOT EXISTS description_governance_open_object
                     ON {} (object_type, object_path)
                     WHERE review_status IN ('PENDING', 'APPROVED')",
                    self.table
                ),
                &[],
            )
            .await?;

        client
            .execute(
                &format!(
                    "CREATE INDEX IF NOT EXISTS description_governance_status_generated
                     ON {} (review_status, generated_at DESC, id)",
                    self.table
                ),
                &[],
            )
            .await?;

        info!("✅ Governance table {} initialized", self.table);
        Ok(())
    }

    async fn insert(&self, item: DescriptionItem) -> Result<DescriptionItem, AppError> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                &format!(
                    "INSERT INTO {} ({COLUMNS})
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
                     RETURNING {COLUMNS}",
                    self.table
                ),
                &[
                    &item.id,
                    &item.object_type.as_str(),
                    &item.object_path,
                    &item.catalog_name,
                    &item.schema_name,
                    &item.table_name,
                    &item.column_name,
                    &item.column_data_type,
                    &item.ai_generated_description,
                    &item.approved_description,
                    &item.status.as_str(),
                    &item.model_used,
                    &item.generated_at,
                    &item.reviewed_at,
                    &item.applied_at,
                    &item.reviewer,
                    &item.apply_error,
                ],
            )
            .await
            .map_err(|e| {
                if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
                    duplicate_open_item(&item)
                } else {
                    AppError::Database(e)
                }
            })?;

        debug!("Stored {} item {} ({})", item.object_type, item.id, item.object_path);
        Self::row_to_item(&row)
    }

    async fn get(&self, id: Uuid) -> Result<DescriptionItem, AppError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!("SELECT {COLUMNS} FROM {} WHERE id = $1", self.table),
                &[&id],
            )
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Description item {} not found", id)))?;
        Self::row_to_item(&row)
    }

    async fn find_open(
        &self,
        object_type: ObjectType,
        object_path: &str,
    ) -> Result<Option<DescriptionItem>, AppError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!(
                    "SELECT {COLUMNS} FROM {}
                     WHERE object_type = $1 AND object_path = $2
                       AND review_status IN ('PENDING', 'APPROVED')",
                    self.table
                ),
                &[&object_type.as_str(), &object_path],
            )
            .await?;
        row.as_ref().map(Self::row_to_item).transpose()
    }

    async fn list(&self, query: &ItemQuery) -> Result<Page<DescriptionItem>, AppError> {
        let client = self.pool.get().await?;
        let statuses = Self::status_filter(query);
        let limit = query.per_page as i64;
        let offset = query.offset() as i64;

        let total: i64 = client
            .query_one(
                &format!(
                    "SELECT COUNT(*) FROM {}
                     WHERE cardinality($1::text[]) = 0 OR review_status = ANY($1::text[])",
                    self.table
                ),
                &[&statuses],
            )
            .await?
            .get(0);

        let rows = client
            .query(
                &format!(
                    "SELECT {COLUMNS} FROM {}
                     WHERE cardinality($1::text[]) = 0 OR review_status = ANY($1::text[])
                     ORDER BY generated_at DESC, id ASC
                     LIMIT $2 OFFSET $3",
                    self.table
                ),
                &[&statuses, &limit, &offset],
            )
            .await?;

        let items = rows
            .iter()
            .map(Self::row_to_item)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page {
            items,
            page: query.page,
            per_page: query.per_page,
            total: total as u64,
        })
    }

    async fn snapshot(&self) -> Result<Vec<DescriptionItem>, AppError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(&format!("SELECT {COLUMNS} FROM {}", self.table), &[])
            .await?;
        rows.iter().map(Self::row_to_item).collect()
    }

    async fn transition(
        &self,
        id: Uuid,
        transition: Transition,
    ) -> Result<DescriptionItem, AppError> {
        let mut next = self.get(id).await?;
        next.apply_transition(&transition, Utc::now())?;

        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!(
                    "UPDATE {} SET
                        review_status = $2,
                        approved_description = $3,
                        reviewer = $4,
                        reviewed_at = $5,
                        applied_at = $6,
                        apply_error = $7
                     WHERE id = $1 AND review_status = $8
                     RETURNING {COLUMNS}",
                    self.table
                ),
                &[
                    &id,
                    &next.status.as_str(),
                    &next.approved_description,
                    &next.reviewer,
                    &next.reviewed_at,
                    &next.applied_at,
                    &next.apply_error,
                    &transition.source().as_str(),
                ],
            )
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "No {} item with id {} (changed concurrently)",
                    transition.source(),
                    id
                ))
            })?;

        debug!("Item {} moved {} -> {}", id, transition.source(), next.status);
        Self::row_to_item(&row)
    }

    async fn record_apply_error(
        &self,
        id: Uuid,
        reason: &str,
    ) -> Result<DescriptionItem, AppError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!(
                    "UPDATE {} SET apply_error = $2
                     WHERE id = $1 AND review_status = $3
                     RETURNING {COLUMNS}",
                    self.table
                ),
                &[&id, &reason, &ItemStatus::Approved.as_str()],
            )
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No APPROVED item with id {}", id)))?;
        Self::row_to_item(&row)
    }
}
