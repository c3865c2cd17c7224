//! Data models and DTOs (Data Transfer Objects)
//!
//! Contains all request/response structures used by the API.

use crate::catalog::TableSummary;
use crate::error::{from_validation_errors, AppError};
use crate::governance::review::{BulkReviewOutcome, Decision};
use crate::governance::stats::{ComplianceStats, SchemaCoverage, SchemaProgress};
use crate::governance::store::{ItemQuery, DEFAULT_PER_PAGE};
use crate::governance::{
    DescriptionItem, GenerationRequest, GenerationTarget, ItemStatus, ObjectPath, OperationInfo,
    ReviewActivityReport,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Generic success response
#[derive(Serialize)]
pub struct SuccessResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub data: Option<T>,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn with_data(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}

/// Message-only response (no data)
#[derive(Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

// =============================================================================
// REQUESTS
// =============================================================================

/// Body of POST /api/generate
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub catalog: Option<String>,
    pub schema: Option<String>,

    /// Table names inside `schema`
    #[serde(default)]
    pub tables: Vec<String>,

    /// Fully-qualified `catalog.schema.table` paths; overrides catalog/schema
    #[serde(default)]
    pub table_paths: Vec<String>,

    #[serde(alias = "batch_size")]
    #[validate(range(min = 1, max = 1000, message = "batchSize must be between 1 and 1000"))]
    pub batch_size: Option<usize>,

    #[serde(default, alias = "include_documented")]
    pub include_documented: bool,
}

impl GenerateRequest {
    pub fn into_generation_request(self) -> Result<GenerationRequest, AppError> {
        self.validate().map_err(from_validation_errors)?;

        let target = if !self.table_paths.is_empty() {
            let paths = self
                .table_paths
                .iter()
                .map(|p| ObjectPath::parse(p))
                .collect::<Result<Vec<_>, _>>()?;
            GenerationTarget::Tables(paths)
        } else {
            GenerationTarget::Schema {
                catalog: self.catalog.unwrap_or_default(),
                schema: self.schema.unwrap_or_default(),
                tables: self.tables,
                batch_size: self.batch_size,
            }
        };

        Ok(GenerationRequest {
            target,
            include_documented: self.include_documented,
        })
    }
}

/// Body of POST /api/review/{id}
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    #[serde(alias = "status")]
    pub decision: Decision,

    #[serde(default, alias = "approved_description")]
    pub approved_description: Option<String>,

    /// Defaults to the acting principal; an explicit blank value is rejected
    #[serde(default)]
    pub reviewer: Option<String>,
}

/// Body of POST /api/review/bulk
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BulkReviewRequest {
    #[validate(length(min = 1, max = 100, message = "Between 1 and 100 ids are required"))]
    pub ids: Vec<Uuid>,

    #[serde(alias = "status")]
    pub decision: Decision,

    #[serde(default)]
    pub reviewer: Option<String>,
}

/// Body of POST /api/permissions
#[derive(Debug, Deserialize, Validate)]
pub struct PermissionsRequest {
    #[validate(length(min = 1, max = 255, message = "Catalog is required"))]
    pub catalog: String,

    #[validate(length(min = 1, max = 255, message = "Schema is required"))]
    pub schema: String,
}

/// Query of GET /api/pending
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingQuery {
    pub page: Option<u32>,
    #[serde(alias = "per_page")]
    pub per_page: Option<u32>,
    /// Comma-separated statuses; defaults to PENDING
    pub status: Option<String>,
}

impl PendingQuery {
    pub fn to_item_query(&self) -> Result<ItemQuery, AppError> {
        let statuses = match self.status.as_deref().map(str::trim) {
            None | Some("") => vec![ItemStatus::Pending],
            Some(raw) if raw.eq_ignore_ascii_case("all") => Vec::new(),
            Some(raw) => raw
                .split(',')
                .map(|s| s.trim().parse::<ItemStatus>())
                .collect::<Result<Vec<_>, _>>()?,
        };
        Ok(ItemQuery::new(
            statuses,
            self.page.unwrap_or(1),
            self.per_page.unwrap_or(DEFAULT_PER_PAGE),
        ))
    }
}

/// Query of GET /api/review-activity
#[derive(Debug, Default, Deserialize)]
pub struct ActivityQuery {
    pub window: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CatalogQuery {
    pub catalog: String,
}

#[derive(Debug, Deserialize)]
pub struct TablesQuery {
    pub catalog: String,
    pub schema: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CoverageQuery {
    pub catalog: Option<String>,
}

// =============================================================================
// RESPONSES
// =============================================================================

/// Generation or apply outcome
#[derive(Debug, Serialize)]
pub struct ResultsResponse<T: Serialize> {
    pub results: T,
}

#[derive(Debug, Serialize)]
pub struct ItemResponse {
    pub item: DescriptionItem,
}

#[derive(Debug, Serialize)]
pub struct BulkReviewResponse {
    pub results: Vec<BulkReviewOutcome>,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub stats: ComplianceStats,
}

#[derive(Debug, Serialize)]
pub struct SchemaProgressResponse {
    pub progress: Vec<SchemaProgress>,
}

#[derive(Debug, Serialize)]
pub struct ReviewActivityResponse {
    pub activity: ReviewActivityReport,
}

#[derive(Debug, Serialize)]
pub struct CatalogListResponse {
    pub catalogs: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SchemaListResponse {
    pub schemas: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct TableListResponse {
    pub tables: Vec<TableSummary>,
}

#[derive(Debug, Serialize)]
pub struct CoverageResponse {
    pub catalog: String,
    pub coverage: Vec<SchemaCoverage>,
}

#[derive(Debug, Serialize)]
pub struct OperationListResponse {
    pub operations: Vec<OperationInfo>,
}

#[derive(Debug, Serialize)]
pub struct OperationResponse {
    pub operation: OperationInfo,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_generate_request_prefers_table_paths() {
        let body: GenerateRequest = serde_json::from_value(json!({
            "catalog": "main",
            "schema": "sales",
            "tablePaths": ["main.hr.staff"]
        }))
        .unwrap();
        let request = body.into_generation_request().unwrap();
        assert_eq!(
            request.target,
            GenerationTarget::Tables(vec![ObjectPath::parse("main.hr.staff").unwrap()])
        );
    }

    #[test]
    fn test_generate_request_rejects_zero_batch() {
        let body: GenerateRequest = serde_json::from_value(json!({
            "catalog": "main",
            "schema": "sales",
            "batch_size": 0
        }))
        .unwrap();
        let err = body.into_generation_request().unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "batch_size"));
    }

    #[test]
    fn test_pending_query_statuses() {
        let query = PendingQuery {
            status: Some("approved, applied".to_string()),
            ..Default::default()
        };
        let parsed = query.to_item_query().unwrap();
        assert_eq!(parsed.statuses, vec![ItemStatus::Approved, ItemStatus::Applied]);
        assert_eq!(parsed.per_page, DEFAULT_PER_PAGE);

        let all = PendingQuery {
            status: Some("all".to_string()),
            ..Default::default()
        };
        assert!(all.to_item_query().unwrap().statuses.is_empty());

        let bad = PendingQuery {
            status: Some("DONE".to_string()),
            ..Default::default()
        };
        assert!(bad.to_item_query().is_err());
    }

    #[test]
    fn test_review_request_accepts_snake_case_aliases() {
        let body: ReviewRequest = serde_json::from_value(json!({
            "status": "APPROVED",
            "approved_description": "Edited",
            "reviewer": "ana"
        }))
        .unwrap();
        assert_eq!(body.decision, Decision::Approve);
        assert_eq!(body.approved_description.as_deref(), Some("Edited"));
    }
}
