//! Governance workflow route handlers

use crate::auth::Principal;
use crate::error::{from_validation_errors, ApiResult};
use crate::governance::{ApplyResult, BucketWindow, DescriptionItem, GenerationResult, Page};
use crate::models::{
    ActivityQuery, BulkReviewRequest, BulkReviewResponse, GenerateRequest, ItemResponse,
    MessageResponse, OperationListResponse, OperationResponse, PendingQuery, PermissionsRequest,
    ResultsResponse, ReviewActivityResponse, ReviewRequest, SchemaProgressResponse,
    StatsResponse, SuccessResponse,
};
use crate::permissions::Capability;
use crate::state::SharedState;
use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

/// Create the governance table
pub async fn setup(State(state): State<SharedState>) -> ApiResult<Json<MessageResponse>> {
    state.governance.setup().await?;
    Ok(Json(MessageResponse::new("Governance table ready")))
}

/// Generate descriptions for a schema or explicit tables
pub async fn generate(
    State(state): State<SharedState>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<GenerateRequest>,
) -> ApiResult<Json<SuccessResponse<ResultsResponse<GenerationResult>>>> {
    let request = payload.into_generation_request()?;
    info!("{} requested generation for {:?}", principal.as_str(), request.target);

    let results = state.governance.generate(principal.as_str(), &request).await?;

    Ok(Json(SuccessResponse::with_data(
        format!("Generated {} descriptions", results.generated),
        ResultsResponse { results },
    )))
}

/// Body reviewer if given, else the acting principal
fn resolve_reviewer(body: Option<String>, principal: &Principal) -> String {
    match body {
        Some(reviewer) => {
            if reviewer.trim() != principal.as_str() {
                warn!(
                    "Review recorded as '{}' on behalf of principal {}",
                    reviewer,
                    principal.as_str()
                );
            }
            reviewer
        }
        None => principal.as_str().to_string(),
    }
}

/// Approve or reject one item
pub async fn review_item(
    State(state): State<SharedState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReviewRequest>,
) -> ApiResult<Json<SuccessResponse<ItemResponse>>> {
    let reviewer = resolve_reviewer(payload.reviewer, &principal);

    let item = state
        .governance
        .review(id, payload.decision, payload.approved_description.as_deref(), &reviewer)
        .await?;

    Ok(Json(SuccessResponse::with_data(
        format!("Review status updated to {}", item.status),
        ItemResponse { item },
    )))
}

/// Apply one decision to many items
pub async fn review_bulk(
    State(state): State<SharedState>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<BulkReviewRequest>,
) -> ApiResult<Json<SuccessResponse<BulkReviewResponse>>> {
    payload.validate().map_err(from_validation_errors)?;
    let reviewer = resolve_reviewer(payload.reviewer, &principal);

    let results = state
        .governance
        .review_many(&payload.ids, payload.decision, &reviewer)
        .await?;
    let succeeded = results.iter().filter(|r| r.success).count();

    Ok(Json(SuccessResponse::with_data(
        format!("{} of {} items updated", succeeded, results.len()),
        BulkReviewResponse { results },
    )))
}

/// Write every approved description to the catalog
pub async fn apply(
    State(state): State<SharedState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<SuccessResponse<ResultsResponse<ApplyResult>>>> {
    let results = state.governance.apply_approved(principal.as_str()).await?;

    Ok(Json(SuccessResponse::with_data(
        format!(
            "Applied {} descriptions, {} failed",
            results.applied_count, results.failed_count
        ),
        ResultsResponse { results },
    )))
}

pub async fn stats(
    State(state): State<SharedState>,
) -> ApiResult<Json<SuccessResponse<StatsResponse>>> {
    let stats = state.governance.stats().await?;
    Ok(Json(SuccessResponse::with_data(
        "Statistics retrieved",
        StatsResponse { stats },
    )))
}

pub async fn schema_progress(
    State(state): State<SharedState>,
) -> ApiResult<Json<SuccessResponse<SchemaProgressResponse>>> {
    let progress = state.governance.schema_progress().await?;
    Ok(Json(SuccessResponse::with_data(
        "Schema progress retrieved",
        SchemaProgressResponse { progress },
    )))
}

pub async fn review_activity(
    State(state): State<SharedState>,
    Query(query): Query<ActivityQuery>,
) -> ApiResult<Json<SuccessResponse<ReviewActivityResponse>>> {
    let window = match query.window.as_deref() {
        Some(raw) => raw.parse::<BucketWindow>()?,
        None => BucketWindow::default(),
    };
    let activity = state.governance.review_activity(window).await?;
    Ok(Json(SuccessResponse::with_data(
        "Review activity retrieved",
        ReviewActivityResponse { activity },
    )))
}

/// Paginated review queue
pub async fn pending(
    State(state): State<SharedState>,
    Query(query): Query<PendingQuery>,
) -> ApiResult<Json<SuccessResponse<Page<DescriptionItem>>>> {
    let query = query.to_item_query()?;
    debug!("Listing items page {} ({} per page)", query.page, query.per_page);

    let page = state.governance.pending_reviews(&query).await?;
    Ok(Json(SuccessResponse::with_data(
        format!("Found {} items", page.total),
        page,
    )))
}

pub async fn get_item(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SuccessResponse<ItemResponse>>> {
    let item = state.governance.get_item(id).await?;
    Ok(Json(SuccessResponse::with_data(
        "Item retrieved",
        ItemResponse { item },
    )))
}

/// Read/modify capability of the acting principal on a schema
pub async fn check_permissions(
    State(state): State<SharedState>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<PermissionsRequest>,
) -> ApiResult<Json<SuccessResponse<Capability>>> {
    payload.validate().map_err(from_validation_errors)?;
    let capability = state
        .governance
        .check_permissions(principal.as_str(), &payload.catalog, &payload.schema)
        .await?;
    Ok(Json(SuccessResponse::with_data(
        "Permissions checked",
        capability,
    )))
}

pub async fn list_operations(
    State(state): State<SharedState>,
) -> ApiResult<Json<SuccessResponse<OperationListResponse>>> {
    let operations = state.governance.operations().await;
    Ok(Json(SuccessResponse::with_data(
        format!("Found {} operations", operations.len()),
        OperationListResponse { operations },
    )))
}

pub async fn cancel_operation(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SuccessResponse<OperationResponse>>> {
    let operation = state.governance.cancel_operation(id).await?;
    Ok(Json(SuccessResponse::with_data(
        "Cancellation requested",
        OperationResponse { operation },
    )))
}
