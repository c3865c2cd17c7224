//! Catalog browsing route handlers

use crate::error::{validation_error, ApiResult};
use crate::models::{
    CatalogListResponse, CatalogQuery, CoverageQuery, CoverageResponse, SchemaListResponse,
    SuccessResponse, TableListResponse, TablesQuery,
};
use crate::state::SharedState;
use axum::{
    extract::{Query, State},
    Json,
};

pub async fn list_catalogs(
    State(state): State<SharedState>,
) -> ApiResult<Json<SuccessResponse<CatalogListResponse>>> {
    let catalogs = state.governance.list_catalogs().await?;
    Ok(Json(SuccessResponse::with_data(
        format!("Found {} catalogs", catalogs.len()),
        CatalogListResponse { catalogs },
    )))
}

pub async fn list_schemas(
    State(state): State<SharedState>,
    Query(query): Query<CatalogQuery>,
) -> ApiResult<Json<SuccessResponse<SchemaListResponse>>> {
    let schemas = state.governance.list_schemas(&query.catalog).await?;
    Ok(Json(SuccessResponse::with_data(
        format!("Found {} schemas", schemas.len()),
        SchemaListResponse { schemas },
    )))
}

pub async fn list_tables(
    State(state): State<SharedState>,
    Query(query): Query<TablesQuery>,
) -> ApiResult<Json<SuccessResponse<TableListResponse>>> {
    let tables = state
        .governance
        .list_tables(&query.catalog, &query.schema)
        .await?;
    Ok(Json(SuccessResponse::with_data(
        format!("Found {} tables", tables.len()),
        TableListResponse { tables },
    )))
}

/// Documented-table coverage; defaults to the first catalog
pub async fn coverage(
    State(state): State<SharedState>,
    Query(query): Query<CoverageQuery>,
) -> ApiResult<Json<SuccessResponse<CoverageResponse>>> {
    let catalog = match query.catalog {
        Some(catalog) => catalog,
        None => state
            .governance
            .list_catalogs()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| validation_error("catalog", "No catalog available"))?,
    };

    let coverage = state.governance.coverage(&catalog).await?;
    Ok(Json(SuccessResponse::with_data(
        format!("Coverage for {} schemas", coverage.len()),
        CoverageResponse { catalog, coverage },
    )))
}
