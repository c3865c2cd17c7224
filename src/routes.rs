//! Route definitions and router setup
//!
//! Configures all API routes and middleware.

mod catalog;
mod governance;

use crate::auth::principal_middleware;
use crate::config::Settings;
use crate::state::SharedState;
use axum::{
    http::{header, HeaderName, Method},
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::MakeRequestUuid,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
    ServiceBuilderExt,
};
use tracing::Level;

/// Create the application router with all routes and middleware
pub fn create_router(state: SharedState, settings: &Settings) -> Router {
    // Build CORS layer
    let cors = build_cors_layer(settings);

    // Build tracing/logging layer
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    // Build middleware stack
    let middleware = ServiceBuilder::new()
        .set_x_request_id(MakeRequestUuid)
        .layer(trace_layer)
        .layer(CompressionLayer::new())
        .layer(cors)
        .propagate_x_request_id();

    let api = Router::new()
        // Workflow
        .route("/setup", post(governance::setup))
        .route("/generate", post(governance::generate))
        .route("/review/bulk", post(governance::review_bulk))
        .route("/review/{id}", post(governance::review_item))
        .route("/apply", post(governance::apply))
        .route("/pending", get(governance::pending))
        .route("/items/{id}", get(governance::get_item))
        .route("/permissions", post(governance::check_permissions))

        // Statistics
        .route("/stats", get(governance::stats))
        .route("/schema-progress", get(governance::schema_progress))
        .route("/review-activity", get(governance::review_activity))

        // Catalog browsing
        .route("/catalogs", get(catalog::list_catalogs))
        .route("/schemas", get(catalog::list_schemas))
        .route("/tables", get(catalog::list_tables))
        .route("/coverage", get(catalog::coverage))

        // Long-running operations
        .route("/operations", get(governance::list_operations))
        .route("/operations/{id}/cancel", post(governance::cancel_operation))
        .layer(from_fn_with_state(state.clone(), principal_middleware));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        .layer(middleware)
        .with_state(state)
}

/// Build CORS layer from settings
fn build_cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<_> = settings
        .cors
        .allowed_origins
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();

    let headers = [
        header::CONTENT_TYPE,
        header::AUTHORIZATION,
        header::ACCEPT,
        HeaderName::from_static(crate::auth::FORWARDED_EMAIL),
        HeaderName::from_static(crate::auth::FORWARDED_USER),
    ];

    let cors = if origins.is_empty() {
        CorsLayer::new().allow_origin(Any)
    } else {
        CorsLayer::new().allow_origin(origins)
    };

    cors.allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(headers)
        .max_age(Duration::from_secs(3600))
}

/// Health check endpoint
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "success": true,
        "status": "healthy",
        "app": env!("CARGO_PKG_NAME"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}
