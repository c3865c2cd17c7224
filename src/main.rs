//! Description Governance API
//!
//! Proposes catalog descriptions with a language model, queues them for
//! human review and writes approved text back as table and column comments.
//!
//! Without DATABASE_URL the server keeps items in memory and refuses every
//! catalog operation, which is enough to exercise the review API locally.

use description_governance::catalog::{CatalogDirectory, PgCatalogDirectory, UnavailableCatalog};
use description_governance::config::Settings;
use description_governance::governance::{Governance, ItemStore, MemoryItemStore, PgItemStore};
use description_governance::model::ChatCompletionsModel;
use description_governance::permissions::{DenyAllGate, PermissionGate, PgPermissionGate};
use description_governance::state::AppState;
use description_governance::{create_router, db};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting Description Governance...");

    let settings = Settings::load()?;
    info!("Configuration loaded");

    let (store, catalog, gate) = init_backends(&settings).await?;

    let model = Arc::new(ChatCompletionsModel::new(settings.model.clone())?);
    info!(
        "Description model {} at {}",
        settings.model.model_name, settings.model.endpoint
    );

    let governance = Governance::new(store, catalog, gate, model, settings.generation.clone());
    if let Err(e) = governance.setup().await {
        error!("Failed to prepare governance store: {}", e);
        return Err(e.into());
    }

    let state = Arc::new(AppState::new(governance, settings.default_principal.clone()));
    let app = create_router(state, &settings);

    let addr = SocketAddr::from((settings.server.host, settings.server.port));
    info!("Server listening on http://{}", addr);
    info!("API Endpoints:");
    info!("   POST /api/setup                   - Create the governance table");
    info!("   POST /api/generate                - Generate descriptions for a schema");
    info!("   GET  /api/pending                 - Paginated review queue");
    info!("   POST /api/review/{{id}}             - Approve or reject an item");
    info!("   POST /api/review/bulk             - Review many items at once");
    info!("   POST /api/apply                   - Write approved descriptions");
    info!("   GET  /api/stats                   - Compliance statistics");
    info!("   GET  /api/coverage                - Documented-table coverage");
    info!("   GET  /api/operations              - Generation and apply runs");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing with structured logging
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,description_governance=debug,tower_http=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .compact(),
        )
        .init();
}

type Backends = (
    Arc<dyn ItemStore>,
    Arc<dyn CatalogDirectory>,
    Arc<dyn PermissionGate>,
);

/// Postgres-backed store, catalog and gate, or the in-memory fallback
async fn init_backends(settings: &Settings) -> anyhow::Result<Backends> {
    let Some(url) = settings.database.url.as_deref() else {
        warn!("DATABASE_URL not set, using in-memory store with no catalog access");
        return Ok((
            Arc::new(MemoryItemStore::new()),
            Arc::new(UnavailableCatalog),
            Arc::new(DenyAllGate),
        ));
    };

    let pool = db::connect(url, settings.database.max_pool_size).await?;
    let store = PgItemStore::new(pool.clone(), &settings.database.governance_schema)?;

    let catalog_pool = match settings.database.catalog_url.as_deref() {
        Some(catalog_url) => db::connect(catalog_url, settings.database.max_pool_size).await?,
        None => pool,
    };

    Ok((
        Arc::new(store),
        Arc::new(PgCatalogDirectory::new(catalog_pool.clone())),
        Arc::new(PgPermissionGate::new(catalog_pool)),
    ))
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("Received terminate signal, initiating graceful shutdown...");
        },
    }
}
