use axum::{
    routing::{get, post},
    Router,
};
use configuration::{Config, StorageBackend};
use database::{DbRepository, InMemoryStore, TransactionCoordinator};
use engine::{ReviewerPicker, Services};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

pub mod dto;
pub mod error;
pub mod handlers;

/// The shared application state that all handlers can access.
#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    /// Deadline for a single engine call.
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(coordinator: Arc<dyn TransactionCoordinator>, request_timeout: Duration) -> Self {
        Self {
            services: Services::new(coordinator, Arc::new(ReviewerPicker::from_entropy())),
            request_timeout,
        }
    }
}

/// Builds the application routes on top of the given state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods(Any)
        .allow_headers(AllowHeaders::any());

    Router::new()
        .route("/health", get(handlers::health))
        .route("/team/add", post(handlers::add_team))
        .route("/team/get", get(handlers::get_team))
        .route("/users/setIsActive", post(handlers::set_is_active))
        .route("/users/getReview", get(handlers::get_review))
        .route("/pullRequest/create", post(handlers::create_pull_request))
        .route("/pullRequest/merge", post(handlers::merge_pull_request))
        .route("/pullRequest/reassign", post(handlers::reassign_reviewer))
        .with_state(Arc::new(state))
        .layer(cors)
        // Logs every incoming request.
        .layer(TraceLayer::new_for_http())
}

/// Opens the store selected by `storage.backend`.
///
/// For PostgreSQL this connects the pool and, unless disabled, applies the
/// pending migrations first.
pub async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn TransactionCoordinator>> {
    match config.storage.backend {
        StorageBackend::Postgres => {
            let pool = database::connect(&config.database).await?;
            if config.database.run_migrations {
                database::run_migrations(&pool).await?;
            }
            Ok(Arc::new(DbRepository::new(pool, config.database.isolation)))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using the in-memory store; all data is lost on shutdown.");
            Ok(Arc::new(InMemoryStore::new()))
        }
    }
}

/// The main function to configure and run the web server.
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    // Tracing is initialized by the binary before this is called.
    let coordinator = open_store(&config).await?;
    let app = router(AppState::new(coordinator, config.server.request_timeout()));

    let addr = config.server.addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, backend = ?config.storage.backend, "Web server started.");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Web server stopped.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for the shutdown signal.");
        std::future::pending::<()>().await;
    }
}
