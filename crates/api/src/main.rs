//! ClassData API service
//!
//! The single entry point for the submission API. Handles:
//! - Submission ingestion (multipart or JSON)
//! - Submission reads, listings, event trails, artifact downloads
//! - Observability (logging, metrics, request IDs)

mod cursor;
mod handlers;
mod ingest;
mod sweeper;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use classdata_common::{
    cache::CacheStore,
    config::AppConfig,
    db::{DbPool, Repository},
    metrics, storage, ArtifactStore, MAX_ARTIFACT_BYTES,
};
use ingest::SubmissionProcessor;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, Level};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
    pub repo: Repository,
    pub cache: CacheStore,
    pub storage: Arc<dyn ArtifactStore>,
    pub processor: Arc<SubmissionProcessor<Repository>>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration first so logging can honor it
    let config = AppConfig::load()?;
    let config = Arc::new(config);

    init_tracing(&config);

    info!("Starting ClassData API v{}", classdata_common::VERSION);

    // Initialize metrics
    metrics::register_metrics();
    if config.observability.metrics_port > 0 {
        let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(metrics_addr)
            .install()?;
        info!("Metrics exporter listening on {}", metrics_addr);
    }

    // Initialize database connection
    let db = DbPool::new(&config.database).await?;

    // Initialize artifact storage
    let artifact_store = storage::create_store(&config.storage).await?;

    let repo = Repository::new(db.clone());
    let cache = CacheStore::new(db.clone(), config.cache.clone());
    let processor = Arc::new(SubmissionProcessor::new(
        repo.clone(),
        artifact_store.clone(),
        Some(cache.clone()),
    ));

    // Create app state
    let state = AppState {
        config: config.clone(),
        db,
        repo,
        cache: cache.clone(),
        storage: artifact_store,
        processor,
    };

    // Start the background cache sweep
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let sweeper = sweeper::spawn_sweeper(cache, config.sweep_interval(), shutdown_rx);

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the sweeper after the last request drains
    let _ = shutdown_tx.send(true);
    let _ = sweeper.await;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize the tracing subscriber per the observability config
fn init_tracing(config: &AppConfig) {
    let level = config
        .observability
        .log_level
        .parse::<Level>()
        .unwrap_or(Level::INFO);

    if config.observability.json_logging {
        tracing_subscriber::fmt()
            .with_max_level(level)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(level)
            .with_target(true)
            .init();
    }
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // API routes
    let api_routes = Router::new()
        // Submission endpoints
        .route("/submissions", post(handlers::submissions::create_submission))
        .route("/submissions", get(handlers::submissions::list_submissions))
        .route(
            "/submissions/{id}",
            get(handlers::submissions::get_submission),
        )
        .route(
            "/submissions/{id}/events",
            get(handlers::submissions::get_submission_events),
        )
        .route(
            "/submissions/{id}/file",
            get(handlers::submissions::get_submission_file),
        );

    // Compose the app
    Router::new()
        // Health endpoints outside the versioned prefix
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/v1", api_routes)
        // Leave headroom over the artifact limit for multipart framing;
        // oversized artifacts still get the precise 413 from validation.
        .layer(DefaultBodyLimit::max(MAX_ARTIFACT_BYTES + 64 * 1024))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
