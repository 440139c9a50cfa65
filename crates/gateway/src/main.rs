//! FinSight API Gateway
//!
//! The entry point for all external API requests. Handles:
//! - Conversation lifecycle and message turns
//! - Document upload and extraction status
//! - Observability (logging, tracing, request ids)

mod handlers;

use axum::{
    routing::{delete, get, post},
    Router,
};
use finsight_common::{
    config::AppConfig,
    llm::HttpLlmClient,
    store::{
        ConversationStore, DocumentRepository, MemoryConversationStore, MemoryDocumentRepository,
    },
};
use finsight_conversation::ConversationEngine;
use finsight_extraction::{AnalysisService, ExtractionPipeline};
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
    pub engine: Arc<ConversationEngine>,
    pub pipeline: Arc<ExtractionPipeline>,
    pub analysis: Arc<AnalysisService>,
    pub repo: Arc<dyn DocumentRepository>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(true)
        .json()
        .init();

    info!("Starting FinSight API Gateway v{}", finsight_common::VERSION);

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        e
    })?;
    let config = Arc::new(config);

    if config.llm.api_key.is_empty() {
        info!("No LLM API key configured, collaborator runs in mock mode");
    }

    // Wire up the services
    let store: Arc<dyn ConversationStore> = Arc::new(MemoryConversationStore::new());
    let repo: Arc<dyn DocumentRepository> = Arc::new(MemoryDocumentRepository::new());
    let llm = Arc::new(HttpLlmClient::new(config.llm.clone())?);

    let engine = Arc::new(ConversationEngine::new(
        store.clone(),
        repo.clone(),
        llm.clone(),
        (*config).clone(),
    ));
    let pipeline = Arc::new(ExtractionPipeline::new(
        repo.clone(),
        llm.clone(),
        (*config).clone(),
    ));
    let analysis = Arc::new(AnalysisService::new(repo.clone(), llm, (*config).clone()));

    let state = AppState {
        config: config.clone(),
        engine,
        pipeline,
        analysis,
        repo,
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
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
        // Conversation endpoints
        .route(
            "/conversations",
            post(handlers::conversations::create_conversation)
                .get(handlers::conversations::list_conversations),
        )
        .route(
            "/conversations/{id}",
            delete(handlers::conversations::delete_conversation),
        )
        .route(
            "/conversations/{id}/documents",
            post(handlers::conversations::add_documents),
        )
        .route(
            "/conversations/{id}/messages",
            post(handlers::conversations::send_message),
        )
        .route(
            "/conversations/{id}/history",
            get(handlers::conversations::get_history),
        )
        // Document endpoints
        .route(
            "/documents",
            post(handlers::documents::upload_document)
                .get(handlers::documents::list_documents),
        )
        .route(
            "/documents/{id}",
            get(handlers::documents::get_document)
                .delete(handlers::documents::delete_document),
        )
        .route(
            "/documents/{id}/citations",
            get(handlers::documents::get_citations),
        )
        .route(
            "/documents/{id}/extraction",
            post(handlers::documents::retry_extraction),
        )
        // Analysis endpoints
        .route(
            "/documents/{id}/analyses",
            post(handlers::analyses::run_analysis).get(handlers::analyses::list_analyses),
        )
        .route("/analyses/{id}", get(handlers::analyses::get_analysis));

    // Compose the app
    Router::new()
        .route("/health", get(handlers::health::health))
        .nest("/v1", api_routes)
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
