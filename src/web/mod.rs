use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, TraceLayer};
use tracing::Level;

use crate::config::ServerConfig;
use crate::notifier::Notifier;
use crate::pipeline::Pipeline;
use crate::registry::ConnectionRegistry;
use crate::store::ProductStore;

pub mod handlers;
pub mod ws;

#[derive(Clone)]
pub struct AppState {
    pub store: ProductStore,
    pub pipeline: Arc<Pipeline>,
    pub notifier: Notifier,
    pub registry: Arc<ConnectionRegistry>,
    pub shutdown: CancellationToken,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::service_info))
        .route("/health", get(handlers::health_check))
        .route(
            "/api/items",
            get(handlers::list_products)
                .post(handlers::create_product)
                .delete(handlers::delete_all_products),
        )
        .route(
            "/api/items/:id",
            get(handlers::get_product)
                .patch(handlers::update_product)
                .delete(handlers::delete_product),
        )
        .route("/api/tasks/run", post(handlers::trigger_parser))
        .route("/api/tasks/status", get(handlers::task_status))
        .route("/ws/items", get(ws::websocket_handler))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO)),
                )
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

pub async fn serve(
    config: &ServerConfig,
    state: AppState,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let listener =
        tokio::net::TcpListener::bind(format!("{}:{}", config.host, config.port)).await?;
    tracing::info!("Server starting on {}:{}", config.host, config.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}
