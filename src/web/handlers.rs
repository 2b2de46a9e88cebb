use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::models::{NewProduct, Product, UpdateProduct};
use crate::utils::error::Result;
use crate::web::AppState;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

#[derive(Debug, Deserialize)]
pub struct TriggerParams {
    #[serde(default = "default_start_page")]
    pub start_page: u32,
    pub end_page: Option<u32>,
}

fn default_start_page() -> u32 {
    1
}

pub async fn service_info() -> Json<Value> {
    Json(json!({
        "message": "Catalog Watcher API",
        "docs": "/health",
        "websocket": "/ws/items?client_id=<id>",
    }))
}

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now(),
        "version": env!("CARGO_PKG_VERSION"),
        "service": "catalog-watcher",
    }))
}

pub async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Product>>> {
    Ok(Json(state.store.list(params.skip, params.limit).await?))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Product>> {
    Ok(Json(state.store.get(id).await?))
}

pub async fn create_product(
    State(state): State<AppState>,
    Json(new): Json<NewProduct>,
) -> Result<(StatusCode, Json<Product>)> {
    let product = state.store.create(new).await?;
    state.notifier.product_created(&product).await;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(update): Json<UpdateProduct>,
) -> Result<Json<Product>> {
    let product = state.store.update(id, update).await?;
    state.notifier.product_updated(&product).await;
    Ok(Json(product))
}

pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    state.store.delete(id).await?;
    state.notifier.product_deleted(id).await;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_all_products(State(state): State<AppState>) -> Result<Json<Value>> {
    let deleted_count = state.store.delete_all().await?;
    if deleted_count > 0 {
        state.notifier.all_products_deleted(deleted_count).await;
    }
    Ok(Json(json!({
        "message": "All products deleted successfully",
        "deleted_count": deleted_count,
    })))
}

/// On-demand pipeline run. The page-range precondition is checked here,
/// before any fetch; a run that parses nothing is a structured
/// zero-count body, never an error.
pub async fn trigger_parser(
    State(state): State<AppState>,
    Query(params): Query<TriggerParams>,
) -> Result<Json<Value>> {
    if let Some(end_page) = params.end_page {
        if end_page < params.start_page {
            return Ok(Json(json!({
                "error": "end_page must be greater than or equal to start_page",
                "start_page": params.start_page,
                "end_page": params.end_page,
                "parsed_count": 0,
                "created_count": 0,
                "updated_count": 0,
            })));
        }
    }

    let stats = state.pipeline.run(params.start_page, params.end_page).await?;

    if stats.parsed_count == 0 {
        return Ok(Json(json!({
            "message": "No products found",
            "start_page": params.start_page,
            "end_page": params.end_page,
            "parsed_count": 0,
            "created_count": 0,
            "updated_count": 0,
        })));
    }

    Ok(Json(json!({
        "message": "Parser executed successfully",
        "start_page": params.start_page,
        "end_page": params.end_page,
        "parsed_count": stats.parsed_count,
        "created_count": stats.created_count,
        "updated_count": stats.updated_count,
    })))
}

pub async fn task_status(State(state): State<AppState>) -> Json<Value> {
    let is_running = !state.shutdown.is_cancelled();
    Json(json!({
        "status": if is_running { "running" } else { "stopped" },
        "is_running": is_running,
    }))
}
