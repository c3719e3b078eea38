use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    routing::{get, post},
    Json, Router,
};
use tower_http::trace::TraceLayer;

use crate::{
    request::{HistoryQuery, LocationRequest},
    response::{ApiError, HistoryResponse},
    store::LocationStore,
};

pub type SharedStore = Arc<dyn LocationStore>;

pub fn router(store: SharedStore) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/location/{order_id}/now", post(add_location))
        .route(
            "/location/{order_id}",
            get(get_location).delete(delete_location),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(store)
}

async fn health() -> &'static str {
    tracing::debug!("health check");
    "OK"
}

async fn add_location(
    State(store): State<SharedStore>,
    Path(order_id): Path<String>,
    body: Result<Json<LocationRequest>, JsonRejection>,
) -> Result<&'static str, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    store.append(&order_id, request.into())?;
    Ok("OK")
}

async fn get_location(
    State(store): State<SharedStore>,
    Path(order_id): Path<String>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let history = store.read(&order_id, query.max)?;
    Ok(Json(HistoryResponse { order_id, history }))
}

async fn delete_location(
    State(store): State<SharedStore>,
    Path(order_id): Path<String>,
) -> Result<&'static str, ApiError> {
    store.delete(&order_id)?;
    Ok("OK")
}
