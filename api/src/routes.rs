/// API route handlers for the Reel broker.
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use reel_shared::models::{UploadRequest, UploadSession};

use crate::broker::BrokerError;
use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health))
        .route("/api/vimeo/create-upload", post(create_upload))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// GET /api/health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// POST /api/vimeo/create-upload
pub async fn create_upload(
    State(state): State<Arc<AppState>>,
    body: Result<Json<UploadRequest>, JsonRejection>,
) -> Result<Json<UploadSession>, BrokerError> {
    let Json(req) = body.map_err(|e| {
        warn!("Rejected create-upload body: {}", e);
        BrokerError::BadRequest(e.body_text())
    })?;

    info!(
        "Upload session requested for {} ({} bytes, {})",
        req.file_name, req.file_size, req.file_type
    );

    let session = state.broker.create_upload(&req).await?;
    Ok(Json(session))
}
