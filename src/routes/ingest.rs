//! `POST /ingest`: one station reading per request.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use chrono::Utc;
use tracing::info;

use super::AppState;
use crate::{ingest, ApiError, ReadingPayload, ValidationError};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/ingest", post(handler))
}

async fn handler(
    State((store, _config)): State<AppState>,
    body: Result<Json<ReadingPayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    // ---
    info!("POST /ingest");

    let Json(payload) = body.map_err(|e| ValidationError::new(e.body_text()))?;
    let ack = ingest::ingest(store.as_ref(), payload, Utc::now()).await?;

    Ok((StatusCode::CREATED, Json(ack)))
}
