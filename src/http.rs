//! Axum HTTP handlers for the trigger endpoint.
//!
//! The data store's database webhook POSTs each inserted attendance row to
//! [`TRIGGER_PATH`]. The handler is the catch-all boundary: whatever goes
//! wrong inside an invocation, including a panic, becomes a logged JSON
//! response and never an unhandled fault.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde_json::json;
use std::sync::Arc;

use crate::constants::TRIGGER_PATH;
use crate::model::TriggerPayload;
use crate::pipeline::{Outcome, Pipeline};

/// Build the Axum router with all endpoints.
pub fn build_router(pipeline: Arc<Pipeline>) -> Router {
    Router::new()
        .route(TRIGGER_PATH, post(handle_trigger))
        .route("/health", get(handle_health))
        .with_state(pipeline)
}

/// Convert a pipeline outcome into the HTTP response.
pub fn outcome_response(outcome: &Outcome) -> Response {
    let status =
        StatusCode::from_u16(outcome.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(outcome.body())).into_response()
}

/// POST /push-notification -- one pipeline invocation
async fn handle_trigger(State(pipeline): State<Arc<Pipeline>>, body: Bytes) -> Response {
    let payload = match TriggerPayload::parse(&body) {
        Ok(payload) => payload,
        Err(e) => {
            log::error!("[Server] Undecodable trigger payload: {e}");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "invalid trigger payload", "detail": e.to_string()})),
            )
                .into_response();
        }
    };

    // Run on its own task so a panic is contained and reported.
    let invocation =
        tokio::spawn(async move { pipeline.handle(payload.record.as_ref()).await });

    match invocation.await {
        Ok(outcome) => {
            log::info!(
                "[Server] Invocation finished: {} ({})",
                outcome.label(),
                outcome.status_code()
            );
            outcome_response(&outcome)
        }
        Err(e) => {
            log::error!("[Server] Invocation aborted: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "internal error", "detail": e.to_string()})),
            )
                .into_response()
        }
    }
}

/// GET /health -- liveness and identity
async fn handle_health(State(pipeline): State<Arc<Pipeline>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "project_id": pipeline.account().project_id(),
    }))
}
