//! Manual scheduler trigger.

use axum::{extract::State, response::IntoResponse, routing::post, Json, Router};

use crate::api::error::ApiError;
use crate::api::request_context::RequestContext;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/tick", post(tick))
}

/// POST /v1/scheduler/tick
///
/// Runs one reconciliation cycle now, or reports that one is in flight.
async fn tick(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .service()
        .tick()
        .await
        .map_err(|e| ApiError::from_service(e, &ctx.request_id))?;
    Ok(Json(outcome))
}
