use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};

use crate::api::error::ApiError;
use crate::api::request_context::RequestContext;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(get_stats))
}

/// GET /v1/stats
async fn get_stats(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<impl IntoResponse, ApiError> {
    let report = state
        .service()
        .get_stats()
        .await
        .map_err(|e| ApiError::from_service(e, &ctx.request_id))?;
    Ok(Json(report))
}
