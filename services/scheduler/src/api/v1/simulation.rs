//! Simulation endpoints.
//!
//! Run and dispatch replace order data wholesale and are meant for
//! calibration runs. Stats is read-only.

use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crate::api::error::ApiError;
use crate::api::request_context::RequestContext;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/run", post(run_simulation))
        .route("/dispatch", post(simulate_dispatch))
        .route("/stats", get(simulation_stats))
}

/// POST /v1/simulation/run
async fn run_simulation(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<impl IntoResponse, ApiError> {
    let summary = state
        .service()
        .run_simulation()
        .await
        .map_err(|e| ApiError::from_service(e, &ctx.request_id))?;
    Ok(Json(summary))
}

/// POST /v1/simulation/dispatch
async fn simulate_dispatch(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<impl IntoResponse, ApiError> {
    let summary = state
        .service()
        .simulate_dispatch()
        .await
        .map_err(|e| ApiError::from_service(e, &ctx.request_id))?;
    Ok(Json(summary))
}

/// GET /v1/simulation/stats
async fn simulation_stats(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<impl IntoResponse, ApiError> {
    let stats = state
        .service()
        .simulation_stats()
        .await
        .map_err(|e| ApiError::from_service(e, &ctx.request_id))?;
    Ok(Json(stats))
}
