//! Menu endpoint.

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::request_context::RequestContext;
use crate::model::Drink;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(list_menu))
}

#[derive(Debug, Serialize)]
pub struct MenuResponse {
    pub items: Vec<Drink>,
}

/// GET /v1/menu
async fn list_menu(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<impl IntoResponse, ApiError> {
    let items = state
        .service()
        .menu()
        .await
        .map_err(|e| ApiError::from_service(e, &ctx.request_id))?;
    Ok(Json(MenuResponse { items }))
}
