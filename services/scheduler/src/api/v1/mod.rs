//! API v1 routes.

mod menu;
mod orders;
mod scheduler;
mod simulation;
mod stats;

use axum::Router;

use crate::state::AppState;

/// Create API v1 routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/menu", menu::routes())
        .nest("/orders", orders::routes())
        .nest("/scheduler", scheduler::routes())
        .nest("/simulation", simulation::routes())
        .nest("/stats", stats::routes())
}
