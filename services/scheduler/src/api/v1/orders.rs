//! Order endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use brew_id::{DrinkId, OrderId, WorkerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, FieldError};
use crate::api::request_context::RequestContext;
use crate::model::{Order, OrderStatus};
use crate::state::AppState;

const MAX_CUSTOMER_NAME_LEN: usize = 100;

/// Orders: /v1/orders
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders).post(place_order))
        .route("/{order_id}", get(get_order))
        .route("/{order_id}/pickup", put(pickup_order))
}

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    pub customer_name: String,
    pub drink_id: String,
    #[serde(default)]
    pub loyal: bool,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct OrderResponse {
    pub id: OrderId,
    pub customer_name: String,
    pub drink_id: DrinkId,
    pub status: OrderStatus,
    pub assigned_worker: Option<WorkerId>,
    pub priority_score: f64,
    pub loyal: bool,
    pub times_skipped: u32,
    pub order_time: DateTime<Utc>,
    pub hard_deadline: DateTime<Utc>,
    pub estimated_completion_time: Option<DateTime<Utc>>,
    pub completed_time: Option<DateTime<Utc>>,
    /// Whole minutes from arrival to completion, once completed.
    pub wait_minutes: Option<i64>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            wait_minutes: order.wait_minutes(),
            order_time: order.order_time(),
            hard_deadline: order.hard_deadline(),
            id: order.id,
            customer_name: order.customer_name,
            drink_id: order.drink_id,
            status: order.status,
            assigned_worker: order.assigned_worker,
            priority_score: order.priority_score,
            loyal: order.loyal,
            times_skipped: order.times_skipped,
            estimated_completion_time: order.estimated_completion_time,
            completed_time: order.completed_time,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListOrdersResponse {
    pub items: Vec<OrderResponse>,
}

fn parse_order_id(raw: &str, request_id: &str) -> Result<OrderId, ApiError> {
    raw.parse().map_err(|_| {
        ApiError::bad_request("invalid_order_id", "Invalid order ID format")
            .with_request_id(request_id)
    })
}

// =============================================================================
// Handlers
// =============================================================================

/// POST /v1/orders
async fn place_order(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<PlaceOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let request_id = ctx.request_id;

    let customer_name = req.customer_name.trim();
    if customer_name.is_empty() || customer_name.len() > MAX_CUSTOMER_NAME_LEN {
        return Err(
            ApiError::bad_request("invalid_request", "Request validation failed")
                .with_details(vec![FieldError {
                    field: "customer_name".to_string(),
                    message: format!("must be 1 to {MAX_CUSTOMER_NAME_LEN} characters"),
                }])
                .with_request_id(request_id),
        );
    }

    let drink_id: DrinkId = req.drink_id.parse().map_err(|_| {
        ApiError::bad_request("invalid_drink_id", "Invalid drink ID format")
            .with_request_id(request_id.clone())
    })?;

    let order = state
        .service()
        .place_order(customer_name, drink_id, req.loyal)
        .await
        .map_err(|e| ApiError::from_service(e, &request_id))?;

    Ok((StatusCode::CREATED, Json(OrderResponse::from(order))))
}

/// GET /v1/orders
async fn list_orders(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<impl IntoResponse, ApiError> {
    let orders = state
        .service()
        .list_orders()
        .await
        .map_err(|e| ApiError::from_service(e, &ctx.request_id))?;

    Ok(Json(ListOrdersResponse {
        items: orders.into_iter().map(OrderResponse::from).collect(),
    }))
}

/// GET /v1/orders/{order_id}
async fn get_order(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(order_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let order_id = parse_order_id(&order_id, &ctx.request_id)?;

    let order = state
        .service()
        .get_order(order_id)
        .await
        .map_err(|e| ApiError::from_service(e, &ctx.request_id))?;
    Ok(Json(OrderResponse::from(order)))
}

/// PUT /v1/orders/{order_id}/pickup
async fn pickup_order(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(order_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let order_id = parse_order_id(&order_id, &ctx.request_id)?;

    let order = state
        .service()
        .pickup_order(order_id)
        .await
        .map_err(|e| ApiError::from_service(e, &ctx.request_id))?;
    Ok(Json(OrderResponse::from(order)))
}
