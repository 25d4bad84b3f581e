//! Service-level errors.

use brew_id::OrderId;
use thiserror::Error;

use crate::model::OrderStatus;
use crate::store::StoreError;

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors surfaced to callers of [`crate::service::ShopService`].
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("order {id} is {status}, expected READY_TO_PICKUP")]
    InvalidState { id: OrderId, status: OrderStatus },

    #[error(transparent)]
    StoreUnavailable(#[from] StoreError),
}

impl ServiceError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Whether retrying the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}
