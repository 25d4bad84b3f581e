//! Application state shared across request handlers.

use std::sync::Arc;

use crate::service::ShopService;

/// Shared application state.
///
/// This is passed to all request handlers via Axum's state extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    service: Arc<ShopService>,
}

impl AppState {
    pub fn new(service: Arc<ShopService>) -> Self {
        Self {
            inner: Arc::new(AppStateInner { service }),
        }
    }

    pub fn service(&self) -> &ShopService {
        &self.inner.service
    }
}
