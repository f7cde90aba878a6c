//! Route construction, grouped by surface.

pub mod api;
pub mod bridge;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Assemble the full application router. Cross-cutting layers (CORS,
/// security headers) are applied in `main`.
pub fn create_app(state: Arc<AppState>) -> Router {
    api::create_api_router()
        .merge(bridge::create_bridge_router())
        .with_state(state)
}
