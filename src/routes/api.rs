use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::api;
use crate::state::AppState;
use std::sync::Arc;

/// Create the REST API router
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/health", get(api::health_check))
        .route("/api/mcp/tools", get(api::list_tools))
        .route("/api/mcp/tools/call", post(api::call_tool))
        .layer(TraceLayer::new_for_http())
}
