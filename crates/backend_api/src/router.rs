use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{handlers, service::RevenueService};

/// Create the main application router with all API endpoints
pub fn create_router(service: Arc<RevenueService>) -> Router {
    // Create CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the router
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Revenue endpoint
        .route("/api/revenue-stats", get(handlers::get_revenue_stats))
        // Add shared state
        .with_state(service)
        // Add middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
