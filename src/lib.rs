use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod validation;

use middleware::{FixedWindowLimiter, RATE_LIMIT_MAX_REQUESTS, RATE_LIMIT_WINDOW};

// Application State
pub struct AppState {
    pub db: sqlx::MySqlPool,
    pub limiter: FixedWindowLimiter,
}

impl AppState {
    pub fn new(db: sqlx::MySqlPool) -> Self {
        Self {
            db,
            limiter: FixedWindowLimiter::new(RATE_LIMIT_MAX_REQUESTS, RATE_LIMIT_WINDOW),
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    // Submissions and result lookups share the per-client request budget;
    // the catalog endpoints stay outside it.
    let rate_limited_routes = Router::new()
        .route(
            "/api/results",
            post(handlers::results::submit_results).get(handlers::results::list_results),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit,
        ));

    Router::new()
        .route("/", get(root))
        .route("/api/servers", get(handlers::servers::list_servers))
        .route(
            "/api/recommendations",
            get(handlers::recommendations::get_recommendations),
        )
        .merge(rate_limited_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn root() -> &'static str {
    "PingDiff API"
}
