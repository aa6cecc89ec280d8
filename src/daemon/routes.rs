use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::daemon::handlers::{health_handler, lvl2_key_handler, AppState};
use crate::daemon::logging::request_logging_middleware;
use crate::wire::{HEALTH_PATH, LVL2_PATH};

/// Build the router of the reference key daemon.
///
/// # Routes
///
/// - `GET /health` - Liveness check, also reports epoch length and protocols
/// - `POST /drkey/v1/lvl2` - Issue a level-2 key
///
/// Every route runs through the request logging middleware, which tags the
/// response with an `X-Request-Id` header.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(HEALTH_PATH, get(health_handler))
        .route(LVL2_PATH, post(lvl2_key_handler))
        .layer(middleware::from_fn(request_logging_middleware))
        .with_state(state)
}
