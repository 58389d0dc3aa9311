//! API Routes
//!
//! Configures the Axum router with all ops endpoints.

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_handler, delete_handler, get_handler, health_handler, invalidate_event_handler,
    invalidate_user_handler, set_handler, stats_handler, AppState,
};
use super::rate_limit::enforce_rate_limit;

/// Creates the main router with all endpoints configured.
///
/// # Middleware
/// - Rate limit: the state's API policy, on every route but `/health`
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let limited = Router::new()
        .route("/stats", get(stats_handler))
        .route("/cache/:namespace", delete(clear_handler))
        .route(
            "/cache/:namespace/:key",
            get(get_handler).put(set_handler).delete(delete_handler),
        )
        .route("/invalidate/events/:id", post(invalidate_event_handler))
        .route("/invalidate/users/:id", post(invalidate_user_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            enforce_rate_limit,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .merge(limited)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
