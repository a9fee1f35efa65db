use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers;
use crate::middleware::jwt_auth_middleware;
use crate::state::AppState;

/// Build the full application router. Kept out of main so integration
/// tests can drive the service in-process.
pub fn app(state: AppState) -> Router {
    Router::new()
        // Public
        .route("/", get(handlers::public::root))
        .route("/health", get(handlers::public::health))
        // Protected coaching API
        .merge(coach_routes(state))
        // Global middleware
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn coach_routes(state: AppState) -> Router {
    use handlers::protected::coach;

    // Body-size gate sits in front of JSON extraction: oversized requests
    // fail with 413 before any aggregation work starts.
    let max_body = state.pipeline.config().max_body_bytes;

    Router::new()
        .route("/ai-coach/generate", post(coach::generate))
        .route("/ai-coach/diag", get(coach::diag))
        .layer(axum::middleware::from_fn(jwt_auth_middleware))
        .layer(DefaultBodyLimit::max(max_body))
        .with_state(state)
}
