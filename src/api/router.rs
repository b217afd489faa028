use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::webhook::receiver::handle_webhook;
use crate::AppState;

use super::auth::require_auth;
use super::handlers;

pub fn create_router(state: AppState) -> Router {
    // Public routes: the webhook is authenticated by its HMAC signature.
    let public = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::render))
        .route("/webhooks/:network", post(handle_webhook));

    // Operator surface — requires Bearer token when API_TOKEN is set.
    let protected = Router::new()
        .route("/api/trades/:trade_id", get(handlers::trades::detail))
        .route("/api/dlq", get(handlers::dlq::list))
        .route("/api/dlq/:event_id/resolve", post(handlers::dlq::resolve))
        .route("/api/dlq/:event_id/replay", post(handlers::dlq::replay))
        .route(
            "/api/config/threshold",
            get(handlers::config::get_threshold).put(handlers::config::put_threshold),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    public
        .merge(protected)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
