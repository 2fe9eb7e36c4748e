//! HTTP API route definitions and the middleware chain around them.

use std::time::Duration;

use axum::{http::StatusCode, middleware, routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, timeout::TimeoutLayer, trace::TraceLayer};

use super::handlers::{api_health, health, not_found, AppState};
use super::middleware::{cors_layer, parse_body, request_log, security_headers};

/// Create the API router.
///
/// Stages run outermost first: security headers, CORS, compression, request
/// log, timeout, body parsing, then route dispatch. The trace span wraps the
/// whole chain.
pub fn create_router(state: AppState) -> Router {
    let config = state.config.clone();

    Router::new()
        // Liveness probe, outside the /api prefix
        .route("/health", get(health).fallback(not_found))
        .route("/api/health", get(api_health).fallback(not_found))
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(security_headers))
                .layer(cors_layer(&config.client_url))
                .layer(CompressionLayer::new())
                .layer(middleware::from_fn(request_log))
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    request_timeout(config.request_timeout_ms),
                ))
                .layer(middleware::from_fn_with_state(state.clone(), parse_body)),
        )
        .with_state(state)
}

/// `0` disables the timeout.
fn request_timeout(ms: u64) -> Duration {
    if ms == 0 {
        Duration::MAX
    } else {
        Duration::from_millis(ms)
    }
}
