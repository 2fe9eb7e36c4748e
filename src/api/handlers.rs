//! HTTP API handlers.

use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::config::Config;
use crate::utils::iso_timestamp;

/// Message returned by `/api/health`.
pub const API_HEALTH_MESSAGE: &str = "Server is running";

/// Application state shared with handlers and middleware.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Resolved configuration. Never mutated after startup.
    pub config: Arc<Config>,
    /// When the server was constructed; the origin for `uptime`.
    pub started: Instant,
}

impl AppState {
    /// Create new app state.
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            started: Instant::now(),
        }
    }

    /// Seconds since startup.
    pub fn uptime_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status: "ok".
    pub status: &'static str,
    /// ISO-8601 time the response was produced.
    pub timestamp: String,
    /// Seconds since startup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime: Option<f64>,
    /// Human readable status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

impl HealthResponse {
    fn ok() -> Self {
        Self {
            status: "ok",
            timestamp: iso_timestamp(),
            uptime: None,
            message: None,
        }
    }
}

/// Liveness probe - always returns 200 with uptime.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        uptime: Some(state.uptime_secs()),
        ..HealthResponse::ok()
    })
}

/// API health check - always returns 200 with a status message.
pub async fn api_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        message: Some(API_HEALTH_MESSAGE),
        ..HealthResponse::ok()
    })
}

/// Default handler for unmatched paths and methods.
pub async fn not_found() -> impl IntoResponse {
    StatusCode::NOT_FOUND
}
