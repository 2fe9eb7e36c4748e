//! Client-side health fetch.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::error::ProbeError;

/// Shown when the server cannot be reached or answers with something
/// other than the expected JSON.
pub const FALLBACK_MESSAGE: &str = "Could not connect to server";

/// Path of the API health endpoint.
pub const API_HEALTH_PATH: &str = "/api/health";

#[derive(Debug, Deserialize)]
struct ApiHealth {
    message: String,
}

/// Fetches the API health message from a server.
#[derive(Debug, Clone)]
pub struct HealthProbe {
    http: reqwest::Client,
    base_url: String,
}

impl HealthProbe {
    /// Create a probe for the server at `base_url`, e.g. `http://localhost:3000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .connect_timeout(Duration::from_secs(2))
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    /// Base URL the probe targets.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the health message, substituting [`FALLBACK_MESSAGE`] on any failure.
    pub async fn fetch_message(&self) -> String {
        match self.try_fetch().await {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, base_url = %self.base_url, "health check failed");
                FALLBACK_MESSAGE.to_string()
            }
        }
    }

    /// Fetch the health message, reporting why it failed.
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn try_fetch(&self) -> Result<String, ProbeError> {
        let url = Url::parse(&self.base_url)?.join(API_HEALTH_PATH)?;
        let response = self.http.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Status(status));
        }

        let body = response.bytes().await?;
        let health: ApiHealth = serde_json::from_slice(&body)?;
        debug!(message = %health.message, "health check succeeded");
        Ok(health.message)
    }
}
