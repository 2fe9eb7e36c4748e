//! Unified error types for the server and the client probe.

use thiserror::Error;

/// Errors raised while running the HTTP server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The listener could not be bound. Fatal: there is no retry.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The accept loop failed.
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),

    /// The metrics exporter could not be installed.
    #[error("metrics exporter error: {0}")]
    Metrics(String),
}

/// Errors raised by the client health probe.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// Base URL could not be parsed or joined.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// Network or transport failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status.
    #[error("unexpected status {0}")]
    Status(reqwest::StatusCode),

    /// Body was not the expected JSON payload.
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, ServerError>;
