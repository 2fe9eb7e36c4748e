//! Starter web service: health checks behind a fixed middleware chain, with
//! an explicit, gracefully draining server lifecycle.
//!
//! # Request flow
//!
//! ```text
//! client ── GET /api/health ──▶ security headers ▶ CORS ▶ compression
//!                               ▶ request log ▶ timeout ▶ body parsing
//!                               ▶ route dispatch ──▶ {"status":"ok", ...}
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration resolved from environment variables
//! - [`error`]: Unified error types
//! - [`api`]: Health handlers, middleware stages and the router
//! - [`lifecycle`]: `Created -> Listening -> ShuttingDown -> Closed`
//! - [`client`]: Page routing, counter and health probe of the client
//! - [`metrics`]: Request metrics and the optional Prometheus exporter
//! - [`utils`]: Utility functions

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod metrics;
pub mod utils;

pub use config::Config;
pub use error::{Result, ServerError};
pub use lifecycle::{LifecycleState, Server, ShutdownCause, ShutdownHandle};
