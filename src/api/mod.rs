//! HTTP API module: health endpoints and the request pipeline.

pub mod handlers;
pub mod middleware;
pub mod routes;

pub use handlers::{AppState, HealthResponse};
pub use middleware::{BodyRejection, ParsedBody};
pub use routes::create_router;
