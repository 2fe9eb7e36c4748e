//! Request pipeline stages.
//!
//! Each stage is an axum `from_fn` middleware or a tower-http layer; the
//! order they run in is fixed by [`super::routes::create_router`].

use std::time::Instant;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde_json::{json, map::Entry, Map, Value};
use thiserror::Error;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tracing::info;

use super::handlers::AppState;
use crate::metrics;
use crate::utils::iso_timestamp;

/// Response headers added to every response unless a handler already set them.
pub const SECURITY_HEADERS: &[(&str, &str)] = &[
    (
        "content-security-policy",
        "default-src 'self';base-uri 'self';font-src 'self' https: data:;\
         form-action 'self';frame-ancestors 'self';img-src 'self' data:;\
         object-src 'none';script-src 'self';script-src-attr 'none';\
         style-src 'self' https: 'unsafe-inline';upgrade-insecure-requests",
    ),
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-resource-policy", "same-origin"),
    ("origin-agent-cluster", "?1"),
    ("referrer-policy", "no-referrer"),
    ("strict-transport-security", "max-age=31536000; includeSubDomains"),
    ("x-content-type-options", "nosniff"),
    ("x-dns-prefetch-control", "off"),
    ("x-download-options", "noopen"),
    ("x-frame-options", "SAMEORIGIN"),
    ("x-permitted-cross-domain-policies", "none"),
    ("x-xss-protection", "0"),
];

/// Inject the fixed security header set. Never blocks.
pub async fn security_headers(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    for &(name, value) in SECURITY_HEADERS {
        headers
            .entry(HeaderName::from_static(name))
            .or_insert_with(|| HeaderValue::from_static(value));
    }
    response
}

/// CORS policy allowing exactly `client_url`, with credentials.
///
/// Requests without an `Origin` header are passed through untouched.
pub fn cors_layer(client_url: &str) -> CorsLayer {
    let allowed = client_url.as_bytes().to_vec();
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            origin.as_bytes() == allowed.as_slice()
        }))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Emit one log line per request: timestamp, method and path.
pub async fn request_log(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let timestamp = iso_timestamp();

    info!(%timestamp, %method, %path, "{timestamp} - {method} {path}");

    let response = next.run(req).await;
    metrics::record_request(method.as_str(), response.status().as_u16(), start);
    response
}

/// Decoded request body, available to handlers as
/// `Extension<ParsedBody>` when the request declared JSON or form content.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBody(pub Value);

/// Body parsing failures. The request never reaches a handler.
#[derive(Error, Debug)]
pub enum BodyRejection {
    /// Declared JSON but the body is not a JSON object or array.
    #[error("invalid JSON body: {0}")]
    InvalidJson(String),

    /// Declared form encoding but the body is not valid UTF-8.
    #[error("invalid form body")]
    InvalidForm,

    /// Body exceeds the configured limit.
    #[error("request body larger than {limit} bytes")]
    TooLarge {
        /// Configured limit in bytes.
        limit: usize,
    },

    /// Body stream failed mid-read.
    #[error("failed to read request body: {0}")]
    Read(String),
}

impl BodyRejection {
    /// Status code sent to the client.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for BodyRejection {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Json,
    Form,
}

fn body_kind(headers: &HeaderMap) -> Option<BodyKind> {
    let content_type = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
    let mime = content_type.split(';').next()?.trim();
    if mime.eq_ignore_ascii_case("application/json") {
        Some(BodyKind::Json)
    } else if mime.eq_ignore_ascii_case("application/x-www-form-urlencoded") {
        Some(BodyKind::Form)
    } else {
        None
    }
}

/// Decode JSON and URL-encoded bodies into [`ParsedBody`].
///
/// Other content types are forwarded with the body untouched. An empty body
/// under a declared type decodes to an empty object.
pub async fn parse_body(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, BodyRejection> {
    let Some(kind) = body_kind(req.headers()) else {
        return Ok(next.run(req).await);
    };

    let limit = state.config.body_limit;
    let (parts, body) = req.into_parts();
    let bytes = Limited::new(body, limit)
        .collect()
        .await
        .map_err(|e| {
            if e.is::<LengthLimitError>() {
                BodyRejection::TooLarge { limit }
            } else {
                BodyRejection::Read(e.to_string())
            }
        })?
        .to_bytes();

    let value = if bytes.iter().all(u8::is_ascii_whitespace) {
        Value::Object(Map::new())
    } else {
        match kind {
            BodyKind::Json => decode_json(&bytes)?,
            BodyKind::Form => decode_form(&bytes)?,
        }
    };

    let mut req = Request::from_parts(parts, Body::from(bytes));
    req.extensions_mut().insert(ParsedBody(value));
    Ok(next.run(req).await)
}

fn decode_json(bytes: &[u8]) -> Result<Value, BodyRejection> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| BodyRejection::InvalidJson(e.to_string()))?;
    if value.is_object() || value.is_array() {
        Ok(value)
    } else {
        Err(BodyRejection::InvalidJson(
            "top-level value must be an object or array".to_string(),
        ))
    }
}

/// Repeated keys collect into an array, in order of appearance.
fn decode_form(bytes: &[u8]) -> Result<Value, BodyRejection> {
    std::str::from_utf8(bytes).map_err(|_| BodyRejection::InvalidForm)?;

    let mut map = Map::new();
    for (key, value) in url::form_urlencoded::parse(bytes) {
        let value = Value::String(value.into_owned());
        match map.entry(key.into_owned()) {
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
            Entry::Occupied(mut slot) => match slot.get_mut() {
                Value::Array(items) => items.push(value),
                existing => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
            },
        }
    }
    Ok(Value::Object(map))
}
