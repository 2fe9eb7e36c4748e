//! Application configuration resolved from environment variables.
//!
//! Resolution is total: every variable has a default, and unparseable numeric
//! input falls back to that default instead of failing.

use std::str::FromStr;

use serde::Deserialize;
use strum::EnumString;

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 3000;
/// Default bind host.
pub const DEFAULT_HOST: &str = "0.0.0.0";
/// Default runtime environment name.
pub const DEFAULT_NODE_ENV: &str = "development";
/// Default port of the client dev server.
pub const DEFAULT_CLIENT_PORT: &str = "5173";
/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";
/// Default request timeout in milliseconds.
pub const DEFAULT_REQUEST_TIMEOUT_MS: i64 = 30_000;
/// Default maximum accepted request body, in bytes.
pub const DEFAULT_BODY_LIMIT: i64 = 1024 * 1024;

/// Runtime environment, as named by `NODE_ENV`.
#[derive(Debug, Clone, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Environment {
    /// Local development.
    Development,
    /// Production deployment.
    Production,
    /// Test runs.
    Test,
    /// Any other value, kept verbatim.
    #[strum(default)]
    Other(String),
}

impl Environment {
    /// Parse an environment name. Unknown names are kept as [`Environment::Other`].
    pub fn parse(value: &str) -> Self {
        Self::from_str(value).unwrap_or_else(|_| Self::Other(value.to_string()))
    }

    /// The environment name as configured.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
            Self::Other(name) => name,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LogFormat {
    /// Human readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Raw environment capture. Every field is optional so capturing never fails.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEnv {
    #[serde(default)]
    pub port: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub node_env: Option<String>,
    #[serde(default)]
    pub client_port: Option<String>,
    #[serde(default)]
    pub log_level: Option<String>,
    #[serde(default)]
    pub log_format: Option<String>,
    #[serde(default)]
    pub request_timeout: Option<String>,
    #[serde(default)]
    pub body_limit: Option<String>,
    #[serde(default)]
    pub metrics_port: Option<String>,
}

/// Fully resolved, immutable server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Port to listen on. `0` asks the OS for an ephemeral port.
    pub port: u16,
    /// Interface to bind.
    pub host: String,
    /// Runtime environment.
    pub node_env: Environment,
    /// Origin allowed by the CORS stage.
    pub client_url: String,
    /// Log level directive used when `RUST_LOG` is not set.
    pub log_level: String,
    /// Log output format.
    pub log_format: LogFormat,
    /// Per-request timeout in milliseconds. `0` disables it.
    pub request_timeout_ms: u64,
    /// Maximum body size accepted by the body parsing stage.
    pub body_limit: usize,
    /// Port of the Prometheus exporter, when enabled.
    pub metrics_port: Option<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self::resolve(&RawEnv::default())
    }
}

impl Config {
    /// Load configuration from the process environment, reading .env first.
    ///
    /// Variables whose name or value is not valid UTF-8 are skipped.
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        let vars = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)));
        Self::resolve(&envy::from_iter::<_, RawEnv>(vars).unwrap_or_default())
    }

    /// Resolve configuration from an explicit set of variables.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let raw = envy::from_iter::<_, RawEnv>(
            vars.into_iter().map(|(k, v)| (k.into(), v.into())),
        )
        .unwrap_or_default();
        Self::resolve(&raw)
    }

    /// Resolve typed configuration from raw values.
    pub fn resolve(raw: &RawEnv) -> Self {
        let port = resolve_port(raw.port.as_deref(), DEFAULT_PORT, true);
        let client_port = resolve_string(raw.client_port.as_deref(), DEFAULT_CLIENT_PORT);
        let log_format = raw
            .log_format
            .as_deref()
            .and_then(|f| LogFormat::from_str(f.trim()).ok())
            .unwrap_or_default();

        Self {
            port,
            host: resolve_string(raw.host.as_deref(), DEFAULT_HOST),
            node_env: Environment::parse(&resolve_string(
                raw.node_env.as_deref(),
                DEFAULT_NODE_ENV,
            )),
            client_url: format!("http://localhost:{client_port}"),
            log_level: resolve_string(raw.log_level.as_deref(), DEFAULT_LOG_LEVEL),
            log_format,
            request_timeout_ms: resolve_int(
                raw.request_timeout.as_deref(),
                DEFAULT_REQUEST_TIMEOUT_MS,
            )
            .max(0) as u64,
            body_limit: resolve_int(raw.body_limit.as_deref(), DEFAULT_BODY_LIMIT).max(0) as usize,
            metrics_port: raw
                .metrics_port
                .as_deref()
                .map(|p| resolve_port(Some(p), 0, false))
                .filter(|p| *p != 0),
        }
    }

    /// Whether running in development.
    pub fn is_dev(&self) -> bool {
        self.node_env == Environment::Development
    }

    /// Whether running in production.
    pub fn is_prod(&self) -> bool {
        self.node_env == Environment::Production
    }

    /// Address string to bind, `host:port`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Returns the value verbatim when present and non-empty, else the default.
pub fn resolve_string(value: Option<&str>, default: &str) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => default.to_string(),
    }
}

/// Parses a base-10 integer prefix, falling back to the default.
///
/// Leading whitespace and a sign are accepted and trailing garbage is ignored,
/// so `"8080abc"` resolves to `8080`. Absent, empty or digit-less input yields
/// the default.
pub fn resolve_int(value: Option<&str>, default: i64) -> i64 {
    value.and_then(parse_int_prefix).unwrap_or(default)
}

fn resolve_port(value: Option<&str>, default: u16, allow_zero: bool) -> u16 {
    let min = if allow_zero { 0 } else { 1 };
    u16::try_from(resolve_int(value, i64::from(default)))
        .ok()
        .filter(|p| *p >= min)
        .unwrap_or(default)
}

fn parse_int_prefix(raw: &str) -> Option<i64> {
    let s = raw.trim_start();
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    if digits_end == 0 {
        return None;
    }
    let magnitude: i64 = rest[..digits_end].parse().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}
