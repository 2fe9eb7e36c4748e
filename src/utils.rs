//! Small helpers shared by the server and the client.

use chrono::{SecondsFormat, Utc};

use crate::lifecycle::ShutdownCause;

/// Current UTC time as ISO-8601 with millisecond precision, e.g.
/// `2024-05-01T12:00:00.000Z`.
pub fn iso_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Wait for SIGINT or SIGTERM and report which one arrived.
pub async fn shutdown_signal() -> ShutdownCause {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => ShutdownCause::Interrupt,
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGINT handler");
                std::future::pending().await
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                ShutdownCause::Terminate
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<ShutdownCause>();

    tokio::select! {
        cause = ctrl_c => cause,
        cause = terminate => cause,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso_timestamp_is_parseable() {
        let ts = iso_timestamp();
        assert!(ts.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }
}
