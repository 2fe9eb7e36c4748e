//! Server lifecycle: `Created -> Listening -> ShuttingDown -> Closed`.
//!
//! The composition root owns a [`Server`], binds it, and decides whether OS
//! signals drive shutdown. Every transition goes through [`Lifecycle`], which
//! guarantees each state is entered at most once.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use strum::Display;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::api::{create_router, AppState};
use crate::config::Config;
use crate::error::{Result, ServerError};
use crate::utils::shutdown_signal;

/// Lifecycle states, in the only order they can be entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    /// Router built, not accepting connections.
    Created,
    /// Bound and accepting connections.
    Listening,
    /// No longer accepting, draining in-flight requests.
    ShuttingDown,
    /// All connections drained.
    Closed,
}

/// What triggered the shutdown transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ShutdownCause {
    /// Interrupt signal (Ctrl+C).
    #[strum(serialize = "SIGINT")]
    Interrupt,
    /// Termination request from the supervisor.
    #[strum(serialize = "SIGTERM")]
    Terminate,
    /// Explicit call through a [`ShutdownHandle`].
    #[strum(serialize = "shutdown request")]
    Requested,
}

/// Shared lifecycle state machine.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    state: Arc<watch::Sender<LifecycleState>>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    /// Create a lifecycle in the `Created` state.
    pub fn new() -> Self {
        let (state, _) = watch::channel(LifecycleState::Created);
        Self {
            state: Arc::new(state),
        }
    }

    /// Current state.
    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// `Created -> Listening`. Returns false if the server already left `Created`.
    pub fn mark_listening(&self) -> bool {
        self.transition(|s| s == LifecycleState::Created, LifecycleState::Listening)
    }

    /// Enter `ShuttingDown` because of `cause`.
    ///
    /// Only the first call has an effect and logs; later calls return false.
    pub fn begin_shutdown(&self, cause: ShutdownCause) -> bool {
        let started = self.transition(
            |s| s < LifecycleState::ShuttingDown,
            LifecycleState::ShuttingDown,
        );
        if started {
            info!(%cause, "{cause} received, shutting down gracefully");
        } else {
            debug!(%cause, state = %self.state(), "shutdown already in progress");
        }
        started
    }

    /// Enter `Closed` once all connections have drained.
    pub fn mark_closed(&self) -> bool {
        let closed = self.transition(|s| s != LifecycleState::Closed, LifecycleState::Closed);
        if closed {
            info!("server closed");
        }
        closed
    }

    /// Resolve once the state is at least `target`.
    pub async fn reached(&self, target: LifecycleState) {
        let mut rx = self.state.subscribe();
        // The sender lives as long as `self`, so the channel cannot close here.
        let _ = rx.wait_for(|s| *s >= target).await;
    }

    /// Resolve when shutdown starts, either through [`Self::begin_shutdown`]
    /// or, when `listen_for_signals` is set, through SIGINT/SIGTERM.
    pub async fn shutdown_trigger(&self, listen_for_signals: bool) {
        if listen_for_signals {
            tokio::select! {
                cause = shutdown_signal() => {
                    self.begin_shutdown(cause);
                }
                _ = self.reached(LifecycleState::ShuttingDown) => {}
            }
        } else {
            self.reached(LifecycleState::ShuttingDown).await;
        }
    }

    fn transition(&self, allowed: impl Fn(LifecycleState) -> bool, next: LifecycleState) -> bool {
        self.state.send_if_modified(|state| {
            if allowed(*state) {
                *state = next;
                true
            } else {
                false
            }
        })
    }
}

/// Cloneable handle used to stop a running server and observe its state.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    lifecycle: Lifecycle,
}

impl ShutdownHandle {
    /// Request a graceful shutdown. Idempotent.
    pub fn shutdown(&self) -> bool {
        self.lifecycle.begin_shutdown(ShutdownCause::Requested)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Wait until all connections have drained.
    pub async fn closed(&self) {
        self.lifecycle.reached(LifecycleState::Closed).await;
    }
}

/// A server in the `Created` state.
pub struct Server {
    config: Config,
    router: Router,
    lifecycle: Lifecycle,
}

impl Server {
    /// Build the middleware and route stack for `config`.
    pub fn new(config: Config) -> Self {
        let router = create_router(AppState::new(config.clone()));
        Self {
            config,
            router,
            lifecycle: Lifecycle::new(),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Bind the configured address and enter `Listening`.
    pub async fn bind(self) -> Result<BoundServer> {
        let addr = self.config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        self.lifecycle.mark_listening();
        info!(
            %local_addr,
            env = self.config.node_env.as_str(),
            "server running on http://{local_addr}"
        );
        info!("health check: http://{local_addr}/health");
        info!("api health: http://{local_addr}/api/health");

        Ok(BoundServer {
            listener,
            router: self.router,
            lifecycle: self.lifecycle,
            local_addr,
        })
    }
}

/// A server in the `Listening` state.
pub struct BoundServer {
    listener: TcpListener,
    router: Router,
    lifecycle: Lifecycle,
    local_addr: SocketAddr,
}

impl BoundServer {
    /// Address actually bound (resolves port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Handle for stopping the server from elsewhere.
    pub fn handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            lifecycle: self.lifecycle.clone(),
        }
    }

    /// Serve until shutdown is triggered, then drain and enter `Closed`.
    pub async fn serve(self, listen_for_signals: bool) -> Result<()> {
        let trigger = self.lifecycle.clone();
        let result = axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move { trigger.shutdown_trigger(listen_for_signals).await })
            .await;

        // An accept-loop failure skips ShuttingDown; Closed is still final.
        self.lifecycle.mark_closed();
        result.map_err(ServerError::Serve)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn lifecycle_moves_forward_only() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.state(), LifecycleState::Created);

        assert!(lifecycle.mark_listening());
        assert!(!lifecycle.mark_listening());
        assert_eq!(lifecycle.state(), LifecycleState::Listening);

        assert!(lifecycle.begin_shutdown(ShutdownCause::Terminate));
        assert_eq!(lifecycle.state(), LifecycleState::ShuttingDown);

        assert!(lifecycle.mark_closed());
        assert!(!lifecycle.mark_listening());
        assert_eq!(lifecycle.state(), LifecycleState::Closed);
    }

    #[test]
    fn shutdown_is_idempotent() {
        let lifecycle = Lifecycle::new();
        lifecycle.mark_listening();

        assert!(lifecycle.begin_shutdown(ShutdownCause::Interrupt));
        assert!(!lifecycle.begin_shutdown(ShutdownCause::Terminate));
        assert!(!lifecycle.begin_shutdown(ShutdownCause::Requested));
        assert_eq!(lifecycle.state(), LifecycleState::ShuttingDown);

        assert!(lifecycle.mark_closed());
        assert!(!lifecycle.mark_closed());
        assert!(!lifecycle.begin_shutdown(ShutdownCause::Requested));
        assert_eq!(lifecycle.state(), LifecycleState::Closed);
    }

    #[test]
    fn causes_name_their_signal() {
        assert_eq!(ShutdownCause::Interrupt.to_string(), "SIGINT");
        assert_eq!(ShutdownCause::Terminate.to_string(), "SIGTERM");
        assert_eq!(ShutdownCause::Requested.to_string(), "shutdown request");
        assert_eq!(LifecycleState::ShuttingDown.to_string(), "SHUTTING_DOWN");
    }

    #[tokio::test]
    async fn trigger_resolves_after_explicit_shutdown() {
        let lifecycle = Lifecycle::new();
        lifecycle.mark_listening();

        let waiter = {
            let lifecycle = lifecycle.clone();
            tokio::spawn(async move { lifecycle.shutdown_trigger(false).await })
        };
        lifecycle.begin_shutdown(ShutdownCause::Requested);

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("trigger did not resolve")
            .unwrap();
    }

    #[tokio::test]
    async fn server_runs_and_closes_on_request() {
        let config = Config::from_vars([("PORT", "0"), ("HOST", "127.0.0.1")]);
        let server = Server::new(config);
        assert_eq!(server.state(), LifecycleState::Created);

        let bound = server.bind().await.unwrap();
        assert_ne!(bound.local_addr().port(), 0);
        let handle = bound.handle();
        assert_eq!(handle.state(), LifecycleState::Listening);

        let task = tokio::spawn(bound.serve(false));
        assert!(handle.shutdown());
        assert!(!handle.shutdown());

        tokio::time::timeout(Duration::from_secs(5), handle.closed())
            .await
            .expect("server did not close");
        task.await.unwrap().unwrap();
        assert_eq!(handle.state(), LifecycleState::Closed);
    }

    #[tokio::test]
    async fn bind_failure_is_reported() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port().to_string();
        let config = Config::from_vars([("PORT", port.as_str()), ("HOST", "127.0.0.1")]);

        let err = Server::new(config).bind().await.err().unwrap();
        assert!(matches!(err, ServerError::Bind { .. }));
    }
}
