//! End-to-end tests against a real listener on an ephemeral port.
//!
//! Run with: cargo test --test integration

use std::net::SocketAddr;
use std::time::Duration;

use scaffold::client::{AppPage, HealthProbe, FALLBACK_MESSAGE};
use scaffold::config::Config;
use scaffold::{LifecycleState, Server, ShutdownHandle};
use serde_json::Value;
use tokio::task::JoinHandle;

struct Running {
    addr: SocketAddr,
    handle: ShutdownHandle,
    task: JoinHandle<scaffold::Result<()>>,
}

impl Running {
    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn stop(self) {
        self.handle.shutdown();
        tokio::time::timeout(Duration::from_secs(5), self.handle.closed())
            .await
            .expect("server did not drain in time");
        self.task.await.unwrap().unwrap();
    }
}

async fn start() -> Running {
    let config = Config::from_vars([("PORT", "0"), ("HOST", "127.0.0.1"), ("NODE_ENV", "test")]);
    let bound = Server::new(config).bind().await.expect("bind ephemeral port");
    let addr = bound.local_addr();
    let handle = bound.handle();
    let task = tokio::spawn(bound.serve(false));
    Running { addr, handle, task }
}

#[tokio::test]
async fn health_then_shutdown() {
    let server = start().await;
    assert_eq!(server.handle.state(), LifecycleState::Listening);

    let response = reqwest::get(server.url("/health")).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["uptime"].as_f64().unwrap() >= 0.0);

    let addr = server.addr;
    let handle = server.handle.clone();
    server.stop().await;
    assert_eq!(handle.state(), LifecycleState::Closed);

    // Listener is gone: new connections are refused.
    assert!(tokio::net::TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn api_health_and_not_found_over_the_wire() {
    let server = start().await;

    let body: Value = reqwest::get(server.url("/api/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["message"], "Server is running");

    let missing = reqwest::get(server.url("/does-not-exist")).await.unwrap();
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);

    server.stop().await;
}

#[tokio::test]
async fn repeated_shutdown_is_harmless() {
    let server = start().await;

    assert!(server.handle.shutdown());
    assert!(!server.handle.shutdown());
    server.stop().await;
}

#[tokio::test]
async fn client_page_reads_server_message() {
    let server = start().await;

    let probe = HealthProbe::new(format!("http://{}", server.addr));
    let mut page = AppPage::mount(&probe).await;
    assert_eq!(page.health_message(), "Server is running");
    for _ in 0..3 {
        page.click();
    }
    assert_eq!(page.count(), 3);

    server.stop().await;

    // Same probe after the server is gone falls back.
    assert_eq!(probe.fetch_message().await, FALLBACK_MESSAGE);
}

#[test]
fn blocking_callers_can_drive_the_lifecycle() {
    tokio_test::block_on(async {
        let lifecycle = scaffold::lifecycle::Lifecycle::new();
        assert!(lifecycle.mark_listening());
        assert!(lifecycle.begin_shutdown(scaffold::ShutdownCause::Terminate));
        lifecycle.reached(LifecycleState::ShuttingDown).await;
        assert!(lifecycle.mark_closed());
    });
}

#[cfg(unix)]
#[tokio::test]
async fn sigterm_drains_and_closes() {
    use tokio::signal::unix::{signal, SignalKind};

    // Installing a handler first keeps SIGTERM from killing the test binary.
    let mut terminate = signal(SignalKind::terminate()).expect("install SIGTERM handler");

    let config = Config::from_vars([("PORT", "0"), ("HOST", "127.0.0.1"), ("NODE_ENV", "test")]);
    let bound = Server::new(config).bind().await.expect("bind ephemeral port");
    let addr = bound.local_addr();
    let handle = bound.handle();
    let task = tokio::spawn(bound.serve(true));

    let response = reqwest::get(format!("http://{addr}/health")).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    // The serve task registers its own listener when it first polls the
    // shutdown future, so resend until the state moves.
    let pid = std::process::id().to_string();
    let mut closed = false;
    for _ in 0..20 {
        let status = std::process::Command::new("kill")
            .args(["-TERM", &pid])
            .status()
            .expect("run kill");
        assert!(status.success());
        terminate.recv().await;

        if tokio::time::timeout(Duration::from_millis(250), handle.closed())
            .await
            .is_ok()
        {
            closed = true;
            break;
        }
    }

    assert!(closed, "server did not close after SIGTERM");
    assert_eq!(handle.state(), LifecycleState::Closed);
    task.await.unwrap().unwrap();
    assert!(!handle.shutdown());
}
