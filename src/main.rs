//! Scaffold server entry point.

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use scaffold::client::HealthProbe;
use scaffold::config::{Config, LogFormat};
use scaffold::metrics;
use scaffold::Server;

/// Starter web service with health checks and graceful shutdown.
#[derive(Parser, Debug)]
#[command(name = "scaffold")]
#[command(about = "Health-check web service with a fixed middleware chain")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default).
    Serve,

    /// Print the resolved configuration.
    CheckConfig,

    /// Fetch the API health message from a running server.
    Probe {
        /// Server base URL. Defaults to the configured port on localhost.
        #[arg(long, env = "SERVER_URL")]
        url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::load();

    init_tracing(&config, args.verbose);

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => cmd_serve(config).await,
        Command::CheckConfig => cmd_check_config(&config),
        Command::Probe { url } => cmd_probe(&config, url).await,
    }
}

fn init_tracing(config: &Config, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("scaffold=debug,info")
    } else {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&config.log_level))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Text => registry.with(fmt::layer()).init(),
    }
}

/// Run the server until SIGINT/SIGTERM, then drain and exit.
async fn cmd_serve(config: Config) -> anyhow::Result<()> {
    metrics::init_metrics();
    if let Some(port) = config.metrics_port {
        metrics::install_exporter(port).context("failed to start metrics exporter")?;
    }

    info!(
        env = config.node_env.as_str(),
        client_url = %config.client_url,
        "starting server"
    );

    let bound = Server::new(config)
        .bind()
        .await
        .context("failed to start server")?;

    // This process is the entry point, so OS signals drive shutdown.
    bound.serve(true).await.context("server terminated abnormally")?;
    Ok(())
}

/// Print the resolved configuration.
fn cmd_check_config(config: &Config) -> anyhow::Result<()> {
    println!("======================================================================");
    println!("SCAFFOLD - CONFIGURATION");
    println!("======================================================================");
    println!("  Bind address:    {}", config.bind_addr());
    println!("  Environment:     {}", config.node_env.as_str());
    println!("  Development:     {}", config.is_dev());
    println!("  Production:      {}", config.is_prod());
    println!("  Client URL:      {}", config.client_url);
    println!("  Log level:       {}", config.log_level);
    println!("  Log format:      {:?}", config.log_format);
    println!("  Request timeout: {}ms", config.request_timeout_ms);
    println!("  Body limit:      {} bytes", config.body_limit);
    match config.metrics_port {
        Some(port) => println!("  Metrics port:    {port}"),
        None => println!("  Metrics port:    disabled"),
    }
    println!("======================================================================");
    Ok(())
}

/// Run the client health probe against a server.
async fn cmd_probe(config: &Config, url: Option<String>) -> anyhow::Result<()> {
    let url = url.unwrap_or_else(|| format!("http://localhost:{}", config.port));
    let probe = HealthProbe::new(url);
    println!("{}", probe.fetch_message().await);
    Ok(())
}
