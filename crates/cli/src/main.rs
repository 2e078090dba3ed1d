use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use jenky_engine::{Engine, config};
use tracing::{info, warn};

/// Jenkins automation MCP server.
#[derive(Parser)]
#[command(name = "jenky", version, about)]
struct Cli {
    /// MCP transport to serve.
    #[arg(long, value_enum, default_value_t = Transport::Stdio)]
    transport: Transport,

    /// Bind host for the HTTP transport.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Bind port for the HTTP transport.
    #[arg(long, default_value_t = 8000)]
    port: u16,

    /// Path to the configuration YAML file.
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Path to a scenarios YAML file, merged over the configured scenarios.
    #[arg(long, short = 's')]
    scenarios: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Transport {
    Stdio,
    Http,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = config::load_config_from_paths(cli.config.as_deref(), cli.scenarios.as_deref())
        .context("load configuration")?;
    let report = config::validate(&config);
    if !report.valid {
        // Keep serving: the validate_config tool stays reachable so the
        // caller can see the same report.
        for error in &report.errors {
            warn!(%error, "configuration issue");
        }
    }
    info!(
        servers = report.server_count,
        scenarios = config.scenarios.len(),
        "configuration loaded"
    );

    let engine = Arc::new(Engine::new(config));
    match cli.transport {
        Transport::Stdio => jenky_mcp::serve_stdio(engine).await,
        Transport::Http => {
            let address = jenky_mcp::resolve_bind_address(&cli.host, cli.port)?;
            let running = jenky_mcp::McpHttpServer::new(address, engine).start().await?;
            tokio::signal::ctrl_c().await.context("wait for shutdown signal")?;
            info!("shutting down");
            running.stop().await
        }
    }
}

/// Route tracing to stderr; stdout belongs to the stdio MCP transport.
fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
