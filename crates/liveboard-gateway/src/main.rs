use std::net::SocketAddr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use liveboard_client::StreamTarget;
use liveboard_core::{config::LiveboardConfig, StreamMode};
use liveboard_upstream::RelayClientFactory;
use tracing::{info, warn};

mod app;
mod http;
mod session;
#[cfg(test)]
mod testing;
mod watch;

/// Live-stream engagement gateway.
#[derive(Parser, Debug)]
#[command(name = "liveboard-gateway", version, about)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "LIVEBOARD_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve /stream and /health (the default).
    Serve,
    /// Follow a gateway stream and log the leaderboard.
    Watch {
        /// Streamer handle to subscribe to.
        #[arg(long)]
        handle: String,
        #[arg(long, default_value = "live")]
        mode: StreamMode,
        /// Gateway base URL; defaults to client.server_url.
        #[arg(long)]
        url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "liveboard_gateway=info,tower_http=debug".into()),
        )
        .init();

    let cli = Cli::parse();

    // load config: --config / LIVEBOARD_CONFIG > ~/.liveboard/liveboard.toml
    let config = LiveboardConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        LiveboardConfig::default()
    });

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Watch { handle, mode, url } => {
            watch::run(config, StreamTarget::new(handle, mode), url).await
        }
    }
}

async fn serve(config: LiveboardConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;

    match config.upstream.relay_url.as_deref() {
        Some(url) => info!(relay = %url, "live mode via webcast relay"),
        None => warn!(
            "upstream.relay_url not set, live sessions will report an error; demo mode works"
        ),
    }
    let live = Arc::new(RelayClientFactory::new(config.upstream.clone()));

    let state = Arc::new(app::AppState::new(config, live));
    let router = app::build_router(state);

    info!("Liveboard gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}
