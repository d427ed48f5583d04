use std::sync::Arc;

use clap::Parser;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use keylock::Config;
use keylock::server::{AppState, router};
use keylock::store::Table;

/// License activation registry server.
#[derive(Parser)]
#[command(name = "keylock-server", version)]
struct Args {
    /// Bind host (overrides HOST)
    #[arg(long)]
    host: Option<String>,
    /// Bind port (overrides PORT)
    #[arg(long)]
    port: Option<u16>,
    /// Registry file path (overrides KEYLOCK_SERVER_REGISTRY_FILE)
    #[arg(long)]
    registry: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut config = Config::from_env();
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(registry) = args.registry {
        config.server_registry_file = registry;
    }

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let state = AppState {
        registry: Arc::new(Table::open(&config.server_registry_file)),
        secret: Arc::new(config.secret.clone().into_bytes()),
    };
    let app = router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(config.addr()).await?;
    tracing::info!(addr = %config.addr(), registry = %config.server_registry_file, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
