use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use daga_server::bootstrap::load_node;
use daga_server::server::{build_node, router, spawn_session_sweeper, ServerConfig};
use daga_server::RandomShares;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(name = "daga-server")]
#[command(about = "DAGA anonymous authentication server node", long_about = None)]
#[command(version)]
struct Args {
    /// Public authentication context descriptor
    auth_context: PathBuf,

    /// This server's private descriptor
    private_data: PathBuf,

    /// Host to bind to, overriding configuration
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Port to listen on instead of base_port + server index
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable metrics endpoint
    #[arg(long, env = "METRICS_ENABLED", default_value = "false")]
    metrics: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = ServerConfig::from_env().unwrap_or_else(|e| {
        error!("Failed to load configuration: {e}");
        info!("Using default configuration");
        ServerConfig::default()
    });
    if let Some(host) = args.host {
        config.host = host;
    }
    config.metrics.enabled |= args.metrics;

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {e}");
        return Err(format!("Invalid configuration: {e}").into());
    }

    let (context, secret) = load_node(&args.auth_context, &args.private_data)?;
    let index = secret.index();
    let group = context.group_id();
    let servers = context.server_count();
    let addr = config.listen_addr(index, args.port)?;

    let state = build_node(&config, context, secret, Arc::new(RandomShares))?;
    spawn_session_sweeper(state.service().clone(), config.cleanup_interval());

    if config.metrics.enabled {
        let metrics_addr = config.metrics.addr()?;
        tokio::spawn(async move {
            if let Err(e) = metrics_exporter_prometheus::PrometheusBuilder::new()
                .with_http_listener(metrics_addr)
                .install()
            {
                error!("Failed to start metrics server: {e}");
            } else {
                info!("Metrics server started on {metrics_addr}");
            }
        });
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        %group,
        server = index,
        servers,
        %addr,
        rate_limit = config.rate_limit.requests_per_minute,
        burst = config.rate_limit.burst,
        "Server starting"
    );

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }

    info!("Initiating graceful shutdown (allowing in-flight requests to complete)");
}
