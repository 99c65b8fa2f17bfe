use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use fruit_merge_server::config::ServerConfig;
use fruit_merge_server::game::game_loop::GameLoopConfig;
use fruit_merge_server::metrics::{self, Metrics};
use fruit_merge_server::net::game_session::{start_game_loop, GameSession};
use fruit_merge_server::net::tls::TlsConfig;
use fruit_merge_server::net::transport::WebTransportServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("Fruit Merge Server v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::load_or_default();
    config.validate().map_err(anyhow::Error::msg)?;
    info!(
        "Configuration loaded: {}:{}, max_sessions={}, queue_depth={}",
        config.bind_address, config.port, config.max_sessions, config.session_queue_depth
    );

    let metrics = Arc::new(Metrics::new());

    let metrics_clone = metrics.clone();
    let metrics_bind = config.bind_address.to_string();
    let metrics_port = config.metrics_port;
    tokio::spawn(async move {
        if let Err(e) = metrics::start_metrics_server(metrics_clone, metrics_bind, metrics_port).await {
            error!("Metrics server error: {}", e);
        }
    });

    let tls_config = TlsConfig::load(&config).await?;

    let game_config = GameLoopConfig::default();
    game_config.validate().map_err(anyhow::Error::msg)?;
    let advertised = Arc::new(game_config.clone());
    let session = GameSession::new(game_config, metrics.clone());
    let commands = session.command_sender();
    let game_loop = start_game_loop(session);

    let server = WebTransportServer::new(config.clone(), tls_config, commands, metrics, advertised);
    info!("Server ready on https://{}", server.bind_addr());
    info!("Certificate hash: {}", server.cert_hash());

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        }
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => info!("Shutdown signal received"),
                Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
            }
        }
    }

    game_loop.abort();
    info!("Server stopped");

    Ok(())
}
