use project_quest::config::parse_cli_args;
use project_quest::server::QuestServer;
use project_quest::shutdown::{wait_for_signal, Shutdown};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    observability::init_logging();

    let config = parse_cli_args();
    tracing::info!(addr = %config.net.ws_addr, "Quest server starting...");

    let shutdown = Shutdown::new();
    let shutdown_rx = shutdown.subscribe();

    let listener = match TcpListener::bind(&config.net.ws_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", config.net.ws_addr, e);
            std::process::exit(1);
        }
    };

    let server = match QuestServer::open(config).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to start server: {}", e);
            std::process::exit(1);
        }
    };

    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("Stopping server...");
        shutdown.trigger();
    });

    if let Err(e) = server.run(listener, shutdown_rx).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped.");
}
