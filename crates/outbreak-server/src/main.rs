use tracing_subscriber::EnvFilter;

use outbreak_server::config::ServerConfig;
use outbreak_server::{build_app, spawn_tickers};

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var("OUTBREAK_LOG_FORMAT").is_ok_and(|v| v == "json") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!("Outbreak server starting");

    let config = ServerConfig::load();
    if let Err(problems) = config.validate() {
        for problem in &problems {
            tracing::error!(%problem, "Invalid configuration");
        }
        std::process::exit(1);
    }

    let listen_addr = config.listen_addr.clone();
    let scheduler = config.scheduler.clone();
    let (app, state) = build_app(config);
    let _tickers = spawn_tickers(state.game.clone(), &scheduler);

    let listener = match tokio::net::TcpListener::bind(&listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %listen_addr, "Failed to bind: {e}");
            std::process::exit(1);
        },
    };
    tracing::info!(addr = %listen_addr, "Listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server error: {e}");
    }
    state.game.stop();
    tracing::info!("Outbreak server stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
