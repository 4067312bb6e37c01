use tracing_subscriber::EnvFilter;

use wireline::config::{Config, DEFAULT_LOG_LEVEL};
use wireline::handlers::DemoHandler;
use wireline::server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = match std::env::var("WIRELINE_CONFIG") {
        Ok(path) => Config::from_file(&path)?,
        Err(_) => Config::load(),
    };

    let filter = EnvFilter::try_new(&cfg.log_level).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(filter)
        .init();

    let handler = DemoHandler::new(&cfg)?;
    let mut server = server::serve(cfg.port, handler).await?;
    tracing::info!(port = server.local_addr().port(), "Server started");

    shutdown_signal().await?;
    tracing::info!("Shutdown signal received");

    server.close().await?;
    tracing::info!("Server stopped gracefully");
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() -> anyhow::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res?,
        _ = terminate.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn shutdown_signal() -> anyhow::Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
