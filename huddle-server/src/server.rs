use crate::config::ServerConfig;
use crate::http::{AppState, router};
use tracing::{error, info};

/// Runs the HTTP server and the presence sweep until Ctrl-C.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let state = AppState::from_config(&config).await;
    let sweeper = state.huddle.spawn_sweep(config.presence.sweep_interval());

    let listener = tokio::net::TcpListener::bind(&config.http.bind).await?;
    info!("huddle listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    info!("huddle stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
