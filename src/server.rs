use anyhow::Result;
use tokio::net::TcpListener;

use crate::gateway::{self, AppState};

pub async fn run(listen_addr: &str, state: AppState) -> Result<()> {
    let listener = TcpListener::bind(listen_addr).await?;

    tracing::info!(
        listen = %listen_addr,
        remote = %state.store.settings().remote_addr,
        "listening"
    );

    axum::serve(listener, gateway::build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
