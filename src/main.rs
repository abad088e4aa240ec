use std::net::SocketAddr;

use accounts::config::Configuration;
use accounts::{app, initialize_state, telemetry};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    telemetry::setup_logging();

    let config = Configuration::load()?;
    let mut state = initialize_state(&config).await?;

    match telemetry::setup_metrics_recorder(&config.name) {
        Ok(handle) => state.metrics = Some(handle),
        Err(err) => tracing::warn!(%err, "metrics recorder not installed"),
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(name = %config.name, %addr, "server started");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "cannot listen for shutdown signal");
    }
    tracing::info!("shutting down");
}
