use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use ws_latency::config::{ServerArgs, ServerConfig};
use ws_latency::server::{self, AppState};
use ws_latency::{logging, shutdown};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let config = ServerConfig::from(ServerArgs::parse());
    let listener = server::bind(&config)
        .await
        .context("is the port already in use?")?;

    tracing::info!(
        addr = %config.bind_addr(),
        interval_ms = config.interval.as_millis() as u64,
        "http server listening"
    );

    let state = Arc::new(AppState::from(&config));
    server::serve(listener, state, async {
        shutdown::interrupt_signal().await;
        tracing::info!("shutdown signal received");
    })
    .await
    .context("server exited with error")?;

    Ok(())
}
