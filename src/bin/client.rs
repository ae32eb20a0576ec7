use anyhow::Context;
use clap::Parser;

use ws_latency::config::{ClientArgs, ClientConfig};
use ws_latency::{client, logging, shutdown, LatencyError};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let config = ClientConfig::from(ClientArgs::parse());
    let url = config.ws_url();

    let result = client::run(&config, shutdown::interrupt_signal(), |progress| {
        println!(
            "Server Source Port:{}, average server to client latency: {}",
            progress.source_port, progress.average_us
        );
    })
    .await
    .with_context(|| format!("latency run against {url} failed"))?;

    println!("{}", result.outcome.closing_message());

    match result.report() {
        Ok(report) => println!("{report}"),
        Err(LatencyError::InsufficientData) => {
            println!("No latency samples received, percentile report unavailable");
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
