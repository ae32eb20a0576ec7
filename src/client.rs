use std::future::Future;
use std::sync::Arc;

use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::config::ClientConfig;
use crate::error::{LatencyError, Result};
use crate::measurement::MeasurementLoop;
use crate::metrics::{sample_stream, LatencySummary, MetricsCollector, PercentileReport, ProgressReport};
use crate::shutdown::{ShutdownCoordinator, ShutdownOutcome, WsCloser};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Everything a finished run hands to the reporter.
#[derive(Debug)]
pub struct RunResult {
    pub outcome: ShutdownOutcome,
    /// Latencies in arrival order, possibly partial after an interrupt.
    pub samples: Vec<i64>,
    pub summary: LatencySummary,
}

impl RunResult {
    /// Fails with `InsufficientData` when nothing was received.
    pub fn report(&self) -> Result<PercentileReport> {
        PercentileReport::from_samples(&self.samples)
    }
}

/// Open the WebSocket. Failure here is fatal for the client.
pub async fn connect(url: &str) -> Result<WsStream> {
    tracing::info!(url, "connecting");
    let (ws, _response) = connect_async(url)
        .await
        .map_err(|e| LatencyError::Connect {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
    tracing::info!(url, "connected");
    Ok(ws)
}

/// Connect, measure until the cap, a channel error or `interrupt`,
/// then close and collect the samples.
pub async fn run<I, F>(config: &ClientConfig, interrupt: I, on_progress: F) -> Result<RunResult>
where
    I: Future<Output = ()>,
    F: FnMut(ProgressReport) + Send + 'static,
{
    let ws = connect(&config.ws_url()).await?;
    Ok(measure(ws, config, interrupt, on_progress).await)
}

/// Run one measurement session over an already-open socket.
pub async fn measure<I, F>(ws: WsStream, config: &ClientConfig, interrupt: I, on_progress: F) -> RunResult
where
    I: Future<Output = ()>,
    F: FnMut(ProgressReport) + Send + 'static,
{
    let cap = config.sample_cap();
    let (write, read) = ws.split();

    // The reader task owns the read half; the close frame goes out on
    // the write half from here so it never waits behind a read.
    let collector = Arc::new(MetricsCollector::new(cap));
    let measurement = MeasurementLoop::new(collector.clone(), config.batch_size, cap);
    let reader = tokio::spawn(measurement.run(sample_stream(read), on_progress));

    let mut closer = WsCloser(write);
    let outcome = ShutdownCoordinator::new(config.grace)
        .run(interrupt, reader, &mut closer)
        .await;

    let summary = collector.summary();
    tracing::info!(
        cause = ?outcome.cause,
        count = summary.count,
        min_us = summary.min,
        max_us = summary.max,
        mean_us = summary.mean,
        "run finished"
    );

    RunResult {
        samples: collector.samples(),
        summary,
        outcome,
    }
}
