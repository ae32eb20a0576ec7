use std::sync::Arc;

use futures::{Stream, StreamExt};

use crate::error::Result;
use crate::metrics::{MetricsCollector, ProgressReport, RunningBatch, Sample};

// ─── Clock ───────────────────────────────────────────────────────

/// Receive-side wall clock, in microseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_micros(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_micros(&self) -> i64 {
        chrono::Utc::now().timestamp_micros()
    }
}

// ─── Loop outcome ────────────────────────────────────────────────

/// Why the measurement loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopExit {
    /// The configured number of samples was processed.
    CapReached { processed: usize },
    /// The channel closed, errored or delivered a malformed frame.
    StreamEnded { processed: usize, reason: String },
}

impl LoopExit {
    pub fn processed(&self) -> usize {
        match self {
            Self::CapReached { processed } | Self::StreamEnded { processed, .. } => *processed,
        }
    }
}

// ─── Measurement loop ────────────────────────────────────────────

/// Consumes samples, records latencies and emits one progress report
/// per full batch.
pub struct MeasurementLoop<C = SystemClock> {
    collector: Arc<MetricsCollector>,
    batch: RunningBatch,
    cap: Option<usize>,
    clock: C,
}

impl MeasurementLoop<SystemClock> {
    pub fn new(collector: Arc<MetricsCollector>, batch_size: u32, cap: Option<usize>) -> Self {
        Self::with_clock(collector, batch_size, cap, SystemClock)
    }
}

impl<C: Clock> MeasurementLoop<C> {
    pub fn with_clock(
        collector: Arc<MetricsCollector>,
        batch_size: u32,
        cap: Option<usize>,
        clock: C,
    ) -> Self {
        Self {
            collector,
            batch: RunningBatch::new(batch_size),
            cap,
            clock,
        }
    }

    /// Drive the loop until the cap is hit or the stream ends.
    ///
    /// With a cap of N the stream is polled at most N times, so frame
    /// N+1 is never read. Read errors are logged and end the run.
    pub async fn run<S, F>(mut self, samples: S, mut on_progress: F) -> LoopExit
    where
        S: Stream<Item = Result<Sample>>,
        F: FnMut(ProgressReport),
    {
        let samples = samples.take(self.cap.unwrap_or(usize::MAX));
        tokio::pin!(samples);

        let mut processed = 0usize;
        while let Some(item) = samples.next().await {
            let measured = item.and_then(|sample| {
                let latency_us = sample.latency_at(self.clock.now_micros())?;
                Ok((sample, latency_us))
            });
            let (sample, latency_us) = match measured {
                Ok(measured) => measured,
                Err(e) => {
                    tracing::info!(processed, error = %e, "sample stream ended");
                    return LoopExit::StreamEnded {
                        processed,
                        reason: e.to_string(),
                    };
                }
            };

            if !self.collector.record(latency_us) {
                // collector already at its cap
                break;
            }
            processed += 1;
            tracing::trace!(port = sample.source_port, latency_us, "sample");

            if let Some(average_us) = self.batch.push(latency_us) {
                on_progress(ProgressReport {
                    source_port: sample.source_port,
                    average_us,
                });
            }
        }

        match self.cap {
            Some(cap) if processed >= cap => LoopExit::CapReached { processed },
            _ if self.collector.is_full() => LoopExit::CapReached { processed },
            _ => {
                tracing::info!(processed, "sample stream finished");
                LoopExit::StreamEnded {
                    processed,
                    reason: "stream finished".into(),
                }
            }
        }
    }
}
