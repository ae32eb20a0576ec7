pub mod collector;
pub mod percentiles;
pub mod stream;

use serde::{Deserialize, Serialize};

use crate::error::{LatencyError, Result};

pub use collector::{MetricsCollector, ProgressReport, RunningBatch};
pub use percentiles::{percentile, LatencySummary, PercentileReport, REPORT_PERCENTILES};
pub use stream::sample_stream;

/// One frame published by the server.
/// Wire form: `{"sourcePort": 54321, "timestamp": 1718000000000000}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    /// Remote port of the client connection, as seen by the server
    pub source_port: u16,
    /// Send instant in microseconds since the Unix epoch
    pub timestamp: i64,
}

impl Sample {
    /// Stamp a sample with the current wall-clock time.
    pub fn now(source_port: u16) -> Self {
        Self {
            source_port,
            timestamp: chrono::Utc::now().timestamp_micros(),
        }
    }

    /// Latency in μs for a frame received at `received_us`.
    /// Negative when the sender clock runs ahead of ours. A timestamp so
    /// far off that the difference leaves `i64` is a malformed frame.
    pub fn latency_at(&self, received_us: i64) -> Result<i64> {
        received_us.checked_sub(self.timestamp).ok_or_else(|| {
            LatencyError::Malformed(format!(
                "timestamp {} is out of range",
                self.timestamp
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_format_uses_camel_case() {
        let sample = Sample {
            source_port: 54321,
            timestamp: 1_718_000_000_000_000,
        };
        let json = serde_json::to_string(&sample).unwrap();
        assert_eq!(json, r#"{"sourcePort":54321,"timestamp":1718000000000000}"#);
    }

    #[test]
    fn latency_is_not_clamped() {
        let sample = Sample { source_port: 1, timestamp: 1_000 };
        assert_eq!(sample.latency_at(1_250).unwrap(), 250);
        assert_eq!(sample.latency_at(900).unwrap(), -100);
    }

    #[test]
    fn out_of_range_timestamp_is_malformed() {
        let sample: Sample =
            serde_json::from_str(r#"{"sourcePort":1,"timestamp":-9223372036854775808}"#).unwrap();
        assert!(matches!(
            sample.latency_at(1_718_000_000_000_000),
            Err(LatencyError::Malformed(_))
        ));
    }
}
