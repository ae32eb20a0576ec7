//! One-way WebSocket latency measurement.
//!
//! The server publishes `{sourcePort, timestamp}` frames on `/ws`; the
//! client turns each frame into a latency sample, prints a running
//! average per batch and a percentile report once the run ends.

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod measurement;
pub mod metrics;
pub mod middleware;
pub mod server;
pub mod shutdown;

pub use error::{LatencyError, Result};
