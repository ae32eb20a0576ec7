use std::time::Duration;

use clap::Parser;

// ─── Defaults ────────────────────────────────────────────────────

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_MAX_SAMPLES: usize = 2000;
pub const DEFAULT_BATCH_SIZE: u32 = 10;
pub const DEFAULT_GRACE_MS: u64 = 1_000;
pub const DEFAULT_PUBLISH_INTERVAL_MS: u64 = 100;

// ─── Client ──────────────────────────────────────────────────────

/// A WebSocket client that measures server-to-client latency.
#[derive(Debug, Clone, Parser)]
#[command(name = "ws-latency-client", version)]
pub struct ClientArgs {
    /// Host of the WebSocket server
    #[arg(short = 'u', long = "url", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port of the WebSocket server
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Number of samples to collect before closing (0 = until interrupted)
    #[arg(
        short = 'm',
        long = "max-number",
        alias = "maxNumber",
        default_value_t = DEFAULT_MAX_SAMPLES
    )]
    pub max_number: usize,

    /// Samples per running-average line
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE, value_parser = clap::value_parser!(u32).range(1..))]
    pub batch_size: u32,

    /// How long to wait for the reader after an interrupt (ms)
    #[arg(long, default_value_t = DEFAULT_GRACE_MS)]
    pub grace_ms: u64,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// 0 means unbounded.
    pub max_samples: usize,
    pub batch_size: u32,
    pub grace: Duration,
}

impl ClientConfig {
    pub fn ws_url(&self) -> String {
        format!("ws://{}:{}/ws", self.host, self.port)
    }

    pub fn sample_cap(&self) -> Option<usize> {
        (self.max_samples > 0).then_some(self.max_samples)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            max_samples: DEFAULT_MAX_SAMPLES,
            batch_size: DEFAULT_BATCH_SIZE,
            grace: Duration::from_millis(DEFAULT_GRACE_MS),
        }
    }
}

impl From<ClientArgs> for ClientConfig {
    fn from(args: ClientArgs) -> Self {
        Self {
            host: args.host,
            port: args.port,
            max_samples: args.max_number,
            batch_size: args.batch_size,
            grace: Duration::from_millis(args.grace_ms),
        }
    }
}

// ─── Server ──────────────────────────────────────────────────────

/// Publishes timestamped samples to every connected WebSocket client.
#[derive(Debug, Clone, Parser)]
#[command(name = "ws-latency-server", version)]
pub struct ServerArgs {
    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Delay between two published samples (ms)
    #[arg(long, default_value_t = DEFAULT_PUBLISH_INTERVAL_MS, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval_ms: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub interval: Duration,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            interval: Duration::from_millis(DEFAULT_PUBLISH_INTERVAL_MS),
        }
    }
}

impl From<ServerArgs> for ServerConfig {
    fn from(args: ServerArgs) -> Self {
        Self {
            host: args.host,
            port: args.port,
            interval: Duration::from_millis(args.interval_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_defaults_match_cli_defaults() {
        let args = ClientArgs::parse_from(["ws-latency-client"]);
        let config = ClientConfig::from(args);

        assert_eq!(config.ws_url(), "ws://localhost:8080/ws");
        assert_eq!(config.sample_cap(), Some(2000));
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.grace, Duration::from_secs(1));
    }

    #[test]
    fn zero_max_number_is_unbounded() {
        let args = ClientArgs::parse_from([
            "ws-latency-client",
            "-u",
            "10.0.0.7",
            "-p",
            "9001",
            "--maxNumber",
            "0",
        ]);
        let config = ClientConfig::from(args);

        assert_eq!(config.ws_url(), "ws://10.0.0.7:9001/ws");
        assert_eq!(config.sample_cap(), None);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let parsed =
            ClientArgs::try_parse_from(["ws-latency-client", "--batch-size", "0"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn server_defaults() {
        let config = ServerConfig::from(ServerArgs::parse_from(["ws-latency-server"]));
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
        assert_eq!(config.interval, Duration::from_millis(100));
    }
}
