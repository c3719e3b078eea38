use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    num::{NonZeroU64, NonZeroUsize},
    time::Duration,
};

use clap::Parser;

/// Location history server. Every option can also be set through its
/// environment variable.
#[derive(Debug, Clone, Parser)]
#[command(version)]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "HISTORY_SERVER_HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(long, env = "HISTORY_SERVER_LISTEN_ADDR", default_value_t = 8080)]
    pub port: u16,

    /// Seconds a location entry is kept before it expires
    #[arg(long, env = "LOCATION_HISTORY_TTL_SECONDS", default_value_t = 60)]
    pub ttl_seconds: u64,

    /// Seconds between two expiry sweeps
    #[arg(long, env = "LOCATION_HISTORY_SWEEP_INTERVAL_SECONDS", default_value = "1")]
    pub sweep_interval_seconds: NonZeroU64,

    /// Maximum number of entries kept per order, oldest dropped first
    #[arg(long, env = "LOCATION_HISTORY_MAX_ENTRIES")]
    pub max_entries: Option<NonZeroUsize>,

    /// OTLP collector to export spans to, e.g. http://localhost:4317
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,
}

impl Config {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds.get())
    }
}
