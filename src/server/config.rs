//! Server configuration

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::error::{Error, Result};

/// Environment variable overriding [`ServerConfig::bind_addr`]
pub const ENV_BIND_ADDR: &str = "HUB_BIND_ADDR";
/// Environment variable overriding [`ServerConfig::max_connections`]
pub const ENV_MAX_CONNECTIONS: &str = "HUB_MAX_CONNECTIONS";
/// Environment variable overriding [`ServerConfig::ws_path`]
pub const ENV_WS_PATH: &str = "HUB_WS_PATH";
/// Environment variable overriding [`ServerConfig::ping_interval`], in seconds
pub const ENV_PING_INTERVAL_SECS: &str = "HUB_PING_INTERVAL_SECS";

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Request path accepted for the WebSocket upgrade (`None` = any path)
    pub ws_path: Option<String>,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// WebSocket upgrade must complete within this time
    pub handshake_timeout: Duration,

    /// Disconnect if nothing is received for this long (zero = never)
    pub idle_timeout: Duration,

    /// Interval between keep-alive pings (zero = no pings)
    pub ping_interval: Duration,

    /// Enable TCP_NODELAY
    pub tcp_nodelay: bool,

    /// Largest inbound frame accepted
    pub max_frame_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 5000)),
            ws_path: Some("/ws".to_string()),
            max_connections: 0,
            handshake_timeout: Duration::from_secs(10),
            idle_timeout: Duration::ZERO,
            ping_interval: Duration::from_secs(30),
            tcp_nodelay: true,
            max_frame_size: 64 * 1024,
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Defaults overlaid with `HUB_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_BIND_ADDR) {
            config.bind_addr = parse_var(ENV_BIND_ADDR, &raw)?;
        }
        if let Some(raw) = lookup(ENV_WS_PATH) {
            let path = raw.trim();
            if !path.starts_with('/') {
                return Err(Error::Config(format!(
                    "{ENV_WS_PATH}={raw:?}: path must start with '/'"
                )));
            }
            config.ws_path = Some(path.to_string());
        }
        if let Some(raw) = lookup(ENV_MAX_CONNECTIONS) {
            config.max_connections = parse_var(ENV_MAX_CONNECTIONS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_PING_INTERVAL_SECS) {
            config.ping_interval = Duration::from_secs(parse_var(ENV_PING_INTERVAL_SECS, &raw)?);
        }

        Ok(config)
    }

    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Only accept upgrades on `path`
    pub fn ws_path(mut self, path: impl Into<String>) -> Self {
        self.ws_path = Some(path.into());
        self
    }

    /// Accept upgrades on any request path
    pub fn any_path(mut self) -> Self {
        self.ws_path = None;
        self
    }

    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }

    /// Set the largest inbound frame (at least 1 KiB)
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size.max(1024);
        self
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| Error::Config(format!("{key}={raw:?}: {e}")))
}
