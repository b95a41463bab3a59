use serde::Deserialize;
use std::time::Duration;

const DEFAULT_CONNECTION_LIMIT: usize = 10_000;
const DEFAULT_BACKLOG: i32 = 5_000;
const DEFAULT_KEEP_ALIVE_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_SEND_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_RECEIVE_TIMEOUT_MS: u64 = 30_000;

/// Socket-level timeouts, all in milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct SocketOptions {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_send_timeout")]
    pub send_timeout_ms: u64,
    #[serde(default = "default_receive_timeout")]
    pub receive_timeout_ms: u64,
}

/// Tunnel watchdog settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TunnelOptions {
    /// Maximum span with zero bytes moved in either direction before the
    /// tunnel is torn down.
    #[serde(default = "default_keep_alive_timeout")]
    pub keep_alive_timeout_ms: u64,
}

/// Validated server configuration. Immutable once loaded; a validation
/// failure is fatal at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    #[serde(default = "default_connection_limit")]
    pub connection_limit: usize,
    #[serde(default = "default_backlog")]
    pub backlog: i32,
    #[serde(default)]
    pub socket: SocketOptions,
    #[serde(default)]
    pub tunnel: TunnelOptions,
}

fn default_listen_port() -> u16 {
    10800
}

fn default_connection_limit() -> usize {
    DEFAULT_CONNECTION_LIMIT
}

fn default_backlog() -> i32 {
    DEFAULT_BACKLOG
}

fn default_keep_alive_timeout() -> u64 {
    DEFAULT_KEEP_ALIVE_TIMEOUT_MS
}

fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

fn default_send_timeout() -> u64 {
    DEFAULT_SEND_TIMEOUT_MS
}

fn default_receive_timeout() -> u64 {
    DEFAULT_RECEIVE_TIMEOUT_MS
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            send_timeout_ms: DEFAULT_SEND_TIMEOUT_MS,
            receive_timeout_ms: DEFAULT_RECEIVE_TIMEOUT_MS,
        }
    }
}

impl Default for TunnelOptions {
    fn default() -> Self {
        Self {
            keep_alive_timeout_ms: DEFAULT_KEEP_ALIVE_TIMEOUT_MS,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_port: default_listen_port(),
            connection_limit: DEFAULT_CONNECTION_LIMIT,
            backlog: DEFAULT_BACKLOG,
            socket: SocketOptions::default(),
            tunnel: TunnelOptions::default(),
        }
    }
}

impl SocketOptions {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }
}

impl TunnelOptions {
    pub fn keep_alive_timeout(&self) -> Duration {
        Duration::from_millis(self.keep_alive_timeout_ms)
    }
}

impl Config {
    /// Loads configuration from the YAML file named by `SIPHON_CONFIG`
    /// (default `config.yaml`). A missing file yields the defaults; a file
    /// that exists but fails to parse or validate is a startup error.
    pub fn load() -> anyhow::Result<Self> {
        let path =
            std::env::var("SIPHON_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());

        let cfg = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_yaml::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Config::default(),
            Err(e) => return Err(e.into()),
        };

        cfg.validate()?;
        Ok(cfg)
    }

    /// Per-field validation, fatal at startup.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.connection_limit < 2 {
            anyhow::bail!("'connection_limit' must be at least 2");
        }
        if self.backlog < 1 {
            anyhow::bail!("'backlog' must be at least 1");
        }
        if self.socket.connect_timeout_ms == 0 {
            anyhow::bail!("'socket.connect_timeout_ms' must be greater than 0");
        }
        if self.socket.send_timeout_ms == 0 {
            anyhow::bail!("'socket.send_timeout_ms' must be greater than 0");
        }
        if self.socket.receive_timeout_ms == 0 {
            anyhow::bail!("'socket.receive_timeout_ms' must be greater than 0");
        }
        Ok(())
    }
}
