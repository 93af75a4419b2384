use std::time::Duration;

use figment::{
    providers::{Env, Serialized},
    Figment,
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ConsoleError, Result};

/// Runtime settings, layered as defaults < `IDS_*` environment variables.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// WebSocket endpoint of the event feed.
    pub feed_url: String,
    /// Base URL of the simulator controller (`/simulate/start`, `/simulate/stop`).
    pub control_url: String,
    /// Per-request timeout for simulator commands. `None` leaves it to the transport.
    pub command_timeout_ms: Option<u64>,
    /// Attempts per simulator command, including the first one.
    pub command_retries: usize,
    /// Upper bound on connecting to the feed.
    pub connect_timeout_ms: u64,
    /// Whether the console binary reconnects on its own after a drop.
    pub reconnect: bool,
    pub reconnect_initial_ms: u64,
    pub reconnect_max_ms: u64,
    /// Interval used by `start` when the operator gives none.
    pub default_interval: f64,
}

impl Default for Config {
    fn default() -> Self {
        // lokale Entwicklungsumgebung
        Self {
            feed_url: "ws://localhost:8000/ws".to_string(),
            control_url: "http://localhost:8000".to_string(),
            command_timeout_ms: None,
            command_retries: 1,
            connect_timeout_ms: 10_000,
            reconnect: true,
            reconnect_initial_ms: 1000,
            reconnect_max_ms: 30_000,
            default_interval: 1.0,
        }
    }
}

impl Config {
    /// Loads the configuration from the process environment.
    pub fn load() -> Result<Self> {
        Self::from_figment(
            Figment::from(Serialized::defaults(Config::default())).merge(Env::prefixed("IDS_")),
        )
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let feed = parse_url("feed_url", &self.feed_url)?;
        if !matches!(feed.scheme(), "ws" | "wss") {
            return Err(ConsoleError::Config(format!(
                "feed_url must use ws:// or wss://, got {}",
                self.feed_url
            )));
        }
        let control = parse_url("control_url", &self.control_url)?;
        if !matches!(control.scheme(), "http" | "https") {
            return Err(ConsoleError::Config(format!(
                "control_url must use http:// or https://, got {}",
                self.control_url
            )));
        }
        if self.command_retries == 0 {
            return Err(ConsoleError::Config("command_retries must be at least 1".to_string()));
        }
        if self.connect_timeout_ms == 0 {
            return Err(ConsoleError::Config("connect_timeout_ms must be positive".to_string()));
        }
        if self.reconnect_initial_ms == 0 || self.reconnect_max_ms < self.reconnect_initial_ms {
            return Err(ConsoleError::Config(format!(
                "reconnect backoff range {}..{} ms is invalid",
                self.reconnect_initial_ms, self.reconnect_max_ms
            )));
        }
        if !(self.default_interval.is_finite() && self.default_interval > 0.0) {
            return Err(ConsoleError::Config(format!(
                "default_interval must be a positive number of seconds, got {}",
                self.default_interval
            )));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_ms.map(Duration::from_millis)
    }
}

fn parse_url(field: &str, raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| ConsoleError::Config(format!("{field}: {e} ({raw})")))
}
