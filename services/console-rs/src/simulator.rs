use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{error, info, warn};
use url::Url;

use crate::config::Config;
use crate::error::{ConsoleError, Result};

const PATH_START: &str = "/simulate/start";
const PATH_STOP: &str = "/simulate/stop";

const RETRY_BASE_MS: u64 = 100;
const RETRY_MAX: Duration = Duration::from_secs(5);

/// Operator intent relayed to the simulator controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimulatorCommand {
    /// `interval_secs` is the target spacing between simulated events.
    Start { interval_secs: f64 },
    Stop,
}

impl SimulatorCommand {
    fn path(&self) -> &'static str {
        match self {
            SimulatorCommand::Start { .. } => PATH_START,
            SimulatorCommand::Stop => PATH_STOP,
        }
    }

    fn validate(&self) -> Result<()> {
        if let SimulatorCommand::Start { interval_secs } = *self {
            if !(interval_secs.is_finite() && interval_secs > 0.0) {
                return Err(ConsoleError::InvalidParameter(format!(
                    "interval must be a positive number of seconds, got {}",
                    interval_secs
                )));
            }
        }
        Ok(())
    }
}

/// Controller reply, e.g. `{"sim": "started", "interval": 1.0}`.
/// Fields are optional; a reply that does not parse is still a success.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimulatorAck {
    #[serde(default)]
    pub sim: Option<String>,
    #[serde(default)]
    pub interval: Option<f64>,
}

/// Stateless relay for start/stop commands. Whether the simulator is running
/// is the controller's business; nothing is tracked here.
///
/// Cheap to clone; concurrent calls are independent.
#[derive(Debug, Clone)]
pub struct SimulatorClient {
    client: Client,
    base_url: String,
    attempts: usize,
}

impl SimulatorClient {
    pub fn new(base_url: &str, timeout: Option<Duration>, attempts: usize) -> Result<Self> {
        let parsed = Url::parse(base_url)
            .map_err(|e| ConsoleError::Config(format!("control_url: {e} ({base_url})")))?;

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ConsoleError::Config(format!("http client: {e}")))?;

        Ok(Self {
            client,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            attempts: attempts.max(1),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.control_url,
            config.command_timeout(),
            config.command_retries,
        )
    }

    pub async fn start(&self, interval_secs: f64) -> Result<SimulatorAck> {
        self.execute(SimulatorCommand::Start { interval_secs }).await
    }

    /// Always safe, even if the simulator was never started.
    pub async fn stop(&self) -> Result<SimulatorAck> {
        self.execute(SimulatorCommand::Stop).await
    }

    pub async fn execute(&self, command: SimulatorCommand) -> Result<SimulatorAck> {
        command.validate()?;
        let url = self.url_for(command.path());

        let mut last_err = None;
        for attempt in 0..self.attempts {
            let mut request = self.client.post(&url);
            if let SimulatorCommand::Start { interval_secs } = command {
                request = request.query(&[("interval", interval_secs)]);
            }

            match request.send().await {
                Ok(r) if r.status().is_success() => {
                    let ack = r.json::<SimulatorAck>().await.unwrap_or_default();
                    info!("Simulator {:?} acknowledged: {:?}", command, ack);
                    return Ok(ack);
                }
                Ok(r) => {
                    let status = r.status();
                    last_err = Some(format!(
                        "controller returned {}: {}",
                        status,
                        r.text().await.unwrap_or_default()
                    ));
                }
                Err(e) => {
                    last_err = Some(format!("request error: {}", e));
                }
            }

            if attempt + 1 < self.attempts {
                warn!("Simulator {:?} attempt {} failed: {:?}", command, attempt + 1, last_err);
                tokio::time::sleep(retry_delay(attempt)).await;
            }
        }

        error!("Simulator {:?} failed: {:?}", command, last_err);
        Err(ConsoleError::CommandFailed(
            last_err.unwrap_or_else(|| "unknown error".to_string()),
        ))
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// `100ms * 2^attempt`, capped at five seconds.
fn retry_delay(attempt: usize) -> Duration {
    let factor = 2u64.saturating_pow(u32::try_from(attempt).unwrap_or(u32::MAX));
    Duration::from_millis(RETRY_BASE_MS.saturating_mul(factor)).min(RETRY_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    // nothing listens here, so reaching the network would surface as CommandFailed
    fn offline_client() -> SimulatorClient {
        SimulatorClient::new("http://127.0.0.1:1", Some(Duration::from_millis(500)), 1)
            .expect("client builds")
    }

    #[tokio::test]
    async fn non_positive_intervals_are_rejected_locally() {
        let client = offline_client();
        for interval in [-1.0, 0.0, -0.0, f64::NAN, f64::INFINITY] {
            let err = client.start(interval).await.expect_err("must be rejected");
            assert!(matches!(err, ConsoleError::InvalidParameter(_)), "{interval}: {err}");
        }
    }

    #[tokio::test]
    async fn unreachable_controller_is_command_failed() {
        let client = offline_client();
        assert!(matches!(client.stop().await, Err(ConsoleError::CommandFailed(_))));
        assert!(matches!(client.start(1.5).await, Err(ConsoleError::CommandFailed(_))));
    }

    #[test]
    fn urls_join_without_double_slashes() {
        let client = SimulatorClient::new("http://localhost:8000/", None, 1).unwrap();
        assert_eq!(client.url_for(PATH_START), "http://localhost:8000/simulate/start");

        let client = SimulatorClient::new("http://gw.internal/ids", None, 1).unwrap();
        assert_eq!(client.url_for(PATH_STOP), "http://gw.internal/ids/simulate/stop");
    }

    #[test]
    fn invalid_base_url_is_a_config_error() {
        let err = SimulatorClient::new("not a url", None, 1).unwrap_err();
        assert!(matches!(err, ConsoleError::Config(_)));
    }

    #[test]
    fn retry_delay_saturates_for_large_attempt_counts() {
        assert_eq!(retry_delay(0), Duration::from_millis(100));
        assert_eq!(retry_delay(2), Duration::from_millis(400));
        assert_eq!(retry_delay(6), RETRY_MAX);
        for attempt in [57, 58, 64, 1_000, usize::MAX] {
            assert_eq!(retry_delay(attempt), RETRY_MAX);
        }
    }

    #[test]
    fn ack_parses_partial_bodies() {
        let ack: SimulatorAck = serde_json::from_str(r#"{"sim":"stopped"}"#).unwrap();
        assert_eq!(ack.sim.as_deref(), Some("stopped"));
        assert_eq!(ack.interval, None);
    }
}
