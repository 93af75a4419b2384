use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::watch;

use crate::config::Config;
use crate::error::Result;
use crate::event::Event;
use crate::history::{SharedHistory, Snapshot};
use crate::selection::Selection;
use crate::simulator::{SimulatorAck, SimulatorClient};
use crate::stream::{ConnectionState, StreamConnection};

/// One monitoring session: a feed connection, its history, the operator's
/// selection and a simulator client. A fresh session starts with an empty
/// history; nothing here is process-global.
pub struct MonitorSession {
    feed_url: String,
    stream: StreamConnection,
    selection: Arc<RwLock<Selection>>,
    simulator: SimulatorClient,
}

impl MonitorSession {
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        let stream = StreamConnection::new(SharedHistory::new())
            .with_connect_timeout(config.connect_timeout());
        Ok(Self::assemble(
            &config.feed_url,
            stream,
            SimulatorClient::from_config(config)?,
        ))
    }

    pub fn with_parts(feed_url: &str, simulator: SimulatorClient) -> Self {
        Self::assemble(feed_url, StreamConnection::new(SharedHistory::new()), simulator)
    }

    fn assemble(feed_url: &str, stream: StreamConnection, simulator: SimulatorClient) -> Self {
        Self {
            feed_url: feed_url.to_string(),
            stream,
            selection: Arc::new(RwLock::new(Selection::new())),
            simulator,
        }
    }

    /// (Re)connects to the configured feed.
    pub async fn connect(&mut self) -> Result<()> {
        let endpoint = self.feed_url.clone();
        self.stream.open(&endpoint).await
    }

    pub async fn send_text(&self, text: &str) -> Result<()> {
        self.stream.send_text(text).await
    }

    pub async fn shutdown(&mut self) {
        self.stream.close().await;
    }

    pub fn state(&self) -> ConnectionState {
        self.stream.state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.stream.subscribe_state()
    }

    pub fn history(&self) -> SharedHistory {
        self.stream.history().clone()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.stream.history().snapshot()
    }

    pub fn select(&self, event: &Event) {
        self.selection
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .select(event);
    }

    /// Selects the `index`-th most recent event. Returns the selected event,
    /// or `None` if the index is past the end of the history.
    pub fn select_index(&self, index: usize) -> Option<Event> {
        let snapshot = self.snapshot();
        let event = snapshot.get(index)?;
        self.select(event);
        Some(Event::clone(event))
    }

    pub fn clear_selection(&self) {
        self.selection
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn selected(&self) -> Option<Event> {
        self.selection
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .current()
            .cloned()
    }

    /// Handle for issuing commands from other tasks.
    pub fn simulator(&self) -> SimulatorClient {
        self.simulator.clone()
    }

    pub async fn start_simulator(&self, interval_secs: f64) -> Result<SimulatorAck> {
        self.simulator.start(interval_secs).await
    }

    pub async fn stop_simulator(&self) -> Result<SimulatorAck> {
        self.simulator.stop().await
    }
}
