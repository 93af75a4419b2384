use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{ConsoleError, Result};
use crate::frame::{decode_frame, Frame};
use crate::history::SharedHistory;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

const CLOSE_GRACE: Duration = Duration::from_secs(1);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Lifecycle of the feed subscription.
///
/// `Idle → Connecting → Connected → Disconnected → Closed`, with
/// `Disconnected → Connecting` on reconnect. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected,
    Disconnected,
    Closed,
}

/// What happened to one inbound text frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Stored,
    Echo,
    Dropped,
    /// Arrived after the owning connection was closed.
    Rejected,
}

/// Exponential backoff for collaborators that want to reconnect.
/// The connection manager never reconnects on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial: Duration,
    pub max: Duration,
}

impl ReconnectPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            initial: Duration::from_millis(config.reconnect_initial_ms),
            max: Duration::from_millis(config.reconnect_max_ms),
        }
    }

    /// Delay before reconnect attempt `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        self.initial
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max)
    }
}

struct ActiveLink {
    endpoint: String,
    cancelled: Arc<AtomicBool>,
    sink: Arc<Mutex<WsSink>>,
    reader: JoinHandle<()>,
}

/// Owns at most one live WebSocket connection to the event feed and is the
/// only path by which events reach the history.
pub struct StreamConnection {
    history: SharedHistory,
    state: Arc<watch::Sender<ConnectionState>>,
    active: Option<ActiveLink>,
    connect_timeout: Duration,
}

impl StreamConnection {
    pub fn new(history: SharedHistory) -> Self {
        let (state, _) = watch::channel(ConnectionState::Idle);
        Self {
            history,
            state: Arc::new(state),
            active: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Upper bound on the TCP + WebSocket handshake in `open`.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Observe state transitions, e.g. to drive a reconnect policy.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn history(&self) -> &SharedHistory {
        &self.history
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.active.as_ref().map(|link| link.endpoint.as_str())
    }

    /// Connects to `endpoint`, closing any previous connection first.
    pub async fn open(&mut self, endpoint: &str) -> Result<()> {
        if self.state() == ConnectionState::Closed {
            return Err(ConsoleError::Transport(
                "connection manager is closed".to_string(),
            ));
        }
        self.release_active().await;

        self.state.send_replace(ConnectionState::Connecting);
        info!("Connecting to event feed {}", endpoint);

        let connected = tokio::time::timeout(self.connect_timeout, connect_async(endpoint))
            .await
            .unwrap_or_else(|_| {
                Err(tokio_tungstenite::tungstenite::Error::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("no handshake within {:?}", self.connect_timeout),
                )))
            });
        let (ws, _response) = match connected {
            Ok(pair) => pair,
            Err(e) => {
                self.state.send_replace(ConnectionState::Disconnected);
                warn!("Event feed {} unreachable: {}", endpoint, e);
                return Err(e.into());
            }
        };

        let (sink, stream) = ws.split();
        let cancelled = Arc::new(AtomicBool::new(false));
        self.state.send_replace(ConnectionState::Connected);
        info!("Connected to event feed {}", endpoint);

        let reader = tokio::spawn(read_loop(
            stream,
            self.history.clone(),
            cancelled.clone(),
            self.state.clone(),
        ));
        self.active = Some(ActiveLink {
            endpoint: endpoint.to_string(),
            cancelled,
            sink: Arc::new(Mutex::new(sink)),
            reader,
        });
        Ok(())
    }

    /// Sends a text frame on the live connection. The feed answers with an echo
    /// frame, which never reaches the history.
    pub async fn send_text(&self, text: &str) -> Result<()> {
        let link = match (&self.active, self.state()) {
            (Some(link), ConnectionState::Connected) => link,
            _ => return Err(ConsoleError::Transport("not connected".to_string())),
        };
        let mut sink = link.sink.lock().await;
        sink.send(Message::Text(text.to_string())).await?;
        Ok(())
    }

    /// Releases the connection and enters `Closed`. Safe to call repeatedly.
    pub async fn close(&mut self) {
        self.release_active().await;
        if self.state.send_replace(ConnectionState::Closed) != ConnectionState::Closed {
            info!("Event feed connection closed");
        }
    }

    async fn release_active(&mut self) {
        let Some(link) = self.active.take() else {
            return;
        };
        let ActiveLink {
            endpoint,
            cancelled,
            sink,
            reader,
        } = link;
        fence_reader(&self.history, &cancelled, &reader);

        let mut sink = sink.lock().await;
        if let Err(_) | Ok(Err(_)) = tokio::time::timeout(CLOSE_GRACE, sink.close()).await {
            debug!("Close handshake with {} did not complete", endpoint);
        }
    }
}

impl Drop for StreamConnection {
    fn drop(&mut self) {
        if let Some(link) = self.active.take() {
            fence_reader(&self.history, &link.cancelled, &link.reader);
        }
    }
}

/// After this returns the reader can no longer touch the history: any insert
/// already holding the write lock has finished, and later ones see the flag.
fn fence_reader(history: &SharedHistory, cancelled: &AtomicBool, reader: &JoinHandle<()>) {
    cancelled.store(true, Ordering::Release);
    drop(history.write());
    reader.abort();
}

async fn read_loop(
    mut stream: SplitStream<WsStream>,
    history: SharedHistory,
    cancelled: Arc<AtomicBool>,
    state: Arc<watch::Sender<ConnectionState>>,
) {
    while let Some(message) = stream.next().await {
        if cancelled.load(Ordering::Acquire) {
            return;
        }
        match message {
            Ok(Message::Text(text)) => {
                ingest_frame(&history, &cancelled, &text);
            }
            Ok(Message::Binary(bytes)) => {
                warn!("Dropping binary frame ({} bytes), feed is text-only", bytes.len());
            }
            Ok(Message::Close(frame)) => {
                info!("Event feed closed the connection: {:?}", frame);
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Event feed transport error: {}", e);
                break;
            }
        }
    }

    // runs under the watch lock, so it cannot overwrite a concurrent close/reopen
    state.send_if_modified(|current| {
        if cancelled.load(Ordering::Acquire) || *current != ConnectionState::Connected {
            return false;
        }
        *current = ConnectionState::Disconnected;
        true
    });
    if !cancelled.load(Ordering::Acquire) {
        info!("Event feed disconnected");
    }
}

/// Decodes one frame and stores it unless it is an echo, malformed, or the
/// connection it came from has been closed.
pub(crate) fn ingest_frame(history: &SharedHistory, cancelled: &AtomicBool, text: &str) -> FrameOutcome {
    let frame = match decode_frame(text, now_epoch_secs()) {
        Ok(frame) => frame,
        Err(e) => {
            warn!("Dropping inbound frame: {}", e);
            return FrameOutcome::Dropped;
        }
    };

    let event = match frame {
        Frame::Echo => {
            debug!("Echo frame suppressed");
            return FrameOutcome::Echo;
        }
        Frame::Event(event) => event,
    };

    let mut guard = history.write();
    if cancelled.load(Ordering::Acquire) {
        return FrameOutcome::Rejected;
    }
    debug!(
        "Event {} {} → {}",
        event.label(),
        event.source_address(),
        event.destination_address()
    );
    let evicted = guard.insert(event);
    if !evicted.is_empty() {
        debug!("Evicted {} event(s) from history", evicted.len());
    }
    FrameOutcome::Stored
}

fn now_epoch_secs() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
