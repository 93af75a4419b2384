//! Monitoring console core for a live security-event feed: WebSocket ingestion
//! into a bounded history, operator selection, and simulator start/stop control.

pub mod config;
pub mod error;
pub mod event;
pub mod frame;
pub mod history;
pub mod selection;
pub mod session;
pub mod simulator;
pub mod stream;

pub use config::Config;
pub use error::{ConsoleError, Result};
pub use event::Event;
pub use frame::{decode_frame, Frame};
pub use history::{EventHistory, SharedHistory, Snapshot, HISTORY_CAPACITY};
pub use selection::Selection;
pub use session::MonitorSession;
pub use simulator::{SimulatorAck, SimulatorClient, SimulatorCommand};
pub use stream::{ConnectionState, FrameOutcome, ReconnectPolicy, StreamConnection};
