use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsoleError {
    /// Malformed inbound frame. Never leaves the frame boundary.
    #[error("decode error: {0}")]
    Decode(String),

    /// Connection could not be established or was lost.
    #[error("transport error: {0}")]
    Transport(String),

    /// Rejected before any network call was made.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Simulator controller rejected the command or was unreachable.
    #[error("command failed: {0}")]
    CommandFailed(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<serde_json::Error> for ConsoleError {
    fn from(err: serde_json::Error) -> Self {
        ConsoleError::Decode(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ConsoleError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ConsoleError::Transport(err.to_string())
    }
}

impl From<figment::Error> for ConsoleError {
    fn from(err: figment::Error) -> Self {
        ConsoleError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ConsoleError>;
