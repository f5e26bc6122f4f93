use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("connecting to {addr} timed out after {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("command {command:?} timed out after {timeout:?}")]
    CommandTimeout { command: String, timeout: Duration },
    #[error("device busy: no session available within {0:?}")]
    Busy(Duration),
    #[error("session closed by the device")]
    Closed,
    #[error("session i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

impl DeviceError {
    /// Whether the session can still be used for the next command.
    ///
    /// Only a command timeout leaves the login intact; everything else aborts the collection.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DeviceError::CommandTimeout { .. })
    }
}
