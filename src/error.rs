//! Error types
//!
//! Each pipeline stage has its own error enum so the broadcast loop can decide
//! between skipping a tick and shutting down. [`Error`] collects the failures
//! that end a server run.

use std::fmt;
use std::io;

use tokio::task::JoinError;
use tokio_tungstenite::tungstenite;

pub use crate::broadcast::config::ConfigError;
pub use crate::capture::source::CaptureError;

/// Result alias for server-level operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// Socket or listener I/O failure
    Io(io::Error),
    /// WebSocket protocol failure
    WebSocket(tungstenite::Error),
    /// The frame source failed permanently
    Capture(CaptureError),
    /// Invalid configuration
    Config(ConfigError),
    /// An operation exceeded its deadline
    Timeout(&'static str),
    /// A server task panicked or was cancelled
    Task(JoinError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::WebSocket(e) => write!(f, "WebSocket error: {}", e),
            Error::Capture(e) => write!(f, "Capture error: {}", e),
            Error::Config(e) => write!(f, "Configuration error: {}", e),
            Error::Timeout(what) => write!(f, "Timed out: {}", what),
            Error::Task(e) => write!(f, "Task failed: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::WebSocket(e) => Some(e),
            Error::Capture(e) => Some(e),
            Error::Config(e) => Some(e),
            Error::Task(e) => Some(e),
            Error::Timeout(_) => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<tungstenite::Error> for Error {
    fn from(e: tungstenite::Error) -> Self {
        Error::WebSocket(e)
    }
}

impl From<CaptureError> for Error {
    fn from(e: CaptureError) -> Self {
        Error::Capture(e)
    }
}

impl From<JoinError> for Error {
    fn from(e: JoinError) -> Self {
        Error::Task(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_wraps_inner_error() {
        let err: Error = CaptureError::DeviceLost("usb reset".into()).into();
        assert_eq!(err.to_string(), "Capture error: device lost: usb reset");

        let err = Error::Timeout("websocket upgrade");
        assert_eq!(err.to_string(), "Timed out: websocket upgrade");
    }

    #[test]
    fn test_source_chain() {
        use std::error::Error as _;

        let err: Error = io::Error::new(io::ErrorKind::AddrInUse, "busy").into();
        assert!(err.source().is_some());
        assert!(Error::Timeout("x").source().is_none());
    }
}
