//! Connection state
//!
//! Counters for one subscriber and the reason it went away.

use std::fmt;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Why a connection ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The client sent a close frame
    ClientClosed,
    /// The socket ended without a close frame
    EndOfStream,
    /// Nothing arrived within the idle timeout
    IdleTimeout,
    /// The broadcaster dropped the client
    Evicted,
    /// The server is shutting down
    Shutdown,
    /// Read or write failure
    Error(String),
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::ClientClosed => write!(f, "client closed"),
            DisconnectReason::EndOfStream => write!(f, "end of stream"),
            DisconnectReason::IdleTimeout => write!(f, "idle timeout"),
            DisconnectReason::Evicted => write!(f, "evicted"),
            DisconnectReason::Shutdown => write!(f, "server shutdown"),
            DisconnectReason::Error(e) => write!(f, "error: {}", e),
        }
    }
}

/// Per-connection bookkeeping
#[derive(Debug)]
pub struct ConnectionState {
    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// Connection start time
    pub connected_at: Instant,

    /// Pings answered
    pub pings: u64,

    /// Messages received and ignored
    pub ignored: u64,
}

impl ConnectionState {
    pub fn new(peer_addr: SocketAddr) -> Self {
        Self {
            peer_addr,
            connected_at: Instant::now(),
            pings: 0,
            ignored: 0,
        }
    }

    pub fn on_ping(&mut self) {
        self.pings += 1;
    }

    pub fn on_ignored(&mut self) {
        self.ignored += 1;
    }

    /// Get connection duration
    pub fn duration(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn addr() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8765)
    }

    #[test]
    fn test_counters() {
        let mut state = ConnectionState::new(addr());
        state.on_ping();
        state.on_ping();
        state.on_ignored();

        assert_eq!(state.pings, 2);
        assert_eq!(state.ignored, 1);
    }

    #[test]
    fn test_disconnect_reason_display() {
        assert_eq!(DisconnectReason::Evicted.to_string(), "evicted");
        assert_eq!(
            DisconnectReason::Error("reset".into()).to_string(),
            "error: reset"
        );
    }
}
