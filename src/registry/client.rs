//! Subscriber handles
//!
//! A [`ClientHandle`] is the broadcaster's view of one connection: a bounded
//! queue feeding that connection's writer task. Queue depth is what decides
//! whether a client keeps up; a client whose queue stays full past the send
//! timeout is treated as failed.

use std::fmt;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;

/// Identifier assigned to a subscriber at registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(u64);

impl ClientId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a payload did not reach a client's queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendFailure {
    /// The connection's writer is gone
    Closed,
    /// The queue stayed full for the whole send timeout
    TimedOut,
}

impl fmt::Display for SendFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendFailure::Closed => write!(f, "connection closed"),
            SendFailure::TimedOut => write!(f, "send timed out"),
        }
    }
}

impl std::error::Error for SendFailure {}

/// One subscriber connection as seen by the broadcaster
#[derive(Debug, Clone)]
pub struct ClientHandle {
    peer_addr: SocketAddr,
    connected_at: Instant,
    tx: mpsc::Sender<Bytes>,
}

impl ClientHandle {
    /// Create a handle and the receiving end its connection drains
    pub fn channel(peer_addr: SocketAddr, capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = Self {
            peer_addr,
            connected_at: Instant::now(),
            tx,
        };
        (handle, rx)
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Time since the connection was accepted
    pub fn connected_for(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Whether the connection's writer is still draining the queue
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Whether both handles refer to the same connection
    pub fn same_connection(&self, other: &ClientHandle) -> bool {
        self.tx.same_channel(&other.tx)
    }

    /// Queue a payload, waiting at most `timeout` for room
    pub async fn deliver(&self, payload: Bytes, timeout: Duration) -> Result<(), SendFailure> {
        match self.tx.send_timeout(payload, timeout).await {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => Err(SendFailure::TimedOut),
            Err(SendTimeoutError::Closed(_)) => Err(SendFailure::Closed),
        }
    }
}
