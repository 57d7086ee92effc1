//! Per-connection handler
//!
//! Each accepted socket is upgraded to a WebSocket, registered with the
//! [`ClientRegistry`] and split into two halves:
//!
//! ```text
//!              ┌──────────── reader (this task) ────────────┐
//!  socket ───► │ ping ──► reply_tx ─┐                        │
//!              │ close / idle / shutdown ──► unregister      │
//!              └────────────────────┼───────────────────────┘
//!                                   ▼
//!  registry ── payload_tx ──► writer task ──► socket
//!                             (replies first)
//! ```
//!
//! The welcome is written before the writer starts, so it always precedes
//! the first point cloud. Dropping the client from the registry closes its
//! payload queue; the writer then sends a close frame and the reader ends.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tokio::time;
use tokio_tungstenite::tungstenite::{self, Message};

use crate::error::{Error, Result};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::registry::{ClientHandle, ClientId, ClientRegistry};
use crate::server::config::ServerConfig;
use crate::session::{ConnectionState, DisconnectReason};

/// Control replies that may wait for the writer
const REPLY_QUEUE_CAPACITY: usize = 16;

/// How the writer task ended
#[derive(Debug)]
enum WriterExit {
    /// A queue closed; a close frame was attempted
    Closed,
    /// A socket write failed
    Failed(tungstenite::Error),
    /// A socket write exceeded the write timeout
    TimedOut,
}

/// One subscriber connection
pub struct Connection<S> {
    stream: S,
    config: ServerConfig,
    registry: Arc<ClientRegistry>,
    shutdown: watch::Receiver<bool>,
    state: ConnectionState,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(
        stream: S,
        peer_addr: SocketAddr,
        config: ServerConfig,
        registry: Arc<ClientRegistry>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            stream,
            config,
            registry,
            shutdown,
            state: ConnectionState::new(peer_addr),
        }
    }

    /// Serve the connection until it ends
    ///
    /// Returns an error only if the upgrade or the welcome write fails;
    /// every later ending is reported as a [`DisconnectReason`].
    pub async fn run(self) -> Result<DisconnectReason> {
        let Connection {
            stream,
            config,
            registry,
            mut shutdown,
            mut state,
        } = self;
        let peer_addr = state.peer_addr;

        let ws = match time::timeout(
            config.handshake_timeout,
            tokio_tungstenite::accept_async(stream),
        )
        .await
        {
            Ok(Ok(ws)) => ws,
            Ok(Err(e)) => return Err(Error::WebSocket(e)),
            Err(_) => return Err(Error::Timeout("websocket upgrade")),
        };
        let (mut sink, mut incoming) = ws.split();

        let (handle, payload_rx) = ClientHandle::channel(peer_addr, config.client_queue_capacity);
        let id = registry.register(handle).await;

        let welcome = Message::text(ServerMessage::welcome(id).to_json());
        let sent = time::timeout(config.write_timeout, sink.send(welcome)).await;
        let failure = match sent {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(Error::WebSocket(e)),
            Err(_) => Some(Error::Timeout("welcome write")),
        };
        if let Some(e) = failure {
            registry.unregister(id).await;
            return Err(e);
        }

        tracing::info!(client_id = %id, peer = %peer_addr, "Client connected");

        let (reply_tx, reply_rx) = mpsc::channel(REPLY_QUEUE_CAPACITY);
        let mut writer = tokio::spawn(write_loop(
            sink,
            payload_rx,
            reply_rx,
            config.write_timeout,
        ));
        let mut writer_done = false;

        let reason = loop {
            tokio::select! {
                biased;

                _ = async {
                    let _ = shutdown.wait_for(|stop| *stop).await;
                } => break DisconnectReason::Shutdown,

                exit = &mut writer, if !writer_done => {
                    writer_done = true;
                    let stopping = *shutdown.borrow();
                    break match exit {
                        Ok(WriterExit::Closed) if stopping => DisconnectReason::Shutdown,
                        Ok(WriterExit::Closed) => DisconnectReason::Evicted,
                        Ok(WriterExit::Failed(e)) => DisconnectReason::Error(e.to_string()),
                        Ok(WriterExit::TimedOut) => {
                            DisconnectReason::Error("write timed out".to_string())
                        }
                        Err(e) => DisconnectReason::Error(e.to_string()),
                    };
                }

                received = next_inbound(&mut incoming, config.idle_timeout) => {
                    let message = match received {
                        Err(_) => break DisconnectReason::IdleTimeout,
                        Ok(None) => break DisconnectReason::EndOfStream,
                        Ok(Some(Err(e))) => break DisconnectReason::Error(e.to_string()),
                        Ok(Some(Ok(message))) => message,
                    };

                    if let Some(reason) = on_message(id, &mut state, message, &reply_tx).await {
                        break reason;
                    }
                }
            }
        };

        registry.unregister(id).await;
        drop(reply_tx);

        if !writer_done {
            // The writer may be mid-write and then owes a close frame
            if time::timeout(config.write_timeout * 2, &mut writer).await.is_err() {
                writer.abort();
            }
        }

        tracing::info!(
            client_id = %id,
            peer = %peer_addr,
            reason = %reason,
            pings = state.pings,
            ignored = state.ignored,
            duration_ms = state.duration().as_millis() as u64,
            "Client disconnected"
        );

        Ok(reason)
    }
}

/// Next inbound frame, or `Err` once `idle` passes without one
async fn next_inbound<St>(
    incoming: &mut St,
    idle: Option<Duration>,
) -> std::result::Result<Option<St::Item>, time::error::Elapsed>
where
    St: Stream + Unpin,
{
    match idle {
        Some(idle) => time::timeout(idle, incoming.next()).await,
        None => Ok(incoming.next().await),
    }
}

/// Handle one inbound message; `Some` ends the connection
async fn on_message(
    id: ClientId,
    state: &mut ConnectionState,
    message: Message,
    reply_tx: &mpsc::Sender<ServerMessage>,
) -> Option<DisconnectReason> {
    match message {
        Message::Text(text) => match ClientMessage::parse(text.as_str()) {
            Ok(ClientMessage::Ping) => {
                state.on_ping();
                // A closed reply queue means the writer is gone; the select
                // loop picks that up on its next pass
                let _ = reply_tx.send(ServerMessage::Pong).await;
                None
            }
            Err(e) => {
                state.on_ignored();
                tracing::debug!(client_id = %id, error = %e, "Ignoring control message");
                None
            }
        },
        Message::Binary(data) => {
            state.on_ignored();
            tracing::debug!(client_id = %id, len = data.len(), "Ignoring binary message");
            None
        }
        Message::Close(_) => Some(DisconnectReason::ClientClosed),
        // WebSocket-level pings are answered by tungstenite
        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => None,
    }
}

/// Drain replies and payloads to the socket
///
/// Replies win over payloads whenever both are ready.
async fn write_loop<W>(
    mut sink: W,
    mut payloads: mpsc::Receiver<Bytes>,
    mut replies: mpsc::Receiver<ServerMessage>,
    write_timeout: Duration,
) -> WriterExit
where
    W: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    loop {
        let message = tokio::select! {
            biased;

            reply = replies.recv() => match reply {
                Some(reply) => Message::text(reply.to_json()),
                None => break,
            },
            payload = payloads.recv() => match payload {
                Some(payload) => Message::binary(payload),
                None => break,
            },
        };

        match time::timeout(write_timeout, sink.send(message)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return WriterExit::Failed(e),
            Err(_) => return WriterExit::TimedOut,
        }
    }

    let _ = time::timeout(write_timeout, sink.send(Message::Close(None))).await;
    WriterExit::Closed
}
