//! Client registry for point cloud fan-out
//!
//! The registry owns the set of connected subscribers. Connections add and
//! remove themselves; the broadcaster reads a snapshot once per tick and
//! prunes clients whose sends failed.
//!
//! # Architecture
//!
//! ```text
//!                        Arc<ClientRegistry>
//!                   ┌──────────────────────────┐
//!                   │ clients: HashMap<Id,     │
//!                   │   ClientHandle {         │
//!                   │     tx: mpsc::Sender,    │
//!                   │   }                      │
//!                   │ >                        │
//!                   └────────────┬─────────────┘
//!                                │
//!        ┌───────────────────────┼───────────────────────┐
//!        │                       │                       │
//!        ▼                       ▼                       ▼
//!   [Broadcaster]          [Connection]            [Connection]
//!   snapshot()             register()              unregister()
//!        │
//!        └──► deliver() per client ──► writer task ──► WebSocket
//! ```
//!
//! Payloads are `bytes::Bytes`, so every client queue shares one allocation
//! per tick.

pub mod client;
pub mod store;

pub use client::{ClientHandle, ClientId, SendFailure};
pub use store::{ClientRegistry, Subscriber};
