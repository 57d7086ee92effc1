//! WebSocket server
//!
//! [`StreamServer`] accepts subscribers, runs the broadcaster and tears both
//! down on shutdown. Each accepted socket is served by a [`Connection`].

pub mod config;
pub mod connection;
pub mod listener;

pub use config::{ServerConfig, DEFAULT_PORT};
pub use connection::Connection;
pub use listener::StreamServer;
