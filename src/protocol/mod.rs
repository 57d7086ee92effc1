//! Control channel protocol

pub mod message;

pub use message::{ClientMessage, ControlParseError, ServerMessage, WELCOME_TEXT};
