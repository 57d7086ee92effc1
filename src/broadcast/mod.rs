//! Capture-to-subscriber broadcast
//!
//! This module provides:
//! - [`Broadcaster`], the fixed-cadence tick loop
//! - [`fan_out`], concurrent timeout-bounded delivery to a registry snapshot
//! - [`BroadcastConfig`], cadence and timeout settings

pub mod broadcaster;
pub mod config;
pub mod fanout;

pub use broadcaster::{Broadcaster, TickError, TickOutcome};
pub use config::{BroadcastConfig, ConfigError};
pub use fanout::{fan_out, FanoutReport};
