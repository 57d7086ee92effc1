//! Frame capture
//!
//! This module provides:
//! - Camera calibration and pixel unprojection
//! - Depth/color grid types and aligned frame pairs
//! - The [`FrameSource`] contract the broadcaster pulls from
//! - A synthetic scene source and a channel-fed source for external drivers

pub mod calibration;
pub mod channel;
pub mod frame;
pub mod source;
pub mod synthetic;

pub use calibration::Calibration;
pub use channel::{ChannelSource, FrameFeeder};
pub use frame::{ColorFormat, ColorGrid, DepthGrid, FramePair, GridSizeError};
pub use source::{CaptureError, FrameSource};
pub use synthetic::SyntheticSource;
