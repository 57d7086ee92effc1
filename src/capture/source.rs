//! Frame source contract
//!
//! The depth camera driver sits behind [`FrameSource`]. The broadcaster asks
//! for one frame per tick and never waits longer than the budget it passes in.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use super::calibration::Calibration;
use super::frame::FramePair;

/// Failure to produce a frame for the current tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// No frame arrived within the wait budget
    Timeout,
    /// A frame arrived but was unusable (e.g. missing depth or color half)
    Unavailable(String),
    /// The device is gone and will not produce frames again
    DeviceLost(String),
}

impl CaptureError {
    /// Whether the broadcaster must stop instead of skipping the tick
    pub fn is_fatal(&self) -> bool {
        matches!(self, CaptureError::DeviceLost(_))
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::Timeout => write!(f, "no frame within wait budget"),
            CaptureError::Unavailable(reason) => write!(f, "frame unavailable: {}", reason),
            CaptureError::DeviceLost(reason) => write!(f, "device lost: {}", reason),
        }
    }
}

impl std::error::Error for CaptureError {}

/// A producer of aligned depth/color frame pairs
///
/// Implementations wrapping a blocking SDK should move the wait onto
/// `tokio::task::spawn_blocking` and honour `budget` there.
pub trait FrameSource: Send + 'static {
    /// Static intrinsics, `None` until the device reports them
    fn calibration(&self) -> Option<Calibration>;

    /// Wait at most `budget` for the next aligned frame pair
    fn next_frame(
        &mut self,
        budget: Duration,
    ) -> impl Future<Output = Result<FramePair, CaptureError>> + Send;

    /// Release the device. Called once when the broadcaster stops.
    fn close(&mut self) {}
}
