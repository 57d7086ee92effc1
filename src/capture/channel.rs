//! Channel-fed frame source
//!
//! Bridges an external capture driver (typically a thread blocked on a vendor
//! SDK) into the async broadcaster. The driver pushes frames through a
//! [`FrameFeeder`]; once every feeder is dropped the source reports the
//! device as lost.

use std::time::Duration;

use tokio::sync::mpsc;

use super::calibration::Calibration;
use super::frame::FramePair;
use super::source::{CaptureError, FrameSource};

/// Sending half held by the capture driver
#[derive(Debug, Clone)]
pub struct FrameFeeder {
    tx: mpsc::Sender<FramePair>,
}

impl FrameFeeder {
    /// Push a frame without waiting, dropping it if the queue is full
    ///
    /// A full queue keeps the frames already in it and discards this one.
    /// Drivers that want the freshest frame should use capacity 1, or `send`
    /// and let the source skip ahead to the newest queued frame.
    ///
    /// Returns `false` once the source has been dropped.
    pub fn offer(&self, frame: FramePair) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => true,
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Push a frame from a blocking driver thread, waiting for room
    pub fn blocking_send(&self, frame: FramePair) -> bool {
        self.tx.blocking_send(frame).is_ok()
    }

    /// Push a frame from async code, waiting for room
    pub async fn send(&self, frame: FramePair) -> bool {
        self.tx.send(frame).await.is_ok()
    }
}

/// Frame source backed by a bounded channel
pub struct ChannelSource {
    calibration: Option<Calibration>,
    rx: mpsc::Receiver<FramePair>,
}

impl ChannelSource {
    /// Create a source and its feeder. `capacity` bounds frames in flight.
    pub fn new(calibration: Option<Calibration>, capacity: usize) -> (Self, FrameFeeder) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { calibration, rx }, FrameFeeder { tx })
    }
}

impl FrameSource for ChannelSource {
    fn calibration(&self) -> Option<Calibration> {
        self.calibration
    }

    async fn next_frame(&mut self, budget: Duration) -> Result<FramePair, CaptureError> {
        match tokio::time::timeout(budget, self.rx.recv()).await {
            Ok(Some(mut frame)) => {
                // Skip ahead to the newest queued frame
                while let Ok(newer) = self.rx.try_recv() {
                    frame = newer;
                }
                Ok(frame)
            }
            Ok(None) => Err(CaptureError::DeviceLost("capture driver stopped".into())),
            Err(_) => Err(CaptureError::Timeout),
        }
    }

    fn close(&mut self) {
        self.rx.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::frame::{ColorGrid, DepthGrid};

    fn frame() -> FramePair {
        FramePair::new(DepthGrid::zeroed(2, 2), ColorGrid::filled(2, 2, [1, 2, 3]), 0.001)
    }

    #[tokio::test]
    async fn test_frames_flow_through() {
        let (mut source, feeder) = ChannelSource::new(Some(Calibration::default()), 2);

        assert!(feeder.send(frame()).await);
        let got = source.next_frame(Duration::from_millis(50)).await.unwrap();
        assert_eq!(got.color.rgb(1, 1), [1, 2, 3]);
    }

    #[tokio::test]
    async fn test_empty_channel_times_out() {
        let (mut source, _feeder) = ChannelSource::new(None, 1);

        let err = source.next_frame(Duration::from_millis(5)).await.unwrap_err();
        assert_eq!(err, CaptureError::Timeout);
        assert!(source.calibration().is_none());
    }

    #[tokio::test]
    async fn test_dropped_feeder_is_device_lost() {
        let (mut source, feeder) = ChannelSource::new(None, 1);
        drop(feeder);

        let err = source.next_frame(Duration::from_millis(5)).await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_backlog_yields_newest_frame() {
        let (mut source, feeder) = ChannelSource::new(None, 3);

        for t in 1..=3 {
            assert!(feeder.send(frame().with_timestamp(t as f64)).await);
        }

        let got = source.next_frame(Duration::from_millis(50)).await.unwrap();
        assert_eq!(got.captured_at, 3.0);

        let err = source.next_frame(Duration::from_millis(5)).await.unwrap_err();
        assert_eq!(err, CaptureError::Timeout);
    }

    #[tokio::test]
    async fn test_offer_drops_when_full_and_detects_close() {
        let (mut source, feeder) = ChannelSource::new(None, 1);

        assert!(feeder.offer(frame().with_timestamp(1.0)));
        assert!(feeder.offer(frame().with_timestamp(2.0)));

        // The queued frame is kept, the overflow is dropped
        let got = source.next_frame(Duration::from_millis(50)).await.unwrap();
        assert_eq!(got.captured_at, 1.0);

        source.close();
        let _ = source.next_frame(Duration::from_millis(5)).await;
        assert!(!feeder.offer(frame()));
    }
}
