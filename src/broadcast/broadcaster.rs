//! Fixed-cadence broadcast loop
//!
//! Each tick:
//!
//! ```text
//! FrameSource ──next_frame(budget)──► FramePair
//!      │                                  │  spawn_blocking
//!      │                                  ▼
//!      │                       build ──► encode ──► Bytes
//!      │                                              │
//!      │                        registry.snapshot() ◄─┘
//!      │                                  │
//!      │                    deliver() to every member concurrently
//!      │                                  │
//!      └── DeviceLost: stop        prune failed members
//! ```
//!
//! A late round causes the following ticks to be skipped rather than queued;
//! clients always get the freshest cloud.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::capture::{CaptureError, FrameSource};
use crate::cloud::{BuildError, EncodeError, PointCloudBuilder, PointCloudCodec};
use crate::error::{Error, Result};
use crate::registry::ClientRegistry;
use crate::stats::BroadcastStats;

use super::config::BroadcastConfig;
use super::fanout::{fan_out, FanoutReport};

/// Why a tick produced no fan-out
#[derive(Debug)]
pub enum TickError {
    Capture(CaptureError),
    Build(BuildError),
    Encode(EncodeError),
    /// The blocking build/encode task panicked or was cancelled
    Worker(String),
}

impl TickError {
    /// Whether the loop must stop
    pub fn is_fatal(&self) -> bool {
        matches!(self, TickError::Capture(e) if e.is_fatal())
    }
}

impl fmt::Display for TickError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TickError::Capture(e) => write!(f, "capture: {}", e),
            TickError::Build(e) => write!(f, "build: {}", e),
            TickError::Encode(e) => write!(f, "encode: {}", e),
            TickError::Worker(e) => write!(f, "worker: {}", e),
        }
    }
}

impl std::error::Error for TickError {}

/// Result of a tick that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nobody is subscribed; the frame was consumed and discarded
    NoSubscribers,
    /// The payload went out to the registry
    Broadcast {
        points: usize,
        payload_size: usize,
        report: FanoutReport,
    },
}

/// Drives capture → build → encode → fan-out → prune
pub struct Broadcaster<S: FrameSource> {
    source: S,
    registry: Arc<ClientRegistry>,
    config: BroadcastConfig,
    builder: PointCloudBuilder,
    codec: PointCloudCodec,
    stats: Arc<BroadcastStats>,
}

impl<S: FrameSource> Broadcaster<S> {
    pub fn new(source: S, registry: Arc<ClientRegistry>, config: BroadcastConfig) -> Self {
        Self {
            source,
            registry,
            builder: PointCloudBuilder::new(config.builder),
            codec: PointCloudCodec::with_level(config.compression_level),
            config,
            stats: Arc::new(BroadcastStats::new()),
        }
    }

    /// Shared statistics handle
    pub fn stats(&self) -> Arc<BroadcastStats> {
        Arc::clone(&self.stats)
    }

    /// Run one tick
    pub async fn tick(&mut self) -> std::result::Result<TickOutcome, TickError> {
        let frame = self
            .source
            .next_frame(self.config.frame_timeout)
            .await
            .map_err(TickError::Capture)?;

        if self.registry.is_empty().await {
            return Ok(TickOutcome::NoSubscribers);
        }

        let calibration = self.source.calibration();
        let builder = self.builder;
        let codec = self.codec;

        // Unprojection and gzip are CPU-bound; keep them off the event loop.
        let (points, payload) = tokio::task::spawn_blocking(move || {
            let snapshot = builder
                .build(&frame, calibration.as_ref())
                .map_err(TickError::Build)?;
            let payload = codec.encode(&snapshot).map_err(TickError::Encode)?;
            Ok::<(usize, Bytes), TickError>((snapshot.len(), payload))
        })
        .await
        .map_err(|e| TickError::Worker(e.to_string()))??;

        let payload_size = payload.len();
        let report = fan_out(&self.registry, payload, self.config.client_send_timeout).await;

        self.stats
            .record_round(points, payload_size, report.delivered, report.dropped.len());

        Ok(TickOutcome::Broadcast {
            points,
            payload_size,
            report,
        })
    }

    /// Run until `shutdown` resolves or the source is lost
    ///
    /// The source is closed on exit in both cases.
    pub async fn run<F>(mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.config.validate()?;

        let mut ticker = time::interval(self.config.tick_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let stats_interval = self.config.stats_interval;
        let mut stats_ticker = time::interval_at(Instant::now() + stats_interval, stats_interval);

        tracing::info!(
            tick_ms = self.config.tick_period.as_millis() as u64,
            send_timeout_ms = self.config.client_send_timeout.as_millis() as u64,
            stride = self.config.builder.stride,
            "Broadcaster started"
        );

        tokio::pin!(shutdown);

        let result = loop {
            tokio::select! {
                _ = &mut shutdown => break Ok(()),
                _ = stats_ticker.tick() => self.log_stats(),
                _ = ticker.tick() => {
                    let outcome = tokio::select! {
                        _ = &mut shutdown => break Ok(()),
                        outcome = self.tick() => outcome,
                    };

                    match outcome {
                        Ok(_) => {}
                        Err(TickError::Capture(e)) if e.is_fatal() => {
                            tracing::error!(error = %e, "Frame source lost, stopping broadcaster");
                            break Err(Error::Capture(e));
                        }
                        Err(e) => self.record_skip(&e),
                    }
                }
            }
        };

        self.source.close();
        self.log_stats();
        tracing::info!("Broadcaster stopped");

        result
    }

    fn record_skip(&self, e: &TickError) {
        match e {
            TickError::Capture(CaptureError::Timeout) => {
                self.stats.record_capture_timeout();
                tracing::debug!("No frame this tick");
            }
            TickError::Capture(_) | TickError::Worker(_) => {
                self.stats.record_skip();
                tracing::warn!(error = %e, "Skipping tick");
            }
            TickError::Build(_) => {
                self.stats.record_build_failure();
                tracing::warn!(error = %e, "Skipping tick");
            }
            TickError::Encode(_) => {
                self.stats.record_encode_failure();
                tracing::warn!(error = %e, "Skipping fan-out");
            }
        }
    }

    fn log_stats(&self) {
        let stats = self.stats.snapshot();
        tracing::info!(
            ticks = stats.ticks,
            skipped = stats.ticks_skipped,
            rate = stats.tick_rate(),
            points = stats.last_point_count,
            mean_payload = stats.mean_payload_size(),
            delivered = stats.payloads_delivered,
            dropped_clients = stats.clients_dropped,
            "Broadcast stats"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::time::Duration;

    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::capture::{Calibration, ChannelSource, ColorGrid, DepthGrid, FramePair};
    use crate::cloud::decode;
    use crate::registry::ClientHandle;

    fn addr() -> SocketAddr {
        "127.0.0.1:46000".parse().unwrap()
    }

    fn test_frame() -> FramePair {
        let mut depth = DepthGrid::zeroed(640, 480);
        depth.set(320, 240, 1000);
        FramePair::new(depth, ColorGrid::filled(640, 480, [200, 100, 50]), 0.001)
            .with_timestamp(7.0)
    }

    fn config() -> BroadcastConfig {
        BroadcastConfig::default()
            .tick_period(Duration::from_millis(20))
            .frame_timeout(Duration::from_millis(20))
            .client_send_timeout(Duration::from_millis(10))
    }

    #[tokio::test]
    async fn test_tick_builds_encodes_and_delivers() {
        let (source, feeder) = ChannelSource::new(Some(Calibration::default()), 1);
        let registry = Arc::new(ClientRegistry::new());
        let (handle, mut rx) = ClientHandle::channel(addr(), 1);
        registry.register(handle).await;

        let mut broadcaster = Broadcaster::new(source, Arc::clone(&registry), config());
        assert!(feeder.send(test_frame()).await);

        let outcome = assert_ok!(broadcaster.tick().await);
        match outcome {
            TickOutcome::Broadcast { points, report, .. } => {
                assert_eq!(points, 1);
                assert_eq!(report.delivered, 1);
            }
            other => panic!("unexpected outcome {:?}", other),
        }

        let snapshot = decode(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(snapshot.points(), &[[0.0, 0.0, 1.0]]);
        assert_eq!(snapshot.colors(), &[[200, 100, 50]]);
        assert_eq!(snapshot.timestamp(), 7.0);
        assert_eq!(broadcaster.stats().snapshot().ticks, 1);
    }

    #[tokio::test]
    async fn test_tick_without_subscribers_skips_work() {
        let (source, feeder) = ChannelSource::new(None, 1);
        let registry = Arc::new(ClientRegistry::new());
        let mut broadcaster = Broadcaster::new(source, registry, config());
        assert!(feeder.send(test_frame()).await);

        // No calibration, but nobody is listening so nothing is built
        assert_eq!(broadcaster.tick().await.unwrap(), TickOutcome::NoSubscribers);
    }

    #[tokio::test]
    async fn test_missing_calibration_skips_tick() {
        let (source, feeder) = ChannelSource::new(None, 1);
        let registry = Arc::new(ClientRegistry::new());
        let (handle, _rx) = ClientHandle::channel(addr(), 1);
        registry.register(handle).await;

        let mut broadcaster = Broadcaster::new(source, registry, config());
        assert!(feeder.send(test_frame()).await);

        let err = assert_err!(broadcaster.tick().await);
        assert!(matches!(err, TickError::Build(BuildError::MissingCalibration)));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_timeout_is_not_fatal() {
        let (source, _feeder) = ChannelSource::new(Some(Calibration::default()), 1);
        let mut broadcaster =
            Broadcaster::new(source, Arc::new(ClientRegistry::new()), config());

        let err = assert_err!(broadcaster.tick().await);
        assert!(matches!(err, TickError::Capture(CaptureError::Timeout)));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_run_stops_on_device_lost() {
        let (source, feeder) = ChannelSource::new(Some(Calibration::default()), 1);
        let registry = Arc::new(ClientRegistry::new());
        let (handle, mut rx) = ClientHandle::channel(addr(), 4);
        registry.register(handle).await;

        let broadcaster = Broadcaster::new(source, Arc::clone(&registry), config());
        let stats = broadcaster.stats();
        let task = tokio::spawn(broadcaster.run(std::future::pending()));

        assert!(feeder.send(test_frame()).await);
        assert!(rx.recv().await.is_some());
        drop(feeder);

        let result = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(Error::Capture(CaptureError::DeviceLost(_)))));
        assert_eq!(stats.snapshot().ticks, 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let (source, _feeder) = ChannelSource::new(Some(Calibration::default()), 1);
        let broadcaster = Broadcaster::new(source, Arc::new(ClientRegistry::new()), config());
        let stats = broadcaster.stats();

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let task = tokio::spawn(broadcaster.run(async {
            let _ = rx.await;
        }));

        tokio::time::sleep(Duration::from_millis(60)).await;
        tx.send(()).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
        assert!(stats.snapshot().capture_timeouts > 0);
    }

    #[tokio::test]
    async fn test_run_rejects_invalid_config() {
        let (source, _feeder) = ChannelSource::new(None, 1);
        let config = BroadcastConfig::default().client_send_timeout(Duration::from_secs(1));
        let broadcaster = Broadcaster::new(source, Arc::new(ClientRegistry::new()), config);

        let result = broadcaster.run(std::future::pending()).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
