//! Statistics for the broadcast loop

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Counters updated by the broadcaster
///
/// Shared behind an `Arc`; every counter is a relaxed atomic so reading stats
/// never contends with the loop.
#[derive(Debug)]
pub struct BroadcastStats {
    started_at: Instant,
    ticks: AtomicU64,
    ticks_skipped: AtomicU64,
    capture_timeouts: AtomicU64,
    build_failures: AtomicU64,
    encode_failures: AtomicU64,
    payloads_delivered: AtomicU64,
    bytes_encoded: AtomicU64,
    clients_dropped: AtomicU64,
    last_point_count: AtomicU64,
}

/// Point-in-time copy of [`BroadcastStats`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsSnapshot {
    /// Ticks that reached fan-out
    pub ticks: u64,
    /// Ticks skipped for any reason
    pub ticks_skipped: u64,
    /// Ticks skipped because no frame arrived in time
    pub capture_timeouts: u64,
    pub build_failures: u64,
    pub encode_failures: u64,
    /// Payloads accepted by client queues
    pub payloads_delivered: u64,
    /// Total size of encoded payloads
    pub bytes_encoded: u64,
    /// Clients removed after a failed send
    pub clients_dropped: u64,
    /// Points in the most recent snapshot
    pub last_point_count: u64,
    /// Time since the broadcaster started
    pub uptime: Duration,
}

impl StatsSnapshot {
    /// Effective broadcast rate over the whole run
    pub fn tick_rate(&self) -> f64 {
        let secs = self.uptime.as_secs_f64();
        if secs > 0.0 {
            self.ticks as f64 / secs
        } else {
            0.0
        }
    }

    /// Average encoded payload size in bytes
    pub fn mean_payload_size(&self) -> u64 {
        if self.ticks > 0 {
            self.bytes_encoded / self.ticks
        } else {
            0
        }
    }
}

impl BroadcastStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            ticks: AtomicU64::new(0),
            ticks_skipped: AtomicU64::new(0),
            capture_timeouts: AtomicU64::new(0),
            build_failures: AtomicU64::new(0),
            encode_failures: AtomicU64::new(0),
            payloads_delivered: AtomicU64::new(0),
            bytes_encoded: AtomicU64::new(0),
            clients_dropped: AtomicU64::new(0),
            last_point_count: AtomicU64::new(0),
        }
    }

    pub(crate) fn record_round(&self, points: usize, bytes: usize, delivered: usize, dropped: usize) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        self.last_point_count.store(points as u64, Ordering::Relaxed);
        self.bytes_encoded.fetch_add(bytes as u64, Ordering::Relaxed);
        self.payloads_delivered
            .fetch_add(delivered as u64, Ordering::Relaxed);
        self.clients_dropped.fetch_add(dropped as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_capture_timeout(&self) {
        self.capture_timeouts.fetch_add(1, Ordering::Relaxed);
        self.ticks_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_build_failure(&self) {
        self.build_failures.fetch_add(1, Ordering::Relaxed);
        self.ticks_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_encode_failure(&self) {
        self.encode_failures.fetch_add(1, Ordering::Relaxed);
        self.ticks_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_skip(&self) {
        self.ticks_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            ticks_skipped: self.ticks_skipped.load(Ordering::Relaxed),
            capture_timeouts: self.capture_timeouts.load(Ordering::Relaxed),
            build_failures: self.build_failures.load(Ordering::Relaxed),
            encode_failures: self.encode_failures.load(Ordering::Relaxed),
            payloads_delivered: self.payloads_delivered.load(Ordering::Relaxed),
            bytes_encoded: self.bytes_encoded.load(Ordering::Relaxed),
            clients_dropped: self.clients_dropped.load(Ordering::Relaxed),
            last_point_count: self.last_point_count.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
        }
    }
}

impl Default for BroadcastStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = BroadcastStats::new().snapshot();
        assert_eq!(stats.ticks, 0);
        assert_eq!(stats.ticks_skipped, 0);
        assert_eq!(stats.payloads_delivered, 0);
        assert_eq!(stats.mean_payload_size(), 0);
    }

    #[test]
    fn test_record_round() {
        let stats = BroadcastStats::new();
        stats.record_round(1000, 4000, 3, 1);
        stats.record_round(500, 2000, 2, 0);

        let snap = stats.snapshot();
        assert_eq!(snap.ticks, 2);
        assert_eq!(snap.last_point_count, 500);
        assert_eq!(snap.bytes_encoded, 6000);
        assert_eq!(snap.payloads_delivered, 5);
        assert_eq!(snap.clients_dropped, 1);
        assert_eq!(snap.mean_payload_size(), 3000);
    }

    #[test]
    fn test_skips_are_counted_by_cause() {
        let stats = BroadcastStats::new();
        stats.record_capture_timeout();
        stats.record_capture_timeout();
        stats.record_build_failure();
        stats.record_encode_failure();
        stats.record_skip();

        let snap = stats.snapshot();
        assert_eq!(snap.ticks_skipped, 5);
        assert_eq!(snap.capture_timeouts, 2);
        assert_eq!(snap.build_failures, 1);
        assert_eq!(snap.encode_failures, 1);
    }

    #[test]
    fn test_tick_rate_zero_uptime() {
        let snap = StatsSnapshot::default();
        assert_eq!(snap.tick_rate(), 0.0);
    }
}
