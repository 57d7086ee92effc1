//! Broadcast loop configuration

use std::fmt;
use std::time::Duration;

use crate::cloud::codec::DEFAULT_COMPRESSION_LEVEL;
use crate::cloud::BuilderConfig;

/// Invalid configuration values
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The tick period is zero
    ZeroTickPeriod,
    /// The per-client send timeout does not fit inside one tick
    SendTimeoutTooLong {
        send_timeout: Duration,
        tick_period: Duration,
    },
    /// The frame wait budget is zero
    ZeroFrameTimeout,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroTickPeriod => write!(f, "tick period must be non-zero"),
            ConfigError::SendTimeoutTooLong {
                send_timeout,
                tick_period,
            } => write!(
                f,
                "client send timeout {:?} must be shorter than tick period {:?}",
                send_timeout, tick_period
            ),
            ConfigError::ZeroFrameTimeout => write!(f, "frame timeout must be non-zero"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Broadcast loop options
#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    /// Target interval between ticks
    pub tick_period: Duration,

    /// Longest wait for a frame within one tick
    pub frame_timeout: Duration,

    /// Longest wait for room in one client's queue; must be below `tick_period`
    pub client_send_timeout: Duration,

    /// Point cloud construction options
    pub builder: BuilderConfig,

    /// Gzip level (0-9)
    pub compression_level: u32,

    /// Interval between stats log lines
    pub stats_interval: Duration,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_millis(33), // ~30 Hz
            frame_timeout: Duration::from_millis(100),
            client_send_timeout: Duration::from_millis(20),
            builder: BuilderConfig::default(),
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            stats_interval: Duration::from_secs(5),
        }
    }
}

impl BroadcastConfig {
    /// Set the tick rate in ticks per second
    pub fn fps(mut self, fps: u32) -> Self {
        self.tick_period = Duration::from_nanos(1_000_000_000 / u64::from(fps.max(1)));
        self
    }

    /// Set the tick period
    pub fn tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }

    /// Set the frame wait budget
    pub fn frame_timeout(mut self, timeout: Duration) -> Self {
        self.frame_timeout = timeout;
        self
    }

    /// Set the per-client send timeout
    pub fn client_send_timeout(mut self, timeout: Duration) -> Self {
        self.client_send_timeout = timeout;
        self
    }

    /// Set point cloud builder options
    pub fn builder(mut self, builder: BuilderConfig) -> Self {
        self.builder = builder;
        self
    }

    /// Set the gzip level (capped at 9)
    pub fn compression_level(mut self, level: u32) -> Self {
        self.compression_level = level.min(9);
        self
    }

    /// Set the stats log interval
    pub fn stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval;
        self
    }

    /// Check the timing invariants
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_period.is_zero() {
            return Err(ConfigError::ZeroTickPeriod);
        }
        if self.frame_timeout.is_zero() {
            return Err(ConfigError::ZeroFrameTimeout);
        }
        if self.client_send_timeout >= self.tick_period {
            return Err(ConfigError::SendTimeoutTooLong {
                send_timeout: self.client_send_timeout,
                tick_period: self.tick_period,
            });
        }
        Ok(())
    }
}
