//! Point cloud construction
//!
//! Every `stride`-th pixel of the aligned frame is unprojected through the
//! pinhole model:
//!
//! ```text
//! z = depth * depth_scale
//! x = (u - ppx) * z / fx
//! y = (v - ppy) * z / fy
//! ```
//!
//! Samples with zero depth carry no return and are skipped.

use std::fmt;

use crate::capture::{Calibration, FramePair};

use super::snapshot::PointCloudSnapshot;

/// Default pixel subsampling stride
pub const DEFAULT_STRIDE: u32 = 2;

/// Reasons a frame cannot be turned into a point cloud
#[derive(Debug, Clone, PartialEq)]
pub enum BuildError {
    /// Depth and color grids have different dimensions
    DimensionMismatch {
        depth: (u32, u32),
        color: (u32, u32),
    },
    /// The source has not reported intrinsics
    MissingCalibration,
    /// Intrinsics cannot be used for unprojection
    InvalidCalibration(Calibration),
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::DimensionMismatch { depth, color } => write!(
                f,
                "depth grid is {}x{} but color grid is {}x{}",
                depth.0, depth.1, color.0, color.1
            ),
            BuildError::MissingCalibration => write!(f, "calibration not available"),
            BuildError::InvalidCalibration(c) => {
                write!(f, "invalid calibration (fx={}, fy={})", c.fx, c.fy)
            }
        }
    }
}

impl std::error::Error for BuildError {}

/// Point cloud builder configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuilderConfig {
    /// Sample every `stride`-th pixel in both directions
    pub stride: u32,

    /// Drop points closer than this many meters
    pub min_depth: Option<f64>,

    /// Drop points farther than this many meters
    pub max_depth: Option<f64>,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            stride: DEFAULT_STRIDE,
            min_depth: None,
            max_depth: None,
        }
    }
}

impl BuilderConfig {
    /// Set the subsampling stride (at least 1)
    pub fn stride(mut self, stride: u32) -> Self {
        self.stride = stride.max(1);
        self
    }

    /// Keep only points whose depth lies in `[min, max]` meters
    pub fn depth_range(mut self, min: f64, max: f64) -> Self {
        self.min_depth = Some(min);
        self.max_depth = Some(max);
        self
    }
}

/// Converts aligned frame pairs into point cloud snapshots
#[derive(Debug, Clone, Copy, Default)]
pub struct PointCloudBuilder {
    config: BuilderConfig,
}

impl PointCloudBuilder {
    pub fn new(config: BuilderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// Build a snapshot from one frame pair
    ///
    /// The output is deterministic for identical inputs; the snapshot is
    /// stamped with the frame's capture time.
    pub fn build(
        &self,
        frame: &FramePair,
        calibration: Option<&Calibration>,
    ) -> Result<PointCloudSnapshot, BuildError> {
        let calib = calibration.ok_or(BuildError::MissingCalibration)?;
        if !calib.is_valid() {
            return Err(BuildError::InvalidCalibration(*calib));
        }

        let depth = &frame.depth;
        let color = &frame.color;
        if depth.width() != color.width() || depth.height() != color.height() {
            return Err(BuildError::DimensionMismatch {
                depth: (depth.width(), depth.height()),
                color: (color.width(), color.height()),
            });
        }

        let stride = self.config.stride.max(1);
        let min_depth = self.config.min_depth.unwrap_or(f64::NEG_INFINITY);
        let max_depth = self.config.max_depth.unwrap_or(f64::INFINITY);

        let sampled =
            depth.width().div_ceil(stride) as usize * depth.height().div_ceil(stride) as usize;
        let mut snapshot = PointCloudSnapshot::with_capacity(sampled, frame.captured_at);

        for y in (0..depth.height()).step_by(stride as usize) {
            for x in (0..depth.width()).step_by(stride as usize) {
                let raw = depth.get(x, y);
                if raw == 0 {
                    continue;
                }

                let depth_m = raw as f64 * frame.depth_scale;
                if depth_m < min_depth || depth_m > max_depth {
                    continue;
                }

                snapshot.push(calib.unproject(x as f64, y as f64, depth_m), color.rgb(x, y));
            }
        }

        Ok(snapshot)
    }
}
