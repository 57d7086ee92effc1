//! Point clouds
//!
//! This module provides:
//! - [`PointCloudSnapshot`], one colored point cloud per tick
//! - [`PointCloudBuilder`], pixel unprojection of aligned frames
//! - [`PointCloudCodec`], the gzip + JSON payload encoding

pub mod builder;
pub mod codec;
pub mod snapshot;

pub use builder::{BuildError, BuilderConfig, PointCloudBuilder, DEFAULT_STRIDE};
pub use codec::{decode, encode, DecodeError, EncodeError, PointCloudCodec};
pub use snapshot::{LengthMismatch, PointCloudSnapshot};
