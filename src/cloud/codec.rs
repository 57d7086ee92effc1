//! Point cloud wire codec
//!
//! Payload format (one WebSocket binary frame per tick):
//!
//! ```text
//! gzip( utf8( {"points": [[x,y,z], ...],
//!              "colors": [[r,g,b], ...],
//!              "timestamp": 1712345678.123} ) )
//! ```
//!
//! JSON keeps the payload self-describing for browser and scripting clients;
//! gzip recovers most of the size cost.

use std::fmt;
use std::io::{self, Read, Write};

use bytes::Bytes;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use super::snapshot::{LengthMismatch, PointCloudSnapshot};

/// Default gzip level, favouring speed at 30 payloads per second
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Failure to produce a payload
#[derive(Debug)]
pub enum EncodeError {
    /// A coordinate or the timestamp is NaN or infinite
    NonFinite,
    /// JSON serialization failed
    Serialize(serde_json::Error),
    /// The compressor failed
    Compress(io::Error),
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::NonFinite => write!(f, "snapshot contains non-finite values"),
            EncodeError::Serialize(e) => write!(f, "serialization failed: {}", e),
            EncodeError::Compress(e) => write!(f, "compression failed: {}", e),
        }
    }
}

impl std::error::Error for EncodeError {}

/// Failure to recover a snapshot from a payload
#[derive(Debug)]
pub enum DecodeError {
    /// Not a valid gzip stream
    Decompress(io::Error),
    /// Decompressed bytes are not a point cloud record
    Deserialize(serde_json::Error),
    /// The record's points and colors are not index-aligned
    Inconsistent(LengthMismatch),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Decompress(e) => write!(f, "decompression failed: {}", e),
            DecodeError::Deserialize(e) => write!(f, "invalid point cloud record: {}", e),
            DecodeError::Inconsistent(e) => write!(f, "inconsistent point cloud: {}", e),
        }
    }
}

impl std::error::Error for DecodeError {}

#[derive(Serialize)]
struct WireRef<'a> {
    points: &'a [[f64; 3]],
    colors: &'a [[u8; 3]],
    timestamp: f64,
}

#[derive(Deserialize)]
struct WireOwned {
    points: Vec<[f64; 3]>,
    colors: Vec<[u8; 3]>,
    timestamp: f64,
}

/// Gzip + JSON codec for point cloud snapshots
#[derive(Debug, Clone, Copy)]
pub struct PointCloudCodec {
    level: Compression,
}

impl Default for PointCloudCodec {
    fn default() -> Self {
        Self::with_level(DEFAULT_COMPRESSION_LEVEL)
    }
}

impl PointCloudCodec {
    /// Create a codec with a gzip level in `0..=9`
    pub fn with_level(level: u32) -> Self {
        Self {
            level: Compression::new(level.min(9)),
        }
    }

    pub fn level(&self) -> u32 {
        self.level.level()
    }

    /// Serialize and compress a snapshot
    pub fn encode(&self, snapshot: &PointCloudSnapshot) -> Result<Bytes, EncodeError> {
        if !snapshot.is_finite() {
            return Err(EncodeError::NonFinite);
        }

        let wire = WireRef {
            points: snapshot.points(),
            colors: snapshot.colors(),
            timestamp: snapshot.timestamp(),
        };

        // Roughly 40 bytes of JSON per point before compression.
        let estimate = 64 + snapshot.len() * 10;
        let mut encoder = GzEncoder::new(Vec::with_capacity(estimate), self.level);
        serde_json::to_writer(&mut encoder, &wire).map_err(EncodeError::Serialize)?;
        encoder.flush().map_err(EncodeError::Compress)?;
        let compressed = encoder.finish().map_err(EncodeError::Compress)?;

        Ok(Bytes::from(compressed))
    }

    /// Decompress and deserialize a payload
    pub fn decode(&self, payload: &[u8]) -> Result<PointCloudSnapshot, DecodeError> {
        let mut json = Vec::with_capacity(payload.len() * 4);
        GzDecoder::new(payload)
            .read_to_end(&mut json)
            .map_err(DecodeError::Decompress)?;

        let wire: WireOwned = serde_json::from_slice(&json).map_err(DecodeError::Deserialize)?;

        PointCloudSnapshot::new(wire.points, wire.colors, wire.timestamp)
            .map_err(DecodeError::Inconsistent)
    }
}

/// Encode with the default codec
pub fn encode(snapshot: &PointCloudSnapshot) -> Result<Bytes, EncodeError> {
    PointCloudCodec::default().encode(snapshot)
}

/// Decode with the default codec
pub fn decode(payload: &[u8]) -> Result<PointCloudSnapshot, DecodeError> {
    PointCloudCodec::default().decode(payload)
}
