//! Aligned depth and color frames
//!
//! A [`FramePair`] is one capture instant: a depth grid in raw sensor units and
//! a color grid aligned to it pixel for pixel.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Error returned when a grid buffer does not match its dimensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridSizeError {
    /// Number of elements implied by the dimensions
    pub expected: usize,
    /// Number of elements actually supplied
    pub actual: usize,
}

impl fmt::Display for GridSizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "grid buffer has {} elements, dimensions require {}",
            self.actual, self.expected
        )
    }
}

impl std::error::Error for GridSizeError {}

/// Depth samples in raw sensor units, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct DepthGrid {
    width: u32,
    height: u32,
    samples: Vec<u16>,
}

impl DepthGrid {
    /// Wrap a row-major sample buffer
    pub fn new(width: u32, height: u32, samples: Vec<u16>) -> Result<Self, GridSizeError> {
        let expected = width as usize * height as usize;
        if samples.len() != expected {
            return Err(GridSizeError {
                expected,
                actual: samples.len(),
            });
        }

        Ok(Self {
            width,
            height,
            samples,
        })
    }

    /// A grid where every sample reports no return
    pub fn zeroed(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            samples: vec![0; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw sample at (x, y)
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> u16 {
        self.samples[y as usize * self.width as usize + x as usize]
    }

    /// Set the raw sample at (x, y)
    pub fn set(&mut self, x: u32, y: u32, value: u16) {
        self.samples[y as usize * self.width as usize + x as usize] = value;
    }

    pub fn samples(&self) -> &[u16] {
        &self.samples
    }
}

/// Channel order of a color buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorFormat {
    #[default]
    Rgb8,
    Bgr8,
}

/// Color pixels, 3 bytes per pixel, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct ColorGrid {
    width: u32,
    height: u32,
    format: ColorFormat,
    data: Vec<u8>,
}

impl ColorGrid {
    /// Wrap a packed 3-byte-per-pixel buffer
    pub fn new(
        width: u32,
        height: u32,
        format: ColorFormat,
        data: Vec<u8>,
    ) -> Result<Self, GridSizeError> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(GridSizeError {
                expected,
                actual: data.len(),
            });
        }

        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    /// A grid filled with one RGB color
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();

        Self {
            width,
            height,
            format: ColorFormat::Rgb8,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> ColorFormat {
        self.format
    }

    /// Pixel at (x, y) in RGB order, regardless of the buffer format
    #[inline]
    pub fn rgb(&self, x: u32, y: u32) -> [u8; 3] {
        let i = (y as usize * self.width as usize + x as usize) * 3;
        let px = [self.data[i], self.data[i + 1], self.data[i + 2]];
        match self.format {
            ColorFormat::Rgb8 => px,
            ColorFormat::Bgr8 => [px[2], px[1], px[0]],
        }
    }

    /// Set the pixel at (x, y) from an RGB triple
    pub fn set_rgb(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        let i = (y as usize * self.width as usize + x as usize) * 3;
        let px = match self.format {
            ColorFormat::Rgb8 => rgb,
            ColorFormat::Bgr8 => [rgb[2], rgb[1], rgb[0]],
        };
        self.data[i..i + 3].copy_from_slice(&px);
    }
}

/// One aligned depth + color capture
#[derive(Debug, Clone, PartialEq)]
pub struct FramePair {
    pub depth: DepthGrid,
    pub color: ColorGrid,
    /// Meters per raw depth unit
    pub depth_scale: f64,
    /// Capture time in seconds since the UNIX epoch
    pub captured_at: f64,
}

impl FramePair {
    /// Create a frame pair stamped with the current wall-clock time
    pub fn new(depth: DepthGrid, color: ColorGrid, depth_scale: f64) -> Self {
        Self {
            depth,
            color,
            depth_scale,
            captured_at: unix_now(),
        }
    }

    /// Override the capture timestamp
    pub fn with_timestamp(mut self, captured_at: f64) -> Self {
        self.captured_at = captured_at;
        self
    }
}

/// Current wall-clock time in seconds since the UNIX epoch
pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
