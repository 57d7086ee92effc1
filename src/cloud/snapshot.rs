//! Point cloud snapshot

use std::fmt;

/// Error returned when points and colors are not index-aligned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthMismatch {
    pub points: usize,
    pub colors: usize,
}

impl fmt::Display for LengthMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} points but {} colors", self.points, self.colors)
    }
}

impl std::error::Error for LengthMismatch {}

/// One built point cloud
///
/// `points[i]` has color `colors[i]`; the two sequences always have the same
/// length.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PointCloudSnapshot {
    points: Vec<[f64; 3]>,
    colors: Vec<[u8; 3]>,
    timestamp: f64,
}

impl PointCloudSnapshot {
    /// Build a snapshot from parallel point and color sequences
    pub fn new(
        points: Vec<[f64; 3]>,
        colors: Vec<[u8; 3]>,
        timestamp: f64,
    ) -> Result<Self, LengthMismatch> {
        if points.len() != colors.len() {
            return Err(LengthMismatch {
                points: points.len(),
                colors: colors.len(),
            });
        }

        Ok(Self {
            points,
            colors,
            timestamp,
        })
    }

    /// An empty snapshot at `timestamp`
    pub fn empty(timestamp: f64) -> Self {
        Self {
            points: Vec::new(),
            colors: Vec::new(),
            timestamp,
        }
    }

    pub(crate) fn with_capacity(capacity: usize, timestamp: f64) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
            colors: Vec::with_capacity(capacity),
            timestamp,
        }
    }

    /// Append one colored point
    pub(crate) fn push(&mut self, point: [f64; 3], color: [u8; 3]) {
        self.points.push(point);
        self.colors.push(color);
    }

    pub fn points(&self) -> &[[f64; 3]] {
        &self.points
    }

    pub fn colors(&self) -> &[[u8; 3]] {
        &self.colors
    }

    /// Capture time in seconds since the UNIX epoch
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Iterate over `(point, color)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&[f64; 3], &[u8; 3])> {
        self.points.iter().zip(self.colors.iter())
    }

    /// Whether every coordinate and the timestamp are finite
    pub fn is_finite(&self) -> bool {
        self.timestamp.is_finite() && self.points.iter().flatten().all(|v| v.is_finite())
    }

    /// Split into the raw parts
    pub fn into_parts(self) -> (Vec<[f64; 3]>, Vec<[u8; 3]>, f64) {
        (self.points, self.colors, self.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_mismatch_rejected() {
        let err = PointCloudSnapshot::new(vec![[0.0; 3]; 2], vec![[0; 3]], 1.0).unwrap_err();
        assert_eq!(err, LengthMismatch { points: 2, colors: 1 });
        assert_eq!(err.to_string(), "2 points but 1 colors");
    }

    #[test]
    fn test_push_keeps_alignment() {
        let mut snapshot = PointCloudSnapshot::with_capacity(2, 5.0);
        snapshot.push([1.0, 2.0, 3.0], [4, 5, 6]);
        snapshot.push([7.0, 8.0, 9.0], [10, 11, 12]);

        assert_eq!(snapshot.len(), 2);
        let pairs: Vec<_> = snapshot.iter().collect();
        assert_eq!(pairs[1], (&[7.0, 8.0, 9.0], &[10, 11, 12]));
    }

    #[test]
    fn test_finite_check() {
        assert!(PointCloudSnapshot::empty(0.0).is_finite());
        assert!(!PointCloudSnapshot::empty(f64::NAN).is_finite());

        let snapshot =
            PointCloudSnapshot::new(vec![[0.0, f64::INFINITY, 1.0]], vec![[0; 3]], 1.0).unwrap();
        assert!(!snapshot.is_finite());
    }
}
