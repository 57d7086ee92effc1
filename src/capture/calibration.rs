//! Pinhole camera intrinsics

/// Fixed camera intrinsics of the color stream that depth is aligned to
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    /// Focal length along x, in pixels
    pub fx: f64,
    /// Focal length along y, in pixels
    pub fy: f64,
    /// Principal point x, in pixels
    pub ppx: f64,
    /// Principal point y, in pixels
    pub ppy: f64,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
}

impl Calibration {
    /// Create calibration from raw intrinsics
    pub fn new(fx: f64, fy: f64, ppx: f64, ppy: f64, width: u32, height: u32) -> Self {
        Self {
            fx,
            fy,
            ppx,
            ppy,
            width,
            height,
        }
    }

    /// Calibration with the principal point at the image center
    pub fn centered(focal_length: f64, width: u32, height: u32) -> Self {
        Self::new(
            focal_length,
            focal_length,
            width as f64 / 2.0,
            height as f64 / 2.0,
            width,
            height,
        )
    }

    /// Whether the intrinsics can be used for unprojection
    pub fn is_valid(&self) -> bool {
        self.fx.is_finite()
            && self.fy.is_finite()
            && self.fx != 0.0
            && self.fy != 0.0
            && self.ppx.is_finite()
            && self.ppy.is_finite()
    }

    /// Map a pixel and its depth in meters to camera-space coordinates
    #[inline]
    pub fn unproject(&self, x: f64, y: f64, depth_m: f64) -> [f64; 3] {
        let z = depth_m;
        [(x - self.ppx) * z / self.fx, (y - self.ppy) * z / self.fy, z]
    }
}

impl Default for Calibration {
    /// Typical intrinsics of a 640x480 depth camera color stream
    fn default() -> Self {
        Self::centered(600.0, 640, 480)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unproject_principal_point() {
        let calib = Calibration::new(600.0, 600.0, 320.0, 240.0, 640, 480);
        assert_eq!(calib.unproject(320.0, 240.0, 1.0), [0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_unproject_off_axis() {
        let calib = Calibration::new(500.0, 250.0, 100.0, 100.0, 200, 200);
        let [x, y, z] = calib.unproject(600.0, 350.0, 2.0);

        assert_eq!(x, 2.0);
        assert_eq!(y, 2.0);
        assert_eq!(z, 2.0);
    }

    #[test]
    fn test_validity() {
        assert!(Calibration::default().is_valid());
        assert!(!Calibration::new(0.0, 600.0, 320.0, 240.0, 640, 480).is_valid());
        assert!(!Calibration::new(600.0, f64::NAN, 320.0, 240.0, 640, 480).is_valid());
        assert!(!Calibration::new(600.0, 600.0, f64::INFINITY, 240.0, 640, 480).is_valid());
    }
}
