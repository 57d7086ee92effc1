//! Synthetic frame source
//!
//! Renders a small scene (a back wall and a sphere swinging in front of it)
//! by ray casting through the calibration, so the server can be run and
//! exercised without a depth camera attached. Frames are paced at the
//! configured rate like a real sensor.

use std::time::Duration;

use tokio::time::Instant;

use super::calibration::Calibration;
use super::frame::{unix_now, ColorGrid, ColorFormat, DepthGrid, FramePair};
use super::source::{CaptureError, FrameSource};

/// Meters per raw unit, matching common depth sensors
const DEPTH_SCALE: f64 = 0.001;
const WALL_DISTANCE_M: f64 = 3.0;
const SPHERE_RADIUS_M: f64 = 0.4;
const SPHERE_DISTANCE_M: f64 = 1.5;
const SWING_AMPLITUDE_M: f64 = 0.6;
const SWING_PERIOD_S: f64 = 4.0;

/// Paced generator of synthetic depth/color frames
pub struct SyntheticSource {
    calibration: Calibration,
    frame_interval: Duration,
    next_due: Instant,
    frame_index: u64,
    closed: bool,
}

impl SyntheticSource {
    /// Create a source producing `fps` frames per second
    pub fn new(calibration: Calibration, fps: u32) -> Self {
        let frame_interval = Duration::from_secs_f64(1.0 / fps.max(1) as f64);

        Self {
            calibration,
            frame_interval,
            next_due: Instant::now(),
            frame_index: 0,
            closed: false,
        }
    }

    /// Number of frames produced so far
    pub fn frames_produced(&self) -> u64 {
        self.frame_index
    }

    /// Render the scene at time `t` seconds
    pub fn render(&self, t: f64) -> FramePair {
        render_scene(&self.calibration, t)
    }
}

/// Ray cast every pixel through `calib`
fn render_scene(calib: &Calibration, t: f64) -> FramePair {
    let (width, height) = (calib.width, calib.height);
    let mut depth = DepthGrid::zeroed(width, height);
    let mut color = ColorGrid::new(
        width,
        height,
        ColorFormat::Bgr8,
        vec![0; width as usize * height as usize * 3],
    )
    .unwrap_or_else(|_| ColorGrid::filled(width, height, [0; 3]));

    let phase = t * std::f64::consts::TAU / SWING_PERIOD_S;
    let center = [SWING_AMPLITUDE_M * phase.sin(), 0.0, SPHERE_DISTANCE_M];

    // Top band has no return, like open space above the wall.
    let no_return_rows = height / 10;

    for y in 0..height {
        for x in 0..width {
            if y < no_return_rows {
                continue;
            }

            let dir = [
                (x as f64 - calib.ppx) / calib.fx,
                (y as f64 - calib.ppy) / calib.fy,
                1.0,
            ];

            let (z, rgb) = match intersect_sphere(dir, center, SPHERE_RADIUS_M) {
                Some(z) => {
                    let shade = (1.0 - (z - SPHERE_DISTANCE_M + SPHERE_RADIUS_M)).clamp(0.2, 1.0);
                    (z, [(230.0 * shade) as u8, (60.0 * shade) as u8, (40.0 * shade) as u8])
                }
                None => {
                    let gx = (x * 255 / width.max(1)) as u8;
                    let gy = (y * 255 / height.max(1)) as u8;
                    (WALL_DISTANCE_M, [gx / 2, 96, gy / 2 + 64])
                }
            };

            depth.set(x, y, (z / DEPTH_SCALE).round() as u16);
            color.set_rgb(x, y, rgb);
        }
    }

    FramePair::new(depth, color, DEPTH_SCALE)
}

/// Depth (z) of the nearest hit of a ray with unit z component, if any
fn intersect_sphere(dir: [f64; 3], center: [f64; 3], radius: f64) -> Option<f64> {
    let a = dir[0] * dir[0] + dir[1] * dir[1] + dir[2] * dir[2];
    let b = -2.0 * (dir[0] * center[0] + dir[1] * center[1] + dir[2] * center[2]);
    let c = center[0] * center[0] + center[1] * center[1] + center[2] * center[2] - radius * radius;
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return None;
    }
    let t = (-b - disc.sqrt()) / (2.0 * a);
    (t > 0.0).then_some(t)
}

impl FrameSource for SyntheticSource {
    fn calibration(&self) -> Option<Calibration> {
        Some(self.calibration)
    }

    async fn next_frame(&mut self, budget: Duration) -> Result<FramePair, CaptureError> {
        if self.closed {
            return Err(CaptureError::DeviceLost("synthetic source closed".into()));
        }

        let now = Instant::now();
        if self.next_due > now + budget {
            tokio::time::sleep(budget).await;
            return Err(CaptureError::Timeout);
        }
        tokio::time::sleep_until(self.next_due).await;

        let now = Instant::now();
        self.next_due += self.frame_interval;
        if self.next_due < now {
            // Fell behind; resynchronise instead of bursting.
            self.next_due = now + self.frame_interval;
        }

        let t = self.frame_index as f64 * self.frame_interval.as_secs_f64();
        self.frame_index += 1;

        let calibration = self.calibration;
        let frame = tokio::task::spawn_blocking(move || render_scene(&calibration, t))
            .await
            .map_err(|e| CaptureError::Unavailable(e.to_string()))?;

        Ok(frame.with_timestamp(unix_now()))
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_source() -> SyntheticSource {
        SyntheticSource::new(Calibration::centered(60.0, 64, 48), 30)
    }

    #[test]
    fn test_render_dimensions_and_scale() {
        let frame = small_source().render(0.0);

        assert_eq!(frame.depth.width(), 64);
        assert_eq!(frame.depth.height(), 48);
        assert_eq!(frame.color.width(), 64);
        assert_eq!(frame.depth_scale, DEPTH_SCALE);
    }

    #[test]
    fn test_render_has_no_return_band_and_sphere() {
        let frame = small_source().render(0.0);

        // Top band reports zero depth
        assert_eq!(frame.depth.get(10, 0), 0);
        // Image center hits the sphere at t = 0 (sphere centered on the axis)
        let center = frame.depth.get(32, 24);
        assert!(center > 0);
        assert!((center as f64 * DEPTH_SCALE) < WALL_DISTANCE_M);
        // Corner sees the wall
        assert_eq!(frame.depth.get(0, 47), 3000);
    }

    #[test]
    fn test_intersect_sphere_on_axis() {
        let z = intersect_sphere([0.0, 0.0, 1.0], [0.0, 0.0, 2.0], 0.5).unwrap();
        assert!((z - 1.5).abs() < 1e-9);
        assert!(intersect_sphere([1.0, 0.0, 1.0], [0.0, 0.0, 2.0], 0.5).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_paced_frames() {
        let mut source = small_source();

        let first = source.next_frame(Duration::from_millis(100)).await;
        assert!(first.is_ok());

        // Next frame is ~33ms away, a 1ms budget times out
        let early = source.next_frame(Duration::from_millis(1)).await;
        assert_eq!(early.unwrap_err(), CaptureError::Timeout);

        let second = source.next_frame(Duration::from_millis(100)).await;
        assert!(second.is_ok());
        assert_eq!(source.frames_produced(), 2);
    }

    #[tokio::test]
    async fn test_next_frame_renders_off_the_runtime() {
        let mut source = SyntheticSource::new(Calibration::default(), 30);

        let frame = source.next_frame(Duration::from_millis(500)).await.unwrap();

        assert_eq!(frame.depth.width(), 640);
        assert_eq!(frame, source.render(0.0).with_timestamp(frame.captured_at));
    }

    #[tokio::test]
    async fn test_closed_source_reports_device_lost() {
        let mut source = small_source();
        source.close();

        let err = source.next_frame(Duration::from_millis(10)).await.unwrap_err();
        assert!(err.is_fatal());
    }
}
