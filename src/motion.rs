//! Orientation, gravity and linear acceleration from IMU samples.
//!
//! A complementary filter: the gyro is integrated into the orientation
//! quaternion every sample, and the orientation is then nudged so that the
//! measured gravity direction lines up with world down. The first usable
//! accelerometer sample snaps the tilt into place; after that the correction
//! rate bounds how fast accel noise can leak into orientation. Yaw around
//! world vertical is unobservable from the accelerometer and drifts freely.

use crate::gyro_space::{MotionFrame, WORLD_DOWN};
use crate::state::MotionState;
use glam::{Quat, Vec3};

/// Accelerometer magnitudes below this (g) carry no usable direction.
const MIN_ACCEL: f32 = 0.05;

const DEG_TO_RAD: f32 = std::f32::consts::PI / 180.0;

#[derive(Clone, Debug)]
pub struct MotionEstimator {
    /// Local-to-world rotation.
    orientation: Quat,
    /// Gravity in the local frame (g).
    gravity: Vec3,
    /// Acceleration with gravity removed (g).
    accel: Vec3,
    settled: bool,
    correction_rate: f32,
}

impl Default for MotionEstimator {
    fn default() -> Self {
        Self::new(2.0)
    }
}

impl MotionEstimator {
    pub fn new(correction_rate: f32) -> Self {
        Self {
            orientation: Quat::IDENTITY,
            gravity: WORLD_DOWN,
            accel: Vec3::ZERO,
            settled: false,
            correction_rate,
        }
    }

    /// Integrate one calibrated local sample. `gyro` in deg/s, `accel` in g,
    /// `dt` in seconds.
    pub fn update(&mut self, gyro: Vec3, accel: Vec3, dt: f32) {
        let dt = dt.max(0.0);
        let step = gyro * (dt * DEG_TO_RAD);
        if step != Vec3::ZERO {
            self.orientation = (self.orientation * Quat::from_scaled_axis(step)).normalize();
        }

        let magnitude = accel.length();
        if magnitude >= MIN_ACCEL {
            let measured_down = self.orientation * (-accel / magnitude);
            let correction = Quat::from_rotation_arc(measured_down, WORLD_DOWN);
            let amount = if self.settled {
                (dt * self.correction_rate).clamp(0.0, 1.0)
            } else {
                1.0
            };
            let partial = Quat::IDENTITY.slerp(correction, amount);
            self.orientation = (partial * self.orientation).normalize();
            self.settled = true;
        }

        self.gravity = self.orientation.inverse() * WORLD_DOWN;
        self.accel = accel + self.gravity;
    }

    /// Forget the orientation estimate.
    pub fn reset(&mut self) {
        self.orientation = Quat::IDENTITY;
        self.gravity = WORLD_DOWN;
        self.accel = Vec3::ZERO;
        self.settled = false;
    }

    pub fn orientation(&self) -> Quat {
        self.orientation
    }

    pub fn gravity(&self) -> Vec3 {
        self.gravity
    }

    pub fn frame(&self) -> MotionFrame {
        MotionFrame {
            orientation: self.orientation,
            gravity: self.gravity,
        }
    }

    pub fn state(&self) -> MotionState {
        MotionState::from_parts(self.orientation, self.accel, self.gravity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 250.0;
    const FLAT: Vec3 = Vec3::new(0.0, 1.0, 0.0);

    fn close(a: Vec3, b: Vec3, eps: f32) -> bool {
        (a - b).length() < eps
    }

    #[test]
    fn at_rest_flat_gravity_is_down_and_accel_is_zero() {
        let mut m = MotionEstimator::default();
        for _ in 0..10 {
            m.update(Vec3::ZERO, FLAT, DT);
        }
        assert!(close(m.gravity(), WORLD_DOWN, 1.0e-5));
        let s = m.state();
        assert!(s.accel_x.abs() < 1.0e-5 && s.accel_y.abs() < 1.0e-5 && s.accel_z.abs() < 1.0e-5);
        assert!((s.quat_w.abs() - 1.0).abs() < 1.0e-5);
    }

    #[test]
    fn first_sample_snaps_tilt() {
        let mut m = MotionEstimator::default();
        // Lying on the left grip.
        m.update(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), DT);
        assert!(close(m.gravity(), Vec3::new(-1.0, 0.0, 0.0), 1.0e-4), "{:?}", m.gravity());
    }

    #[test]
    fn gyro_integrates_into_orientation() {
        let mut m = MotionEstimator::default();
        m.update(Vec3::ZERO, FLAT, DT);
        // 90 deg/s of yaw for one second: yaw is invisible to the accel.
        for _ in 0..250 {
            m.update(Vec3::new(0.0, 90.0, 0.0), FLAT, DT);
        }
        let forward = m.orientation() * Vec3::Z;
        assert!(close(forward, Vec3::X, 1.0e-2), "{forward:?}");
        assert!(close(m.gravity(), WORLD_DOWN, 1.0e-3));
    }

    #[test]
    fn gravity_follows_slow_tilt() {
        let mut m = MotionEstimator::default();
        m.update(Vec3::ZERO, FLAT, DT);
        // Pitch 90 degrees about X over a second, accel agreeing.
        for i in 1..=250 {
            let angle = (i as f32 / 250.0) * std::f32::consts::FRAC_PI_2;
            let accel = Vec3::new(0.0, angle.cos(), -angle.sin());
            m.update(Vec3::new(90.0, 0.0, 0.0), accel, DT);
        }
        assert!(close(m.gravity(), Vec3::new(0.0, 0.0, 1.0), 2.0e-2), "{:?}", m.gravity());
    }

    #[test]
    fn tiny_accel_skips_correction() {
        let mut m = MotionEstimator::default();
        m.update(Vec3::ZERO, Vec3::ZERO, DT);
        assert_eq!(m.orientation(), Quat::IDENTITY);
        assert_eq!(m.gravity(), WORLD_DOWN);
    }

    #[test]
    fn reset_returns_to_identity() {
        let mut m = MotionEstimator::default();
        m.update(Vec3::new(10.0, 20.0, 30.0), Vec3::new(0.5, 0.5, 0.5), DT);
        m.reset();
        assert_eq!(m.orientation(), Quat::IDENTITY);
        assert_eq!(m.state().quat_w, 1.0);
    }
}
