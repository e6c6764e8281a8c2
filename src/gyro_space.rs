//! Gyro coordinate spaces.
//!
//! Raw gyro output is in the controller's own frame (**local** space). Two
//! other frames are derived from the gravity estimate:
//!
//! - **World**: yaw is reported around true vertical no matter how the
//!   controller is tilted; pitch is around the horizontal projection of the
//!   controller's X axis and roll completes the right-handed basis. Pitch
//!   fades out as the controller is held on its side (see
//!   [`GyroTransformer::side_reduction`]).
//! - **Player**: pitch and roll stay local. Yaw takes its direction from the
//!   yaw and roll axes projected on vertical, scaled by the relax factor, and
//!   its magnitude is capped by the local yaw-plane magnitude
//!   `hypot(gy, gz)`. Tilted yaw gets its full strength back while pitch
//!   never leaks into it.
//!
//! Frame convention: X = pitch axis, Y = yaw axis (up when the controller
//! lies flat), Z = roll axis. Gravity at rest, flat, is `(0, -1, 0)`. At that
//! reference orientation all three spaces agree.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Gravity direction in the world frame.
pub const WORLD_DOWN: Vec3 = Vec3::new(0.0, -1.0, 0.0);

/// Below this length a projected axis is treated as degenerate.
const AXIS_EPSILON: f32 = 1.0e-4;

/// Coordinate frame for reported angular velocity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i32)]
pub enum GyroSpace {
    #[default]
    Local = 0,
    World = 1,
    Player = 2,
}

impl GyroSpace {
    pub const fn as_raw(self) -> i32 {
        self as i32
    }

    /// `0` = local, `1` = world, `2` = player; anything else is `None`.
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::Local),
            1 => Some(Self::World),
            2 => Some(Self::Player),
            _ => None,
        }
    }
}

/// The orientation estimate a transform is evaluated against.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotionFrame {
    pub orientation: Quat,
    /// Gravity in the local frame (g). A zero vector means "unknown"; the
    /// orientation is used instead.
    pub gravity: Vec3,
}

impl Default for MotionFrame {
    fn default() -> Self {
        Self {
            orientation: Quat::IDENTITY,
            gravity: WORLD_DOWN,
        }
    }
}

impl MotionFrame {
    /// Unit up vector in the local frame.
    fn up(&self) -> Vec3 {
        let up = -self.gravity.normalize_or_zero();
        if up != Vec3::ZERO {
            return up;
        }
        -(self.orientation.inverse() * WORLD_DOWN).normalize_or_zero()
    }
}

/// Default [`GyroTransformer::player_relax`].
pub const DEFAULT_PLAYER_RELAX: f32 = 1.41;

/// Default [`GyroTransformer::side_reduction`].
pub const DEFAULT_SIDE_REDUCTION: f32 = 0.125;

/// Converts calibrated local gyro into a [`GyroSpace`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GyroTransformer {
    /// Gain on the projected player-space yaw before it is capped by the
    /// local yaw-plane magnitude. Must be `>= 1.0`.
    pub player_relax: f32,
    /// World-space pitch is scaled down once neither the yaw axis nor the
    /// roll axis is within this much of vertical, reaching zero with the
    /// controller on its side. `0` disables the reduction.
    pub side_reduction: f32,
}

impl Default for GyroTransformer {
    fn default() -> Self {
        Self::new(DEFAULT_PLAYER_RELAX)
    }
}

impl GyroTransformer {
    pub fn new(player_relax: f32) -> Self {
        Self {
            player_relax,
            side_reduction: DEFAULT_SIDE_REDUCTION,
        }
    }

    pub fn with_side_reduction(mut self, threshold: f32) -> Self {
        self.side_reduction = threshold;
        self
    }

    pub fn transform(&self, space: GyroSpace, gyro: Vec3, frame: &MotionFrame) -> Vec3 {
        match space {
            GyroSpace::Local => gyro,
            GyroSpace::World => world_space(gyro, frame, self.side_reduction),
            GyroSpace::Player => self.player_space(gyro, frame),
        }
    }

    fn player_space(&self, gyro: Vec3, frame: &MotionFrame) -> Vec3 {
        let up = frame.up();
        if up == Vec3::ZERO {
            return gyro;
        }
        // Only the yaw and roll axes count toward the direction.
        let world_yaw = gyro.y * up.y + gyro.z * up.z;
        let magnitude = (world_yaw.abs() * self.player_relax).min(gyro.y.hypot(gyro.z));
        Vec3::new(gyro.x, magnitude.copysign(world_yaw), gyro.z)
    }
}

/// Pitch scale for world space: 1 while the yaw or roll axis is close to
/// vertical, falling to 0 as both approach horizontal.
fn side_reduction_factor(up: Vec3, threshold: f32) -> f32 {
    if threshold <= 0.0 {
        return 1.0;
    }
    let flatness = up.y.abs();
    let upness = up.z.abs();
    ((flatness.max(upness) - threshold) / threshold).clamp(0.0, 1.0)
}

/// World basis `(pitch, up, roll)` expressed in local coordinates.
fn world_basis(up: Vec3) -> (Vec3, Vec3) {
    let pitch = Vec3::X - up * up.x;
    if pitch.length() > AXIS_EPSILON {
        let pitch = pitch.normalize();
        return (pitch, pitch.cross(up));
    }
    // X points straight up or down: anchor on the roll axis instead.
    let roll = (Vec3::Z - up * up.z).normalize_or_zero();
    (up.cross(roll), roll)
}

fn world_space(gyro: Vec3, frame: &MotionFrame, side_reduction: f32) -> Vec3 {
    let up = frame.up();
    if up == Vec3::ZERO {
        return gyro;
    }
    let (pitch, roll) = world_basis(up);
    Vec3::new(
        gyro.dot(pitch) * side_reduction_factor(up, side_reduction),
        gyro.dot(up),
        gyro.dot(roll),
    )
}
