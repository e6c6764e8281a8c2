//! Plain state records returned by the polled accessors.
//!
//! Every record is `#[repr(C)]` with the field order of the C-facing API so
//! it can be handed across an FFI boundary unchanged. The `Default` value of
//! each record is the all-zero state returned for unknown or stale handles.
//!
//! ## Units
//! - Sticks: nominally `[-1.0, 1.0]`, up is positive Y.
//! - Triggers: `[0.0, 1.0]`. Digital-only triggers report `0.0` or `1.0`.
//! - Accelerometer: g. At rest, flat and face up, a controller reads `(0, 1, 0)`.
//! - Gyroscope: degrees per second. X = pitch, Y = yaw, Z = roll.
//! - Touch coordinates: normalized `[0.0, 1.0]` over the touchpad.

use crate::buttons::{Button, ButtonMask};
use crate::gyro_space::GyroSpace;
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Buttons, triggers and sticks.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SimpleState {
    pub buttons: ButtonMask,
    pub l_trigger: f32,
    pub r_trigger: f32,
    pub stick_lx: f32,
    pub stick_ly: f32,
    pub stick_rx: f32,
    pub stick_ry: f32,
}

impl SimpleState {
    #[inline]
    pub fn pressed(&self, button: Button) -> bool {
        self.buttons.contains(button)
    }
}

/// Accelerometer and gyroscope reading.
///
/// The gyro fields are expressed in the device's configured [`GyroSpace`];
/// the accelerometer is always local.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ImuState {
    pub accel_x: f32,
    pub accel_y: f32,
    pub accel_z: f32,
    pub gyro_x: f32,
    pub gyro_y: f32,
    pub gyro_z: f32,
}

impl ImuState {
    pub(crate) fn from_vectors(accel: Vec3, gyro: Vec3) -> Self {
        Self {
            accel_x: accel.x,
            accel_y: accel.y,
            accel_z: accel.z,
            gyro_x: gyro.x,
            gyro_y: gyro.y,
            gyro_z: gyro.z,
        }
    }

    #[inline]
    pub fn gyro(&self) -> [f32; 3] {
        [self.gyro_x, self.gyro_y, self.gyro_z]
    }

    #[inline]
    pub fn accel(&self) -> [f32; 3] {
        [self.accel_x, self.accel_y, self.accel_z]
    }
}

/// Fused motion: orientation, gravity-free acceleration and gravity.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionState {
    pub quat_w: f32,
    pub quat_x: f32,
    pub quat_y: f32,
    pub quat_z: f32,
    pub accel_x: f32,
    pub accel_y: f32,
    pub accel_z: f32,
    pub grav_x: f32,
    pub grav_y: f32,
    pub grav_z: f32,
}

impl MotionState {
    pub(crate) fn from_parts(orientation: Quat, accel: Vec3, gravity: Vec3) -> Self {
        Self {
            quat_w: orientation.w,
            quat_x: orientation.x,
            quat_y: orientation.y,
            quat_z: orientation.z,
            accel_x: accel.x,
            accel_y: accel.y,
            accel_z: accel.z,
            grav_x: gravity.x,
            grav_y: gravity.y,
            grav_z: gravity.z,
        }
    }
}

/// One finger on a touchpad.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TouchPoint {
    pub id: i32,
    pub down: bool,
    pub x: f32,
    pub y: f32,
}

/// Up to two touch points.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TouchState {
    pub t0_id: i32,
    pub t1_id: i32,
    pub t0_down: bool,
    pub t1_down: bool,
    pub t0_x: f32,
    pub t0_y: f32,
    pub t1_x: f32,
    pub t1_y: f32,
}

impl TouchState {
    pub fn from_points(first: TouchPoint, second: TouchPoint) -> Self {
        Self {
            t0_id: first.id,
            t1_id: second.id,
            t0_down: first.down,
            t1_down: second.down,
            t0_x: first.x,
            t0_y: first.y,
            t1_x: second.x,
            t1_y: second.y,
        }
    }

    /// The first (`second == false`) or second touch point.
    pub fn point(&self, second: bool) -> TouchPoint {
        if second {
            TouchPoint {
                id: self.t1_id,
                down: self.t1_down,
                x: self.t1_x,
                y: self.t1_y,
            }
        } else {
            TouchPoint {
                id: self.t0_id,
                down: self.t0_down,
                x: self.t0_x,
                y: self.t0_y,
            }
        }
    }
}

/// Gyro bias offset subtracted from raw samples (deg/s).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationOffset {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl CalibrationOffset {
    pub const ZERO: CalibrationOffset = CalibrationOffset {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl From<Vec3> for CalibrationOffset {
    fn from(v: Vec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

impl From<CalibrationOffset> for Vec3 {
    fn from(o: CalibrationOffset) -> Self {
        Vec3::new(o.x, o.y, o.z)
    }
}

/// Automatic calibration status.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AutoCalibrationStatus {
    /// `0.0` (no trust) to `1.0` (fully settled).
    pub confidence: f32,
    pub auto_calibration_enabled: bool,
    pub is_steady: bool,
}

/// Controller family.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum ControllerType {
    #[default]
    Unknown = 0,
    JoyConLeft = 1,
    JoyConRight = 2,
    ProController = 3,
    DualShock4 = 4,
    DualSense = 5,
}

impl ControllerType {
    pub const fn as_raw(self) -> i32 {
        self as i32
    }

    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => Self::JoyConLeft,
            2 => Self::JoyConRight,
            3 => Self::ProController,
            4 => Self::DualShock4,
            5 => Self::DualSense,
            _ => Self::Unknown,
        }
    }

    /// The split type a controller of this family always has.
    pub const fn split_type(self) -> SplitType {
        match self {
            Self::JoyConLeft => SplitType::Left,
            Self::JoyConRight => SplitType::Right,
            Self::ProController | Self::DualShock4 | Self::DualSense => SplitType::Full,
            Self::Unknown => SplitType::Unknown,
        }
    }
}

/// Whether a physical unit is a left half, a right half or a full controller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum SplitType {
    #[default]
    Unknown = 0,
    Left = 1,
    Right = 2,
    Full = 3,
}

impl SplitType {
    pub const fn as_raw(self) -> i32 {
        self as i32
    }

    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => Self::Left,
            2 => Self::Right,
            3 => Self::Full,
            _ => Self::Unknown,
        }
    }
}

/// Everything known about a device's identity and settings in one read.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ControllerInfo {
    pub gyro_space: GyroSpace,
    pub colour: i32,
    pub player_number: i32,
    pub controller_type: ControllerType,
    pub split_type: SplitType,
    pub is_calibrating: bool,
    pub auto_calibration_enabled: bool,
    pub is_connected: bool,
    /// Transport path (opaque, platform specific). Empty when unknown.
    pub path: String,
}
