//! Decoded input reports and the events delivered to callbacks.
//!
//! Transports (HID report parsers, virtual devices, host applications that
//! own their own I/O) hand the [`Manager`](crate::manager::Manager) one
//! [`InputReport`] per device report. Reports are already decoded into
//! library units; vendor wire formats never reach this layer.
//!
//! ## Value conventions
//! - Sticks `[-1, 1]`, up positive. Triggers `[0, 1]`.
//! - Accelerometer in g, gyro in deg/s, both in the controller's local frame
//!   and **uncalibrated**: the manager applies the calibration offset.
//! - Some controllers deliver several IMU samples per report (Switch
//!   controllers send three); list them oldest first.

use crate::device::DeviceHandle;
use crate::state::{ImuState, SimpleState, TouchState};
use std::time::Instant;

/// One raw IMU sample.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ImuSample {
    /// Accelerometer (g).
    pub accel: [f32; 3],
    /// Raw gyroscope (deg/s).
    pub gyro: [f32; 3],
    /// Seconds covered by this sample. `0.0` means unknown; the manager
    /// derives it from report timing or the device poll rate.
    pub delta_time: f32,
}

/// A decoded device report.
#[derive(Clone, Debug)]
pub struct InputReport {
    /// Capture time (monotonic).
    pub at: Instant,
    pub simple: SimpleState,
    pub imu: Vec<ImuSample>,
    /// `None` when the report carried no touch data.
    pub touch: Option<TouchState>,
}

impl InputReport {
    pub fn new(simple: SimpleState) -> Self {
        Self {
            at: Instant::now(),
            simple,
            imu: Vec::new(),
            touch: None,
        }
    }

    pub fn with_imu(mut self, sample: ImuSample) -> Self {
        self.imu.push(sample);
        self
    }

    pub fn with_touch(mut self, touch: TouchState) -> Self {
        self.touch = Some(touch);
        self
    }

    pub fn at(mut self, at: Instant) -> Self {
        self.at = at;
        self
    }
}

/// Delivered to the state callback once per processed report.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StateEvent {
    pub handle: DeviceHandle,
    pub state: SimpleState,
    pub last_state: SimpleState,
    pub imu: ImuState,
    pub last_imu: ImuState,
    /// Seconds since the previous report from this device.
    pub delta_time: f32,
}

/// Delivered to the touch callback once per processed report on devices
/// with a touchpad, whether or not touch data changed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TouchEvent {
    pub handle: DeviceHandle,
    pub touch: TouchState,
    pub last_touch: TouchState,
    pub delta_time: f32,
}
