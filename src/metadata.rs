//! Device metadata and capabilities.
//!
//! [`DeviceMeta`] is a lightweight, cloneable description of a device
//! suitable for logging and for keying persisted calibration. Backends fill
//! in what they know; unknown fields stay `None`.
//!
//! [`DeviceCaps`] describes what the hardware can do. The manager consults
//! it to answer resolution/rate queries and to skip output requests the
//! hardware cannot honour.
//!
//! ## Persistence notes
//! - `path` is the preferred calibration key: it is what the platform hands
//!   back for the same physical port and pairing.
//! - `vid`/`pid`/`serial_number` are used as a fallback key when no path is
//!   known.

use crate::state::{ControllerType, SplitType};
use serde::{Deserialize, Serialize};

/// Reported when a controller has no known body colour.
pub const COLOUR_WHITE: i32 = 0x00FF_FFFF;

/// Snapshot of metadata describing a single device.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceMeta {
    /// High-level bus classification (e.g. `"usb"`, `"bluetooth"`, `"virtual"`).
    pub bus: Option<String>,

    /// USB Vendor ID (VID), if known.
    pub vid: Option<u16>,

    /// USB Product ID (PID), if known.
    pub pid: Option<u16>,

    /// Human-readable product name from the driver/firmware.
    pub product_string: Option<String>,

    /// Device serial number supplied by firmware/OS, if present.
    pub serial_number: Option<String>,

    /// OS/topological path to the device. Opaque.
    pub path: Option<String>,

    pub controller_type: ControllerType,

    pub split_type: SplitType,
}

impl DeviceMeta {
    /// Key under which this device's calibration is persisted.
    ///
    /// Upper-cased so the same device matches regardless of how the
    /// platform cased the path.
    pub fn calibration_key(&self) -> Option<String> {
        if let Some(path) = self.path.as_deref().filter(|p| !p.is_empty()) {
            return Some(path.to_uppercase());
        }
        match (self.vid, self.pid, self.serial_number.as_deref()) {
            (Some(vid), Some(pid), Some(serial)) if !serial.is_empty() => {
                Some(format!("{vid:04X}:{pid:04X}:{}", serial.to_uppercase()))
            }
            _ => None,
        }
    }
}

/// What a device can do and at what resolution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviceCaps {
    pub has_imu: bool,
    /// Touchpad size in device units, if the device has one.
    pub touchpad: Option<(i32, i32)>,
    /// Smallest distinguishable stick movement in normalized units.
    pub stick_step: f32,
    /// Smallest distinguishable trigger movement in normalized units.
    pub trigger_step: f32,
    /// Nominal report rate (Hz).
    pub poll_rate: f32,
    pub has_light: bool,
    pub has_rumble: bool,
    pub has_player_leds: bool,
    /// Packed `0xRRGGBB` body colour.
    pub body_colour: i32,
}

impl Default for DeviceCaps {
    fn default() -> Self {
        Self {
            has_imu: false,
            touchpad: None,
            stick_step: 0.0,
            trigger_step: 0.0,
            poll_rate: 0.0,
            has_light: false,
            has_rumble: false,
            has_player_leds: false,
            body_colour: COLOUR_WHITE,
        }
    }
}

impl DeviceCaps {
    /// Typical capabilities for a controller family.
    ///
    /// Values follow the hardware: Switch controllers report 12-bit sticks
    /// and digital triggers at ~67 Hz; DualShock 4 and DualSense report
    /// 8-bit sticks and triggers and a touchpad.
    pub fn for_controller(controller_type: ControllerType) -> Self {
        match controller_type {
            ControllerType::JoyConLeft
            | ControllerType::JoyConRight
            | ControllerType::ProController => Self {
                has_imu: true,
                stick_step: 1.0 / 2048.0,
                trigger_step: 1.0,
                poll_rate: 66.67,
                has_rumble: true,
                has_player_leds: true,
                ..Self::default()
            },
            ControllerType::DualShock4 => Self {
                has_imu: true,
                touchpad: Some((1920, 943)),
                stick_step: 1.0 / 128.0,
                trigger_step: 1.0 / 255.0,
                poll_rate: 250.0,
                has_light: true,
                has_rumble: true,
                ..Self::default()
            },
            ControllerType::DualSense => Self {
                has_imu: true,
                touchpad: Some((1920, 1070)),
                stick_step: 1.0 / 128.0,
                trigger_step: 1.0 / 255.0,
                poll_rate: 250.0,
                has_light: true,
                has_rumble: true,
                has_player_leds: true,
                ..Self::default()
            },
            ControllerType::Unknown => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calibration_key_prefers_path() {
        let meta = DeviceMeta {
            path: Some("\\\\?\\hid#vid_054c&pid_09cc".into()),
            vid: Some(0x054c),
            pid: Some(0x09cc),
            serial_number: Some("abc".into()),
            ..DeviceMeta::default()
        };
        assert_eq!(
            meta.calibration_key().as_deref(),
            Some("\\\\?\\HID#VID_054C&PID_09CC")
        );
    }

    #[test]
    fn calibration_key_falls_back_to_ids() {
        let meta = DeviceMeta {
            vid: Some(0x057e),
            pid: Some(0x2009),
            serial_number: Some("ab12".into()),
            ..DeviceMeta::default()
        };
        assert_eq!(meta.calibration_key().as_deref(), Some("057E:2009:AB12"));
        assert_eq!(DeviceMeta::default().calibration_key(), None);
    }

    #[test]
    fn unknown_controllers_report_white_and_no_features() {
        let caps = DeviceCaps::for_controller(ControllerType::Unknown);
        assert_eq!(caps.body_colour, COLOUR_WHITE);
        assert!(!caps.has_light && !caps.has_rumble && !caps.has_player_leds);
        assert!(DeviceCaps::for_controller(ControllerType::DualSense).touchpad.is_some());
    }
}
