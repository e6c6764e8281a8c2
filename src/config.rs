//! Library configuration.
//!
//! [`Config`] is plain serde data. Every section and field has a default, so
//! a TOML file only needs to name what it changes:
//!
//! ```toml
//! [motion]
//! default_gyro_space = "player"
//!
//! [calibration]
//! stillness_window = 64
//!
//! [storage]
//! calibration_file = "calibration.json"
//! auto_save = true
//! ```

use crate::calibration::CalibrationMode;
use crate::error::{Error, Result};
use crate::gyro_space::{GyroSpace, DEFAULT_PLAYER_RELAX, DEFAULT_SIDE_REDUCTION};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub motion: MotionSettings,
    pub calibration: CalibrationSettings,
    pub storage: StorageSettings,
    pub hid: HidSettings,
}

/// Motion pipeline settings applied to newly attached devices.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionSettings {
    /// Gyro space for newly attached devices.
    pub default_gyro_space: GyroSpace,
    /// Gain on projected player-space yaw before the local yaw-plane cap.
    /// Must be `>= 1`.
    pub player_space_relax: f32,
    /// Vertical component of the yaw or roll axis below which world-space
    /// pitch starts fading out. `0` disables it.
    pub world_side_reduction: f32,
    /// How fast the orientation is pulled toward the measured gravity (1/s).
    pub gravity_correction_rate: f32,
    /// Report rate assumed when neither the sample nor the device states one (Hz).
    pub fallback_poll_rate: f32,
    /// Enable automatic calibration when a device is attached.
    pub auto_calibration_on_connect: bool,
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            default_gyro_space: GyroSpace::Local,
            player_space_relax: DEFAULT_PLAYER_RELAX,
            world_side_reduction: DEFAULT_SIDE_REDUCTION,
            gravity_correction_rate: 2.0,
            fallback_poll_rate: 250.0,
            auto_calibration_on_connect: false,
        }
    }
}

/// Automatic calibration tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationSettings {
    /// Mode used when automatic calibration is switched on.
    pub automatic_mode: CalibrationMode,
    /// Samples in the sliding stillness window.
    pub stillness_window: usize,
    /// Sum of per-axis gyro variances below which the device may be steady ((deg/s)^2).
    pub gyro_variance_threshold: f32,
    /// Sum of per-axis accel variances below which the device may be steady (g^2).
    pub accel_variance_threshold: f32,
    /// Confidence gained per steady second.
    pub confidence_rise_rate: f32,
    /// Confidence lost per moving second.
    pub confidence_decay_rate: f32,
    /// Fraction of the way the offset moves toward its target per steady second.
    pub offset_adapt_rate: f32,
    /// Sensor fusion: largest deviation of the accel magnitude from 1 g that
    /// still counts as pure gravity.
    pub fusion_accel_tolerance: f32,
    /// Sensor fusion: fastest gravity-derived rotation (deg/s) trusted for
    /// correction.
    pub fusion_max_rate: f32,
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self {
            automatic_mode: CalibrationMode::Stillness,
            stillness_window: 48,
            gyro_variance_threshold: 0.5,
            accel_variance_threshold: 0.0004,
            confidence_rise_rate: 1.0,
            confidence_decay_rate: 0.5,
            offset_adapt_rate: 2.0,
            fusion_accel_tolerance: 0.1,
            fusion_max_rate: 120.0,
        }
    }
}

/// Calibration persistence.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// JSON file of per-device offsets. `None` disables persistence.
    pub calibration_file: Option<PathBuf>,
    /// Store a device's calibration when it disconnects.
    pub auto_save: bool,
}

/// HID backend settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HidSettings {
    pub enabled: bool,
    /// Upper bound on reports drained from one device per poll.
    pub max_reports_per_poll: usize,
}

impl Default for HidSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_reports_per_poll: 32,
        }
    }
}

impl Config {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        let m = &self.motion;
        if !(m.player_space_relax >= 1.0) {
            return Err(Error::Config(format!(
                "motion.player_space_relax must be >= 1.0, got {}",
                m.player_space_relax
            )));
        }
        if !(m.world_side_reduction >= 0.0) {
            return Err(Error::Config(
                "motion.world_side_reduction must be >= 0".into(),
            ));
        }
        if !(m.gravity_correction_rate >= 0.0) {
            return Err(Error::Config(
                "motion.gravity_correction_rate must be >= 0".into(),
            ));
        }
        if !(m.fallback_poll_rate > 0.0) {
            return Err(Error::Config("motion.fallback_poll_rate must be > 0".into()));
        }

        let c = &self.calibration;
        if c.stillness_window < 2 {
            return Err(Error::Config(
                "calibration.stillness_window must hold at least 2 samples".into(),
            ));
        }
        for (name, value) in [
            ("gyro_variance_threshold", c.gyro_variance_threshold),
            ("accel_variance_threshold", c.accel_variance_threshold),
            ("confidence_rise_rate", c.confidence_rise_rate),
            ("confidence_decay_rate", c.confidence_decay_rate),
            ("offset_adapt_rate", c.offset_adapt_rate),
            ("fusion_accel_tolerance", c.fusion_accel_tolerance),
            ("fusion_max_rate", c.fusion_max_rate),
        ] {
            if !(value >= 0.0) {
                return Err(Error::Config(format!(
                    "calibration.{name} must be >= 0, got {value}"
                )));
            }
        }

        if self.hid.max_reports_per_poll == 0 {
            return Err(Error::Config("hid.max_reports_per_poll must be > 0".into()));
        }
        Ok(())
    }
}
