//! Per-device gyro calibration.
//!
//! A [`CalibrationStore`] owns the one active gyro offset of a device and
//! the two ways of estimating it:
//!
//! - **Continuous calibration** (`start` / `pause` / `reset`): while
//!   started, every raw sample is folded into a running mean and that mean
//!   *is* the offset. The user is expected to hold the controller still.
//! - **Automatic calibration**, selected by [`CalibrationMode`]:
//!   - [`CalibrationMode::Stillness`]: a sliding window of raw gyro and
//!     accel samples is checked for stillness. While steady, the offset
//!     drifts toward the window mean.
//!   - [`CalibrationMode::SensorFusion`]: the rate at which the measured
//!     gravity direction turns gives the true angular velocity on the two
//!     axes perpendicular to gravity. While that estimate is trustworthy the
//!     offset on those axes drifts toward the difference between gyro and
//!     accel rates. The axis along gravity is left alone.
//!
//!   In both, confidence rises while the estimate is usable and decays
//!   otherwise.
//!
//! The two are independent switches. While continuous calibration is
//! integrating it owns the offset and the automatic path only observes.

use crate::config::CalibrationSettings;
use crate::state::{AutoCalibrationStatus, CalibrationOffset};
use glam::{DVec3, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::f32::consts::PI;
use tracing::debug;

/// Accel readings shorter than this (g) carry no direction.
const MIN_ACCEL: f32 = 0.05;

/// How automatic calibration estimates the offset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum CalibrationMode {
    /// No automatic calibration.
    #[default]
    Manual = 0,
    /// Learn the offset while the controller is held still.
    Stillness = 1,
    /// Learn the offset from gravity direction changes.
    SensorFusion = 2,
}

impl CalibrationMode {
    pub const fn as_raw(self) -> i32 {
        self as i32
    }

    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::Manual),
            1 => Some(Self::Stillness),
            2 => Some(Self::SensorFusion),
            _ => None,
        }
    }

    pub fn is_automatic(self) -> bool {
        self != Self::Manual
    }
}

/// Running mean for continuous calibration.
#[derive(Clone, Debug, Default)]
struct ContinuousCalibration {
    active: bool,
    sum: DVec3,
    count: u32,
}

impl ContinuousCalibration {
    fn clear(&mut self) {
        self.sum = DVec3::ZERO;
        self.count = 0;
    }

    fn mean(&self) -> Vec3 {
        if self.count == 0 {
            Vec3::ZERO
        } else {
            (self.sum / f64::from(self.count)).as_vec3()
        }
    }
}

/// Sliding window used to decide whether the controller is held still.
#[derive(Clone, Debug)]
struct StillnessWindow {
    samples: VecDeque<(Vec3, Vec3)>,
    capacity: usize,
}

/// Mean and variance summary of a full window.
struct WindowStats {
    gyro_mean: Vec3,
    gyro_variance: f32,
    accel_variance: f32,
}

impl StillnessWindow {
    fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, gyro: Vec3, accel: Vec3) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back((gyro, accel));
    }

    fn clear(&mut self) {
        self.samples.clear();
    }

    fn is_full(&self) -> bool {
        self.samples.len() >= self.capacity
    }

    fn stats(&self) -> Option<WindowStats> {
        if self.samples.is_empty() {
            return None;
        }
        let n = self.samples.len() as f32;
        let (gyro_sum, accel_sum) = self
            .samples
            .iter()
            .fold((Vec3::ZERO, Vec3::ZERO), |(g, a), (gs, as_)| (g + *gs, a + *as_));
        let gyro_mean = gyro_sum / n;
        let accel_mean = accel_sum / n;
        let (gyro_sq, accel_sq) = self.samples.iter().fold((0.0f32, 0.0f32), |(g, a), (gs, as_)| {
            (
                g + (*gs - gyro_mean).length_squared(),
                a + (*as_ - accel_mean).length_squared(),
            )
        });
        Some(WindowStats {
            gyro_mean,
            gyro_variance: gyro_sq / n,
            accel_variance: accel_sq / n,
        })
    }
}

/// Automatic calibration state shared by both modes.
#[derive(Clone, Debug)]
struct AutoCalibration {
    mode: CalibrationMode,
    steady: bool,
    confidence: f32,
    window: StillnessWindow,
    /// Previous unit accel direction for sensor fusion.
    last_direction: Option<Vec3>,
}

impl AutoCalibration {
    fn clear(&mut self) {
        self.window.clear();
        self.last_direction = None;
        self.steady = false;
    }
}

/// The active gyro offset of one device and the machinery that estimates it.
#[derive(Clone, Debug)]
pub struct CalibrationStore {
    settings: CalibrationSettings,
    offset: Vec3,
    continuous: ContinuousCalibration,
    auto: AutoCalibration,
}

impl Default for CalibrationStore {
    fn default() -> Self {
        Self::new(CalibrationSettings::default())
    }
}

impl CalibrationStore {
    pub fn new(settings: CalibrationSettings) -> Self {
        let window = StillnessWindow::new(settings.stillness_window.max(2));
        Self {
            settings,
            offset: Vec3::ZERO,
            continuous: ContinuousCalibration::default(),
            auto: AutoCalibration {
                mode: CalibrationMode::Manual,
                steady: false,
                confidence: 0.0,
                window,
                last_direction: None,
            },
        }
    }

    /// The offset currently subtracted from raw gyro.
    pub fn offset(&self) -> CalibrationOffset {
        self.offset.into()
    }

    /// Overwrite the offset. Subsequent continuous calibration starts a
    /// fresh mean.
    pub fn set_offset(&mut self, offset: CalibrationOffset) {
        self.offset = offset.into();
        self.continuous.clear();
    }

    /// Seed the offset from persisted data, counting it as `weight` samples
    /// of continuous calibration.
    pub fn restore(&mut self, offset: CalibrationOffset, weight: u32) {
        self.offset = offset.into();
        self.continuous.sum = self.offset.as_dvec3() * f64::from(weight);
        self.continuous.count = weight;
    }

    /// Samples behind the continuous-calibration mean.
    pub fn weight(&self) -> u32 {
        self.continuous.count
    }

    pub fn start_continuous(&mut self) {
        self.continuous.active = true;
    }

    pub fn pause_continuous(&mut self) {
        self.continuous.active = false;
    }

    /// Forget every estimate: offset, running mean, window and confidence.
    /// Whether continuous calibration is started is left unchanged.
    pub fn reset_continuous(&mut self) {
        self.offset = Vec3::ZERO;
        self.continuous.clear();
        self.auto.clear();
        self.auto.confidence = 0.0;
    }

    pub fn is_calibrating(&self) -> bool {
        self.continuous.active
    }

    /// Turn automatic calibration on in the configured
    /// [`automatic_mode`](CalibrationSettings::automatic_mode), or off. An
    /// already running automatic mode is kept.
    pub fn set_auto_enabled(&mut self, enabled: bool) {
        let mode = match (enabled, self.auto.mode.is_automatic()) {
            (true, true) => return,
            (true, false) => self.settings.automatic_mode,
            (false, _) => CalibrationMode::Manual,
        };
        self.set_mode(mode);
    }

    pub fn auto_enabled(&self) -> bool {
        self.auto.mode.is_automatic()
    }

    pub fn mode(&self) -> CalibrationMode {
        self.auto.mode
    }

    /// Switch automatic calibration mode. Switching clears the stillness
    /// window and fusion history but keeps the offset and confidence.
    pub fn set_mode(&mut self, mode: CalibrationMode) {
        if self.auto.mode == mode {
            return;
        }
        debug!(?mode, "calibration mode changed");
        self.auto.mode = mode;
        self.auto.clear();
    }

    pub fn status(&self) -> AutoCalibrationStatus {
        AutoCalibrationStatus {
            confidence: self.auto.confidence,
            auto_calibration_enabled: self.auto.mode.is_automatic(),
            is_steady: self.auto.steady,
        }
    }

    /// Feed one raw (uncalibrated) sample. `dt` is in seconds.
    pub fn observe(&mut self, raw_gyro: Vec3, accel: Vec3, dt: f32) {
        if self.continuous.active {
            self.continuous.sum += raw_gyro.as_dvec3();
            self.continuous.count = self.continuous.count.saturating_add(1);
            self.offset = self.continuous.mean();
        }

        let dt = dt.max(0.0);
        match self.auto.mode {
            CalibrationMode::Manual => {}
            CalibrationMode::Stillness => self.observe_stillness(raw_gyro, accel, dt),
            CalibrationMode::SensorFusion => self.observe_fusion(raw_gyro, accel, dt),
        }
    }

    fn observe_stillness(&mut self, raw_gyro: Vec3, accel: Vec3, dt: f32) {
        self.auto.window.push(raw_gyro, accel);
        if !self.auto.window.is_full() {
            return;
        }
        let Some(stats) = self.auto.window.stats() else {
            return;
        };

        let steady = stats.gyro_variance < self.settings.gyro_variance_threshold
            && stats.accel_variance < self.settings.accel_variance_threshold;
        if steady != self.auto.steady {
            debug!(
                steady,
                gyro_variance = stats.gyro_variance,
                accel_variance = stats.accel_variance,
                "stillness changed"
            );
        }
        self.settle(steady, dt, |_| stats.gyro_mean);
    }

    fn observe_fusion(&mut self, raw_gyro: Vec3, accel: Vec3, dt: f32) {
        let length = accel.length();
        if length < MIN_ACCEL {
            self.auto.last_direction = None;
            self.settle(false, dt, |offset| offset);
            return;
        }
        let direction = accel / length;
        let Some(previous) = self.auto.last_direction.replace(direction) else {
            return;
        };
        if dt <= 0.0 {
            return;
        }

        // A world-fixed direction seen from the controller turns opposite
        // to the controller: d' = d x w, so w across gravity = d' x d.
        let accel_rate = ((direction - previous) / dt).cross(direction) * (180.0 / PI);
        let gyro_across = raw_gyro - direction * raw_gyro.dot(direction);
        let usable = (length - 1.0).abs() < self.settings.fusion_accel_tolerance
            && accel_rate.length() < self.settings.fusion_max_rate;
        if usable != self.auto.steady {
            debug!(usable, accel = length, rate = accel_rate.length(), "fusion usability changed");
        }
        self.settle(usable, dt, |offset| {
            direction * offset.dot(direction) + (gyro_across - accel_rate)
        });
    }

    /// Update steadiness and confidence, and while steady move the offset
    /// toward `target(current offset)` unless continuous calibration owns it.
    fn settle(&mut self, steady: bool, dt: f32, target: impl FnOnce(Vec3) -> Vec3) {
        self.auto.steady = steady;
        if steady {
            self.auto.confidence =
                (self.auto.confidence + dt * self.settings.confidence_rise_rate).min(1.0);
            if !self.continuous.active {
                let alpha = (dt * self.settings.offset_adapt_rate).clamp(0.0, 1.0);
                self.offset += (target(self.offset) - self.offset) * alpha;
            }
        } else {
            self.auto.confidence =
                (self.auto.confidence - dt * self.settings.confidence_decay_rate).max(0.0);
        }
    }

    /// Subtract the active offset from a raw sample.
    #[inline]
    pub fn apply(&self, raw_gyro: Vec3) -> Vec3 {
        raw_gyro - self.offset
    }
}
