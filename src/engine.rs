//! Per-device motion pipeline.
//!
//! Every IMU sample goes through the same fixed sequence:
//!
//! ```text
//! raw gyro ─► calibration observe ─► offset subtract ─► estimator update
//!                                                         │
//!              IMU state / callbacks ◄─ accumulate ◄─ gyro-space transform
//! ```
//!
//! The estimator always sees calibrated *local* gyro; the space transform is
//! evaluated against the freshly updated orientation.

use crate::accumulator::GyroAccumulator;
use crate::calibration::CalibrationStore;
use crate::config::{CalibrationSettings, MotionSettings};
use crate::event::ImuSample;
use crate::gyro_space::{GyroSpace, GyroTransformer};
use crate::motion::MotionEstimator;
use crate::state::{ImuState, MotionState};
use glam::Vec3;

#[derive(Clone, Debug)]
pub struct MotionEngine {
    space: GyroSpace,
    transformer: GyroTransformer,
    calibration: CalibrationStore,
    estimator: MotionEstimator,
    accumulator: GyroAccumulator,
}

impl Default for MotionEngine {
    fn default() -> Self {
        Self::new(&MotionSettings::default(), CalibrationSettings::default())
    }
}

impl MotionEngine {
    pub fn new(motion: &MotionSettings, calibration: CalibrationSettings) -> Self {
        let mut store = CalibrationStore::new(calibration);
        store.set_auto_enabled(motion.auto_calibration_on_connect);
        Self {
            space: motion.default_gyro_space,
            transformer: GyroTransformer::new(motion.player_space_relax)
                .with_side_reduction(motion.world_side_reduction),
            calibration: store,
            estimator: MotionEstimator::new(motion.gravity_correction_rate),
            accumulator: GyroAccumulator::new(),
        }
    }

    /// Run one sample through the pipeline and return what the accessors
    /// should now report.
    pub fn process(&mut self, sample: &ImuSample, dt: f32) -> (ImuState, MotionState) {
        let raw_gyro = Vec3::from_array(sample.gyro);
        let accel = Vec3::from_array(sample.accel);

        self.calibration.observe(raw_gyro, accel, dt);
        let gyro = self.calibration.apply(raw_gyro);
        self.estimator.update(gyro, accel, dt);

        let out = self
            .transformer
            .transform(self.space, gyro, &self.estimator.frame());
        self.accumulator.add(out);

        (ImuState::from_vectors(accel, out), self.estimator.state())
    }

    pub fn gyro_space(&self) -> GyroSpace {
        self.space
    }

    pub fn set_gyro_space(&mut self, space: GyroSpace) {
        self.space = space;
    }

    pub fn calibration(&self) -> &CalibrationStore {
        &self.calibration
    }

    pub fn calibration_mut(&mut self) -> &mut CalibrationStore {
        &mut self.calibration
    }

    /// Mean transformed gyro since the last flush, then reset.
    pub fn flush_accumulated(&mut self) -> Vec3 {
        self.accumulator.flush()
    }

    pub fn reset_motion(&mut self) {
        self.estimator.reset();
        self.accumulator.reset();
    }
}
