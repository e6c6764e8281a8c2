//! Gyro accumulation between flushes.

use glam::{DVec3, Vec3};

/// Running mean of space-transformed gyro samples since the last flush.
///
/// The sum is kept in `f64` so that averaging many identical `f32` samples
/// returns the sample value exactly.
#[derive(Clone, Debug, Default)]
pub struct GyroAccumulator {
    sum: DVec3,
    count: u32,
}

impl GyroAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, gyro: Vec3) {
        self.sum += gyro.as_dvec3();
        self.count = self.count.saturating_add(1);
    }

    /// Samples accumulated since the last flush.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Mean of the accumulated samples, then reset. Zero when empty.
    pub fn flush(&mut self) -> Vec3 {
        let mean = self.mean();
        self.reset();
        mean
    }

    pub fn reset(&mut self) {
        self.sum = DVec3::ZERO;
        self.count = 0;
    }

    fn mean(&self) -> Vec3 {
        if self.count == 0 {
            return Vec3::ZERO;
        }
        (self.sum / f64::from(self.count)).as_vec3()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_flush_is_zero() {
        let mut acc = GyroAccumulator::new();
        assert_eq!(acc.flush(), Vec3::ZERO);
        assert_eq!(acc.count(), 0);
    }

    #[test]
    fn mean_of_identical_samples_is_exact() {
        let mut acc = GyroAccumulator::new();
        let v = Vec3::new(0.1, -3.3, 123.456);
        for _ in 0..997 {
            acc.add(v);
        }
        assert_eq!(acc.flush(), v);
        assert_eq!(acc.count(), 0);
        assert_eq!(acc.flush(), Vec3::ZERO);
    }

    #[test]
    fn mean_of_mixed_samples() {
        let mut acc = GyroAccumulator::new();
        acc.add(Vec3::new(1.0, 0.0, -2.0));
        acc.add(Vec3::new(3.0, 4.0, 2.0));
        assert_eq!(acc.flush(), Vec3::new(2.0, 2.0, 0.0));
    }

    #[test]
    fn reset_discards_samples() {
        let mut acc = GyroAccumulator::new();
        acc.add(Vec3::ONE);
        acc.reset();
        assert_eq!(acc.flush(), Vec3::ZERO);
    }
}
