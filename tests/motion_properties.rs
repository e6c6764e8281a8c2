//! Property-based tests for the motion pipeline.
//!
//! - zero gyro stays zero in every space and orientation
//! - flushing N identical samples returns the sample
//! - offsets read back exactly as set
//! - every button offset decodes to exactly one button
//! - player space equals world space at the reference orientation without
//!   roll, and its yaw never exceeds the local yaw plane
//! - steady input builds confidence and converges the offset; motion decays it
//! - configuration round-trips through TOML and rejects invalid values

use glam::{Quat, Vec3};
use motionpad::accumulator::GyroAccumulator;
use motionpad::calibration::CalibrationStore;
use motionpad::config::{CalibrationSettings, Config};
use motionpad::engine::MotionEngine;
use motionpad::gyro_space::{GyroTransformer, MotionFrame, WORLD_DOWN};
use motionpad::motion::MotionEstimator;
use motionpad::{Button, CalibrationOffset, Error, GyroSpace, ImuSample, BUTTON_COUNT};
use proptest::prelude::*;

const DT: f32 = 1.0 / 250.0;

fn any_space() -> impl Strategy<Value = GyroSpace> {
    prop_oneof![
        Just(GyroSpace::Local),
        Just(GyroSpace::World),
        Just(GyroSpace::Player),
    ]
}

fn any_vec(range: f32) -> impl Strategy<Value = Vec3> {
    (-range..range, -range..range, -range..range).prop_map(|(x, y, z)| Vec3::new(x, y, z))
}

/// Unit quaternion from a scaled-axis rotation of up to ~pi.
fn any_orientation() -> impl Strategy<Value = Quat> {
    any_vec(3.1).prop_map(Quat::from_scaled_axis)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_zero_gyro_is_zero_in_every_space(
        space in any_space(),
        orientation in any_orientation(),
        relax in 1.0f32..3.0,
    ) {
        let frame = MotionFrame {
            orientation,
            gravity: orientation.inverse() * WORLD_DOWN,
        };
        let out = GyroTransformer::new(relax).transform(space, Vec3::ZERO, &frame);
        prop_assert_eq!(out, Vec3::ZERO);
    }

    #[test]
    fn prop_zero_gyro_through_engine(
        space in any_space(),
        accel in any_vec(2.0),
        steps in 1usize..20,
    ) {
        let mut engine = MotionEngine::default();
        engine.set_gyro_space(space);
        let sample = ImuSample { accel: accel.to_array(), gyro: [0.0; 3], delta_time: DT };
        for _ in 0..steps {
            let (imu, _) = engine.process(&sample, DT);
            prop_assert_eq!(imu.gyro(), [0.0, 0.0, 0.0]);
        }
        prop_assert_eq!(engine.flush_accumulated(), Vec3::ZERO);
    }

    #[test]
    fn prop_flush_of_identical_samples_is_the_sample(
        v in any_vec(2000.0),
        n in 1u32..2000,
    ) {
        let mut acc = GyroAccumulator::new();
        for _ in 0..n {
            acc.add(v);
        }
        prop_assert_eq!(acc.count(), n);
        prop_assert_eq!(acc.flush(), v);
        prop_assert_eq!(acc.flush(), Vec3::ZERO);
    }

    #[test]
    fn prop_offset_reads_back_exactly(
        x in -1.0e4f32..1.0e4,
        y in -1.0e4f32..1.0e4,
        z in -1.0e4f32..1.0e4,
    ) {
        let mut store = CalibrationStore::default();
        let offset = CalibrationOffset::new(x, y, z);
        store.set_offset(offset);
        prop_assert_eq!(store.offset(), offset);
    }

    #[test]
    fn prop_player_equals_world_at_reference(
        pitch in -2000.0f32..2000.0,
        yaw in -2000.0f32..2000.0,
        relax in 1.0f32..3.0,
    ) {
        let t = GyroTransformer::new(relax);
        let frame = MotionFrame::default();
        let g = Vec3::new(pitch, yaw, 0.0);
        let world = t.transform(GyroSpace::World, g, &frame);
        let player = t.transform(GyroSpace::Player, g, &frame);
        prop_assert!((world - player).length() <= 1.0e-6 * (1.0 + g.length()),
            "world {world:?} != player {player:?}");
        prop_assert!((world - g).length() <= 1.0e-6 * (1.0 + g.length()));
    }

    #[test]
    fn prop_unit_relax_player_equals_world_at_reference(g in any_vec(2000.0)) {
        let t = GyroTransformer::new(1.0);
        let frame = MotionFrame::default();
        let world = t.transform(GyroSpace::World, g, &frame);
        let player = t.transform(GyroSpace::Player, g, &frame);
        prop_assert!((world.y - player.y).abs() <= 1.0e-6 * (1.0 + g.length()),
            "world {world:?} != player {player:?}");
        prop_assert_eq!(player.x, g.x);
        prop_assert_eq!(player.z, g.z);
    }

    #[test]
    fn prop_player_yaw_is_capped_by_local_yaw_plane(
        g in any_vec(2000.0),
        gravity in any_vec(1.0),
        relax in 1.0f32..3.0,
    ) {
        prop_assume!(gravity.length() > 0.1);
        let frame = MotionFrame { orientation: Quat::IDENTITY, gravity };
        let player = GyroTransformer::new(relax).transform(GyroSpace::Player, g, &frame);
        let cap = g.y.hypot(g.z);
        prop_assert!(player.y.abs() <= cap * (1.0 + 1.0e-6), "{player:?} cap {cap}");
        let up = -gravity.normalize();
        let projected = g.y * up.y + g.z * up.z;
        if projected.abs() > 1.0e-3 {
            prop_assert_eq!(player.y.signum(), projected.signum());
        }
        prop_assert_eq!(player.x, g.x);
    }

    #[test]
    fn prop_first_accel_sample_sets_gravity(accel in any_vec(2.0)) {
        prop_assume!(accel.length() > 0.1);
        let mut estimator = MotionEstimator::default();
        estimator.update(Vec3::ZERO, accel, DT);
        let expected = -accel.normalize();
        prop_assert!((estimator.gravity() - expected).length() < 1.0e-3,
            "gravity {:?} expected {expected:?}", estimator.gravity());
    }

    #[test]
    fn prop_steady_input_converges_offset(bias in any_vec(5.0)) {
        let mut store = CalibrationStore::new(CalibrationSettings::default());
        store.set_auto_enabled(true);
        let accel = Vec3::new(0.0, 1.0, 0.0);
        for _ in 0..1000 {
            store.observe(bias, accel, DT);
        }
        let status = store.status();
        prop_assert!(status.is_steady);
        prop_assert_eq!(status.confidence, 1.0);
        let offset: Vec3 = store.offset().into();
        prop_assert!((offset - bias).length() < 1.0e-2, "offset {offset:?} bias {bias:?}");
        prop_assert!(store.apply(bias).length() < 1.0e-2);

        for i in 0..250 {
            let wobble = if i % 2 == 0 { 50.0 } else { -50.0 };
            store.observe(bias + Vec3::splat(wobble), accel, DT);
        }
        let status = store.status();
        prop_assert!(!status.is_steady);
        prop_assert!(status.confidence < 1.0);
    }

    #[test]
    fn prop_config_round_trips_through_toml(
        relax in 1.0f32..4.0,
        rate in 0.0f32..10.0,
        window in 2usize..512,
        auto_save: bool,
        space in any_space(),
    ) {
        let mut config = Config::default();
        config.motion.player_space_relax = relax;
        config.motion.gravity_correction_rate = rate;
        config.motion.default_gyro_space = space;
        config.calibration.stillness_window = window;
        config.storage.calibration_file = Some("calibration.json".into());
        config.storage.auto_save = auto_save;

        let text = config.to_toml_string().map_err(|e| TestCaseError::fail(e.to_string()))?;
        let back = Config::from_toml_str(&text).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(back, config);
    }

    #[test]
    fn prop_config_rejects_relax_below_one(relax in -2.0f32..0.999) {
        let text = format!("[motion]\nplayer_space_relax = {relax}\n");
        prop_assert!(matches!(Config::from_toml_str(&text), Err(Error::Config(_))));
    }
}

#[test]
fn every_offset_decodes_to_one_button() {
    for offset in 0..32u8 {
        let button = Button::from_offset(offset);
        if usize::from(offset) < BUTTON_COUNT {
            let button = button.unwrap();
            assert_eq!(button.offset(), offset);
            assert_eq!(button.mask(), 1 << offset);
            let matches = Button::ALL.iter().filter(|b| b.mask() & (1 << offset) != 0).count();
            assert_eq!(matches, 1);
        } else {
            assert_eq!(button, None);
        }
    }
}
