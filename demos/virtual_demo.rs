//! Drive a virtual DualSense from a second thread and watch the motion
//! pipeline respond: a held-still controller with gyro bias gets calibrated,
//! then a yaw turn shows up in player space.

use motionpad::backends::virtual_input::VirtualDevice;
use motionpad::{
    Button, ButtonMask, ControllerType, GyroSpace, ImuSample, InputReport, Manager, SimpleState,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const DT: f32 = 1.0 / 250.0;
const BIAS: [f32; 3] = [0.8, -0.3, 0.5];

fn main() {
    tracing_subscriber::fmt::init();

    let manager = Arc::new(Manager::new());
    manager.set_connect_callback(|handle| println!("(Virtual) connected {handle}"));
    manager.set_disconnect_callback(|handle, timed_out| {
        println!("(Virtual) disconnected {handle} timed_out={timed_out}")
    });

    let (device, pad) = VirtualDevice::controller("demo", ControllerType::DualSense);
    let handle = manager.attach(device);
    manager.set_gyro_space(handle, GyroSpace::Player);
    manager.set_automatic_calibration(handle, true);

    let feeder = thread::spawn(move || {
        // Two seconds still, then one second turning at 90 deg/s.
        for i in 0..750 {
            let yaw = if i >= 500 { 90.0 } else { 0.0 };
            let buttons = if i >= 500 {
                ButtonMask::from(Button::R)
            } else {
                ButtonMask::EMPTY
            };
            let sample = ImuSample {
                accel: [0.0, 1.0, 0.0],
                gyro: [BIAS[0], BIAS[1] + yaw, BIAS[2]],
                delta_time: DT,
            };
            pad.push(
                InputReport::new(SimpleState {
                    buttons,
                    ..SimpleState::default()
                })
                .with_imu(sample),
            );
            thread::sleep(Duration::from_secs_f32(DT));
        }
        pad.unplug();
    });

    while manager.still_connected(handle) {
        manager.poll();
        let [x, y, z] = manager.get_and_flush_accumulated_gyro(handle);
        let offset = manager.calibration_offset(handle);
        let status = manager.auto_calibration_status(handle);
        println!(
            "gyro=({x:+6.2},{y:+6.2},{z:+6.2}) offset=({:+.2},{:+.2},{:+.2}) steady={} conf={:.2} R={}",
            offset.x,
            offset.y,
            offset.z,
            status.is_steady,
            status.confidence,
            manager.simple_state(handle).pressed(Button::R),
        );
        thread::sleep(Duration::from_millis(50));
    }

    if feeder.join().is_err() {
        eprintln!("feeder thread panicked");
    }
}
