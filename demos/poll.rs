//! Discover HID controllers and print their state.
//!
//! Registers a minimal DualShock 4 (USB) parser to show how the parser seam
//! is used, then polls at ~250 Hz and prints buttons, sticks and the mean
//! player-space gyro every 100 ms.
//!
//! Usage: `cargo run --example poll [config.toml]`

use motionpad::{
    Button, ButtonMask, Config, ControllerType, DeviceMeta, GyroSpace, ImuSample, InputReport,
    Logger, Manager, ParseCtx, ReportParser, SimpleState,
};
use std::time::{Duration, Instant};

/// DualShock 4 USB input report `0x01`. Rough scaling, no factory calibration.
struct Ds4UsbParser;

const DS4_GYRO_DPS_PER_LSB: f32 = 2000.0 / 32767.0;
const DS4_ACCEL_G_PER_LSB: f32 = 1.0 / 8192.0;

fn stick(raw: u8) -> f32 {
    ((raw as f32 - 128.0) / 127.0).clamp(-1.0, 1.0)
}

fn i16_at(buf: &[u8], at: usize) -> f32 {
    i16::from_le_bytes([buf[at], buf[at + 1]]) as f32
}

impl ReportParser for Ds4UsbParser {
    fn input_report_len(&self) -> Option<usize> {
        Some(64)
    }

    fn parse(&mut self, ctx: &ParseCtx<'_>, p: &[u8]) -> Option<InputReport> {
        if ctx.report_id != 0x01 || p.len() < 24 {
            return None;
        }

        let mut buttons = ButtonMask::EMPTY;
        let dpad = p[4] & 0x0F;
        for (dirs, button) in [
            ([7, 0, 1], Button::Up),
            ([1, 2, 3], Button::Right),
            ([3, 4, 5], Button::Down),
            ([5, 6, 7], Button::Left),
        ] {
            if dirs.contains(&dpad) {
                buttons = buttons.with(button);
            }
        }
        let bits = [
            (p[4], 0x10, Button::W),
            (p[4], 0x20, Button::S),
            (p[4], 0x40, Button::E),
            (p[4], 0x80, Button::N),
            (p[5], 0x01, Button::L),
            (p[5], 0x02, Button::R),
            (p[5], 0x04, Button::ZL),
            (p[5], 0x08, Button::ZR),
            (p[5], 0x10, Button::SHARE),
            (p[5], 0x20, Button::OPTIONS),
            (p[5], 0x40, Button::LClick),
            (p[5], 0x80, Button::RClick),
            (p[6], 0x01, Button::PS),
            (p[6], 0x02, Button::TOUCHPAD_CLICK),
        ];
        for (byte, mask, button) in bits {
            if byte & mask != 0 {
                buttons = buttons.with(button);
            }
        }

        let simple = SimpleState {
            buttons,
            l_trigger: p[7] as f32 / 255.0,
            r_trigger: p[8] as f32 / 255.0,
            stick_lx: stick(p[0]),
            stick_ly: -stick(p[1]),
            stick_rx: stick(p[2]),
            stick_ry: -stick(p[3]),
        };
        let sample = ImuSample {
            gyro: [
                i16_at(p, 12) * DS4_GYRO_DPS_PER_LSB,
                i16_at(p, 14) * DS4_GYRO_DPS_PER_LSB,
                i16_at(p, 16) * DS4_GYRO_DPS_PER_LSB,
            ],
            accel: [
                i16_at(p, 18) * DS4_ACCEL_G_PER_LSB,
                i16_at(p, 20) * DS4_ACCEL_G_PER_LSB,
                i16_at(p, 22) * DS4_ACCEL_G_PER_LSB,
            ],
            delta_time: 0.0,
        };
        Some(InputReport::new(simple).at(ctx.now).with_imu(sample))
    }
}

fn main() -> motionpad::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let manager = Manager::with_config(config)?;
    manager.register_parser(ControllerType::DualShock4, |_: &DeviceMeta| {
        Box::new(Ds4UsbParser) as Box<dyn ReportParser>
    });
    Logger::new().install(&manager);

    let count = manager.connect_devices();
    println!("Connected {count} controller(s)");
    for handle in manager.device_handles() {
        manager.set_gyro_space(handle, GyroSpace::Player);
        manager.set_automatic_calibration(handle, true);
    }

    let mut last_print = Instant::now();
    while !manager.device_handles().is_empty() {
        manager.poll();

        if last_print.elapsed() >= Duration::from_millis(100) {
            for handle in manager.device_handles() {
                let s = manager.simple_state(handle);
                let [gx, gy, gz] = manager.get_and_flush_accumulated_gyro(handle);
                let status = manager.auto_calibration_status(handle);
                let pressed: Vec<&str> = s.buttons.iter().map(Button::name).collect();
                println!(
                    "{handle}: L=({:+.2},{:+.2}) R=({:+.2},{:+.2}) gyro=({gx:+7.2},{gy:+7.2},{gz:+7.2}) conf={:.2} [{}]",
                    s.stick_lx,
                    s.stick_ly,
                    s.stick_rx,
                    s.stick_ry,
                    status.confidence,
                    pressed.join(" "),
                );
            }
            last_print = Instant::now();
        }

        std::thread::sleep(Duration::from_millis(4));
    }
    println!("No controllers left");
    Ok(())
}
