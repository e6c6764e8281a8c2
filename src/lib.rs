//! # motionpad
//!
//! Controller input with motion: polled button/stick/trigger/touch state,
//! calibrated gyro in local, world or player space, orientation and gravity
//! estimation, and callbacks for input events.
//!
//! ```no_run
//! use motionpad::{GyroSpace, Manager};
//!
//! let manager = Manager::new();
//! manager.connect_devices();
//! for handle in manager.device_handles() {
//!     manager.set_gyro_space(handle, GyroSpace::Player);
//! }
//! loop {
//!     manager.poll();
//!     for handle in manager.device_handles() {
//!         let [x, y, _] = manager.get_and_flush_accumulated_gyro(handle);
//!         println!("{handle}: {x:.2} {y:.2}");
//!     }
//!     std::thread::sleep(std::time::Duration::from_millis(4));
//! }
//! ```
//!
//! Vendor report decoding is pluggable: register a
//! [`ReportParser`](device::ReportParser) per [`ControllerType`] before
//! calling [`Manager::connect_devices`], or attach your own
//! [`Device`](device::Device) implementations directly.

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod accumulator;
pub mod backends;
pub mod buttons;
pub mod calibration;
pub mod callbacks;
pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod event;
pub mod gyro_space;
pub mod logger;
pub mod manager;
pub mod metadata;
pub mod motion;
pub mod persistence;
pub mod snapshot;
pub mod state;

pub use buttons::{Button, ButtonMask, BUTTON_COUNT, BUTTON_MASK_ALL};
pub use calibration::CalibrationMode;
pub use config::Config;
pub use device::{
    dualsense_player_leds, Device, DeviceError, DeviceHandle, ParseCtx, ParserRegistry,
    ReportParser,
};
pub use error::{Error, Result};
pub use event::{ImuSample, InputReport, StateEvent, TouchEvent};
pub use gyro_space::GyroSpace;
pub use logger::Logger;
pub use manager::Manager;
pub use metadata::{DeviceCaps, DeviceMeta};
pub use snapshot::{DeviceSnapshot, Snapshot};
pub use state::{
    AutoCalibrationStatus, CalibrationOffset, ControllerInfo, ControllerType, ImuState,
    MotionState, SimpleState, SplitType, TouchPoint, TouchState,
};
