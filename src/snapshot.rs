//! Per-device state and owned snapshots of it.
//!
//! [`DeviceSnapshot`] is what the manager keeps for every connected device:
//! the current and previous input structs plus the derived motion state.
//! Reports replace it wholesale under a write lock, so a reader never sees a
//! half-applied report.
//!
//! [`Snapshot`] is an **owned**, read-only copy of every device's state at a
//! point in time, produced by [`Manager::snapshot`](crate::manager::Manager::snapshot).
//! It is cheap to clone for fan-out to several consumers.
//!
//! # Semantics
//! - Keys are [`DeviceHandle`]s, iterated in handle order.
//! - A snapshot is **immutable** and does not poll; it reflects the
//!   manager's last-known state.
//!
//! # Examples
//! ```no_run
//! use motionpad::{Button, Snapshot};
//!
//! fn print_sticks(snap: &Snapshot) {
//!     for (handle, dev) in snap.iter() {
//!         println!(
//!             "{handle}: L=({:.2}, {:.2}) south={}",
//!             dev.simple.stick_lx,
//!             dev.simple.stick_ly,
//!             dev.simple.pressed(Button::S),
//!         );
//!     }
//! }
//! ```

use crate::device::DeviceHandle;
use crate::event::InputReport;
use crate::state::{ImuState, MotionState, SimpleState, TouchState};
use std::collections::BTreeMap;
use std::time::Instant;

/// Current and previous state of one device.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DeviceSnapshot {
    pub simple: SimpleState,
    pub prev_simple: SimpleState,
    pub imu: ImuState,
    pub prev_imu: ImuState,
    pub motion: MotionState,
    pub touch: TouchState,
    /// Equals `touch` when the latest report carried no touch data.
    pub prev_touch: TouchState,
    /// When the latest report was applied; `None` before the first one.
    pub last_update: Option<Instant>,
}

impl DeviceSnapshot {
    /// Roll current into previous and take the new values.
    ///
    /// `imu` is `None` when the report carried no IMU sample; the IMU state
    /// then holds its last value.
    pub(crate) fn apply(
        &mut self,
        report: &InputReport,
        imu: Option<(ImuState, MotionState)>,
    ) {
        self.prev_simple = self.simple;
        self.simple = report.simple;

        self.prev_imu = self.imu;
        if let Some((imu, motion)) = imu {
            self.imu = imu;
            self.motion = motion;
        }

        match report.touch {
            Some(touch) => {
                self.prev_touch = self.touch;
                self.touch = touch;
            }
            None => self.prev_touch = self.touch,
        }

        self.last_update = Some(report.at);
    }

    pub fn touch(&self, previous: bool) -> TouchState {
        if previous {
            self.prev_touch
        } else {
            self.touch
        }
    }
}

/// Owned snapshot of all connected devices (`handle → state`).
#[derive(Clone, Debug, Default)]
pub struct Snapshot(pub BTreeMap<DeviceHandle, DeviceSnapshot>);

impl Snapshot {
    /// State for a specific device.
    #[inline]
    pub fn get(&self, handle: DeviceHandle) -> Option<&DeviceSnapshot> {
        self.0.get(&handle)
    }

    /// Iterate `(handle, state)` pairs in handle order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&DeviceHandle, &DeviceSnapshot)> {
        self.0.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consume the snapshot and return the inner map.
    #[inline]
    pub fn into_inner(self) -> BTreeMap<DeviceHandle, DeviceSnapshot> {
        self.0
    }
}
