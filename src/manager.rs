//! Device manager: the device table, input pumping, polled accessors,
//! calibration controls and callback dispatch.
//!
//! ## Handles
//! Every attached device gets a [`DeviceHandle`] from an increasing counter
//! starting at 1. Handles are never reused, so a handle kept past its
//! device's disconnect simply reads as default state.
//!
//! ## Pumping
//! The manager does not spawn threads. Call [`Manager::poll`] from your own
//! loop (or push already decoded reports with [`Manager::push_report`]).
//! Each report is applied to the device's state under a write lock; state
//! and touch callbacks run after that lock is released, on the polling
//! thread.
//!
//! ## Stale handles
//! Accessors never fail. An unknown or disconnected handle reads as zeroed
//! state, `false`, `None`, or the documented default.

use crate::backends::Backends;
use crate::calibration::CalibrationMode;
use crate::callbacks::Callbacks;
use crate::config::Config;
use crate::device::{Device, DeviceError, DeviceHandle, ParserRegistry, ReportParser};
use crate::engine::MotionEngine;
use crate::error::{Error, Result};
use crate::event::{InputReport, StateEvent, TouchEvent};
use crate::gyro_space::GyroSpace;
use crate::metadata::{DeviceCaps, DeviceMeta, COLOUR_WHITE};
use crate::persistence::CalibrationFile;
use crate::snapshot::{DeviceSnapshot, Snapshot};
use crate::state::{
    AutoCalibrationStatus, CalibrationOffset, ControllerInfo, ControllerType, ImuState,
    MotionState, SimpleState, SplitType, TouchState,
};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Mutable per-device state, replaced under one write lock per report.
struct SlotState {
    snapshot: DeviceSnapshot,
    engine: MotionEngine,
    light_colour: i32,
    player_number: i32,
}

struct DeviceSlot {
    handle: DeviceHandle,
    id: String,
    name: String,
    meta: DeviceMeta,
    caps: DeviceCaps,
    live: AtomicBool,
    transport: Mutex<Box<dyn Device>>,
    state: RwLock<SlotState>,
}

impl DeviceSlot {
    fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }
}

/// Owns all connected devices.
///
/// `Manager` is `Send + Sync` and every method takes `&self`, so it can be
/// shared behind an `Arc` between a polling thread and readers.
pub struct Manager {
    config: Config,
    parsers: ParserRegistry,
    backends: Mutex<Backends>,
    devices: RwLock<BTreeMap<DeviceHandle, Arc<DeviceSlot>>>,
    next_handle: AtomicI32,
    callbacks: Callbacks,
    calibration_file: Mutex<Option<CalibrationFile>>,
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("devices", &self.device_handles())
            .field("parsers", &self.parsers)
            .field("callbacks", &self.callbacks)
            .finish()
    }
}

impl Manager {
    /// A manager with default settings and no calibration persistence.
    pub fn new() -> Self {
        Self::build(Config::default(), None)
    }

    /// A manager using `config`. Validates it and loads the calibration
    /// file when one is configured.
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate()?;
        let file = match &config.storage.calibration_file {
            Some(path) => Some(CalibrationFile::load(path)?),
            None => None,
        };
        Ok(Self::build(config, file))
    }

    fn build(config: Config, file: Option<CalibrationFile>) -> Self {
        Self {
            config,
            parsers: ParserRegistry::new(),
            backends: Mutex::new(Backends::new()),
            devices: RwLock::new(BTreeMap::new()),
            next_handle: AtomicI32::new(1),
            callbacks: Callbacks::default(),
            calibration_file: Mutex::new(file),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn parsers(&self) -> &ParserRegistry {
        &self.parsers
    }

    /// Register the parser used for a controller family found by discovery.
    pub fn register_parser<F>(&self, controller_type: ControllerType, factory: F)
    where
        F: Fn(&DeviceMeta) -> Box<dyn ReportParser> + Send + Sync + 'static,
    {
        self.parsers.register(controller_type, factory);
    }

    /// Discover controllers through the enabled backends and attach any that
    /// are not attached yet. Returns the number of connected devices.
    pub fn connect_devices(&self) -> usize {
        let known: HashSet<String> = self
            .devices
            .read()
            .values()
            .map(|slot| slot.id.clone())
            .collect();

        let found = self.backends.lock().probe(&self.config, &self.parsers, &known);
        debug!(found = found.len(), "discovery finished");
        for device in found {
            self.attach_boxed(device);
        }
        self.devices.read().len()
    }

    /// Attach a device and start tracking it. Fires the connect callback.
    pub fn attach(&self, device: impl Device + 'static) -> DeviceHandle {
        self.attach_boxed(Box::new(device))
    }

    pub fn attach_boxed(&self, device: Box<dyn Device>) -> DeviceHandle {
        let handle = DeviceHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let meta = device.metadata();
        let caps = device.capabilities();

        let mut engine = MotionEngine::new(&self.config.motion, self.config.calibration.clone());
        if let Some(key) = meta.calibration_key() {
            if let Some(stored) = self
                .calibration_file
                .lock()
                .as_ref()
                .and_then(|file| file.get(&key))
            {
                debug!(%handle, device = %key, "restored calibration offsets");
                engine
                    .calibration_mut()
                    .restore(stored.offset(), stored.sample_weight());
            }
        }

        let slot = Arc::new(DeviceSlot {
            handle,
            id: device.id().to_string(),
            name: device.name().to_string(),
            state: RwLock::new(SlotState {
                snapshot: DeviceSnapshot::default(),
                engine,
                light_colour: caps.body_colour,
                player_number: 0,
            }),
            meta,
            caps,
            live: AtomicBool::new(true),
            transport: Mutex::new(device),
        });

        info!(
            %handle,
            name = %slot.name,
            id = %slot.id,
            kind = ?slot.meta.controller_type,
            "device connected"
        );
        self.devices.write().insert(handle, slot);
        self.callbacks.emit_connect(handle);
        handle
    }

    /// Handles of all connected devices, in handle order.
    pub fn device_handles(&self) -> Vec<DeviceHandle> {
        self.devices.read().keys().copied().collect()
    }

    /// Fill `out` with connected handles; returns how many were written.
    pub fn connected_device_handles(&self, out: &mut [DeviceHandle]) -> usize {
        let devices = self.devices.read();
        let mut written = 0;
        for (dst, handle) in out.iter_mut().zip(devices.keys()) {
            *dst = *handle;
            written += 1;
        }
        written
    }

    pub fn still_connected(&self, handle: DeviceHandle) -> bool {
        self.slot(handle).is_some()
    }

    /// Disconnect one device on request. Returns `false` for unknown handles.
    pub fn disconnect(&self, handle: DeviceHandle) -> bool {
        self.disconnect_slot(handle, false)
    }

    /// Disconnect every device.
    pub fn disconnect_and_dispose_all(&self) {
        let slots: Vec<Arc<DeviceSlot>> = {
            let mut devices = self.devices.write();
            std::mem::take(&mut *devices).into_values().collect()
        };
        for slot in slots {
            self.retire(&slot, false);
        }
    }

    fn disconnect_slot(&self, handle: DeviceHandle, timed_out: bool) -> bool {
        let removed = self.devices.write().remove(&handle);
        match removed {
            Some(slot) => {
                self.retire(&slot, timed_out);
                true
            }
            None => false,
        }
    }

    /// Tombstone a slot that has already left the table.
    fn retire(&self, slot: &DeviceSlot, timed_out: bool) {
        if !slot.live.swap(false, Ordering::AcqRel) {
            return;
        }
        if self.config.storage.auto_save {
            if let Err(e) = self.store_slot_calibration(slot) {
                warn!(handle = %slot.handle, error = %e, "failed to store calibration");
            }
        }
        info!(handle = %slot.handle, name = %slot.name, timed_out, "device disconnected");
        self.callbacks.emit_disconnect(slot.handle, timed_out);
    }

    fn slot(&self, handle: DeviceHandle) -> Option<Arc<DeviceSlot>> {
        self.devices.read().get(&handle).cloned()
    }

    fn slots(&self) -> Vec<Arc<DeviceSlot>> {
        self.devices.read().values().cloned().collect()
    }

    /// Drain pending reports from every device and apply them. Devices whose
    /// transport reports a disconnect are torn down with `timed_out = true`.
    /// Returns the number of reports applied.
    pub fn poll(&self) -> usize {
        let mut applied = 0;
        for slot in self.slots() {
            let result = slot.transport.lock().poll();
            match result {
                Ok(reports) => {
                    for report in reports {
                        if self.apply_report(&slot, report) {
                            applied += 1;
                        }
                    }
                }
                Err(DeviceError::Disconnected) => {
                    self.disconnect_slot(slot.handle, true);
                }
                Err(e) => {
                    warn!(handle = %slot.handle, error = %e, "device poll failed");
                }
            }
        }
        applied
    }

    /// Apply a report decoded elsewhere. Returns `false` for unknown handles.
    pub fn push_report(&self, handle: DeviceHandle, report: InputReport) -> bool {
        match self.slot(handle) {
            Some(slot) => self.apply_report(&slot, report),
            None => false,
        }
    }

    fn apply_report(&self, slot: &DeviceSlot, report: InputReport) -> bool {
        if !slot.is_live() {
            return false;
        }

        let (state_event, touch_event) = {
            let mut st = slot.state.write();
            let report_dt = st
                .snapshot
                .last_update
                .map(|last| report.at.saturating_duration_since(last).as_secs_f32())
                .filter(|dt| *dt > 0.0)
                .unwrap_or_else(|| self.nominal_interval(&slot.caps));

            let sample_dt = report_dt / report.imu.len().max(1) as f32;
            let mut latest = None;
            // Devices without an IMU keep zeroed IMU and motion state.
            let samples = if slot.caps.has_imu { report.imu.as_slice() } else { &[][..] };
            for sample in samples {
                let dt = if sample.delta_time > 0.0 {
                    sample.delta_time
                } else {
                    sample_dt
                };
                latest = Some(st.engine.process(sample, dt));
            }
            st.snapshot.apply(&report, latest);

            let snap = &st.snapshot;
            let state_event = StateEvent {
                handle: slot.handle,
                state: snap.simple,
                last_state: snap.prev_simple,
                imu: snap.imu,
                last_imu: snap.prev_imu,
                delta_time: report_dt,
            };
            let touch_event = slot.caps.touchpad.map(|_| TouchEvent {
                handle: slot.handle,
                touch: snap.touch,
                last_touch: snap.prev_touch,
                delta_time: report_dt,
            });
            (state_event, touch_event)
        };

        self.callbacks.emit_state(&state_event);
        if let Some(event) = touch_event {
            self.callbacks.emit_touch(&event);
        }
        true
    }

    fn nominal_interval(&self, caps: &DeviceCaps) -> f32 {
        let rate = if caps.poll_rate > 0.0 {
            caps.poll_rate
        } else {
            self.config.motion.fallback_poll_rate
        };
        1.0 / rate
    }

    fn read<T: Default>(
        &self,
        handle: DeviceHandle,
        f: impl FnOnce(&DeviceSlot, &SlotState) -> T,
    ) -> T {
        match self.slot(handle) {
            Some(slot) => {
                let st = slot.state.read();
                f(&slot, &st)
            }
            None => T::default(),
        }
    }

    fn write<T: Default>(
        &self,
        handle: DeviceHandle,
        f: impl FnOnce(&DeviceSlot, &mut SlotState) -> T,
    ) -> T {
        match self.slot(handle) {
            Some(slot) => {
                let mut st = slot.state.write();
                f(&slot, &mut st)
            }
            None => T::default(),
        }
    }

    /// Owned copy of every connected device's state.
    pub fn snapshot(&self) -> Snapshot {
        let map = self
            .slots()
            .into_iter()
            .map(|slot| {
                let snap = slot.state.read().snapshot;
                (slot.handle, snap)
            })
            .collect();
        Snapshot(map)
    }

    pub fn simple_state(&self, handle: DeviceHandle) -> SimpleState {
        self.read(handle, |_, st| st.snapshot.simple)
    }

    pub fn imu_state(&self, handle: DeviceHandle) -> ImuState {
        self.read(handle, |_, st| st.snapshot.imu)
    }

    pub fn motion_state(&self, handle: DeviceHandle) -> MotionState {
        self.read(handle, |_, st| st.snapshot.motion)
    }

    /// Current touch state, or the one before the latest report.
    pub fn touch_state(&self, handle: DeviceHandle, previous: bool) -> TouchState {
        self.read(handle, |_, st| st.snapshot.touch(previous))
    }

    /// Touchpad size in device units, if the device has one.
    pub fn touchpad_dimension(&self, handle: DeviceHandle) -> Option<(i32, i32)> {
        self.read(handle, |slot, _| slot.caps.touchpad)
    }

    /// Raw 20-bit button mask.
    pub fn buttons(&self, handle: DeviceHandle) -> u32 {
        self.simple_state(handle).buttons.bits()
    }

    pub fn left_x(&self, handle: DeviceHandle) -> f32 {
        self.simple_state(handle).stick_lx
    }

    pub fn left_y(&self, handle: DeviceHandle) -> f32 {
        self.simple_state(handle).stick_ly
    }

    pub fn right_x(&self, handle: DeviceHandle) -> f32 {
        self.simple_state(handle).stick_rx
    }

    pub fn right_y(&self, handle: DeviceHandle) -> f32 {
        self.simple_state(handle).stick_ry
    }

    pub fn left_trigger(&self, handle: DeviceHandle) -> f32 {
        self.simple_state(handle).l_trigger
    }

    pub fn right_trigger(&self, handle: DeviceHandle) -> f32 {
        self.simple_state(handle).r_trigger
    }

    pub fn gyro_x(&self, handle: DeviceHandle) -> f32 {
        self.imu_state(handle).gyro_x
    }

    pub fn gyro_y(&self, handle: DeviceHandle) -> f32 {
        self.imu_state(handle).gyro_y
    }

    pub fn gyro_z(&self, handle: DeviceHandle) -> f32 {
        self.imu_state(handle).gyro_z
    }

    pub fn accel_x(&self, handle: DeviceHandle) -> f32 {
        self.imu_state(handle).accel_x
    }

    pub fn accel_y(&self, handle: DeviceHandle) -> f32 {
        self.imu_state(handle).accel_y
    }

    pub fn accel_z(&self, handle: DeviceHandle) -> f32 {
        self.imu_state(handle).accel_z
    }

    pub fn touch_id(&self, handle: DeviceHandle, second: bool) -> i32 {
        self.touch_state(handle, false).point(second).id
    }

    pub fn touch_down(&self, handle: DeviceHandle, second: bool) -> bool {
        self.touch_state(handle, false).point(second).down
    }

    pub fn touch_x(&self, handle: DeviceHandle, second: bool) -> f32 {
        self.touch_state(handle, false).point(second).x
    }

    pub fn touch_y(&self, handle: DeviceHandle, second: bool) -> f32 {
        self.touch_state(handle, false).point(second).y
    }

    /// Mean space-transformed gyro since the previous flush, then reset.
    /// Zero when nothing was accumulated.
    pub fn get_and_flush_accumulated_gyro(&self, handle: DeviceHandle) -> [f32; 3] {
        self.write(handle, |_, st| st.engine.flush_accumulated().to_array())
    }

    pub fn stick_step(&self, handle: DeviceHandle) -> f32 {
        self.read(handle, |slot, _| slot.caps.stick_step)
    }

    pub fn trigger_step(&self, handle: DeviceHandle) -> f32 {
        self.read(handle, |slot, _| slot.caps.trigger_step)
    }

    /// Nominal report rate (Hz).
    pub fn poll_rate(&self, handle: DeviceHandle) -> f32 {
        self.read(handle, |slot, _| slot.caps.poll_rate)
    }

    /// Seconds since the latest report was applied; `0.0` before the first
    /// report and for unknown handles.
    pub fn time_since_last_update(&self, handle: DeviceHandle) -> f32 {
        self.read(handle, |_, st| {
            st.snapshot
                .last_update
                .map(|t| t.elapsed().as_secs_f32())
                .unwrap_or(0.0)
        })
    }

    pub fn reset_continuous_calibration(&self, handle: DeviceHandle) {
        self.write(handle, |_, st| st.engine.calibration_mut().reset_continuous());
    }

    pub fn start_continuous_calibration(&self, handle: DeviceHandle) {
        self.write(handle, |slot, st| {
            debug!(handle = %slot.handle, "continuous calibration started");
            st.engine.calibration_mut().start_continuous();
        });
    }

    pub fn pause_continuous_calibration(&self, handle: DeviceHandle) {
        self.write(handle, |slot, st| {
            debug!(handle = %slot.handle, "continuous calibration paused");
            st.engine.calibration_mut().pause_continuous();
        });
    }

    pub fn set_automatic_calibration(&self, handle: DeviceHandle, enabled: bool) {
        self.write(handle, |_, st| st.engine.calibration_mut().set_auto_enabled(enabled));
    }

    /// [`CalibrationMode::Manual`] for unknown handles.
    pub fn calibration_mode(&self, handle: DeviceHandle) -> CalibrationMode {
        self.read(handle, |_, st| st.engine.calibration().mode())
    }

    pub fn set_calibration_mode(&self, handle: DeviceHandle, mode: CalibrationMode) {
        self.write(handle, |slot, st| {
            debug!(handle = %slot.handle, ?mode, "calibration mode set");
            st.engine.calibration_mut().set_mode(mode);
        });
    }

    pub fn calibration_offset(&self, handle: DeviceHandle) -> CalibrationOffset {
        self.read(handle, |_, st| st.engine.calibration().offset())
    }

    pub fn set_calibration_offset(&self, handle: DeviceHandle, offset: CalibrationOffset) {
        self.write(handle, |_, st| st.engine.calibration_mut().set_offset(offset));
    }

    pub fn auto_calibration_status(&self, handle: DeviceHandle) -> AutoCalibrationStatus {
        self.read(handle, |_, st| st.engine.calibration().status())
    }

    /// Forget the orientation estimate and any accumulated gyro.
    pub fn reset_motion(&self, handle: DeviceHandle) {
        self.write(handle, |_, st| st.engine.reset_motion());
    }

    /// Persist the device's current offsets to the calibration file.
    ///
    /// A no-op when no calibration file is configured or the device has no
    /// usable key.
    pub fn store_calibration(&self, handle: DeviceHandle) -> Result<()> {
        let slot = self.slot(handle).ok_or(Error::UnknownDevice(handle.0))?;
        self.store_slot_calibration(&slot)
    }

    fn store_slot_calibration(&self, slot: &DeviceSlot) -> Result<()> {
        let Some(key) = slot.meta.calibration_key() else {
            debug!(handle = %slot.handle, "device has no calibration key");
            return Ok(());
        };
        let (offset, weight) = {
            let st = slot.state.read();
            let calibration = st.engine.calibration();
            (calibration.offset(), calibration.weight())
        };
        match self.calibration_file.lock().as_mut() {
            Some(file) => file.update_offset(&key, offset, weight),
            None => Ok(()),
        }
    }

    pub fn set_gyro_space(&self, handle: DeviceHandle, space: GyroSpace) {
        self.write(handle, |_, st| st.engine.set_gyro_space(space));
    }

    /// `0` local, `1` world, `2` player. Other values are ignored.
    pub fn set_gyro_space_raw(&self, handle: DeviceHandle, raw: i32) {
        match GyroSpace::from_raw(raw) {
            Some(space) => self.set_gyro_space(handle, space),
            None => trace!(%handle, raw, "ignoring unknown gyro space"),
        }
    }

    /// Packed `0xRRGGBB` colour, or a palette index on devices with a fixed
    /// palette. Ignored by hardware without a light.
    pub fn set_light_colour(&self, handle: DeviceHandle, colour: i32) {
        let Some(slot) = self.slot(handle) else { return };
        slot.state.write().light_colour = colour;
        if !slot.caps.has_light {
            trace!(%handle, "device has no light; ignoring colour");
            return;
        }
        let result = slot.transport.lock().set_light_colour(colour);
        self.handle_output(&slot, result);
    }

    /// Motor intensities `0..=255`. Ignored by hardware without rumble.
    pub fn set_rumble(&self, handle: DeviceHandle, small: i32, big: i32) {
        let Some(slot) = self.slot(handle) else { return };
        if !slot.caps.has_rumble {
            trace!(%handle, "device has no rumble; ignoring");
            return;
        }
        let result = slot
            .transport
            .lock()
            .set_rumble(small.clamp(0, 255), big.clamp(0, 255));
        self.handle_output(&slot, result);
    }

    /// Player indicator. Ignored by hardware without player LEDs.
    pub fn set_player_number(&self, handle: DeviceHandle, number: i32) {
        let Some(slot) = self.slot(handle) else { return };
        slot.state.write().player_number = number;
        if !slot.caps.has_player_leds {
            trace!(%handle, "device has no player indicator; ignoring");
            return;
        }
        let result = slot.transport.lock().set_player_number(number);
        self.handle_output(&slot, result);
    }

    fn handle_output(&self, slot: &DeviceSlot, result: std::result::Result<(), DeviceError>) {
        match result {
            Ok(()) => {}
            Err(DeviceError::Unsupported(what)) => {
                trace!(handle = %slot.handle, what, "output not supported; ignoring");
            }
            Err(DeviceError::Disconnected) => {
                self.disconnect_slot(slot.handle, true);
            }
            Err(e) => warn!(handle = %slot.handle, error = %e, "output request failed"),
        }
    }

    pub fn controller_info(&self, handle: DeviceHandle) -> ControllerInfo {
        self.read(handle, |slot, st| {
            let calibration = st.engine.calibration();
            ControllerInfo {
                gyro_space: st.engine.gyro_space(),
                colour: st.light_colour,
                player_number: st.player_number,
                controller_type: slot.meta.controller_type,
                split_type: slot.meta.split_type,
                is_calibrating: calibration.is_calibrating(),
                auto_calibration_enabled: calibration.auto_enabled(),
                is_connected: slot.is_live(),
                path: slot.meta.path.clone().unwrap_or_default(),
            }
        })
    }

    pub fn controller_type(&self, handle: DeviceHandle) -> ControllerType {
        self.read(handle, |slot, _| slot.meta.controller_type)
    }

    pub fn controller_split_type(&self, handle: DeviceHandle) -> SplitType {
        self.read(handle, |slot, _| slot.meta.split_type)
    }

    /// Body colour as `0xRRGGBB`; white when unknown.
    pub fn controller_colour(&self, handle: DeviceHandle) -> i32 {
        self.slot(handle)
            .map(|slot| slot.caps.body_colour)
            .unwrap_or(COLOUR_WHITE)
    }

    pub fn device_name(&self, handle: DeviceHandle) -> Option<String> {
        self.slot(handle).map(|slot| slot.name.clone())
    }

    pub fn device_metadata(&self, handle: DeviceHandle) -> Option<DeviceMeta> {
        self.slot(handle).map(|slot| slot.meta.clone())
    }

    pub fn set_state_callback<F>(&self, callback: F)
    where
        F: Fn(&StateEvent) + Send + Sync + 'static,
    {
        self.callbacks.state.replace(Some(Arc::new(callback)));
    }

    pub fn clear_state_callback(&self) {
        self.callbacks.state.replace(None);
    }

    /// Called for every report from devices with a touchpad.
    pub fn set_touch_callback<F>(&self, callback: F)
    where
        F: Fn(&TouchEvent) + Send + Sync + 'static,
    {
        self.callbacks.touch.replace(Some(Arc::new(callback)));
    }

    pub fn clear_touch_callback(&self) {
        self.callbacks.touch.replace(None);
    }

    pub fn set_connect_callback<F>(&self, callback: F)
    where
        F: Fn(DeviceHandle) + Send + Sync + 'static,
    {
        self.callbacks.connect.replace(Some(Arc::new(callback)));
    }

    pub fn clear_connect_callback(&self) {
        self.callbacks.connect.replace(None);
    }

    /// `callback(handle, timed_out)`; `timed_out` is `true` when the
    /// transport was lost rather than disconnected on request.
    pub fn set_disconnect_callback<F>(&self, callback: F)
    where
        F: Fn(DeviceHandle, bool) + Send + Sync + 'static,
    {
        self.callbacks.disconnect.replace(Some(Arc::new(callback)));
    }

    pub fn clear_disconnect_callback(&self) {
        self.callbacks.disconnect.replace(None);
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        if self.config.storage.auto_save {
            self.disconnect_and_dispose_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::virtual_input::{OutputRequest, VirtualDevice};
    use crate::buttons::{Button, ButtonMask};
    use crate::event::ImuSample;
    use crate::state::TouchPoint;
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    const DT: f32 = 1.0 / 250.0;

    fn flat(gyro: [f32; 3]) -> ImuSample {
        ImuSample {
            accel: [0.0, 1.0, 0.0],
            gyro,
            delta_time: DT,
        }
    }

    fn pressed(button: Button) -> SimpleState {
        SimpleState {
            buttons: ButtonMask::from(button),
            ..SimpleState::default()
        }
    }

    #[test]
    fn handles_increase_and_are_not_reused() {
        let manager = Manager::new();
        let (a, _) = VirtualDevice::controller("a", ControllerType::DualShock4);
        let (b, _) = VirtualDevice::controller("b", ControllerType::DualSense);
        let ha = manager.attach(a);
        let hb = manager.attach(b);
        assert_eq!(ha, DeviceHandle(1));
        assert_eq!(hb, DeviceHandle(2));

        assert!(manager.disconnect(ha));
        let (c, _) = VirtualDevice::controller("c", ControllerType::ProController);
        let hc = manager.attach(c);
        assert_eq!(hc, DeviceHandle(3));
        assert_eq!(manager.device_handles(), vec![hb, hc]);

        let mut out = [DeviceHandle(0); 1];
        assert_eq!(manager.connected_device_handles(&mut out), 1);
        assert_eq!(out[0], hb);
    }

    #[test]
    fn poll_applies_reports_and_rolls_previous_state() {
        let manager = Manager::new();
        let (dev, pad) = VirtualDevice::controller("pad", ControllerType::DualShock4);
        let handle = manager.attach(dev);

        pad.push(InputReport::new(pressed(Button::S)));
        pad.push(InputReport::new(SimpleState {
            stick_lx: -0.5,
            r_trigger: 1.0,
            ..pressed(Button::E)
        }));
        assert_eq!(manager.poll(), 2);

        assert_eq!(manager.buttons(handle), Button::E.mask());
        assert_eq!(manager.left_x(handle), -0.5);
        assert_eq!(manager.right_trigger(handle), 1.0);
        let snap = manager.snapshot();
        let dev = snap.get(handle).unwrap();
        assert_eq!(dev.prev_simple.buttons, ButtonMask::from(Button::S));
        assert!(manager.time_since_last_update(handle) >= 0.0);
    }

    #[test]
    fn stale_handles_read_as_defaults() {
        let manager = Manager::new();
        let (dev, pad) = VirtualDevice::controller("pad", ControllerType::DualSense);
        let handle = manager.attach(dev);
        pad.push(InputReport::new(pressed(Button::N)).with_imu(flat([5.0, 0.0, 0.0])));
        manager.poll();
        assert_ne!(manager.buttons(handle), 0);

        assert!(manager.disconnect(handle));
        assert!(!manager.still_connected(handle));
        assert!(!manager.disconnect(handle));
        assert_eq!(manager.simple_state(handle), SimpleState::default());
        assert_eq!(manager.imu_state(handle), ImuState::default());
        assert_eq!(manager.get_and_flush_accumulated_gyro(handle), [0.0; 3]);
        assert_eq!(manager.touchpad_dimension(handle), None);
        assert_eq!(manager.controller_info(handle), ControllerInfo::default());
        assert_eq!(manager.controller_colour(handle), COLOUR_WHITE);
        assert!(!manager.push_report(handle, InputReport::new(SimpleState::default())));
        manager.set_rumble(handle, 10, 10);
        manager.set_gyro_space(handle, GyroSpace::World);
    }

    #[test]
    fn accumulated_gyro_is_the_mean_of_samples() {
        let manager = Manager::new();
        let (dev, pad) = VirtualDevice::controller("pad", ControllerType::DualShock4);
        let handle = manager.attach(dev);
        for _ in 0..5 {
            pad.push(InputReport::new(SimpleState::default()).with_imu(flat([3.0, -2.0, 1.5])));
        }
        manager.poll();
        assert_eq!(manager.get_and_flush_accumulated_gyro(handle), [3.0, -2.0, 1.5]);
        assert_eq!(manager.get_and_flush_accumulated_gyro(handle), [0.0; 3]);
        assert_eq!(manager.gyro_x(handle), 3.0);
        assert_eq!(manager.accel_y(handle), 1.0);
    }

    #[test]
    fn offset_applies_to_reported_gyro() {
        let manager = Manager::new();
        let (dev, pad) = VirtualDevice::controller("pad", ControllerType::DualSense);
        let handle = manager.attach(dev);
        let offset = CalibrationOffset::new(0.25, -0.5, 1.0);
        manager.set_calibration_offset(handle, offset);
        assert_eq!(manager.calibration_offset(handle), offset);

        pad.push(InputReport::new(SimpleState::default()).with_imu(flat([0.25, -0.5, 1.0])));
        manager.poll();
        assert_eq!(manager.imu_state(handle).gyro(), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn continuous_calibration_controls_show_in_info() {
        let manager = Manager::new();
        let (dev, pad) = VirtualDevice::controller("pad", ControllerType::DualSense);
        let handle = manager.attach(dev);

        manager.start_continuous_calibration(handle);
        assert!(manager.controller_info(handle).is_calibrating);
        for _ in 0..10 {
            pad.push(InputReport::new(SimpleState::default()).with_imu(flat([1.0, 2.0, 3.0])));
        }
        manager.poll();
        manager.pause_continuous_calibration(handle);
        assert!(!manager.controller_info(handle).is_calibrating);
        assert_eq!(manager.calibration_offset(handle), CalibrationOffset::new(1.0, 2.0, 3.0));

        manager.set_automatic_calibration(handle, true);
        assert!(manager.auto_calibration_status(handle).auto_calibration_enabled);
        assert!(manager.controller_info(handle).auto_calibration_enabled);
    }

    #[test]
    fn sensor_fusion_mode_learns_offset_across_gravity() {
        let manager = Manager::new();
        let (dev, pad) = VirtualDevice::controller("pad", ControllerType::ProController);
        let handle = manager.attach(dev);
        assert_eq!(manager.calibration_mode(handle), CalibrationMode::Manual);

        manager.set_calibration_mode(handle, CalibrationMode::SensorFusion);
        assert!(manager.auto_calibration_status(handle).auto_calibration_enabled);
        for _ in 0..1000 {
            pad.push(InputReport::new(SimpleState::default()).with_imu(flat([1.0, 4.0, 0.5])));
        }
        manager.poll();

        let offset = manager.calibration_offset(handle);
        assert!((offset.x - 1.0).abs() < 1.0e-2, "{offset:?}");
        assert_eq!(offset.y, 0.0);
        assert!((offset.z - 0.5).abs() < 1.0e-2, "{offset:?}");
        assert_eq!(manager.calibration_mode(DeviceHandle(99)), CalibrationMode::Manual);
    }

    #[test]
    fn devices_without_imu_keep_zeroed_motion() {
        let manager = Manager::new();
        let (dev, pad) = VirtualDevice::controller("plain", ControllerType::Unknown);
        let handle = manager.attach(dev);

        pad.push(InputReport::new(pressed(Button::N)).with_imu(flat([5.0, 0.0, 0.0])));
        assert_eq!(manager.poll(), 1);

        assert!(manager.simple_state(handle).pressed(Button::N));
        assert_eq!(manager.imu_state(handle), ImuState::default());
        assert_eq!(manager.motion_state(handle), MotionState::default());
        assert_eq!(manager.get_and_flush_accumulated_gyro(handle), [0.0; 3]);
    }

    #[test]
    fn gyro_space_mutators() {
        let manager = Manager::new();
        let (dev, _) = VirtualDevice::controller("pad", ControllerType::DualSense);
        let handle = manager.attach(dev);
        manager.set_gyro_space_raw(handle, 2);
        assert_eq!(manager.controller_info(handle).gyro_space, GyroSpace::Player);
        manager.set_gyro_space_raw(handle, 9);
        assert_eq!(manager.controller_info(handle).gyro_space, GyroSpace::Player);
        manager.set_gyro_space(handle, GyroSpace::World);
        assert_eq!(manager.controller_info(handle).gyro_space, GyroSpace::World);
    }

    #[test]
    fn transport_loss_reports_timed_out_disconnect() {
        let manager = Manager::new();
        let disconnects = Arc::new(Mutex::new(Vec::new()));
        let seen = disconnects.clone();
        manager.set_disconnect_callback(move |handle, timed_out| {
            seen.lock().push((handle, timed_out));
        });

        let (a, pad_a) = VirtualDevice::controller("a", ControllerType::DualSense);
        let (b, _) = VirtualDevice::controller("b", ControllerType::DualSense);
        let ha = manager.attach(a);
        let hb = manager.attach(b);

        pad_a.unplug();
        manager.poll();
        assert!(!manager.still_connected(ha));
        manager.disconnect(hb);
        assert_eq!(*disconnects.lock(), vec![(ha, true), (hb, false)]);
    }

    #[test]
    fn callbacks_fire_after_state_is_applied() {
        let manager = Arc::new(Manager::new());
        let states = Arc::new(AtomicUsize::new(0));
        let touches = Arc::new(AtomicUsize::new(0));
        let connects = Arc::new(AtomicUsize::new(0));

        let counter = connects.clone();
        manager.set_connect_callback(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        // Reading back from the manager inside the callback must not deadlock.
        let reader = Arc::downgrade(&manager);
        let counter = states.clone();
        manager.set_state_callback(move |event| {
            if let Some(manager) = reader.upgrade() {
                assert_eq!(manager.simple_state(event.handle), event.state);
            }
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let counter = touches.clone();
        manager.set_touch_callback(move |event| {
            assert_eq!(event.last_touch, event.touch);
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let (ds4, pad) = VirtualDevice::controller("ds4", ControllerType::DualShock4);
        let (pro, pro_pad) = VirtualDevice::controller("pro", ControllerType::ProController);
        manager.attach(ds4);
        manager.attach(pro);
        pad.push(InputReport::new(pressed(Button::W)));
        pro_pad.push(InputReport::new(pressed(Button::W)));
        assert_eq!(manager.poll(), 2);

        assert_eq!(connects.load(Ordering::SeqCst), 2);
        assert_eq!(states.load(Ordering::SeqCst), 2);
        // Only the DualShock 4 has a touchpad.
        assert_eq!(touches.load(Ordering::SeqCst), 1);

        manager.clear_state_callback();
        pad.push(InputReport::new(SimpleState::default()));
        manager.poll();
        assert_eq!(states.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn touch_accessors_read_current_points() {
        let manager = Manager::new();
        let (dev, pad) = VirtualDevice::controller("pad", ControllerType::DualSense);
        let handle = manager.attach(dev);
        let first = TouchPoint {
            id: 3,
            down: true,
            x: 0.25,
            y: 0.75,
        };
        pad.push(
            InputReport::new(SimpleState::default())
                .with_touch(TouchState::from_points(first, TouchPoint::default())),
        );
        manager.poll();
        assert_eq!(manager.touch_id(handle, false), 3);
        assert!(manager.touch_down(handle, false));
        assert!(!manager.touch_down(handle, true));
        assert_eq!(manager.touch_x(handle, false), 0.25);
        assert_eq!(manager.touch_y(handle, false), 0.75);
        assert_eq!(manager.touchpad_dimension(handle), Some((1920, 1070)));
    }

    #[test]
    fn outputs_reach_capable_devices_only() {
        let manager = Manager::new();
        let (ds5, ds5_pad) = VirtualDevice::controller("ds5", ControllerType::DualSense);
        let (joycon, joycon_pad) = VirtualDevice::controller("jc", ControllerType::JoyConLeft);
        let h5 = manager.attach(ds5);
        let hj = manager.attach(joycon);

        manager.set_light_colour(h5, 0x00FF00);
        manager.set_rumble(h5, 300, -4);
        manager.set_player_number(h5, 2);
        manager.set_light_colour(hj, 0x00FF00);

        assert_eq!(
            ds5_pad.outputs(),
            vec![
                OutputRequest::LightColour(0x00FF00),
                OutputRequest::Rumble { small: 255, big: 0 },
                OutputRequest::PlayerNumber(2),
            ]
        );
        assert!(joycon_pad.outputs().is_empty());
        assert_eq!(manager.controller_info(h5).colour, 0x00FF00);
        assert_eq!(manager.controller_info(h5).player_number, 2);
        assert_eq!(manager.controller_split_type(hj), SplitType::Left);
    }

    #[test]
    fn delta_time_falls_back_to_report_timing() {
        let manager = Manager::new();
        let (dev, pad) = VirtualDevice::controller("pad", ControllerType::DualSense);
        let handle = manager.attach(dev);
        let deltas = Arc::new(Mutex::new(Vec::new()));
        let seen = deltas.clone();
        manager.set_state_callback(move |event| seen.lock().push(event.delta_time));

        let start = Instant::now();
        pad.push(InputReport::new(SimpleState::default()).at(start));
        pad.push(InputReport::new(SimpleState::default()).at(start + Duration::from_millis(8)));
        manager.poll();

        let deltas = deltas.lock();
        assert!((deltas[0] - 1.0 / 250.0).abs() < 1.0e-6);
        assert!((deltas[1] - 0.008).abs() < 1.0e-4);
        assert!(manager.poll_rate(handle) > 0.0);
    }

    #[test]
    fn calibration_persists_across_reconnects() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.calibration_file = Some(dir.path().join("calibration.json"));
        config.storage.auto_save = true;

        let offset = CalibrationOffset::new(0.5, 0.25, -0.125);
        {
            let manager = Manager::with_config(config.clone()).unwrap();
            let (dev, _) = VirtualDevice::controller("pad", ControllerType::DualSense);
            let handle = manager.attach(dev);
            manager.set_calibration_offset(handle, offset);
            manager.disconnect(handle);
        }

        let manager = Manager::with_config(config).unwrap();
        let (dev, _) = VirtualDevice::controller("PAD", ControllerType::DualSense);
        let handle = manager.attach(dev);
        assert_eq!(manager.calibration_offset(handle), offset);
        assert!(matches!(
            manager.store_calibration(DeviceHandle(99)),
            Err(Error::UnknownDevice(99))
        ));
    }
}
