//! Scriptable in-process devices.
//!
//! [`VirtualDevice::new`] returns the device (attach it to a
//! [`Manager`](crate::manager::Manager)) and a [`VirtualHandle`] that another
//! thread can use to feed reports, inspect the output requests the manager
//! forwarded, and simulate an unplug.

use crate::device::{Device, DeviceError};
use crate::event::InputReport;
use crate::metadata::{DeviceCaps, DeviceMeta};
use crate::state::ControllerType;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// An output request the device received.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputRequest {
    LightColour(i32),
    Rumble { small: i32, big: i32 },
    PlayerNumber(i32),
}

#[derive(Default)]
struct Shared {
    queue: Mutex<VecDeque<InputReport>>,
    outputs: Mutex<Vec<OutputRequest>>,
    unplugged: AtomicBool,
}

/// The [`Device`] half of a virtual controller.
pub struct VirtualDevice {
    id: String,
    name: String,
    meta: DeviceMeta,
    caps: DeviceCaps,
    shared: Arc<Shared>,
}

/// The scripting half of a virtual controller.
#[derive(Clone)]
pub struct VirtualHandle {
    shared: Arc<Shared>,
}

impl VirtualDevice {
    pub fn new(
        id: &str,
        name: &str,
        meta: DeviceMeta,
        caps: DeviceCaps,
    ) -> (VirtualDevice, VirtualHandle) {
        let shared = Arc::new(Shared::default());
        let device = VirtualDevice {
            id: id.to_string(),
            name: name.to_string(),
            meta,
            caps,
            shared: shared.clone(),
        };
        (device, VirtualHandle { shared })
    }

    /// A virtual controller with the typical capabilities of its family.
    pub fn controller(id: &str, controller_type: ControllerType) -> (VirtualDevice, VirtualHandle) {
        let meta = DeviceMeta {
            bus: Some("virtual".into()),
            product_string: Some(format!("Virtual {controller_type:?}")),
            path: Some(format!("virtual:{id}")),
            controller_type,
            split_type: controller_type.split_type(),
            ..DeviceMeta::default()
        };
        let name = format!("Virtual {controller_type:?} ({id})");
        Self::new(id, &name, meta, DeviceCaps::for_controller(controller_type))
    }

    fn record(
        &self,
        request: OutputRequest,
        supported: bool,
        what: &'static str,
    ) -> Result<(), DeviceError> {
        if self.shared.unplugged.load(Ordering::Acquire) {
            return Err(DeviceError::Disconnected);
        }
        if !supported {
            return Err(DeviceError::Unsupported(what));
        }
        self.shared.outputs.lock().push(request);
        Ok(())
    }
}

impl VirtualHandle {
    /// Queue a report for the next poll.
    pub fn push(&self, report: InputReport) {
        self.shared.queue.lock().push_back(report);
    }

    /// Make the next poll report a lost transport.
    pub fn unplug(&self) {
        self.shared.unplugged.store(true, Ordering::Release);
    }

    pub fn is_unplugged(&self) -> bool {
        self.shared.unplugged.load(Ordering::Acquire)
    }

    /// Reports queued but not yet polled.
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().len()
    }

    /// Output requests received so far, oldest first.
    pub fn outputs(&self) -> Vec<OutputRequest> {
        self.shared.outputs.lock().clone()
    }
}

impl Device for VirtualDevice {
    fn poll(&mut self) -> Result<Vec<InputReport>, DeviceError> {
        if self.shared.unplugged.load(Ordering::Acquire) {
            return Err(DeviceError::Disconnected);
        }
        Ok(self.shared.queue.lock().drain(..).collect())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn metadata(&self) -> DeviceMeta {
        self.meta.clone()
    }

    fn capabilities(&self) -> DeviceCaps {
        self.caps.clone()
    }

    fn set_light_colour(&mut self, colour: i32) -> Result<(), DeviceError> {
        self.record(OutputRequest::LightColour(colour), self.caps.has_light, "light colour")
    }

    fn set_rumble(&mut self, small: i32, big: i32) -> Result<(), DeviceError> {
        self.record(OutputRequest::Rumble { small, big }, self.caps.has_rumble, "rumble")
    }

    fn set_player_number(&mut self, number: i32) -> Result<(), DeviceError> {
        self.record(
            OutputRequest::PlayerNumber(number),
            self.caps.has_player_leds,
            "player indicator",
        )
    }
}
