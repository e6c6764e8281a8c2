//! Tracing-backed input logger.
//!
//! [`Logger::install`] registers callbacks that turn input into `tracing`
//! events: button transitions at `debug`, touch contacts at `trace`. It
//! replaces any state and touch callbacks already registered.

use crate::event::{StateEvent, TouchEvent};
use crate::manager::Manager;
use tracing::{debug, trace};

/// Logs input events through `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Logger;

impl Logger {
    pub fn new() -> Self {
        Logger
    }

    pub fn install(self, manager: &Manager) {
        manager.set_state_callback(move |event| self.on_state(event));
        manager.set_touch_callback(move |event| self.on_touch(event));
    }

    fn on_state(&self, event: &StateEvent) {
        let changed = event.state.buttons.changed(event.last_state.buttons);
        for button in changed.iter() {
            let down = event.state.buttons.contains(button);
            debug!(handle = %event.handle, button = button.name(), down, "button");
        }
    }

    fn on_touch(&self, event: &TouchEvent) {
        for second in [false, true] {
            let now = event.touch.point(second);
            let before = event.last_touch.point(second);
            if now.down != before.down || (now.down && now.id != before.id) {
                trace!(
                    handle = %event.handle,
                    finger = u8::from(second),
                    id = now.id,
                    down = now.down,
                    x = now.x,
                    y = now.y,
                    "touch"
                );
            }
        }
    }
}
