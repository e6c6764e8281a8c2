//! Callback registration and dispatch.
//!
//! One slot per event category. Registering replaces the previous callback
//! atomically: a dispatch in flight finishes on the callback it already
//! cloned, and every later dispatch sees the new one. An empty slot makes
//! dispatch a no-op.
//!
//! Callbacks run on whichever thread processed the report, after the
//! device's state lock has been released, so they may call back into the
//! [`Manager`](crate::manager::Manager).

use crate::device::DeviceHandle;
use crate::event::{StateEvent, TouchEvent};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

pub type StateCallback = dyn Fn(&StateEvent) + Send + Sync;
pub type TouchCallback = dyn Fn(&TouchEvent) + Send + Sync;
pub type ConnectCallback = dyn Fn(DeviceHandle) + Send + Sync;
/// Receives the handle and whether the device timed out (transport loss)
/// rather than being disconnected on request.
pub type DisconnectCallback = dyn Fn(DeviceHandle, bool) + Send + Sync;

/// A single replaceable callback.
pub struct CallbackSlot<F: ?Sized> {
    inner: RwLock<Option<Arc<F>>>,
}

impl<F: ?Sized> Default for CallbackSlot<F> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(None),
        }
    }
}

impl<F: ?Sized> CallbackSlot<F> {
    /// Swap in `callback` (or clear with `None`), returning the old one.
    pub fn replace(&self, callback: Option<Arc<F>>) -> Option<Arc<F>> {
        std::mem::replace(&mut *self.inner.write(), callback)
    }

    /// The callback to invoke right now, if any.
    ///
    /// The lock is held only long enough to clone the `Arc`.
    pub fn current(&self) -> Option<Arc<F>> {
        self.inner.read().clone()
    }

    pub fn is_set(&self) -> bool {
        self.inner.read().is_some()
    }
}

impl<F: ?Sized> fmt::Debug for CallbackSlot<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackSlot")
            .field("set", &self.is_set())
            .finish()
    }
}

/// The four callback slots a manager dispatches to.
#[derive(Debug, Default)]
pub struct Callbacks {
    pub state: CallbackSlot<StateCallback>,
    pub touch: CallbackSlot<TouchCallback>,
    pub connect: CallbackSlot<ConnectCallback>,
    pub disconnect: CallbackSlot<DisconnectCallback>,
}

impl Callbacks {
    pub fn emit_state(&self, event: &StateEvent) {
        if let Some(cb) = self.state.current() {
            cb(event);
        }
    }

    pub fn emit_touch(&self, event: &TouchEvent) {
        if let Some(cb) = self.touch.current() {
            cb(event);
        }
    }

    pub fn emit_connect(&self, handle: DeviceHandle) {
        if let Some(cb) = self.connect.current() {
            cb(handle);
        }
    }

    pub fn emit_disconnect(&self, handle: DeviceHandle, timed_out: bool) {
        if let Some(cb) = self.disconnect.current() {
            cb(handle, timed_out);
        }
    }
}
