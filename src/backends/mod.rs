//! Input backends.
//!
//! Implementations of [`Device`](crate::device::Device) for concrete input
//! sources, and the discovery front the manager calls.
//!
//! # Feature flags
//! - **`hid`** (default): the `hidapi` backend. Discovery opens known
//!   controllers for which a parser is registered.
//!
//! The virtual backend is always available; its devices are attached
//! explicitly rather than discovered.

use crate::config::Config;
use crate::device::{Device, ParserRegistry};
use std::collections::HashSet;

#[cfg(feature = "hid")]
#[cfg_attr(docsrs, doc(cfg(feature = "hid")))]
pub mod hid;
pub mod virtual_input;

/// Discovery state shared across `connect_devices` calls.
#[derive(Default)]
pub struct Backends {
    #[cfg(feature = "hid")]
    hid: Option<hid::HidBackend>,
}

impl Backends {
    pub fn new() -> Self {
        Self::default()
    }

    /// Devices from every enabled backend, skipping ids in `known`.
    #[cfg_attr(not(feature = "hid"), allow(unused_variables))]
    pub fn probe(
        &mut self,
        config: &Config,
        parsers: &ParserRegistry,
        known: &HashSet<String>,
    ) -> Vec<Box<dyn Device>> {
        let mut out: Vec<Box<dyn Device>> = Vec::new();

        #[cfg(feature = "hid")]
        if config.hid.enabled {
            if self.hid.is_none() {
                match hid::HidBackend::new() {
                    Ok(backend) => self.hid = Some(backend),
                    Err(e) => tracing::warn!(error = %e, "HID backend unavailable"),
                }
            }
            if let Some(backend) = self.hid.as_mut() {
                match backend.probe_devices(parsers, known, config.hid.max_reports_per_poll) {
                    Ok(found) => out.extend(found),
                    Err(e) => tracing::warn!(error = %e, "HID discovery failed"),
                }
            }
        }

        out
    }
}
