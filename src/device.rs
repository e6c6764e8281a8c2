//! Device abstractions: the transport seam and the report-parser seam.
//!
//! A [`Device`] is anything that can produce decoded [`InputReport`]s and
//! optionally accept output requests (light, rumble, player LEDs). Backends
//! implement it; applications with their own I/O can implement it too and
//! [`attach`](crate::manager::Manager::attach) the result.
//!
//! A [`ReportParser`] turns one vendor HID report into an [`InputReport`]
//! and encodes output requests into vendor reports. Parsers are registered
//! per [`ControllerType`] in a [`ParserRegistry`]; the HID backend only
//! opens controllers it has a parser for.

use crate::event::InputReport;
use crate::metadata::{DeviceCaps, DeviceMeta};
use crate::state::ControllerType;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Opaque integer identifying a connected device.
///
/// Handles are assigned when a device is attached and never reused by the
/// same manager, so a stale handle can never alias a newer device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceHandle(pub i32);

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<i32> for DeviceHandle {
    fn from(raw: i32) -> Self {
        DeviceHandle(raw)
    }
}

/// Transport-level failure.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The device went away. The manager tears it down and reports a
    /// timed-out disconnect.
    #[error("device disconnected")]
    Disconnected,

    #[error("device does not support {0}")]
    Unsupported(&'static str),

    #[cfg(feature = "hid")]
    #[error("HID error: {0}")]
    Hid(#[from] hidapi::HidError),
}

/// A source of decoded input reports.
pub trait Device: Send {
    /// Drain whatever reports are pending. Must not block.
    fn poll(&mut self) -> Result<Vec<InputReport>, DeviceError>;

    fn name(&self) -> &str;

    /// Stable identifier, used to avoid attaching the same device twice.
    fn id(&self) -> &str;

    fn metadata(&self) -> DeviceMeta;

    fn capabilities(&self) -> DeviceCaps;

    /// Packed `0xRRGGBB` light colour, or a palette index on devices with a
    /// fixed palette.
    fn set_light_colour(&mut self, _colour: i32) -> Result<(), DeviceError> {
        Err(DeviceError::Unsupported("light colour"))
    }

    /// Small (high frequency) and big (low frequency) motor, `0..=255`.
    fn set_rumble(&mut self, _small: i32, _big: i32) -> Result<(), DeviceError> {
        Err(DeviceError::Unsupported("rumble"))
    }

    fn set_player_number(&mut self, _number: i32) -> Result<(), DeviceError> {
        Err(DeviceError::Unsupported("player indicator"))
    }
}

/// Context handed to a parser with each report.
pub struct ParseCtx<'a> {
    /// First byte of the report when the parser expects a report ID prefix,
    /// otherwise `0`.
    pub report_id: u8,
    pub now: Instant,
    pub meta: &'a DeviceMeta,
}

/// Decodes vendor reports for one controller family.
pub trait ReportParser: Send {
    /// Exact input report length including any ID byte, if fixed.
    fn input_report_len(&self) -> Option<usize> {
        None
    }

    /// Whether reads deliver `[report_id][payload...]`.
    fn expects_report_id_prefix(&self) -> bool {
        true
    }

    fn capabilities(&self, meta: &DeviceMeta) -> DeviceCaps {
        DeviceCaps::for_controller(meta.controller_type)
    }

    /// Decode one report. `None` for reports that carry no input (status,
    /// acknowledgements, unknown IDs).
    fn parse(&mut self, ctx: &ParseCtx<'_>, payload: &[u8]) -> Option<InputReport>;

    /// Output report that sets the light colour, if supported.
    fn encode_light_colour(&mut self, _colour: i32) -> Option<Vec<u8>> {
        None
    }

    fn encode_rumble(&mut self, _small: i32, _big: i32) -> Option<Vec<u8>> {
        None
    }

    fn encode_player_number(&mut self, _number: i32) -> Option<Vec<u8>> {
        None
    }
}

/// Builds a parser for a newly discovered device.
pub type ParserFactory = Arc<dyn Fn(&DeviceMeta) -> Box<dyn ReportParser> + Send + Sync>;

/// Parser factories keyed by controller family.
#[derive(Clone, Default)]
pub struct ParserRegistry {
    factories: Arc<RwLock<HashMap<ControllerType, ParserFactory>>>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the parser factory for a controller family.
    pub fn register<F>(&self, controller_type: ControllerType, factory: F)
    where
        F: Fn(&DeviceMeta) -> Box<dyn ReportParser> + Send + Sync + 'static,
    {
        self.factories
            .write()
            .insert(controller_type, Arc::new(factory));
    }

    pub fn supports(&self, controller_type: ControllerType) -> bool {
        self.factories.read().contains_key(&controller_type)
    }

    /// Build a parser for `meta`, if its family is registered.
    pub fn create(&self, meta: &DeviceMeta) -> Option<Box<dyn ReportParser>> {
        let factory = self.factories.read().get(&meta.controller_type).cloned()?;
        Some(factory(meta))
    }
}

impl fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let families: Vec<ControllerType> = self.factories.read().keys().copied().collect();
        f.debug_struct("ParserRegistry")
            .field("families", &families)
            .finish()
    }
}

/// DualSense lightbar LED patterns for players 1 to 5.
pub const DUALSENSE_PLAYER_LEDS: [u8; 5] = [4, 10, 21, 27, 31];

/// Player-indicator bits for a DualSense.
///
/// Players 1 to 5 use the console's own patterns; anything else lights the
/// low bits of `number` directly, and `0` turns the indicator off.
pub fn dualsense_player_leds(number: i32) -> u8 {
    match number {
        1..=5 => DUALSENSE_PLAYER_LEDS[(number - 1) as usize],
        _ => (number & 0x1F) as u8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SimpleState;

    struct NullParser;

    impl ReportParser for NullParser {
        fn parse(&mut self, ctx: &ParseCtx<'_>, _payload: &[u8]) -> Option<InputReport> {
            Some(InputReport::new(SimpleState::default()).at(ctx.now))
        }
    }

    #[test]
    fn registry_creates_only_registered_families() {
        let registry = ParserRegistry::new();
        registry.register(ControllerType::DualShock4, |_| Box::new(NullParser));
        assert!(registry.supports(ControllerType::DualShock4));
        assert!(!registry.supports(ControllerType::DualSense));

        let ds4 = DeviceMeta {
            controller_type: ControllerType::DualShock4,
            ..DeviceMeta::default()
        };
        let ds5 = DeviceMeta {
            controller_type: ControllerType::DualSense,
            ..DeviceMeta::default()
        };
        let mut parser = registry.create(&ds4).unwrap();
        let ctx = ParseCtx {
            report_id: 1,
            now: Instant::now(),
            meta: &ds4,
        };
        assert!(parser.parse(&ctx, &[]).is_some());
        assert!(parser.encode_rumble(10, 10).is_none());
        assert!(registry.create(&ds5).is_none());
    }

    #[test]
    fn dualsense_player_patterns() {
        assert_eq!(dualsense_player_leds(1), 4);
        assert_eq!(dualsense_player_leds(2), 10);
        assert_eq!(dualsense_player_leds(3), 21);
        assert_eq!(dualsense_player_leds(4), 27);
        assert_eq!(dualsense_player_leds(5), 31);
        assert_eq!(dualsense_player_leds(0), 0);
        assert_eq!(dualsense_player_leds(0x22), 0x02);
    }

    #[test]
    fn handle_display() {
        assert_eq!(DeviceHandle(7).to_string(), "#7");
    }
}
