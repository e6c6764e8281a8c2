//! HID discovery and transport (`hidapi`).
//!
//! Discovery walks the `hidapi` device list, keeps entries whose VID/PID
//! belong to a [known controller](KNOWN_CONTROLLERS), and wraps each one in
//! a [`HidInputDevice`] driven by the [`ReportParser`] registered for its
//! family. Families without a registered parser are skipped.
//!
//! [`HidInputDevice`] is responsible for:
//! - opening the HID handle in non-blocking mode
//! - draining a bounded number of reports per poll
//! - splitting `[report_id][payload...]` vs `[payload...]` depending on
//!   parser expectations
//! - writing the output reports the parser encodes
//!
//! It does **not** keep state; that is the manager's job.

use crate::device::{Device, DeviceError, ParseCtx, ParserRegistry, ReportParser};
use crate::error::Result;
use crate::event::InputReport;
use crate::metadata::{DeviceCaps, DeviceMeta};
use crate::state::ControllerType;
use hidapi::{DeviceInfo, HidApi, HidDevice};
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, trace, warn};

const VID_NINTENDO: u16 = 0x057e;
const VID_SONY: u16 = 0x054c;

/// `(vendor id, product id, family)` for every controller discovery accepts.
pub const KNOWN_CONTROLLERS: &[(u16, u16, ControllerType)] = &[
    (VID_NINTENDO, 0x2006, ControllerType::JoyConLeft),
    (VID_NINTENDO, 0x2007, ControllerType::JoyConRight),
    (VID_NINTENDO, 0x2009, ControllerType::ProController),
    (VID_SONY, 0x05c4, ControllerType::DualShock4),
    (VID_SONY, 0x09cc, ControllerType::DualShock4),
    (VID_SONY, 0x0ba0, ControllerType::DualShock4),
    (VID_SONY, 0x0ce6, ControllerType::DualSense),
    (VID_SONY, 0x0df2, ControllerType::DualSense),
];

/// Controller family for a VID/PID pair, if it is a supported controller.
pub fn classify(vid: u16, pid: u16) -> Option<ControllerType> {
    KNOWN_CONTROLLERS
        .iter()
        .find(|(v, p, _)| *v == vid && *p == pid)
        .map(|(_, _, kind)| *kind)
}

/// Treat the first byte as a report ID.
#[inline]
fn split_report(data: &[u8]) -> (u8, &[u8]) {
    match data.split_first() {
        Some((id, payload)) => (*id, payload),
        None => (0, &[]),
    }
}

/// A HID controller driven by a [`ReportParser`].
pub struct HidInputDevice {
    id: String,
    name: String,
    raw: HidDevice,
    buf: Vec<u8>,
    parser: Box<dyn ReportParser>,
    meta: DeviceMeta,
    caps: DeviceCaps,
    max_reports: usize,
}

impl HidInputDevice {
    /// Open and wrap a HID device entry.
    pub fn open(
        info: &DeviceInfo,
        api: &HidApi,
        parser: Box<dyn ReportParser>,
        meta: DeviceMeta,
        max_reports: usize,
    ) -> Result<Self> {
        let raw = info.open_device(api)?;
        // Polled from the host loop; if this fails reads still work, only slower.
        if let Err(e) = raw.set_blocking_mode(false) {
            debug!(error = %e, "could not switch HID handle to non-blocking");
        }

        let buf = vec![0u8; parser.input_report_len().unwrap_or(64)];
        let caps = parser.capabilities(&meta);
        let name = meta
            .product_string
            .clone()
            .unwrap_or_else(|| format!("{:?}", meta.controller_type));
        let id = info.path().to_string_lossy().into_owned();

        debug!(
            vid = format_args!("{:04x}", info.vendor_id()),
            pid = format_args!("{:04x}", info.product_id()),
            path = %id,
            kind = ?meta.controller_type,
            "opened HID controller"
        );

        Ok(Self {
            id,
            name,
            raw,
            buf,
            parser,
            meta,
            caps,
            max_reports: max_reports.max(1),
        })
    }

    fn write_output(
        &self,
        report: Option<Vec<u8>>,
        what: &'static str,
    ) -> std::result::Result<(), DeviceError> {
        let report = report.ok_or(DeviceError::Unsupported(what))?;
        match self.raw.write(&report) {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(dev = %self.id, error = %e, what, "HID write failed");
                Err(DeviceError::Disconnected)
            }
        }
    }
}

impl Device for HidInputDevice {
    fn poll(&mut self) -> std::result::Result<Vec<InputReport>, DeviceError> {
        let mut reports = Vec::new();
        for _ in 0..self.max_reports {
            let n = match self.raw.read(&mut self.buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    warn!(dev = %self.id, error = %e, "HID read failed");
                    return Err(DeviceError::Disconnected);
                }
            };

            let slice = &self.buf[..n];
            let (report_id, payload) = if self.parser.expects_report_id_prefix() {
                split_report(slice)
            } else {
                (0, slice)
            };
            let ctx = ParseCtx {
                report_id,
                now: Instant::now(),
                meta: &self.meta,
            };
            match self.parser.parse(&ctx, payload) {
                Some(report) => reports.push(report),
                None => trace!(dev = %self.id, report_id, len = n, "report carried no input"),
            }
        }
        Ok(reports)
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

    fn set_light_colour(&mut self, colour: i32) -> std::result::Result<(), DeviceError> {
        let report = self.parser.encode_light_colour(colour);
        self.write_output(report, "light colour")
    }

    fn set_rumble(&mut self, small: i32, big: i32) -> std::result::Result<(), DeviceError> {
        let report = self.parser.encode_rumble(small, big);
        self.write_output(report, "rumble")
    }

    fn set_player_number(&mut self, number: i32) -> std::result::Result<(), DeviceError> {
        let report = self.parser.encode_player_number(number);
        self.write_output(report, "player indicator")
    }
}

/// Metadata for a hidapi entry that passed [`classify`].
fn describe(info: &DeviceInfo, controller_type: ControllerType) -> DeviceMeta {
    // hidapi reports no interface number for Bluetooth HID.
    let bus = if info.interface_number() < 0 {
        "bluetooth"
    } else {
        "usb"
    };
    DeviceMeta {
        bus: Some(bus.to_string()),
        vid: Some(info.vendor_id()),
        pid: Some(info.product_id()),
        product_string: info.product_string().map(str::to_string),
        serial_number: info.serial_number().map(str::to_string),
        path: Some(info.path().to_string_lossy().into_owned()),
        controller_type,
        split_type: controller_type.split_type(),
    }
}

/// Owns the `hidapi` context for the lifetime of a manager.
pub struct HidBackend {
    api: HidApi,
}

impl HidBackend {
    pub fn new() -> Result<Self> {
        Ok(Self { api: HidApi::new()? })
    }

    /// Open every supported controller not already in `known` (by path).
    pub fn probe_devices(
        &mut self,
        parsers: &ParserRegistry,
        known: &HashSet<String>,
        max_reports: usize,
    ) -> Result<Vec<Box<dyn Device>>> {
        self.api.refresh_devices()?;

        let mut seen = HashSet::new();
        let mut out: Vec<Box<dyn Device>> = Vec::new();
        for info in self.api.device_list() {
            let Some(kind) = classify(info.vendor_id(), info.product_id()) else {
                continue;
            };
            let path = info.path().to_string_lossy().into_owned();
            if known.contains(&path) || !seen.insert(path.clone()) {
                continue;
            }

            let meta = describe(info, kind);
            let Some(parser) = parsers.create(&meta) else {
                debug!(%path, ?kind, "no parser registered; skipping");
                continue;
            };
            match HidInputDevice::open(info, &self.api, parser, meta, max_reports) {
                Ok(dev) => out.push(Box::new(dev)),
                Err(e) => warn!(%path, error = %e, "failed to open controller"),
            }
        }
        Ok(out)
    }
}
