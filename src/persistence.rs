//! Stored gyro calibration.
//!
//! A single JSON document maps an upper-cased device key (see
//! [`DeviceMeta::calibration_key`](crate::metadata::DeviceMeta::calibration_key))
//! to the offsets learned for that device:
//!
//! ```json
//! {
//!   "\\\\?\\HID#VID_054C&PID_09CC": {
//!     "xOffset": 0.12,
//!     "yOffset": -0.4,
//!     "zOffset": 0.03,
//!     "weight": 250,
//!     "thresholdG": 2000.0,
//!     "thresholdA": 4.0
//!   }
//! }
//! ```
//!
//! The sensor range thresholds are not used here but are carried through so
//! that storing offsets never drops them. A missing file reads as an empty
//! map. Every store rewrites the whole file.

use crate::error::{Error, Result};
use crate::state::CalibrationOffset;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default gyro range (deg/s).
pub const DEFAULT_THRESHOLD_G: f32 = 2000.0;
/// Default accelerometer range (g).
pub const DEFAULT_THRESHOLD_A: f32 = 4.0;

fn default_threshold_g() -> f32 {
    DEFAULT_THRESHOLD_G
}

fn default_threshold_a() -> f32 {
    DEFAULT_THRESHOLD_A
}

/// Offsets stored for one device.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCalibration {
    pub x_offset: f32,
    pub y_offset: f32,
    pub z_offset: f32,
    /// Samples that went into the offsets. Negative values read as zero.
    #[serde(default)]
    pub weight: i32,
    /// Gyro sensor range (deg/s).
    #[serde(default = "default_threshold_g")]
    pub threshold_g: f32,
    /// Accelerometer sensor range (g).
    #[serde(default = "default_threshold_a")]
    pub threshold_a: f32,
}

impl Default for StoredCalibration {
    fn default() -> Self {
        Self {
            x_offset: 0.0,
            y_offset: 0.0,
            z_offset: 0.0,
            weight: 0,
            threshold_g: DEFAULT_THRESHOLD_G,
            threshold_a: DEFAULT_THRESHOLD_A,
        }
    }
}

impl StoredCalibration {
    pub fn new(offset: CalibrationOffset, weight: u32) -> Self {
        Self::default().with_offset(offset, weight)
    }

    /// Replace offsets and weight, keeping the thresholds.
    pub fn with_offset(self, offset: CalibrationOffset, weight: u32) -> Self {
        Self {
            x_offset: offset.x,
            y_offset: offset.y,
            z_offset: offset.z,
            weight: i32::try_from(weight).unwrap_or(i32::MAX),
            ..self
        }
    }

    pub fn offset(&self) -> CalibrationOffset {
        CalibrationOffset::new(self.x_offset, self.y_offset, self.z_offset)
    }

    /// Weight as a sample count.
    pub fn sample_weight(&self) -> u32 {
        u32::try_from(self.weight).unwrap_or(0)
    }
}

/// In-memory copy of a calibration file.
#[derive(Clone, Debug)]
pub struct CalibrationFile {
    path: PathBuf,
    entries: BTreeMap<String, StoredCalibration>,
}

impl CalibrationFile {
    /// Read `path`, or start empty if it does not exist yet.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(Error::Io { path, source }),
        };
        debug!(path = %path.display(), devices = entries.len(), "loaded calibration file");
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stored offsets for `key`, matched case-insensitively.
    pub fn get(&self, key: &str) -> Option<StoredCalibration> {
        self.entries.get(&key.to_uppercase()).copied()
    }

    /// Record new offsets for `key`, keeping any stored thresholds, and
    /// rewrite the file.
    pub fn update_offset(
        &mut self,
        key: &str,
        offset: CalibrationOffset,
        weight: u32,
    ) -> Result<()> {
        let calibration = self.get(key).unwrap_or_default().with_offset(offset, weight);
        self.store(key, calibration)
    }

    /// Record offsets for `key` and rewrite the file.
    pub fn store(&mut self, key: &str, calibration: StoredCalibration) -> Result<()> {
        let key = key.to_uppercase();
        debug!(device = %key, ?calibration, "storing calibration");
        self.entries.insert(key, calibration);
        self.save()
    }

    fn save(&self) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| Error::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, json).map_err(|source| Error::Io {
            path: self.path.clone(),
            source,
        })
    }
}
