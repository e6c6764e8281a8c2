//! Error types for the fallible setup surfaces.
//!
//! The polling API itself never fails: stale handles read as default state.
//! Errors only come from loading configuration, persisting calibration and
//! initialising transports.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to serialize TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("calibration file is malformed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no device with handle {0}")]
    UnknownDevice(i32),

    #[cfg(feature = "hid")]
    #[error("HID initialisation failed: {0}")]
    Hid(#[from] hidapi::HidError),
}

pub type Result<T> = std::result::Result<T, Error>;
