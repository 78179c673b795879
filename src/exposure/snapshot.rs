//! Crash-recovery snapshot of a running print.
//!
//! Only counters and profile names are stored. Hardware and profile objects
//! are resolved again from those names when a print is resumed.

use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::units::Nm;
use crate::error::{bounded, Error, ExposureError, Result};

/// Serializable print progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureSnapshot {
    /// Job name of the project
    pub project_name: String,
    /// Next layer to print
    pub actual_layer: u32,
    /// Tower position in nanometers
    pub position_nm: i64,
    /// Resin used so far
    pub resin_count_ml: f64,
    /// Resin in the tank at print start, plus refills
    pub resin_volume_ml: Option<f64>,
    /// Layers printed with slow tear-off
    pub slow_layers_done: u32,
    /// Exposure profile name
    pub exposure_profile: String,
    /// Print was canceled
    pub canceled: bool,
    /// Seconds since the Unix epoch
    pub saved_at: u64,
}

impl ExposureSnapshot {
    /// Tower position.
    pub fn position(&self) -> Nm {
        Nm(self.position_nm)
    }

    /// Write the snapshot atomically (temporary file, then rename).
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).map_err(snapshot_error)?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, json).map_err(snapshot_error)?;
        fs::rename(&tmp, path).map_err(snapshot_error)?;
        debug!("snapshot of layer {} written to {}", self.actual_layer, path.display());
        Ok(())
    }

    /// Read a snapshot.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(snapshot_error)?;
        serde_json::from_str(&json).map_err(snapshot_error)
    }

    /// Delete a snapshot file; a missing file is not an error.
    pub fn remove<P: AsRef<Path>>(path: P) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(snapshot_error(e)),
        }
    }
}

pub(crate) fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn snapshot_error<E: std::fmt::Display>(e: E) -> Error {
    Error::Exposure(ExposureError::Snapshot(bounded(&e.to_string())))
}
