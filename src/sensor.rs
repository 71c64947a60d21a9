//! Ambient light sensor discovery and sampling.
//!
//! IIO light sensors live under `/sys/bus/iio/devices/iio:deviceN` and expose
//! an illumination attribute such as `in_illuminance_raw`. Discovery picks the
//! first device directory (in name order) that contains the configured
//! attribute.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Find the device directory under `devices_path` exposing `file_name`.
///
/// # Returns
/// - `Ok(path)` of the device directory (not the attribute file)
/// - `Err` if the directory cannot be read or no device has the attribute
pub fn find_sensor_device(devices_path: &Path, file_name: &str) -> Result<PathBuf> {
    let entries = fs::read_dir(devices_path).with_context(|| {
        format!(
            "Error opening sensor devices directory {}",
            devices_path.display()
        )
    })?;

    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .collect();
    candidates.sort();

    candidates
        .into_iter()
        .find(|dir| fs::File::open(dir.join(file_name)).is_ok())
        .with_context(|| {
            format!(
                "Sensor file not found: no device under {} exposes {}",
                devices_path.display(),
                file_name
            )
        })
}

/// A resolved light sensor attribute.
#[derive(Debug, Clone)]
pub struct Sensor {
    attribute: PathBuf,
}

impl Sensor {
    pub fn new(device_dir: &Path, file_name: &str) -> Self {
        Self {
            attribute: device_dir.join(file_name),
        }
    }

    pub fn attribute(&self) -> &Path {
        &self.attribute
    }

    /// Read the current illumination value.
    ///
    /// Raw attributes hold integers, processed ones (`in_illuminance_input`)
    /// may hold decimals; both parse.
    pub fn read_illumination(&self) -> Result<f64> {
        let content = fs::read_to_string(&self.attribute)
            .with_context(|| format!("Error reading sensor {}", self.attribute.display()))?;
        content.trim().parse::<f64>().with_context(|| {
            format!(
                "Invalid illumination value in {}: {:?}",
                self.attribute.display(),
                content.trim()
            )
        })
    }
}
