//! Brightness I/O primitives for sysfs backlight devices.
//!
//! A backlight device directory exposes `brightness` (written to change the
//! level), `actual_brightness` (the level the hardware reports) and
//! `max_brightness`. Every write is clamped to `[1, max]` so the panel never
//! goes fully dark and never exceeds the hardware maximum.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::*;

/// Read a single integer from an attribute file.
///
/// Surrounding whitespace (sysfs files end in a newline) is ignored.
pub fn read_value(path: &Path) -> Result<i64> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Error reading file {}", path.display()))?;
    content
        .trim()
        .parse::<i64>()
        .with_context(|| format!("Invalid integer in {}: {:?}", path.display(), content.trim()))
}

/// Write a single integer to an attribute file.
pub fn write_value(path: &Path, value: i64) -> Result<()> {
    fs::write(path, value.to_string())
        .with_context(|| format!("Error writing to {}", path.display()))
}

/// Clamp a computed brightness to the range the device accepts.
///
/// Always `max(1, min(value, max_brightness))`; the lower bound wins if a
/// device ever reports a maximum below 1.
pub fn clamp_brightness(value: i64, max_brightness: i64) -> i64 {
    value.min(max_brightness).max(1)
}

/// Brightness after applying a relative change of `percent` of the maximum.
///
/// The delta is truncated toward zero before being added, so
/// `adjusted_brightness(100, 255, 25)` is `100 + 63 = 163`. The result is not
/// clamped.
pub fn adjusted_brightness(current: i64, max_brightness: i64, percent: i32) -> i64 {
    current + ((max_brightness as f64 / 100.0) * percent as f64) as i64
}

/// Convert a percentage of `max_brightness` into device units (truncated).
pub fn percent_to_units(percent: u8, max_brightness: i64) -> i64 {
    (max_brightness as f64 * percent as f64 / 100.0) as i64
}

/// Handle on a backlight device directory such as
/// `/sys/class/backlight/intel_backlight`.
#[derive(Debug, Clone)]
pub struct Backlight {
    dir: PathBuf,
}

impl Backlight {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_brightness(&self) -> Result<i64> {
        read_value(&self.dir.join(MAX_BRIGHTNESS_FILE))
    }

    pub fn actual_brightness(&self) -> Result<i64> {
        read_value(&self.dir.join(ACTUAL_BRIGHTNESS_FILE))
    }

    /// Check that `brightness` can be opened for writing, without writing.
    pub fn check_writable(&self) -> Result<()> {
        let path = self.dir.join(BRIGHTNESS_FILE);
        fs::OpenOptions::new()
            .write(true)
            .open(&path)
            .map(drop)
            .with_context(|| format!("Cannot write {}", path.display()))
    }

    /// Clamp `value` against `max_brightness` and write it to `brightness`.
    ///
    /// Returns the value that was actually written.
    pub fn set_brightness(&self, value: i64, max_brightness: i64) -> Result<i64> {
        let clamped = clamp_brightness(value, max_brightness);
        write_value(&self.dir.join(BRIGHTNESS_FILE), clamped)?;
        Ok(clamped)
    }

    /// Apply a one-shot relative adjustment based on the current actual level.
    pub fn adjust_brightness(&self, percent: i32, max_brightness: i64) -> Result<i64> {
        let current = self.actual_brightness()?;
        self.set_brightness(adjusted_brightness(current, max_brightness, percent), max_brightness)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::test_constants::*;
    use tempfile::tempdir;

    fn fake_device(max: i64, actual: i64) -> (tempfile::TempDir, Backlight) {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(MAX_BRIGHTNESS_FILE), format!("{}\n", max)).unwrap();
        fs::write(dir.path().join(ACTUAL_BRIGHTNESS_FILE), format!("{}\n", actual)).unwrap();
        fs::write(dir.path().join(BRIGHTNESS_FILE), format!("{}\n", actual)).unwrap();
        let backlight = Backlight::new(dir.path());
        (dir, backlight)
    }

    fn written(backlight: &Backlight) -> i64 {
        read_value(&backlight.dir().join(BRIGHTNESS_FILE)).unwrap()
    }

    #[test]
    fn test_clamp_brightness_bounds() {
        assert_eq!(clamp_brightness(50, 100), 50);
        assert_eq!(clamp_brightness(0, 100), 1);
        assert_eq!(clamp_brightness(-500, 100), 1);
        assert_eq!(clamp_brightness(100, 100), 100);
        assert_eq!(clamp_brightness(i64::MAX, 100), 100);
    }

    #[test]
    fn test_clamp_brightness_degenerate_max() {
        assert_eq!(clamp_brightness(10, 0), 1);
    }

    #[test]
    fn test_adjusted_brightness_truncates_delta() {
        assert_eq!(adjusted_brightness(100, 255, 25), 163);
        assert_eq!(adjusted_brightness(40, 100, 10), 50);
        assert_eq!(adjusted_brightness(5, 100, -10), -5);
        // -0.9 truncates to 0
        assert_eq!(adjusted_brightness(10, 9, -10), 10);
    }

    #[test]
    fn test_percent_to_units() {
        assert_eq!(percent_to_units(30, 100), 30);
        assert_eq!(percent_to_units(10, 255), 25);
        assert_eq!(percent_to_units(0, 255), 0);
        assert_eq!(percent_to_units(100, 937), 937);
    }

    #[test]
    fn test_read_value_trims_newline() {
        let (_dir, backlight) = fake_device(TEST_MAX_BRIGHTNESS, 42);
        assert_eq!(backlight.max_brightness().unwrap(), TEST_MAX_BRIGHTNESS);
        assert_eq!(backlight.actual_brightness().unwrap(), 42);
    }

    #[test]
    fn test_read_value_rejects_garbage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("max_brightness");
        fs::write(&path, "bright\n").unwrap();
        assert!(read_value(&path).is_err());
    }

    #[test]
    fn test_read_value_missing_file() {
        let dir = tempdir().unwrap();
        let err = read_value(&dir.path().join("nope")).unwrap_err();
        assert!(err.to_string().contains("Error reading file"));
    }

    #[test]
    fn test_set_brightness_clamps_high_and_low() {
        let (_dir, backlight) = fake_device(TEST_MAX_BRIGHTNESS, 40);

        assert_eq!(backlight.set_brightness(5000, TEST_MAX_BRIGHTNESS).unwrap(), 100);
        assert_eq!(written(&backlight), 100);

        assert_eq!(backlight.set_brightness(-3, TEST_MAX_BRIGHTNESS).unwrap(), 1);
        assert_eq!(written(&backlight), 1);
    }

    #[test]
    fn test_adjust_brightness_up() {
        let (_dir, backlight) = fake_device(100, 40);
        assert_eq!(backlight.adjust_brightness(10, 100).unwrap(), 50);
        assert_eq!(written(&backlight), 50);
    }

    #[test]
    fn test_adjust_brightness_down_clamps_to_one() {
        let (_dir, backlight) = fake_device(100, 5);
        assert_eq!(backlight.adjust_brightness(-10, 100).unwrap(), 1);
        assert_eq!(written(&backlight), 1);
    }

    #[test]
    fn test_set_brightness_unwritable_device() {
        let dir = tempdir().unwrap();
        let backlight = Backlight::new(dir.path().join("missing"));
        assert!(backlight.set_brightness(10, 100).is_err());
    }
}
