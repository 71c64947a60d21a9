//! Configuration system for backlight_manager.
//!
//! The configuration lives in `backlight_manager.conf` under the user's
//! configuration home (`$XDG_CONFIG_HOME/backlight_manager/`), as plain
//! `key=value` lines:
//!
//! ```text
//! # Light sensor
//! sensor_path=/sys/bus/iio/devices
//! sensor_file=in_illuminance_raw
//!
//! # Backlight devices
//! screen_backlight_path=/sys/class/backlight/intel_backlight
//! keyboard_backlight_path=/sys/class/leds/tpacpi::kbd_backlight
//!
//! # Daemon behavior
//! update_rate=5
//! brightness_factor=1.5
//! min_brightness=10
//! ```
//!
//! Only the first whitespace-delimited token after `=` is used as the value.
//! Blank lines and `#` comments are skipped, unknown keys produce a warning and
//! are otherwise ignored.
//!
//! ## Validation
//!
//! - `update_rate`: 1-3600 seconds
//! - `min_brightness`: 0-100 percent of the device maximum
//! - `brightness_factor`: finite and not negative
//! - `screen_backlight_path`: required
//!
//! Loading also resolves the light sensor: the first device under
//! `sensor_path` exposing `sensor_file`. A missing sensor is a fatal
//! configuration error.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::backlight::Backlight;
use crate::constants::*;
use crate::logger::Log;
use crate::sensor::{Sensor, find_sensor_device};

/// Raw values as they appear in the configuration file.
///
/// Every field is optional; defaults are applied by [`Config::from_file`].
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ConfigFile {
    pub sensor_path: Option<PathBuf>,
    pub sensor_file: Option<String>,
    pub keyboard_backlight_path: Option<PathBuf>,
    pub screen_backlight_path: Option<PathBuf>,
    pub update_rate: Option<i64>,
    pub min_brightness: Option<i64>,
    pub brightness_factor: Option<f64>,
}

impl ConfigFile {
    /// Parse `key=value` text.
    ///
    /// A typed key whose value does not parse is an error naming the line.
    /// Malformed lines and unknown keys are skipped with a warning.
    pub fn parse(content: &str) -> Result<Self> {
        let mut file = ConfigFile::default();

        for (index, raw_line) in content.lines().enumerate() {
            let line_number = index + 1;
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                Log::log_warning(&format!(
                    "Ignoring line {} without '=': {}",
                    line_number, line
                ));
                continue;
            };
            let key = key.trim();
            let Some(value) = value.split_whitespace().next() else {
                Log::log_warning(&format!(
                    "Ignoring empty value for {} on line {}",
                    key, line_number
                ));
                continue;
            };

            match key {
                "sensor_path" => file.sensor_path = Some(PathBuf::from(value)),
                "sensor_file" => file.sensor_file = Some(value.to_string()),
                "keyboard_backlight_path" => {
                    file.keyboard_backlight_path = Some(PathBuf::from(value))
                }
                "screen_backlight_path" => file.screen_backlight_path = Some(PathBuf::from(value)),
                "update_rate" => {
                    file.update_rate = Some(value.parse().with_context(|| {
                        format!("Invalid update_rate on line {}: {}", line_number, value)
                    })?)
                }
                "min_brightness" => {
                    file.min_brightness = Some(value.parse().with_context(|| {
                        format!("Invalid min_brightness on line {}: {}", line_number, value)
                    })?)
                }
                "brightness_factor" => {
                    file.brightness_factor = Some(value.parse().with_context(|| {
                        format!("Invalid brightness_factor on line {}: {}", line_number, value)
                    })?)
                }
                unknown => {
                    Log::log_warning(&format!(
                        "Ignoring unknown config key '{}' on line {}",
                        unknown, line_number
                    ));
                }
            }
        }

        Ok(file)
    }
}

/// Resolved, validated configuration. Read-only once loaded.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory searched for the light sensor.
    pub sensor_path: PathBuf,
    /// Illumination attribute name, e.g. `in_illuminance_raw`.
    pub sensor_file: String,
    /// Resolved sensor device directory containing `sensor_file`.
    pub sensor_file_path: PathBuf,
    /// Recognized and reported; not driven by the daemon.
    pub keyboard_backlight_path: Option<PathBuf>,
    pub screen_backlight_path: PathBuf,
    pub update_rate: u64,         // seconds between ticks
    pub brightness_factor: f64,   // sensor units -> device units
    pub min_brightness: u8,       // percent floor for ambient mode
}

impl Config {
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().context("Could not determine the user configuration directory")?;
        Ok(config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load the configuration from the default location.
    ///
    /// A default file is written first if none exists.
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if !config_path.exists() {
            Log::log_block_start("No configuration found, creating default");
            Self::create_default_config(&config_path)
                .context("Failed to create default config during load")?;
            Log::log_indented(&format!(
                "Wrote {}",
                crate::utils::path_for_display(&config_path)
            ));
        }

        Self::load_from_path(&config_path).with_context(|| {
            format!(
                "Failed to load configuration from {}",
                config_path.display()
            )
        })
    }

    /// Load from a specific path. Does not create a default file.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!(
                "Configuration file not found at specified path: {}",
                path.display()
            );
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let file = ConfigFile::parse(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;

        Self::from_file(file)
    }

    /// Apply defaults, validate and resolve the sensor.
    pub fn from_file(file: ConfigFile) -> Result<Self> {
        let screen_backlight_path = file.screen_backlight_path.context(
            "screen_backlight_path is required (e.g. /sys/class/backlight/intel_backlight)",
        )?;

        let update_rate =
            check_update_rate(file.update_rate.unwrap_or(DEFAULT_UPDATE_RATE as i64))?;
        let min_brightness =
            check_min_brightness(file.min_brightness.unwrap_or(DEFAULT_MIN_BRIGHTNESS as i64))?;

        let mut config = Config {
            sensor_path: file
                .sensor_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SENSOR_PATH)),
            sensor_file: file
                .sensor_file
                .unwrap_or_else(|| DEFAULT_SENSOR_FILE.to_string()),
            sensor_file_path: PathBuf::new(),
            keyboard_backlight_path: file.keyboard_backlight_path,
            screen_backlight_path,
            update_rate,
            brightness_factor: file.brightness_factor.unwrap_or(DEFAULT_BRIGHTNESS_FACTOR),
            min_brightness,
        };

        validate_config(&config)?;

        config.sensor_file_path = find_sensor_device(&config.sensor_path, &config.sensor_file)?;

        Ok(config)
    }

    /// Write a commented default configuration to `path`.
    ///
    /// The screen backlight defaults to the first device found under
    /// `/sys/class/backlight`.
    pub fn create_default_config(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let screen_backlight = detect_screen_backlight(Path::new(BACKLIGHT_CLASS_PATH))
            .unwrap_or_else(|| PathBuf::from(FALLBACK_SCREEN_BACKLIGHT_PATH));

        let content = ConfigBuilder::new()
            .add_section("Light sensor")
            .add_setting(
                "sensor_path",
                DEFAULT_SENSOR_PATH,
                "Directory searched for an ambient light sensor",
            )
            .add_setting(
                "sensor_file",
                DEFAULT_SENSOR_FILE,
                "Illumination attribute the sensor must expose",
            )
            .add_section("Backlight devices")
            .add_setting(
                "screen_backlight_path",
                &screen_backlight.display().to_string(),
                "Screen backlight device directory",
            )
            .add_section("Daemon behavior")
            .add_setting(
                "update_rate",
                &DEFAULT_UPDATE_RATE.to_string(),
                "Seconds between ambient updates (1-3600)",
            )
            .add_setting(
                "brightness_factor",
                &format!("{:.1}", DEFAULT_BRIGHTNESS_FACTOR),
                "Multiplier from sensor reading to brightness units",
            )
            .add_setting(
                "min_brightness",
                &DEFAULT_MIN_BRIGHTNESS.to_string(),
                "Lowest brightness ambient mode may choose, in percent (0-100)",
            )
            .build();

        fs::write(path, content)
            .with_context(|| format!("Failed to write default config to {}", path.display()))
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_rate)
    }

    pub fn screen_backlight(&self) -> Backlight {
        Backlight::new(&self.screen_backlight_path)
    }

    pub fn sensor(&self) -> Sensor {
        Sensor::new(&self.sensor_file_path, &self.sensor_file)
    }

    pub fn log_config(&self) {
        let config_path = Self::get_config_path().unwrap_or_else(|_| {
            PathBuf::from("~/.config/backlight_manager/backlight_manager.conf")
        });

        Log::log_block_start(&format!(
            "Loaded configuration from {}",
            crate::utils::path_for_display(&config_path)
        ));
        Log::log_indented(&format!("Sensor path: {}", self.sensor_path.display()));
        Log::log_indented(&format!("Sensor file: {}", self.sensor_file));
        Log::log_indented(&format!(
            "Sensor file path: {}",
            self.sensor_file_path.display()
        ));
        Log::log_indented(&format!(
            "Keyboard backlight path: {}",
            self.keyboard_backlight_path
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(not set)".to_string())
        ));
        Log::log_indented(&format!(
            "Screen backlight path: {}",
            self.screen_backlight_path.display()
        ));
        Log::log_indented(&format!("Update rate: {} seconds", self.update_rate));
        Log::log_indented(&format!("Brightness factor: {}", self.brightness_factor));
        Log::log_indented(&format!("Minimum brightness: {}%", self.min_brightness));
    }
}

/// Range checks that do not need the filesystem.
pub fn validate_config(config: &Config) -> Result<()> {
    check_update_rate(i64::try_from(config.update_rate).unwrap_or(i64::MAX))?;
    check_min_brightness(i64::from(config.min_brightness))?;

    if !config.brightness_factor.is_finite() || config.brightness_factor < 0.0 {
        anyhow::bail!(
            "brightness_factor must be a finite, non-negative number (got {})",
            config.brightness_factor
        );
    }

    if config.sensor_file.is_empty() {
        anyhow::bail!("sensor_file must not be empty");
    }

    Ok(())
}

/// Seconds between ticks, as read from the file.
fn check_update_rate(raw: i64) -> Result<u64> {
    u64::try_from(raw)
        .ok()
        .filter(|rate| (MINIMUM_UPDATE_RATE..=MAXIMUM_UPDATE_RATE).contains(rate))
        .with_context(|| {
            format!(
                "update_rate must be between {} and {} seconds (got {})",
                MINIMUM_UPDATE_RATE, MAXIMUM_UPDATE_RATE, raw
            )
        })
}

/// Percent floor for ambient mode, as read from the file.
fn check_min_brightness(raw: i64) -> Result<u8> {
    u8::try_from(raw)
        .ok()
        .filter(|percent| *percent <= MAXIMUM_MIN_BRIGHTNESS)
        .with_context(|| {
            format!(
                "min_brightness must be between 0 and {} percent (got {})",
                MAXIMUM_MIN_BRIGHTNESS, raw
            )
        })
}

/// First backlight device directory in name order, if any.
fn detect_screen_backlight(class_path: &Path) -> Option<PathBuf> {
    let mut devices: Vec<PathBuf> = fs::read_dir(class_path)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .collect();
    devices.sort();
    devices.into_iter().next()
}

/// Builder for the commented default configuration file.
///
/// Each setting is preceded by its comment on a separate line.
struct ConfigBuilder {
    lines: Vec<String>,
}

impl ConfigBuilder {
    fn new() -> Self {
        Self { lines: Vec::new() }
    }

    fn add_section(mut self, title: &str) -> Self {
        if !self.lines.is_empty() {
            self.lines.push(String::new());
        }
        self.lines.push(format!("#[{}]", title));
        self
    }

    fn add_setting(mut self, key: &str, value: &str, comment: &str) -> Self {
        self.lines.push(format!("# {}", comment));
        self.lines.push(format!("{}={}", key, value));
        self
    }

    fn build(self) -> String {
        let mut content = self.lines.join("\n");
        content.push('\n');
        content
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::test_constants::*;
    use serial_test::serial;
    use tempfile::tempdir;

    /// Build a fake sysfs tree with one sensor and return its root.
    fn fake_sensor_root() -> tempfile::TempDir {
        let root = tempdir().unwrap();
        let device = root.path().join(TEST_SENSOR_DEVICE);
        fs::create_dir_all(&device).unwrap();
        fs::write(device.join(TEST_SENSOR_FILE), "100\n").unwrap();
        root
    }

    fn create_test_config(update_rate: u64, min_brightness: u8, brightness_factor: f64) -> Config {
        Config {
            sensor_path: PathBuf::from(DEFAULT_SENSOR_PATH),
            sensor_file: DEFAULT_SENSOR_FILE.to_string(),
            sensor_file_path: PathBuf::from("/sys/bus/iio/devices/iio:device0"),
            keyboard_backlight_path: None,
            screen_backlight_path: PathBuf::from(FALLBACK_SCREEN_BACKLIGHT_PATH),
            update_rate,
            brightness_factor,
            min_brightness,
        }
    }

    #[test]
    fn test_parse_all_keys() {
        let content = "\
sensor_path=/sys/bus/iio/devices
sensor_file=in_illuminance_input
keyboard_backlight_path=/sys/class/leds/kbd
screen_backlight_path=/sys/class/backlight/acpi_video0
update_rate=3
min_brightness=15
brightness_factor=2.5
";
        let file = ConfigFile::parse(content).unwrap();
        assert_eq!(file.sensor_path, Some(PathBuf::from("/sys/bus/iio/devices")));
        assert_eq!(file.sensor_file.as_deref(), Some("in_illuminance_input"));
        assert_eq!(file.keyboard_backlight_path, Some(PathBuf::from("/sys/class/leds/kbd")));
        assert_eq!(
            file.screen_backlight_path,
            Some(PathBuf::from("/sys/class/backlight/acpi_video0"))
        );
        assert_eq!(file.update_rate, Some(3));
        assert_eq!(file.min_brightness, Some(15));
        assert_eq!(file.brightness_factor, Some(2.5));
    }

    #[test]
    fn test_parse_ignores_comments_blanks_and_unknown_keys() {
        let content = "\n# comment\n  \nfavorite_color=blue\nupdate_rate=7\nnot a setting\n";
        let file = ConfigFile::parse(content).unwrap();
        assert_eq!(
            file,
            ConfigFile {
                update_rate: Some(7),
                ..ConfigFile::default()
            }
        );
    }

    #[test]
    fn test_parse_takes_first_token_of_value() {
        let file = ConfigFile::parse("update_rate = 4   # every few seconds").unwrap();
        assert_eq!(file.update_rate, Some(4));
    }

    #[test]
    fn test_parse_later_key_wins() {
        let file = ConfigFile::parse("update_rate=4\nupdate_rate=9").unwrap();
        assert_eq!(file.update_rate, Some(9));
    }

    #[test]
    fn test_parse_invalid_number_names_line() {
        let err = ConfigFile::parse("update_rate=2\nbrightness_factor=bright").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_from_file_applies_defaults_and_resolves_sensor() {
        let root = fake_sensor_root();
        let file = ConfigFile {
            sensor_path: Some(root.path().to_path_buf()),
            screen_backlight_path: Some(PathBuf::from("/sys/class/backlight/test")),
            ..ConfigFile::default()
        };

        let config = Config::from_file(file).unwrap();
        assert_eq!(config.sensor_file, DEFAULT_SENSOR_FILE);
        assert_eq!(config.sensor_file_path, root.path().join(TEST_SENSOR_DEVICE));
        assert_eq!(config.update_rate, DEFAULT_UPDATE_RATE);
        assert_eq!(config.min_brightness, DEFAULT_MIN_BRIGHTNESS);
        assert_eq!(config.brightness_factor, DEFAULT_BRIGHTNESS_FACTOR);
        assert_eq!(config.update_interval(), Duration::from_secs(DEFAULT_UPDATE_RATE));
        assert_eq!(
            config.sensor().attribute(),
            root.path().join(TEST_SENSOR_DEVICE).join(TEST_SENSOR_FILE)
        );
    }

    #[test]
    fn test_from_file_requires_screen_backlight() {
        let root = fake_sensor_root();
        let file = ConfigFile {
            sensor_path: Some(root.path().to_path_buf()),
            ..ConfigFile::default()
        };
        let err = Config::from_file(file).unwrap_err();
        assert!(err.to_string().contains("screen_backlight_path"));
    }

    #[test]
    fn test_from_file_missing_sensor_is_fatal() {
        let root = tempdir().unwrap();
        let file = ConfigFile {
            sensor_path: Some(root.path().to_path_buf()),
            screen_backlight_path: Some(PathBuf::from("/sys/class/backlight/test")),
            ..ConfigFile::default()
        };
        let err = Config::from_file(file).unwrap_err();
        assert!(err.to_string().contains("Sensor file not found"));
    }

    #[test]
    fn test_from_file_rejects_out_of_range_values() {
        let root = fake_sensor_root();
        let base = ConfigFile {
            sensor_path: Some(root.path().to_path_buf()),
            screen_backlight_path: Some(PathBuf::from("/sys/class/backlight/test")),
            ..ConfigFile::default()
        };

        for update_rate in [0, -5, 3601] {
            let file = ConfigFile {
                update_rate: Some(update_rate),
                ..base.clone()
            };
            assert!(Config::from_file(file).is_err(), "update_rate {}", update_rate);
        }

        for min_brightness in [-1, 101, 300] {
            let file = ConfigFile {
                min_brightness: Some(min_brightness),
                ..base.clone()
            };
            assert!(Config::from_file(file).is_err(), "min_brightness {}", min_brightness);
        }

        let file = ConfigFile {
            brightness_factor: Some(-0.5),
            ..base
        };
        assert!(Config::from_file(file).is_err());
    }

    #[test]
    fn test_validate_config_basic() {
        assert!(validate_config(&create_test_config(5, 10, 1.0)).is_ok());
        assert!(validate_config(&create_test_config(1, 0, 0.0)).is_ok());
        assert!(validate_config(&create_test_config(3600, 100, 40.0)).is_ok());
    }

    #[test]
    fn test_range_limits_shared_by_file_and_value_checks() {
        for rate in [0, 3601] {
            assert!(validate_config(&create_test_config(rate, 10, 1.0)).is_err());
            assert!(check_update_rate(rate as i64).is_err());
        }
        assert!(validate_config(&create_test_config(5, 101, 1.0)).is_err());
        assert!(check_min_brightness(101).is_err());

        let err = check_update_rate(-5).unwrap_err();
        assert!(err.to_string().contains("got -5"));
        assert_eq!(check_min_brightness(100).unwrap(), 100);
    }

    #[test]
    fn test_validate_config_rejects_non_finite_factor() {
        assert!(validate_config(&create_test_config(5, 10, f64::NAN)).is_err());
        assert!(validate_config(&create_test_config(5, 10, f64::INFINITY)).is_err());
    }

    #[test]
    fn test_default_config_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME);
        Config::create_default_config(&path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let file = ConfigFile::parse(&content).unwrap();
        assert_eq!(file.sensor_path, Some(PathBuf::from(DEFAULT_SENSOR_PATH)));
        assert_eq!(file.sensor_file.as_deref(), Some(DEFAULT_SENSOR_FILE));
        assert_eq!(file.update_rate, Some(DEFAULT_UPDATE_RATE as i64));
        assert_eq!(file.min_brightness, Some(DEFAULT_MIN_BRIGHTNESS as i64));
        assert_eq!(file.brightness_factor, Some(DEFAULT_BRIGHTNESS_FACTOR));
        assert!(file.screen_backlight_path.is_some());
    }

    #[test]
    fn test_detect_screen_backlight_first_entry() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("intel_backlight")).unwrap();
        fs::create_dir_all(dir.path().join("acpi_video0")).unwrap();
        assert_eq!(
            detect_screen_backlight(dir.path()),
            Some(dir.path().join("acpi_video0"))
        );
        assert_eq!(detect_screen_backlight(&dir.path().join("absent")), None);
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let dir = tempdir().unwrap();
        assert!(Config::load_from_path(&dir.path().join("missing.conf")).is_err());
    }

    #[test]
    #[serial]
    fn test_config_load_default_creation() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME);

        let original = std::env::var("XDG_CONFIG_HOME").ok();
        unsafe {
            std::env::set_var("XDG_CONFIG_HOME", temp_dir.path());
        }

        // The host may have no light sensor, so only file creation is asserted
        let _ = Config::load();

        unsafe {
            match original {
                Some(val) => std::env::set_var("XDG_CONFIG_HOME", val),
                None => std::env::remove_var("XDG_CONFIG_HOME"),
            }
        }

        assert!(config_path.exists());
    }
}
