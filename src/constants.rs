//! Application constants and default values for backlight_manager.
//!
//! Configuration defaults, validation limits, file names and operational
//! timing used throughout the application.

// ═══ Application Configuration Defaults ═══
// Used when a key is absent from backlight_manager.conf

pub const DEFAULT_SENSOR_PATH: &str = "/sys/bus/iio/devices";
pub const DEFAULT_SENSOR_FILE: &str = "in_illuminance_raw";
pub const DEFAULT_UPDATE_RATE: u64 = 5; // seconds between daemon ticks
pub const DEFAULT_BRIGHTNESS_FACTOR: f64 = 1.0; // raw sensor units -> device units
pub const DEFAULT_MIN_BRIGHTNESS: u8 = 0; // percent of max_brightness

// Directory scanned when generating a default config
pub const BACKLIGHT_CLASS_PATH: &str = "/sys/class/backlight";
pub const FALLBACK_SCREEN_BACKLIGHT_PATH: &str = "/sys/class/backlight/intel_backlight";

// ═══ Validation Limits ═══

pub const MINIMUM_UPDATE_RATE: u64 = 1; // seconds
pub const MAXIMUM_UPDATE_RATE: u64 = 3600; // seconds (1 hour)
pub const MAXIMUM_MIN_BRIGHTNESS: u8 = 100; // percent

// ═══ File Names ═══

pub const CONFIG_DIR_NAME: &str = "backlight_manager";
pub const CONFIG_FILE_NAME: &str = "backlight_manager.conf";
pub const RECORD_FILE_NAME: &str = "backlight_manager.pid";
pub const CHANNEL_FILE_NAME: &str = "backlight_manager.fifo";
pub const FALLBACK_RUNTIME_DIR: &str = "/tmp";

// Backlight device attributes
pub const BRIGHTNESS_FILE: &str = "brightness";
pub const ACTUAL_BRIGHTNESS_FILE: &str = "actual_brightness";
pub const MAX_BRIGHTNESS_FILE: &str = "max_brightness";

// ═══ IPC ═══

pub const CHANNEL_MODE: u32 = 0o666; // world-writable named pipe
pub const SEND_TIMEOUT_MS: u64 = 1000; // how long a client waits for a reader
pub const SEND_RETRY_INTERVAL_MS: u64 = 50;

// ═══ Operational Timing Constants ═══

pub const CHECK_INTERVAL_SECS: u64 = 1; // How often to check the running flag during sleep

// ═══ Exit Codes ═══

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1; // General failure and unrecognized options
