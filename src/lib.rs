//! # backlight_manager
//!
//! Screen backlight control for Linux sysfs devices, with an optional
//! ambient-light mode that follows an IIO illuminance sensor.
//!
//! A single background daemon owns the control loop; later invocations
//! forward brightness adjustments and ambient-mode toggles to it over a named
//! pipe.
//!
//! ## Architecture
//!
//! - **args**: Command-line parsing into a single action
//! - **backlight**: Reading and writing sysfs brightness attributes
//! - **commands**: Handlers for each command-line action
//! - **config**: Configuration loading, validation, and default generation
//! - **constants**: Application-wide constants and defaults
//! - **daemon**: The control loop and its state
//! - **ipc**: The fixed-size command format and the named-pipe channel
//! - **logger**: Structured logging with visual formatting
//! - **process**: Process record, single-instance lock, detaching and stopping
//! - **sensor**: Ambient light sensor discovery and reading
//! - **signals**: Turning termination signals into a cleared running flag
//! - **utils**: Small shared helpers

pub mod args;
pub mod backlight;
pub mod commands;
pub mod config;
pub mod constants;
pub mod daemon;
pub mod ipc;
pub mod logger;
pub mod process;
pub mod sensor;
pub mod signals;
pub mod utils;

// Re-export important types for easier access
pub use args::{CliAction, ParsedArgs};
pub use backlight::Backlight;
pub use config::Config;
pub use daemon::{Daemon, DaemonState, TickReport};
pub use ipc::{Command, CommandInbox};
pub use logger::{Log, LogLevel};
pub use process::RuntimePaths;
pub use sensor::Sensor;
