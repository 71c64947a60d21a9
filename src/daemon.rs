//! The control loop that drives the screen backlight.
//!
//! Every tick runs the same fixed sequence:
//!
//! 1. **Drain** at most one command from the inbox. Its adjustment overwrites
//!    any pending one; a toggle request flips ambient mode.
//! 2. **One-shot**: a pending adjustment is applied relative to the current
//!    actual brightness, then cleared.
//! 3. **Ambient**: while ambient mode is on, the sensor reading times the
//!    brightness factor (floored at the minimum brightness) is written.
//! 4. **Idle** for the update interval.
//!
//! Step 3 runs after step 2 within the same tick, so with ambient mode on a
//! one-shot adjustment is immediately replaced by the ambient value.

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::backlight::{Backlight, percent_to_units};
use crate::config::Config;
use crate::ipc::{Command, CommandInbox};
use crate::logger::Log;
use crate::sensor::Sensor;

/// Mutable state owned by the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaemonState {
    pub ambient_mode: bool,
    /// Percent of max queued for one-shot application; `0` means none.
    pub pending_adjustment: i32,
    /// Read once at startup.
    pub max_brightness: i64,
}

impl DaemonState {
    pub fn new(ambient_mode: bool, pending_adjustment: i32, max_brightness: i64) -> Self {
        Self {
            ambient_mode,
            pending_adjustment,
            max_brightness,
        }
    }

    /// Fold a received command into the state.
    pub fn apply_command(&mut self, command: Command) {
        self.pending_adjustment = command.adjustment;
        if command.ambient_toggle_requested {
            self.ambient_mode = !self.ambient_mode;
        }
    }
}

/// Target brightness for a sensor reading, before clamping.
pub fn ambient_brightness(illumination: f64, brightness_factor: f64, floor: i64) -> i64 {
    ((illumination * brightness_factor) as i64).max(floor)
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub command: Option<Command>,
    /// Value written by the one-shot adjustment
    pub adjusted: Option<i64>,
    /// Value written by ambient tracking
    pub ambient: Option<i64>,
}

/// Everything the loop touches outside the process, checked before it runs.
///
/// Built from configuration in the foreground so that a wrong backlight or
/// sensor path is reported on the terminal, not after detaching.
#[derive(Debug, Clone)]
pub struct Devices {
    backlight: Backlight,
    sensor: Sensor,
    brightness_factor: f64,
    /// `min_brightness` converted to device units
    brightness_floor: i64,
    max_brightness: i64,
    interval: Duration,
}

impl Devices {
    /// Read `max_brightness` once and check the other attributes can be used.
    ///
    /// The sensor is sampled only when ambient mode starts enabled; a sensor
    /// that breaks later still ends the loop.
    pub fn open(config: &Config, ambient_mode: bool) -> Result<Self> {
        let backlight = config.screen_backlight();
        let max_brightness = backlight
            .max_brightness()
            .context("Failed to read maximum screen brightness")?;
        backlight
            .actual_brightness()
            .context("Failed to read current screen brightness")?;
        backlight.check_writable()?;

        let sensor = config.sensor();
        if ambient_mode {
            sensor
                .read_illumination()
                .context("Ambient mode requested but the light sensor is unreadable")?;
        }

        Ok(Self {
            backlight,
            sensor,
            brightness_factor: config.brightness_factor,
            brightness_floor: percent_to_units(config.min_brightness, max_brightness),
            max_brightness,
            interval: config.update_interval(),
        })
    }

    pub fn max_brightness(&self) -> i64 {
        self.max_brightness
    }
}

pub struct Daemon<I: CommandInbox> {
    devices: Devices,
    inbox: I,
    state: DaemonState,
}

impl<I: CommandInbox> Daemon<I> {
    /// Open the devices and build the loop in one step.
    ///
    /// # Arguments
    /// * `ambient_mode` - whether ambient tracking starts enabled
    /// * `pending_adjustment` - a one-shot adjustment to apply on the first tick
    pub fn new(
        config: &Config,
        inbox: I,
        ambient_mode: bool,
        pending_adjustment: i32,
    ) -> Result<Self> {
        let devices = Devices::open(config, ambient_mode)?;
        Ok(Self::with_devices(devices, inbox, ambient_mode, pending_adjustment))
    }

    /// Attach an inbox to devices that were opened earlier.
    pub fn with_devices(
        devices: Devices,
        inbox: I,
        ambient_mode: bool,
        pending_adjustment: i32,
    ) -> Self {
        let state = DaemonState::new(ambient_mode, pending_adjustment, devices.max_brightness);
        Self {
            devices,
            inbox,
            state,
        }
    }

    pub fn state(&self) -> DaemonState {
        self.state
    }

    pub fn brightness_floor(&self) -> i64 {
        self.devices.brightness_floor
    }

    pub fn inbox_mut(&mut self) -> &mut I {
        &mut self.inbox
    }

    /// Run one iteration of the loop body, without the idle step.
    ///
    /// Device and sensor I/O errors are returned to the caller, which ends
    /// the daemon.
    pub fn tick(&mut self) -> Result<TickReport> {
        let mut report = TickReport::default();

        if let Some(command) = self.inbox.try_receive() {
            let was_ambient = self.state.ambient_mode;
            self.state.apply_command(command);
            report.command = Some(command);

            Log::log_block_start(&format!(
                "Received command: adjustment {}%, toggle ambient: {}",
                command.adjustment, command.ambient_toggle_requested
            ));
            if was_ambient != self.state.ambient_mode {
                Log::log_decorated(&format!(
                    "Ambient mode {}",
                    if self.state.ambient_mode { "enabled" } else { "disabled" }
                ));
            }
        }

        if self.state.pending_adjustment != 0 {
            let written = self
                .devices
                .backlight
                .adjust_brightness(self.state.pending_adjustment, self.state.max_brightness)?;
            Log::log_decorated(&format!(
                "Adjusted brightness by {}% to {}/{}",
                self.state.pending_adjustment, written, self.state.max_brightness
            ));
            self.state.pending_adjustment = 0;
            report.adjusted = Some(written);
        }

        if self.state.ambient_mode {
            let devices = &self.devices;
            let illumination = devices.sensor.read_illumination()?;
            let target = ambient_brightness(
                illumination,
                devices.brightness_factor,
                devices.brightness_floor,
            );
            let written = devices
                .backlight
                .set_brightness(target, self.state.max_brightness)?;
            report.ambient = Some(written);
        }

        Ok(report)
    }

    /// Tick until `running` is cleared, sleeping the update interval in between.
    pub fn run(&mut self, running: &AtomicBool) -> Result<()> {
        Log::log_block_start(&format!(
            "Control loop started (ambient mode: {}, update every {} seconds)",
            if self.state.ambient_mode { "on" } else { "off" },
            self.devices.interval.as_secs()
        ));

        let mut last_ambient: Option<i64> = None;
        while running.load(Ordering::SeqCst) {
            let report = self.tick()?;

            if let Some(value) = report.ambient {
                if last_ambient != Some(value) {
                    Log::log_decorated(&format!(
                        "Ambient brightness {}/{}",
                        value, self.state.max_brightness
                    ));
                }
            }
            last_ambient = report.ambient;

            crate::utils::sleep_while_running(self.devices.interval, running);
        }

        Log::log_block_start("Control loop stopped");
        Ok(())
    }
}
