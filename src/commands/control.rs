//! Brightness adjustment, ambient mode and daemon startup.
//!
//! This command operates in one of four ways:
//! 1. **Daemon already running**: the request is forwarded over the command
//!    channel and the invocation exits.
//! 2. **`--daemon`**: the process detaches and becomes the daemon.
//! 3. **`--ambient` without a daemon**: the control loop runs in the
//!    foreground until interrupted.
//! 4. **`--set` only**: the adjustment is applied once, synchronously.

use anyhow::{Context, Result};

use crate::backlight::Backlight;
use crate::config::Config;
use crate::daemon::{Daemon, Devices};
use crate::ipc::{self, Command, NoInbox};
use crate::logger::Log;
use crate::process::{self, RuntimePaths};
use crate::signals::setup_signal_handler;

/// What a run invocation resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Forward the command to the daemon with this PID
    Forward(i32),
    /// Become the daemon
    StartDaemon,
    /// Run the ambient loop in the foreground
    Foreground,
    /// Apply a single adjustment and exit
    OneShot,
    /// Nothing was requested
    Idle,
}

/// Decide how to handle the request given the running daemon, if any.
pub fn resolve_mode(
    running_pid: Option<i32>,
    ambient: bool,
    daemon: bool,
    adjustment: i32,
) -> RunMode {
    match running_pid {
        Some(pid) => RunMode::Forward(pid),
        None if daemon => RunMode::StartDaemon,
        None if ambient => RunMode::Foreground,
        None if adjustment != 0 => RunMode::OneShot,
        None => RunMode::Idle,
    }
}

/// Handle a run invocation (`--set`, `--ambient`, `--daemon`).
pub fn handle_run_command(
    ambient: bool,
    daemon: bool,
    adjustment: i32,
    paths: &RuntimePaths,
) -> Result<()> {
    let config = Config::load()?;

    match resolve_mode(process::running_daemon_pid(paths), ambient, daemon, adjustment) {
        RunMode::Forward(pid) => {
            forward_to_daemon(pid, Command::new(adjustment, ambient), paths)
        }
        RunMode::StartDaemon => run_daemon(&config, paths, ambient, adjustment),
        RunMode::Foreground => run_foreground(&config, adjustment),
        RunMode::OneShot => {
            apply_adjustment_once(&config.screen_backlight(), adjustment)?;
            Ok(())
        }
        RunMode::Idle => {
            Log::log_decorated("Nothing to do. See --help for usage.");
            Ok(())
        }
    }
}

fn forward_to_daemon(pid: i32, command: Command, paths: &RuntimePaths) -> Result<()> {
    if command.is_noop() {
        Log::log_decorated(&format!(
            "Daemon already running (PID: {}), nothing to send",
            pid
        ));
        return Ok(());
    }

    Log::log_decorated(&format!(
        "Found running daemon (PID: {}), sending command...",
        pid
    ));
    ipc::send(&paths.channel, command)?;
    Log::log_decorated("Command sent");
    Ok(())
}

/// Read the device state and apply `adjustment` percent once.
///
/// Returns the value written.
pub fn apply_adjustment_once(backlight: &Backlight, adjustment: i32) -> Result<i64> {
    let max_brightness = backlight
        .max_brightness()
        .context("Failed to read maximum screen brightness")?;
    let written = backlight.adjust_brightness(adjustment, max_brightness)?;
    Log::log_decorated(&format!(
        "Brightness set to {}/{} ({:+}%)",
        written, max_brightness, adjustment
    ));
    Ok(written)
}

fn run_daemon(
    config: &Config,
    paths: &RuntimePaths,
    ambient: bool,
    adjustment: i32,
) -> Result<()> {
    // Device errors must reach the terminal, so check them before detaching
    let devices = Devices::open(config, ambient)?;
    let (handle, inbox, signals) = process::start(paths)?;

    let mut daemon = Daemon::with_devices(devices, inbox, ambient, adjustment);
    let result = daemon.run(&signals.running);

    if let Err(e) = &result {
        Log::log_critical(&format!("Daemon stopped: {:#}", e));
    }

    Log::log_block_start("Shutting down backlight_manager...");
    handle.shutdown();
    result
}

fn run_foreground(config: &Config, adjustment: i32) -> Result<()> {
    let signals = setup_signal_handler(false)?;
    let mut daemon = Daemon::new(config, NoInbox, true, adjustment)?;
    daemon.run(&signals.running)
}
