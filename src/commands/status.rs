//! Printing configuration, daemon state and current brightness.

use anyhow::Result;

use crate::backlight::Backlight;
use crate::config::Config;
use crate::logger::Log;
use crate::process::{self, RuntimePaths};

/// Format a brightness reading as `actual/max (percent%)`.
pub fn format_brightness(actual: i64, max_brightness: i64) -> String {
    let percent = if max_brightness > 0 {
        (actual as f64 / max_brightness as f64 * 100.0).round() as i64
    } else {
        0
    };
    format!("{}/{} ({}%)", actual, max_brightness, percent)
}

/// Handle `--print-status`.
pub fn handle_status_command(paths: &RuntimePaths) -> Result<()> {
    let config = Config::load()?;
    config.log_config();

    Log::log_block_start("Status");
    match process::running_daemon_pid(paths) {
        Some(pid) => Log::log_indented(&format!("Daemon: running (PID: {})", pid)),
        None => Log::log_indented("Daemon: not running"),
    }

    log_brightness(&config.screen_backlight());
    Ok(())
}

fn log_brightness(backlight: &Backlight) {
    let reading = backlight
        .max_brightness()
        .and_then(|max| Ok((backlight.actual_brightness()?, max)));

    match reading {
        Ok((actual, max)) => {
            Log::log_indented(&format!("Screen brightness: {}", format_brightness(actual, max)))
        }
        Err(e) => Log::log_warning(&format!("Could not read screen brightness: {:#}", e)),
    }
}
