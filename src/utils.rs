//! Utility functions shared across the codebase.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::constants::CHECK_INTERVAL_SECS;

/// Replace the home directory prefix of a path with `~` for display.
///
/// # Examples
/// ```
/// use std::path::Path;
/// use backlight_manager::utils::path_for_display;
/// let shown = path_for_display(Path::new("/etc/backlight_manager.conf"));
/// assert!(shown.ends_with("backlight_manager.conf"));
/// ```
pub fn path_for_display(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(relative) = path.strip_prefix(&home) {
            return format!("~/{}", relative.display());
        }
    }
    path.display().to_string()
}

/// Sleep for `duration`, waking every `CHECK_INTERVAL_SECS` to check `running`.
///
/// Returns early once `running` is false.
pub fn sleep_while_running(duration: Duration, running: &AtomicBool) {
    let check_interval = Duration::from_secs(CHECK_INTERVAL_SECS);
    let mut slept = Duration::ZERO;
    while slept < duration && running.load(Ordering::SeqCst) {
        let sleep_chunk = check_interval.min(duration - slept);
        thread::sleep(sleep_chunk);
        slept += sleep_chunk;
    }
}
