//! Terminating the running daemon.

use anyhow::Result;

use crate::process::{self, RuntimePaths, StopOutcome};

/// Handle `--kill`.
///
/// Works without a configuration file and succeeds when no daemon is running.
pub fn handle_kill_command(paths: &RuntimePaths) -> Result<StopOutcome> {
    process::stop(paths)
}
