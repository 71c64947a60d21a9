//! Signal handling for the control loop.
//!
//! Termination requests (`SIGTERM`, `SIGINT`) never interrupt a tick. A
//! helper thread turns them into a cleared `running` flag that the loop checks
//! at tick boundaries and while sleeping; the loop then returns and the caller
//! removes the process record and the channel before exiting.
//!
//! `SIGHUP` is ignored by a detached daemon and treated as a termination
//! request by a foreground instance.

use anyhow::{Context, Result};
use signal_hook::{
    consts::signal::{SIGHUP, SIGINT, SIGTERM},
    iterator::Signals,
};
use std::{
    sync::Arc,
    sync::atomic::{AtomicBool, Ordering},
    thread,
};

use crate::logger::Log;

/// Signal handling state shared with the control loop.
pub struct SignalState {
    /// Cleared once a termination request has been received
    pub running: Arc<AtomicBool>,
}

impl SignalState {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// What a received signal means for the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    Shutdown,
    Ignore,
}

pub fn action_for(signal: i32, detached: bool) -> SignalAction {
    match signal {
        SIGHUP if detached => SignalAction::Ignore,
        SIGHUP | SIGINT | SIGTERM => SignalAction::Shutdown,
        _ => SignalAction::Ignore,
    }
}

/// Register handlers and spawn the thread that watches for signals.
///
/// # Arguments
/// * `detached` - whether the process has left its terminal (daemon mode)
pub fn setup_signal_handler(detached: bool) -> Result<SignalState> {
    let running = Arc::new(AtomicBool::new(true));

    let mut signals =
        Signals::new([SIGINT, SIGTERM, SIGHUP]).context("failed to register signal handlers")?;

    let running_clone = running.clone();
    thread::spawn(move || {
        for signal in signals.forever() {
            match action_for(signal, detached) {
                SignalAction::Shutdown => {
                    Log::log_pipe();
                    Log::log_info(&format!("Shutdown signal received: {}", signal));
                    running_clone.store(false, Ordering::SeqCst);
                }
                SignalAction::Ignore => {
                    Log::log_debug(&format!("Ignoring signal {}", signal));
                }
            }
        }
    });

    Ok(SignalState { running })
}
