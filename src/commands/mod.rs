//! Command-line command handlers for backlight_manager.
//!
//! Each CLI action is implemented in its own submodule:
//! - `control`: brightness adjustment, ambient mode and daemon startup
//! - `kill`: terminating the running daemon
//! - `status`: printing configuration and daemon state

pub mod control;
pub mod kill;
pub mod status;
