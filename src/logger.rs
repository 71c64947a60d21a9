//! Console output for client invocations and the foreground loop.
//!
//! Every invocation prints a short tree: a version header, one branch per
//! step (config loaded, daemon found, command sent), and an end marker.
//! `[ERR]` and `[CRIT]` lines go to stderr so a failing `--set` or `--kill`
//! is visible even when stdout is redirected; everything else goes to stdout.
//!
//! A daemon started with `--daemon` logs up to the moment it detaches. From
//! then on both streams point at `/dev/null`: received commands, ambient
//! changes and the reason the loop stopped are not recorded anywhere. That is
//! why device and runtime-file checks happen before detaching.

use std::sync::atomic::{AtomicBool, Ordering};

static LOGGING_ENABLED: AtomicBool = AtomicBool::new(true);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Log,
    Warn,
    /// Recoverable failure, printed to stderr
    Err,
    /// The invocation is about to exit non-zero, printed to stderr
    Crit,
    Info,
}

impl LogLevel {
    pub fn prefix(self) -> &'static str {
        match self {
            LogLevel::Log => "[LOG]",
            LogLevel::Warn => "[WARN]",
            LogLevel::Err => "[ERR]",
            LogLevel::Crit => "[CRIT]",
            LogLevel::Info => "[INFO]",
        }
    }

    pub fn to_stderr(self) -> bool {
        matches!(self, LogLevel::Err | LogLevel::Crit)
    }
}

pub struct Log;

impl Log {
    /// Silence all output; tests use this to keep the loop quiet.
    pub fn set_enabled(enabled: bool) {
        LOGGING_ENABLED.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled() -> bool {
        LOGGING_ENABLED.load(Ordering::SeqCst)
    }

    pub fn log(level: LogLevel, message: &str) {
        if !Self::is_enabled() {
            return;
        }
        if level.to_stderr() {
            eprintln!("{} {}", level.prefix(), message);
        } else {
            println!("{} {}", level.prefix(), message);
        }
    }

    pub fn log_error(message: &str) {
        Self::log(LogLevel::Err, message);
    }

    pub fn log_warning(message: &str) {
        Self::log(LogLevel::Warn, message);
    }

    pub fn log_info(message: &str) {
        Self::log(LogLevel::Info, message);
    }

    pub fn log_debug(message: &str) {
        Self::log(LogLevel::Log, message);
    }

    pub fn log_critical(message: &str) {
        Self::log(LogLevel::Crit, message);
    }

    // ═══ Tree decorations ═══

    /// A step of the current invocation.
    pub fn log_decorated(message: &str) {
        Self::print_line(&format!("┣ {}", message));
    }

    /// Detail under the last step, e.g. one configuration value.
    pub fn log_indented(message: &str) {
        Self::print_line(&format!("┃   {}", message));
    }

    pub fn log_pipe() {
        Self::print_line("┃");
    }

    /// Start a new group of steps: loop start, shutdown, status section.
    pub fn log_block_start(message: &str) {
        Self::log_pipe();
        Self::log_decorated(message);
    }

    pub fn log_version() {
        let version = env!("CARGO_PKG_VERSION");
        Self::print_line(&format!("┏ backlight_manager v{} ━━╸", version));
        Self::log_pipe();
    }

    pub fn log_end() {
        Self::print_line("╹");
    }

    fn print_line(line: &str) {
        if Self::is_enabled() {
            println!("{}", line);
        }
    }
}
