//! Command channel between client invocations and the running daemon.
//!
//! The transport is a named pipe. The daemon holds it open for reading in
//! non-blocking mode and polls it once per tick; clients open it for writing,
//! write a single fixed-size message and close it.
//!
//! ## Wire format
//!
//! Every message is exactly [`COMMAND_SIZE`] bytes:
//!
//! | offset | size | field                                   |
//! |--------|------|-----------------------------------------|
//! | 0      | 4    | adjustment, `i32` little-endian percent |
//! | 4      | 1    | ambient toggle, `0` or `1`              |
//!
//! Messages are far below `PIPE_BUF`, so concurrent client writes never
//! interleave within a message.

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::fs::{FileTypeExt, OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use nix::sys::stat::Mode;
use nix::unistd::mkfifo;

use crate::constants::*;
use crate::logger::Log;

pub const COMMAND_SIZE: usize = 5;

/// A request from a client invocation to the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Command {
    /// Relative brightness change in percent of maximum; `0` means none.
    pub adjustment: i32,
    /// Flip ambient mode. This is a toggle, not a desired state.
    pub ambient_toggle_requested: bool,
}

impl Command {
    pub fn new(adjustment: i32, ambient_toggle_requested: bool) -> Self {
        Self {
            adjustment,
            ambient_toggle_requested,
        }
    }

    /// Whether sending this command would change anything in the daemon.
    pub fn is_noop(&self) -> bool {
        self.adjustment == 0 && !self.ambient_toggle_requested
    }

    pub fn encode(&self) -> [u8; COMMAND_SIZE] {
        let mut bytes = [0u8; COMMAND_SIZE];
        bytes[..4].copy_from_slice(&self.adjustment.to_le_bytes());
        bytes[4] = u8::from(self.ambient_toggle_requested);
        bytes
    }

    /// Decode a message. Anything but an exact, well-formed record is `None`.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != COMMAND_SIZE {
            return None;
        }
        let adjustment = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let ambient_toggle_requested = match bytes[4] {
            0 => false,
            1 => true,
            _ => return None,
        };
        Some(Self {
            adjustment,
            ambient_toggle_requested,
        })
    }
}

/// Receive side of the command channel as seen by the control loop.
#[cfg_attr(test, mockall::automock)]
pub trait CommandInbox {
    /// One non-blocking attempt to take the next command.
    ///
    /// Returns `None` when nothing is pending, the writer side is absent, or
    /// the data read was not a complete command. Must never block.
    fn try_receive(&mut self) -> Option<Command>;
}

/// Inbox that never yields a command; drives foreground ambient mode.
#[derive(Debug, Default)]
pub struct NoInbox;

impl CommandInbox for NoInbox {
    fn try_receive(&mut self) -> Option<Command> {
        None
    }
}

/// In-memory inbox for driving the control loop without a pipe.
#[cfg(any(test, feature = "testing-support"))]
#[derive(Debug, Default)]
pub struct MemoryInbox {
    queue: std::collections::VecDeque<Command>,
}

#[cfg(any(test, feature = "testing-support"))]
impl MemoryInbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: Command) {
        self.queue.push_back(command);
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(any(test, feature = "testing-support"))]
impl CommandInbox for MemoryInbox {
    fn try_receive(&mut self) -> Option<Command> {
        self.queue.pop_front()
    }
}

/// Create the named pipe at `path` if it does not exist yet.
///
/// The mode is forced to `0666` regardless of the umask so any user's client
/// can write to it. An existing non-pipe file at `path` is an error.
pub fn create_channel(path: &Path) -> Result<()> {
    match std::fs::metadata(path) {
        Ok(metadata) if metadata.file_type().is_fifo() => {}
        Ok(_) => anyhow::bail!(
            "{} exists and is not a named pipe; remove it and try again",
            path.display()
        ),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            mkfifo(path, Mode::from_bits_truncate(CHANNEL_MODE))
                .with_context(|| format!("Failed to create named pipe {}", path.display()))?;
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to inspect {}", path.display()));
        }
    }

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(CHANNEL_MODE))
        .with_context(|| format!("Failed to set permissions on {}", path.display()))
}

/// Daemon side of the named pipe.
///
/// Opened read-only with `O_NONBLOCK`; with no writer attached a read yields
/// zero bytes, which is treated as "no command".
#[derive(Debug)]
pub struct FifoInbox {
    file: File,
    path: PathBuf,
}

impl FifoInbox {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)
            .with_context(|| format!("Failed to open command channel {}", path.display()))?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CommandInbox for FifoInbox {
    fn try_receive(&mut self) -> Option<Command> {
        let mut buffer = [0u8; COMMAND_SIZE];
        match self.file.read(&mut buffer) {
            Ok(0) => None,
            Ok(COMMAND_SIZE) => {
                let command = Command::decode(&buffer);
                if command.is_none() {
                    Log::log_warning("Discarding malformed command from channel");
                }
                command
            }
            Ok(n) => {
                Log::log_warning(&format!(
                    "Discarding partial command ({} of {} bytes)",
                    n, COMMAND_SIZE
                ));
                None
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => None,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => None,
            Err(e) => {
                Log::log_error(&format!("Failed to read command channel: {}", e));
                None
            }
        }
    }
}

/// Send one command to the daemon listening on `path`.
///
/// The pipe is opened without blocking; while no reader is attached (`ENXIO`)
/// or the pipe does not exist yet, the open is retried for up to
/// `SEND_TIMEOUT_MS`. After that the daemon is considered unreachable.
pub fn send(path: &Path, command: Command) -> Result<()> {
    let deadline = Instant::now() + Duration::from_millis(SEND_TIMEOUT_MS);

    let mut file = loop {
        let attempt = OpenOptions::new()
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path);

        match attempt {
            Ok(file) => break file,
            Err(e) if is_no_reader(&e) && Instant::now() < deadline => {
                thread::sleep(Duration::from_millis(SEND_RETRY_INTERVAL_MS));
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Daemon not reachable through {}", path.display())
                });
            }
        }
    };

    file.write_all(&command.encode())
        .with_context(|| format!("Failed to write command to {}", path.display()))?;

    Ok(())
}

fn is_no_reader(error: &io::Error) -> bool {
    error.raw_os_error() == Some(libc::ENXIO) || error.kind() == io::ErrorKind::NotFound
}
