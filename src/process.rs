//! Daemon process lifecycle: detaching, the process record, and stopping.
//!
//! A running daemon is identified by its *process record*, a text file
//! holding its PID, next to the command channel in the runtime directory:
//!
//! - `$XDG_RUNTIME_DIR/backlight_manager.pid`
//! - `$XDG_RUNTIME_DIR/backlight_manager.fifo`
//!
//! (`/tmp` when `XDG_RUNTIME_DIR` is unset.)
//!
//! The daemon keeps an exclusive lock on the record for its whole life, so a
//! second daemon cannot start while the first one runs. The lock is also what
//! clients use to tell a live daemon from a leftover record: an unlocked
//! record is stale no matter which process its PID happens to name now, and
//! is removed without signalling anyone.

use anyhow::{Context, Result};
use fs2::FileExt;
use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::os::unix::fs::{MetadataExt, OpenOptionsExt};
use std::path::{Path, PathBuf};

use crate::constants::*;
use crate::ipc::{self, FifoInbox};
use crate::logger::Log;
use crate::signals::{SignalState, setup_signal_handler};

/// Locations of the process record and the command channel.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimePaths {
    pub record: PathBuf,
    pub channel: PathBuf,
}

impl RuntimePaths {
    pub fn from_env() -> Self {
        let runtime_dir = std::env::var_os("XDG_RUNTIME_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(FALLBACK_RUNTIME_DIR));
        Self::in_dir(&runtime_dir)
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self {
            record: dir.join(RECORD_FILE_NAME),
            channel: dir.join(CHANNEL_FILE_NAME),
        }
    }
}

/// Read the PID stored in the process record.
///
/// # Returns
/// - `Ok(Some(pid))` if the record exists and holds a positive integer
/// - `Ok(None)` if there is no record
/// - `Err` if the record exists but cannot be read or parsed
pub fn read_record(paths: &RuntimePaths) -> Result<Option<i32>> {
    let content = match fs::read_to_string(&paths.record) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Failed to read {}", paths.record.display()));
        }
    };

    let pid = content
        .trim()
        .parse::<i32>()
        .ok()
        .filter(|pid| *pid > 0)
        .with_context(|| {
            format!(
                "Process record {} does not contain a valid PID: {:?}",
                paths.record.display(),
                content.trim()
            )
        })?;

    Ok(Some(pid))
}

/// Whether a process with this PID exists.
///
/// `EPERM` means it exists but belongs to someone else.
pub fn is_process_alive(pid: i32) -> bool {
    match kill(Pid::from_raw(pid), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// Whether some process holds the single-instance lock on the record.
///
/// A daemon keeps an exclusive lock on its record for as long as it runs, so a
/// free lock means the recorded PID is not ours, whatever it currently names.
pub fn record_lock_held(paths: &RuntimePaths) -> Result<bool> {
    let file = match File::open(&paths.record) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Failed to open {}", paths.record.display()));
        }
    };

    // Fully qualified: std's inherent `File::try_lock_shared` has another signature
    match FileExt::try_lock_shared(&file) {
        Ok(()) => Ok(false),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(true),
        Err(e) => Err(e)
            .with_context(|| format!("Failed to check lock on {}", paths.record.display())),
    }
}

/// What the process record currently says about the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    /// No record present
    Absent,
    /// Record locked by a live daemon with this PID
    Running(i32),
    /// Locked, but the PID is not written yet or does not match a live process
    Starting,
    /// Nobody holds the lock; the content is left over from a dead daemon
    Stale(Option<i32>),
}

/// Inspect the process record without modifying it.
///
/// The lock decides liveness; the PID is only trusted while the lock is held
/// and `kill(pid, 0)` agrees.
pub fn inspect_record(paths: &RuntimePaths) -> Result<RecordState> {
    if !paths.record.exists() {
        return Ok(RecordState::Absent);
    }

    let locked = record_lock_held(paths)?;
    let pid = match read_record(paths) {
        Ok(pid) => pid,
        Err(e) => {
            Log::log_debug(&format!("{:#}", e));
            None
        }
    };

    Ok(match (locked, pid) {
        (true, Some(pid)) if is_process_alive(pid) => RecordState::Running(pid),
        (true, _) => RecordState::Starting,
        (false, pid) => RecordState::Stale(pid),
    })
}

/// PID of the running daemon, if any.
///
/// A stale record holding a PID is removed together with the channel. A
/// record without a PID is left alone; it may belong to a daemon that has
/// just been created and not written yet.
pub fn running_daemon_pid(paths: &RuntimePaths) -> Option<i32> {
    match inspect_record(paths) {
        Ok(RecordState::Running(pid)) => Some(pid),
        Ok(RecordState::Absent) => None,
        Ok(RecordState::Starting) => {
            Log::log_warning("A daemon is still starting; not forwarding to it");
            None
        }
        Ok(RecordState::Stale(Some(pid))) => {
            Log::log_warning(&format!(
                "Removing stale process record (PID {} holds no lock)",
                pid
            ));
            remove_runtime_files(paths);
            None
        }
        Ok(RecordState::Stale(None)) => None,
        Err(e) => {
            Log::log_warning(&format!("Ignoring process record: {:#}", e));
            None
        }
    }
}

/// Remove the process record and channel, reporting but tolerating failures.
///
/// Already-missing files are not an error.
pub fn remove_runtime_files(paths: &RuntimePaths) {
    for (what, path) in [("process record", &paths.record), ("command channel", &paths.channel)] {
        remove_reporting(what, path);
    }
}

fn remove_reporting(what: &str, path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => Log::log_decorated(&format!("Removed {}", what)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => Log::log_warning(&format!(
            "Failed to remove {} {}: {}",
            what,
            path.display(),
            e
        )),
    }
}

/// Result of [`stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// No process record was present.
    NotRunning,
    /// The record was not locked by any daemon; it was removed without
    /// signalling anyone.
    Stale,
    /// `SIGTERM` was delivered to the recorded PID.
    Terminated(i32),
    /// The record named a PID that could not be signalled.
    SignalFailed(i32),
}

/// Terminate the recorded daemon and remove its runtime files.
///
/// Idempotent: with no record there is nothing to terminate and the call
/// still succeeds. Only the holder of the record lock is ever signalled.
pub fn stop(paths: &RuntimePaths) -> Result<StopOutcome> {
    let outcome = match inspect_record(paths)? {
        RecordState::Absent => {
            Log::log_decorated("No running daemon found, nothing to terminate");
            StopOutcome::NotRunning
        }
        RecordState::Stale(pid) => {
            Log::log_warning(&format!(
                "Process record is stale{}; not signalling",
                pid.map(|pid| format!(" (PID {})", pid)).unwrap_or_default()
            ));
            StopOutcome::Stale
        }
        RecordState::Starting => {
            anyhow::bail!("The daemon is still starting; try again in a moment");
        }
        RecordState::Running(pid) => match kill(Pid::from_raw(pid), Signal::SIGTERM) {
            Ok(()) => {
                Log::log_decorated(&format!("Sent termination request to daemon (PID: {})", pid));
                StopOutcome::Terminated(pid)
            }
            Err(e) => {
                Log::log_warning(&format!("Failed to terminate daemon (PID: {}): {}", pid, e));
                StopOutcome::SignalFailed(pid)
            }
        },
    };

    remove_runtime_files(paths);
    Ok(outcome)
}

/// Device and inode of a file, used to tell our runtime files from a
/// successor's at the same path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileId {
    dev: u64,
    ino: u64,
}

impl FileId {
    fn of(metadata: &fs::Metadata) -> Self {
        Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
        }
    }

    fn at(path: &Path) -> Option<Self> {
        fs::metadata(path).ok().map(|metadata| Self::of(&metadata))
    }
}

/// Runtime files owned by a daemon.
///
/// Holding the handle holds the single-instance lock. [`DaemonHandle::shutdown`]
/// removes the record and the channel, but only while the paths still refer
/// to the files this handle created: after `--kill` a new daemon may already
/// have put its own files there.
pub struct DaemonHandle {
    record_file: File,
    record_id: FileId,
    /// Kept open so the pipe's inode cannot be reused while we compare against it
    channel_file: File,
    channel_id: FileId,
    paths: RuntimePaths,
}

impl DaemonHandle {
    /// Replace the record's content with `pid`.
    pub fn write_pid(&mut self, pid: u32) -> Result<()> {
        write_record(&mut self.record_file, pid).with_context(|| {
            format!("Failed to write process record {}", self.paths.record.display())
        })
    }

    /// Whether the record path still refers to the file this handle locked.
    pub fn owns_record(&self) -> bool {
        FileId::at(&self.paths.record) == Some(self.record_id)
    }

    /// Whether the channel path still refers to the pipe this handle created.
    pub fn owns_channel(&self) -> bool {
        FileId::at(&self.paths.channel) == Some(self.channel_id)
    }

    /// Remove our record and channel, then release the lock.
    pub fn shutdown(self) {
        Log::log_decorated("Performing cleanup...");
        if self.owns_channel() {
            remove_reporting("command channel", &self.paths.channel);
        } else {
            Log::log_decorated("Command channel was replaced, leaving it");
        }
        if self.owns_record() {
            remove_reporting("process record", &self.paths.record);
        } else {
            Log::log_decorated("Process record was replaced, leaving it");
        }
        drop(self.channel_file);
        drop(self.record_file);
        Log::log_decorated("Cleanup complete");
    }
}

/// Acquire the single-instance lock on the process record.
///
/// The file is opened without truncation so a running daemon's PID is never
/// wiped by a contender that then fails to get the lock. If the record is
/// removed or replaced between opening and locking, the lock would guard a
/// file nobody can see, so that is an error too.
pub fn lock_record(paths: &RuntimePaths) -> Result<File> {
    if let Some(parent) = paths.record.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create runtime directory {}", parent.display()))?;
    }

    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&paths.record)
        .with_context(|| format!("Failed to open process record {}", paths.record.display()))?;

    if file.try_lock_exclusive().is_err() {
        anyhow::bail!(
            "Another instance of backlight_manager is already running.\n\
            • Stop it with: backlight_manager --kill"
        );
    }

    let locked_id = FileId::of(&file.metadata()?);
    if FileId::at(&paths.record) != Some(locked_id) {
        anyhow::bail!(
            "Process record {} changed while it was being locked; try again",
            paths.record.display()
        );
    }

    Ok(file)
}

/// Replace the record's content with `pid`.
pub fn write_record(record_file: &mut File, pid: u32) -> Result<()> {
    record_file.set_len(0)?;
    record_file.seek(SeekFrom::Start(0))?;
    write!(record_file, "{}", pid)?;
    record_file.flush()?;
    Ok(())
}

/// Take ownership of the runtime files: lock the record, then create the
/// channel.
///
/// Runs before detaching so that "already running" and permission errors
/// still reach the terminal.
pub fn claim(paths: &RuntimePaths) -> Result<DaemonHandle> {
    let record_file = lock_record(paths)?;
    let record_id = FileId::of(&record_file.metadata()?);

    ipc::create_channel(&paths.channel)?;
    let channel_file = OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(&paths.channel)
        .with_context(|| format!("Failed to open command channel {}", paths.channel.display()))?;
    let channel_id = FileId::of(&channel_file.metadata()?);

    Ok(DaemonHandle {
        record_file,
        record_id,
        channel_file,
        channel_id,
        paths: paths.clone(),
    })
}

/// Turn the current process into the background daemon.
///
/// Claims the runtime files, then detaches (fork, new session, `chdir /`,
/// stdio to `/dev/null`). In the detached child it writes the new PID, opens
/// the channel for reading and installs the signal handler. The parent
/// process exits inside this call.
pub fn start(paths: &RuntimePaths) -> Result<(DaemonHandle, FifoInbox, SignalState)> {
    let mut handle = claim(paths)?;

    Log::log_block_start("Detaching from terminal...");
    nix::unistd::daemon(false, false).context("Failed to detach from terminal")?;

    handle.write_pid(std::process::id())?;
    let inbox = FifoInbox::open(&paths.channel)?;
    let signals = setup_signal_handler(true)?;

    Ok((handle, inbox, signals))
}
