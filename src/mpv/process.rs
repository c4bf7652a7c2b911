//! MPV process detection, spawning and teardown.

use std::fs;
use std::io;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use thiserror::Error;

use super::state::{parse_pid, StateDir, StateError};

/// Substring expected in the process name of a live instance.
pub const PROCESS_NAME: &str = "mpv";

#[derive(Error, Debug)]
pub enum ProcessError {
  #[error("MPV executable not found")]
  NotFound,
  #[error("Failed to spawn MPV: {0}")]
  SpawnFailed(#[source] io::Error),
  #[error("couldn't read file {path:?}: {source}")]
  Probe { path: PathBuf, source: io::Error },
  #[error("invalid process handle {0:?}")]
  InvalidHandle(String),
  #[error("couldn't kill process {pid}: {source}")]
  Signal { pid: i32, source: Errno },
  #[error(transparent)]
  State(#[from] StateError),
}

/// Find MPV executable in common locations.
pub fn find_mpv() -> Option<PathBuf> {
  // Check PATH first
  if let Ok(path) = which::which(PROCESS_NAME) {
    return Some(path);
  }

  #[cfg(target_os = "macos")]
  let common_paths = [
    "/usr/local/bin/mpv",
    "/opt/homebrew/bin/mpv",
    "/Applications/mpv.app/Contents/MacOS/mpv",
  ];
  #[cfg(not(target_os = "macos"))]
  let common_paths = ["/usr/bin/mpv", "/usr/local/bin/mpv"];

  common_paths
    .into_iter()
    .map(PathBuf::from)
    .find(|p| p.exists())
}

/// Spawn a detached, idle, audio-only MPV serving IPC on `ipc`.
pub fn spawn_mpv(mpv_exe: &Path, ipc: &Path) -> Result<Child, ProcessError> {
  log::info!("Spawning MPV: {:?} with IPC: {:?}", mpv_exe, ipc);

  Command::new(mpv_exe)
    .arg("--no-video")
    .arg("--no-terminal")
    .arg("--idle")
    .arg("--loop-playlist")
    .arg(format!("--input-ipc-server={}", ipc.display()))
    .stdin(Stdio::null())
    .stdout(Stdio::null())
    .stderr(Stdio::null())
    // Own process group, so the player outlives the shell job that started it.
    .process_group(0)
    .spawn()
    .map_err(ProcessError::SpawnFailed)
}

/// Name the kernel reports for `pid`, or `None` if there is no such process.
fn process_name(pid: i32) -> Result<Option<String>, ProcessError> {
  let path = PathBuf::from(format!("/proc/{pid}/comm"));
  match fs::read_to_string(&path) {
    Ok(name) => Ok(Some(name.trim_end().to_string())),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
    Err(source) => Err(ProcessError::Probe { path, source }),
  }
}

/// Finds, starts and tears down the single background instance recorded in a
/// [`StateDir`].
#[derive(Debug, Clone)]
pub struct Locator {
  state: StateDir,
  mpv_path: Option<PathBuf>,
  process_name: String,
}

impl Locator {
  /// `mpv_path` overrides executable detection.
  pub fn new(state: StateDir, mpv_path: Option<PathBuf>) -> Self {
    Self {
      state,
      mpv_path,
      process_name: PROCESS_NAME.to_string(),
    }
  }

  /// Change the process name a live instance must carry.
  pub fn with_process_name(mut self, name: impl Into<String>) -> Self {
    self.process_name = name.into();
    self
  }

  pub fn state(&self) -> &StateDir {
    &self.state
  }

  /// Whether `pid` is alive and is actually the player, not a recycled pid.
  fn is_instance(&self, pid: i32) -> Result<bool, ProcessError> {
    let name = process_name(pid)?;
    log::debug!("pid {} reports name {:?}", pid, name);
    Ok(name.is_some_and(|name| name.contains(&self.process_name)))
  }

  /// Check whether the recorded instance is still alive.
  pub fn is_running(&self) -> Result<bool, ProcessError> {
    let Some(data) = self.state.read_handle()? else {
      return Ok(false);
    };
    match parse_pid(&data) {
      Some(pid) => self.is_instance(pid),
      None => {
        log::warn!("Ignoring unreadable process handle {:?}", data);
        Ok(false)
      }
    }
  }

  /// Spawn a new instance and record its pid. Does not wait for the socket.
  pub fn start(&self) -> Result<u32, ProcessError> {
    let mpv_exe = self
      .mpv_path
      .clone()
      .or_else(find_mpv)
      .ok_or(ProcessError::NotFound)?;

    let child = spawn_mpv(&mpv_exe, self.state.ipc_path())?;
    let pid = child.id();
    self.state.write_handle(pid)?;

    log::info!("Started MPV (pid: {})", pid);
    Ok(pid)
  }

  /// Start an instance unless a live one is already recorded.
  pub fn ensure_running(&self) -> Result<(), ProcessError> {
    if self.is_running()? {
      log::debug!("Reusing running MPV instance");
      return Ok(());
    }
    self.start()?;
    Ok(())
  }

  /// Kill the recorded instance and remove the state directory.
  ///
  /// With no recorded instance there is nothing to kill; the directory is
  /// still cleaned up.
  pub fn kill(&self) -> Result<(), ProcessError> {
    let Some(data) = self.state.read_handle()? else {
      log::info!("No MPV instance recorded, nothing to kill");
      self.state.remove()?;
      return Ok(());
    };
    let pid =
      parse_pid(&data).ok_or_else(|| ProcessError::InvalidHandle(data.trim().to_string()))?;

    if self.is_instance(pid)? {
      log::info!("Killing MPV process (pid: {})", pid);
      signal::kill(Pid::from_raw(pid), Signal::SIGKILL)
        .map_err(|source| ProcessError::Signal { pid, source })?;
    } else {
      log::warn!("pid {} is not a running MPV, not signalling it", pid);
    }

    self.state.remove()?;
    log::info!("Removed {:?}", self.state.root());
    Ok(())
  }
}
