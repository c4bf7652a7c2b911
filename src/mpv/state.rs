//! On-disk coordination record for the background MPV instance.
//!
//! The state directory holds the process handle (`pid`) and the IPC socket
//! (`ipc`). It is shared by every invocation and is not locked.

use std::fs;
use std::io;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Well-known state directory.
pub const STATE_DIR: &str = "/tmp/mpv-mp";

const PID_FILE: &str = "pid";
const IPC_FILE: &str = "ipc";

#[derive(Error, Debug)]
pub enum StateError {
  #[error("couldn't create dir {path:?}: {source}")]
  CreateDir { path: PathBuf, source: io::Error },
  #[error("couldn't read file {path:?}: {source}")]
  Read { path: PathBuf, source: io::Error },
  #[error("couldn't write file {path:?}: {source}")]
  Write { path: PathBuf, source: io::Error },
  #[error("couldn't remove dir {path:?}: {source}")]
  Remove { path: PathBuf, source: io::Error },
}

/// Paths of the handle file and IPC socket under one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateDir {
  root: PathBuf,
  pid_path: PathBuf,
  ipc_path: PathBuf,
}

impl Default for StateDir {
  fn default() -> Self {
    Self::new(STATE_DIR)
  }
}

impl StateDir {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    let root = root.into();
    Self {
      pid_path: root.join(PID_FILE),
      ipc_path: root.join(IPC_FILE),
      root,
    }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn pid_path(&self) -> &Path {
    &self.pid_path
  }

  pub fn ipc_path(&self) -> &Path {
    &self.ipc_path
  }

  /// Create the directory (and parents) if it does not exist yet.
  pub fn ensure(&self) -> Result<(), StateError> {
    fs::DirBuilder::new()
      .recursive(true)
      .mode(0o755)
      .create(&self.root)
      .map_err(|source| StateError::CreateDir {
        path: self.root.clone(),
        source,
      })
  }

  /// Raw handle file content, or `None` when no instance was ever recorded.
  pub fn read_handle(&self) -> Result<Option<String>, StateError> {
    match fs::read_to_string(&self.pid_path) {
      Ok(data) => Ok(Some(data)),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
      Err(source) => Err(StateError::Read {
        path: self.pid_path.clone(),
        source,
      }),
    }
  }

  /// Record the pid of a freshly started instance, replacing any stale one.
  pub fn write_handle(&self, pid: u32) -> Result<(), StateError> {
    fs::write(&self.pid_path, pid.to_string()).map_err(|source| StateError::Write {
      path: self.pid_path.clone(),
      source,
    })
  }

  /// Remove the whole directory, handle file and socket included.
  pub fn remove(&self) -> Result<(), StateError> {
    match fs::remove_dir_all(&self.root) {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
      Err(source) => Err(StateError::Remove {
        path: self.root.clone(),
        source,
      }),
    }
  }
}

/// Parse handle file content as a pid.
pub fn parse_pid(data: &str) -> Option<i32> {
  data.trim().parse::<i32>().ok().filter(|pid| *pid > 0)
}
