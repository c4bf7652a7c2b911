//! Blocking IPC connection to MPV over its Unix socket.
//!
//! MPV gives no framing beyond newlines, so replies are collected with a
//! short timed drain. [`Transport`] is the seam where real framing would go.

use std::fs;
use std::io::{self, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

/// Number of times the socket path is checked before giving up.
pub const CONNECT_ATTEMPTS: u32 = 10;
/// Pause between socket path checks.
pub const CONNECT_INTERVAL: Duration = Duration::from_millis(100);
/// How long a drain keeps reading.
pub const RECEIVE_WINDOW: Duration = Duration::from_millis(100);

const READ_CHUNK: usize = 4096;

#[derive(Error, Debug)]
pub enum IpcError {
  #[error("couldn't stat file {path:?}: {source}")]
  Stat { path: PathBuf, source: io::Error },
  #[error("couldn't get mpv ipc {0:?}: socket never appeared")]
  NotReady(PathBuf),
  #[error("Connection failed: {0}")]
  ConnectionFailed(#[source] io::Error),
  #[error("Write failed: {0}")]
  WriteFailed(#[from] io::Error),
  #[error("incorrect command {command:?}: wrote {written} of {expected} bytes")]
  PartialWrite {
    command: String,
    written: usize,
    expected: usize,
  },
  #[error("couldn't set read deadline: {0}")]
  Deadline(#[source] io::Error),
}

/// A line-oriented request/response channel to MPV.
pub trait Transport {
  /// Send one command line; the newline is added here.
  fn send_line(&mut self, line: &str) -> Result<(), IpcError>;

  /// Everything MPV sent within the receive window, possibly nothing.
  fn receive_raw(&mut self) -> Result<Vec<u8>, IpcError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
  fn send_line(&mut self, line: &str) -> Result<(), IpcError> {
    (**self).send_line(line)
  }

  fn receive_raw(&mut self) -> Result<Vec<u8>, IpcError> {
    (**self).receive_raw()
  }
}

/// Connect to the MPV socket, waiting for a freshly started MPV to create it.
pub fn connect(path: &Path) -> Result<Connection, IpcError> {
  let mut attempt = 0;
  loop {
    match fs::metadata(path) {
      Ok(_) => break,
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        if attempt >= CONNECT_ATTEMPTS {
          return Err(IpcError::NotReady(path.to_path_buf()));
        }
        attempt += 1;
        log::debug!("IPC socket not there yet (attempt {})", attempt);
        thread::sleep(CONNECT_INTERVAL);
      }
      Err(source) => {
        return Err(IpcError::Stat {
          path: path.to_path_buf(),
          source,
        })
      }
    }
  }

  let stream = UnixStream::connect(path).map_err(IpcError::ConnectionFailed)?;
  log::info!("Connected to MPV IPC {:?}", path);
  Ok(Connection::new(stream))
}

/// MPV IPC connection. Closed when dropped.
#[derive(Debug)]
pub struct Connection {
  stream: UnixStream,
}

impl Connection {
  pub fn new(stream: UnixStream) -> Self {
    Self { stream }
  }
}

impl Transport for Connection {
  fn send_line(&mut self, line: &str) -> Result<(), IpcError> {
    let data = format!("{line}\n");
    log::debug!("Sending MPV command: {}", line);

    let written = self.stream.write(data.as_bytes())?;
    if written != data.len() {
      return Err(IpcError::PartialWrite {
        command: line.to_string(),
        written,
        expected: data.len(),
      });
    }
    Ok(())
  }

  fn receive_raw(&mut self) -> Result<Vec<u8>, IpcError> {
    let deadline = Instant::now() + RECEIVE_WINDOW;
    let mut buf = [0u8; READ_CHUNK];
    let mut received = Vec::with_capacity(READ_CHUNK);

    loop {
      let remaining = deadline.saturating_duration_since(Instant::now());
      if remaining.is_zero() {
        break;
      }
      self
        .stream
        .set_read_timeout(Some(remaining))
        .map_err(IpcError::Deadline)?;

      // Timeout, EOF and read errors all end the drain.
      match self.stream.read(&mut buf) {
        Ok(0) => break,
        Ok(n) => received.extend_from_slice(&buf[..n]),
        Err(e) => {
          log::debug!("MPV drain stopped: {}", e);
          break;
        }
      }
    }

    log::debug!("Received {} bytes from MPV", received.len());
    Ok(received)
  }
}
