//! High-level MPV client with command methods.

use thiserror::Error;

use super::ipc::{Connection, IpcError, Transport};
use super::protocol::{find_response, input, LoadMode, MpvCommand, PlaylistEntry, PropertyValue};

#[derive(Error, Debug)]
pub enum MpvError {
  #[error("IPC error: {0}")]
  Ipc(#[from] IpcError),
  #[error("couldn't get property {0:?}")]
  PropertyUnavailable(String),
  #[error("MPV refused property {name:?}: {error}")]
  CommandFailed { name: String, error: String },
  #[error("property {name:?}: expected {expected}, got {found}")]
  TypeMismatch {
    name: String,
    expected: &'static str,
    found: &'static str,
  },
  #[error("invalid playlist entry: {0}")]
  InvalidPlaylist(#[source] serde_json::Error),
}

/// High-level MPV client over a single connection.
pub struct MpvClient<T = Connection> {
  transport: T,
}

impl<T: Transport> MpvClient<T> {
  pub fn new(transport: T) -> Self {
    Self { transport }
  }

  /// Send a free-form input command without waiting for a reply.
  pub fn command(&mut self, text: &str) -> Result<(), MpvError> {
    self.transport.send_line(text)?;
    Ok(())
  }

  /// Send a free-form command and return whatever MPV answered.
  pub fn custom(&mut self, text: &str) -> Result<Vec<u8>, MpvError> {
    self.transport.send_line(text)?;
    Ok(self.transport.receive_raw()?)
  }

  /// Get a property value.
  pub fn get_property(&mut self, name: &str) -> Result<PropertyValue, MpvError> {
    let cmd = MpvCommand::get_property(name);
    self.transport.send_line(&cmd.to_line())?;

    let raw = self.transport.receive_raw()?;
    let response = find_response(&raw, cmd.request_id)
      .ok_or_else(|| MpvError::PropertyUnavailable(name.to_string()))?;

    if !response.is_success() {
      return Err(MpvError::CommandFailed {
        name: name.to_string(),
        error: response.error,
      });
    }

    Ok(
      response
        .data
        .map(PropertyValue::from)
        .unwrap_or(PropertyValue::Null),
    )
  }

  /// Get current pause state.
  pub fn get_pause(&mut self) -> Result<bool, MpvError> {
    match self.get_property("pause")? {
      PropertyValue::Bool(b) => Ok(b),
      other => Err(mismatch("pause", "bool", &other)),
    }
  }

  /// Get the playlist in playback order.
  pub fn get_playlist(&mut self) -> Result<Vec<PlaylistEntry>, MpvError> {
    match self.get_property("playlist")? {
      PropertyValue::Array(items) => items
        .into_iter()
        .map(|item| serde_json::from_value(item).map_err(MpvError::InvalidPlaylist))
        .collect(),
      other => Err(mismatch("playlist", "array", &other)),
    }
  }

  /// Load a single track.
  pub fn loadfile(&mut self, path: &str, mode: LoadMode) -> Result<(), MpvError> {
    log::info!("Loading file: {} ({})", path, mode);
    self.command(&input::loadfile(path, mode))
  }

  /// Load a playlist file or directory.
  pub fn loadlist(&mut self, path: &str, mode: LoadMode) -> Result<(), MpvError> {
    log::info!("Loading list: {} ({})", path, mode);
    self.command(&input::loadlist(path, mode))
  }

  /// Jump to a playlist position.
  pub fn play_index(&mut self, index: usize) -> Result<(), MpvError> {
    self.command(&input::playlist_play_index(index))
  }

  /// Toggle pause state.
  pub fn toggle_pause(&mut self) -> Result<(), MpvError> {
    self.command(input::CYCLE_PAUSE)
  }

  pub fn next(&mut self) -> Result<(), MpvError> {
    self.command(input::PLAYLIST_NEXT)
  }

  pub fn prev(&mut self) -> Result<(), MpvError> {
    self.command(input::PLAYLIST_PREV)
  }

  /// Toggle looping of the current track.
  pub fn toggle_loop_file(&mut self) -> Result<(), MpvError> {
    self.command(input::CYCLE_LOOP_FILE)
  }

  #[cfg(test)]
  pub(crate) fn transport(&self) -> &T {
    &self.transport
  }
}

fn mismatch(name: &str, expected: &'static str, found: &PropertyValue) -> MpvError {
  MpvError::TypeMismatch {
    name: name.to_string(),
    expected,
    found: found.kind(),
  }
}
