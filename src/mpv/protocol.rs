//! MPV JSON IPC protocol types.
//!
//! Reference: https://mpv.io/manual/master/#json-ipc
//!
//! Two request shapes go over the socket: free-form input commands
//! (`loadfile "a.mp3" append`) and JSON objects carrying a `command` array.
//! Replies and events come back as one JSON object per line.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Global request ID counter for unique command identification.
static REQUEST_ID: AtomicI64 = AtomicI64::new(1);

/// Generate a unique request ID for MPV commands.
pub fn next_request_id() -> i64 {
  REQUEST_ID.fetch_add(1, Ordering::SeqCst)
}

/// Structured command sent to MPV via IPC.
#[derive(Debug, Clone, Serialize)]
pub struct MpvCommand {
  pub command: Vec<Value>,
  pub request_id: i64,
}

impl MpvCommand {
  /// Create a new command with auto-generated request ID.
  pub fn new(args: Vec<Value>) -> Self {
    Self {
      command: args,
      request_id: next_request_id(),
    }
  }

  /// Get a property value.
  pub fn get_property(name: &str) -> Self {
    Self::new(vec!["get_property".into(), name.into()])
  }

  /// Single-line JSON encoding.
  pub fn to_line(&self) -> String {
    // A Vec<Value> and an i64 always serialize.
    serde_json::to_string(self).unwrap_or_default()
  }
}

/// Reply from MPV for a structured command.
#[derive(Debug, Clone, Deserialize)]
pub struct MpvResponse {
  /// "success" or error message.
  pub error: String,
  /// Response data (command-specific).
  #[serde(default)]
  pub data: Option<Value>,
  /// Matching request ID.
  pub request_id: i64,
}

impl MpvResponse {
  /// Check if the command succeeded.
  pub fn is_success(&self) -> bool {
    self.error == "success"
  }
}

/// Unsolicited event sent by MPV (playback start, property changes, ...).
#[derive(Debug, Clone, Deserialize)]
pub struct MpvEvent {
  /// Event type (e.g., "property-change", "end-file", "idle").
  pub event: String,
  /// Property name for property-change events.
  pub name: Option<String>,
}

/// Message received from MPV IPC (either reply or event).
#[derive(Debug, Clone)]
pub enum MpvMessage {
  Response(MpvResponse),
  Event(MpvEvent),
}

impl MpvMessage {
  /// Classify one decoded JSON value; `None` for anything else.
  fn from_value(value: Value) -> Option<Self> {
    if value.get("event").is_some() {
      return serde_json::from_value(value).ok().map(MpvMessage::Event);
    }
    serde_json::from_value(value).ok().map(MpvMessage::Response)
  }
}

/// Decode every message found in a raw drain buffer, in order.
///
/// The buffer may hold any number of messages, usually one per line but
/// possibly concatenated. Values are decoded one after another until the end
/// of the buffer; text that is not JSON is skipped up to the next newline.
pub fn decode_messages(raw: &[u8]) -> Vec<MpvMessage> {
  let mut messages = Vec::new();

  for line in raw.split(|b| *b == b'\n') {
    let mut stream = serde_json::Deserializer::from_slice(line).into_iter::<Value>();
    loop {
      match stream.next() {
        Some(Ok(value)) => {
          if let Some(message) = MpvMessage::from_value(value) {
            messages.push(message);
          }
        }
        Some(Err(e)) => {
          log::debug!("Skipping undecodable MPV output: {}", e);
          break;
        }
        None => break,
      }
    }
  }

  messages
}

/// Find the reply to `request_id` in a raw drain buffer.
pub fn find_response(raw: &[u8], request_id: i64) -> Option<MpvResponse> {
  decode_messages(raw).into_iter().find_map(|message| match message {
    MpvMessage::Response(response) if response.request_id == request_id => Some(response),
    MpvMessage::Response(response) => {
      log::debug!("Ignoring reply for request_id={}", response.request_id);
      None
    }
    MpvMessage::Event(event) => {
      log::debug!("Ignoring MPV event {:?} ({:?})", event.event, event.name);
      None
    }
  })
}

/// Typed property values from MPV.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
  Bool(bool),
  Number(f64),
  String(String),
  Array(Vec<Value>),
  Object(Map<String, Value>),
  Null,
}

impl PropertyValue {
  /// Name of the variant, for mismatch diagnostics.
  pub fn kind(&self) -> &'static str {
    match self {
      PropertyValue::Bool(_) => "bool",
      PropertyValue::Number(_) => "number",
      PropertyValue::String(_) => "string",
      PropertyValue::Array(_) => "array",
      PropertyValue::Object(_) => "object",
      PropertyValue::Null => "null",
    }
  }
}

impl From<Value> for PropertyValue {
  fn from(value: Value) -> Self {
    match value {
      Value::Bool(b) => PropertyValue::Bool(b),
      Value::Number(n) => n.as_f64().map_or(PropertyValue::Null, PropertyValue::Number),
      Value::String(s) => PropertyValue::String(s),
      Value::Array(items) => PropertyValue::Array(items),
      Value::Object(map) => PropertyValue::Object(map),
      Value::Null => PropertyValue::Null,
    }
  }
}

/// One element of MPV's `playlist` property.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlaylistEntry {
  pub filename: String,
  /// Only present (and true) on the entry being played.
  #[serde(default)]
  pub current: bool,
}

/// Whether loaded items are appended or replace the playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
  Append,
  Replace,
}

impl fmt::Display for LoadMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      LoadMode::Append => f.write_str("append"),
      LoadMode::Replace => f.write_str("replace"),
    }
  }
}

/// Quote an argument for MPV's input command grammar.
pub fn quote(arg: &str) -> String {
  let mut out = String::with_capacity(arg.len() + 2);
  out.push('"');
  for c in arg.chars() {
    match c {
      '"' => out.push_str("\\\""),
      '\\' => out.push_str("\\\\"),
      '\n' => out.push_str("\\n"),
      '\r' => out.push_str("\\r"),
      '\t' => out.push_str("\\t"),
      c => out.push(c),
    }
  }
  out.push('"');
  out
}

/// Free-form input commands.
pub mod input {
  use super::{quote, LoadMode};

  /// Load a single track.
  pub fn loadfile(path: &str, mode: LoadMode) -> String {
    format!("loadfile {} {}", quote(path), mode)
  }

  /// Load a playlist file or directory.
  pub fn loadlist(path: &str, mode: LoadMode) -> String {
    format!("loadlist {} {}", quote(path), mode)
  }

  pub fn playlist_play_index(index: usize) -> String {
    format!("playlist-play-index {index}")
  }

  pub const CYCLE_PAUSE: &str = "cycle pause";
  pub const PLAYLIST_NEXT: &str = "playlist-next";
  pub const PLAYLIST_PREV: &str = "playlist-prev";
  /// Toggle looping of the current track.
  pub const CYCLE_LOOP_FILE: &str = "cycle-values loop-file 'inf' 'no'";
}
