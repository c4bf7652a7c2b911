//! MPV IPC module - keeps one background MPV alive and controls it via JSON IPC.
//!
//! Architecture:
//! - `state.rs` - On-disk pid file and socket path shared by all invocations
//! - `process.rs` - MPV binary detection, liveness checks, spawning and killing
//! - `ipc.rs` - Blocking Unix socket connection with a timed receive drain
//! - `protocol.rs` - JSON command/response types and input command builders
//! - `client.rs` - High-level MPV client with command methods

mod client;
mod ipc;
mod process;
mod protocol;
mod state;

pub use client::{MpvClient, MpvError};
pub use ipc::{connect, Connection, IpcError, Transport};
pub use process::{find_mpv, Locator, ProcessError};
pub use protocol::{LoadMode, PlaylistEntry, PropertyValue};
pub use state::{StateDir, StateError};

#[cfg(test)]
pub(crate) use ipc::testing;
