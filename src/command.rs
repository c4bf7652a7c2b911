//! Command-line surface and the mapping of sub-commands onto MPV requests.

use std::io::{self, Write};
use std::path::Path;

use clap::{ArgAction, Parser, Subcommand};
use thiserror::Error;

use crate::mpv::{
  self, Connection, IpcError, LoadMode, Locator, MpvClient, MpvError, PlaylistEntry, ProcessError,
  StateError, Transport,
};

#[derive(Error, Debug)]
pub enum CommandError {
  #[error(transparent)]
  Process(#[from] ProcessError),
  #[error(transparent)]
  State(#[from] StateError),
  #[error(transparent)]
  Ipc(#[from] IpcError),
  #[error(transparent)]
  Mpv(#[from] MpvError),
  #[error("incorrect playlist position {0}")]
  PlaylistIndex(i64),
  #[error("invalid playlist argument {0:?}: expected raw or INDEX")]
  PlaylistTarget(String),
  #[error("couldn't write output: {0}")]
  Output(#[from] io::Error),
}

#[derive(Debug, Parser)]
#[command(
  name = "mpv-mp",
  version,
  about = "Control a single background mpv from the shell",
  arg_required_else_help = true
)]
pub struct Cli {
  /// Log more (-v info, -vv debug)
  #[arg(short, long, global = true, action = ArgAction::Count)]
  pub verbose: u8,
  #[command(subcommand)]
  pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
  /// Play the current playlist from the beginning or replace it with FILE (track or playlist)
  Play { files: Vec<String> },
  /// Add FILE to the current playlist; FILE could be track or playlist
  Add {
    #[arg(required = true)]
    files: Vec<String>,
  },
  /// Show the current playlist; `raw` prints bare filenames, INDEX changes position to INDEX
  Playlist {
    #[arg(value_name = "raw|INDEX", allow_negative_numbers = true)]
    target: Option<String>,
  },
  /// Toggle pause
  Pause,
  /// Go to the next track in the current playlist
  Next,
  /// Go to the previous track in the current playlist
  Prev,
  /// Toggle loop for the current track
  Loop,
  /// Kill the running instance and clean up its state
  Kill,
  /// Send a custom command to mpv and print the reply
  #[command(name = "-")]
  Custom {
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
  },
}

/// What `playlist` was asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistTarget {
  Show,
  Raw,
  Jump(i64),
}

impl PlaylistTarget {
  pub fn parse(arg: Option<&str>) -> Result<Self, CommandError> {
    match arg {
      None => Ok(PlaylistTarget::Show),
      Some("raw") => Ok(PlaylistTarget::Raw),
      Some(other) => other
        .parse()
        .map(PlaylistTarget::Jump)
        .map_err(|_| CommandError::PlaylistTarget(other.to_string())),
    }
  }
}

/// Make sure an instance is running and connect to it.
pub fn connect_instance(locator: &Locator) -> Result<Connection, CommandError> {
  locator.state().ensure()?;
  locator.ensure_running()?;
  Ok(mpv::connect(locator.state().ipc_path())?)
}

/// Run one command. `open` is only called for commands that talk to MPV.
pub fn execute<T, F, W>(
  command: &Command,
  locator: &Locator,
  open: F,
  out: &mut W,
) -> Result<(), CommandError>
where
  T: Transport,
  F: FnOnce(&Locator) -> Result<T, CommandError>,
  W: Write,
{
  let client =
    |open: F| -> Result<MpvClient<T>, CommandError> { Ok(MpvClient::new(open(locator)?)) };

  match command {
    Command::Kill => Ok(locator.kill()?),
    Command::Play { files } => play(&mut client(open)?, files),
    Command::Add { files } => add(&mut client(open)?, files, LoadMode::Append),
    Command::Playlist { target } => {
      let target = PlaylistTarget::parse(target.as_deref())?;
      playlist(&mut client(open)?, target, out)
    }
    Command::Pause => Ok(client(open)?.toggle_pause()?),
    Command::Next => Ok(client(open)?.next()?),
    Command::Prev => Ok(client(open)?.prev()?),
    Command::Loop => Ok(client(open)?.toggle_loop_file()?),
    Command::Custom { command } => custom(&mut client(open)?, &command.join(" "), out),
  }
}

// ============================================================================
// Playback
// ============================================================================

/// Replay the playlist or replace it with `files`, then make sure it is not paused.
fn play<T: Transport>(mpv: &mut MpvClient<T>, files: &[String]) -> Result<(), CommandError> {
  if files.is_empty() {
    jump(mpv, 0)?;
  } else {
    add(mpv, files, LoadMode::Replace)?;
  }

  if mpv.get_pause()? {
    mpv.toggle_pause()?;
  }
  Ok(())
}

/// Whether `arg` names a single track rather than a directory or playlist.
fn looks_like_track(arg: &str) -> bool {
  arg
    .rsplit('/')
    .next()
    .is_some_and(|name| name.contains('.'))
}

/// Load each argument in order. In replace mode only the first one replaces.
fn add<T: Transport>(
  mpv: &mut MpvClient<T>,
  files: &[String],
  mode: LoadMode,
) -> Result<(), CommandError> {
  for (i, file) in files.iter().enumerate() {
    let mode = if i == 0 { mode } else { LoadMode::Append };
    if looks_like_track(file) {
      mpv.loadfile(file, mode)?;
    } else {
      mpv.loadlist(file, mode)?;
    }
  }
  Ok(())
}

// ============================================================================
// Playlist
// ============================================================================

fn playlist<T: Transport, W: Write>(
  mpv: &mut MpvClient<T>,
  target: PlaylistTarget,
  out: &mut W,
) -> Result<(), CommandError> {
  match target {
    PlaylistTarget::Show => write_listing(&mpv.get_playlist()?, out)?,
    PlaylistTarget::Raw => {
      for entry in mpv.get_playlist()? {
        writeln!(out, "{}", entry.filename)?;
      }
    }
    PlaylistTarget::Jump(index) => jump(mpv, index)?,
  }
  Ok(())
}

/// Change playlist position after checking `index` against the playlist.
fn jump<T: Transport>(mpv: &mut MpvClient<T>, index: i64) -> Result<(), CommandError> {
  let position = usize::try_from(index).map_err(|_| CommandError::PlaylistIndex(index))?;
  if position >= mpv.get_playlist()?.len() {
    return Err(CommandError::PlaylistIndex(index));
  }
  mpv.play_index(position)?;
  Ok(())
}

fn display_name(filename: &str) -> String {
  Path::new(filename)
    .file_name()
    .map(|name| name.to_string_lossy().into_owned())
    .unwrap_or_else(|| filename.to_string())
}

/// Numbered listing; the current entry's line starts with `>`.
fn write_listing<W: Write>(entries: &[PlaylistEntry], out: &mut W) -> io::Result<()> {
  let width = entries.len().to_string().len() + 2;
  for (i, entry) in entries.iter().enumerate() {
    let mut line = format!("{:>width$}\t{}", i, display_name(&entry.filename));
    if entry.current {
      line.replace_range(..1, ">");
    }
    writeln!(out, "{line}")?;
  }
  Ok(())
}

// ============================================================================
// Raw commands
// ============================================================================

fn custom<T: Transport, W: Write>(
  mpv: &mut MpvClient<T>,
  text: &str,
  out: &mut W,
) -> Result<(), CommandError> {
  let reply = mpv.custom(text)?;
  writeln!(out, "{}", String::from_utf8_lossy(&reply))?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::mpv::testing::ScriptedTransport;
  use crate::mpv::StateDir;

  const PAUSED: &str = r#"{"data":true,"request_id":{id},"error":"success"}"#;
  const PLAYING: &str = r#"{"data":false,"request_id":{id},"error":"success"}"#;
  const THREE_TRACKS: &str = concat!(
    r#"{"event":"idle"}"#,
    "\n",
    r#"{"data":[{"filename":"/music/one.mp3","id":1},"#,
    r#"{"filename":"/music/two.mp3","current":true,"playing":true,"id":2},"#,
    r#"{"filename":"three.ogg","id":3}],"request_id":{id},"error":"success"}"#,
    "\n"
  );

  struct Run {
    sent: Vec<String>,
    output: String,
    result: Result<(), CommandError>,
  }

  fn run(args: &[&str], replies: &[&str]) -> Run {
    let dir = tempfile::tempdir().unwrap();
    let locator = Locator::new(StateDir::new(dir.path()), None);
    let cli = Cli::try_parse_from(std::iter::once("mpv-mp").chain(args.iter().copied())).unwrap();

    let mut transport = ScriptedTransport::new(replies.iter().copied());
    let mut out = Vec::new();
    let handle = &mut transport;
    let result = execute(&cli.command, &locator, move |_| Ok(handle), &mut out);

    Run {
      sent: transport.sent,
      output: String::from_utf8(out).unwrap(),
      result,
    }
  }

  fn is_property_query(line: &str, name: &str) -> bool {
    let value: serde_json::Value = serde_json::from_str(line).unwrap();
    value["command"] == serde_json::json!(["get_property", name])
  }

  #[test]
  fn test_play_file_replaces_and_unpauses() {
    let run = run(&["play", "song.mp3"], &[PAUSED]);
    run.result.unwrap();
    assert_eq!(run.sent.len(), 3);
    assert_eq!(run.sent[0], r#"loadfile "song.mp3" replace"#);
    assert!(is_property_query(&run.sent[1], "pause"));
    assert_eq!(run.sent[2], "cycle pause");
  }

  #[test]
  fn test_play_does_not_pause_when_playing() {
    let run = run(&["play", "a.mp3", "albums"], &[PLAYING]);
    run.result.unwrap();
    assert_eq!(run.sent[0], r#"loadfile "a.mp3" replace"#);
    assert_eq!(run.sent[1], r#"loadlist "albums" append"#);
    assert_eq!(run.sent.len(), 3);
  }

  #[test]
  fn test_play_without_files_restarts_playlist() {
    let run = run(&["play"], &[THREE_TRACKS, PLAYING]);
    run.result.unwrap();
    assert!(is_property_query(&run.sent[0], "playlist"));
    assert_eq!(run.sent[1], "playlist-play-index 0");
    assert!(is_property_query(&run.sent[2], "pause"));
    assert_eq!(run.sent.len(), 3);
  }

  #[test]
  fn test_play_empty_playlist_fails() {
    let empty = r#"{"data":[],"request_id":{id},"error":"success"}"#;
    let run = run(&["play"], &[empty]);
    assert!(matches!(run.result, Err(CommandError::PlaylistIndex(0))));
  }

  #[test]
  fn test_add_chooses_loadfile_or_loadlist() {
    let run = run(&["add", "mydir", "track.flac", "some.dir/list"], &[]);
    run.result.unwrap();
    assert_eq!(
      run.sent,
      vec![
        r#"loadlist "mydir" append"#,
        r#"loadfile "track.flac" append"#,
        r#"loadlist "some.dir/list" append"#,
      ]
    );
  }

  #[test]
  fn test_add_requires_files() {
    assert!(Cli::try_parse_from(["mpv-mp", "add"]).is_err());
  }

  #[test]
  fn test_playlist_listing_marks_current() {
    let run = run(&["playlist"], &[THREE_TRACKS]);
    run.result.unwrap();
    let lines: Vec<&str> = run.output.lines().collect();
    assert_eq!(lines, vec!["  0\tone.mp3", "> 1\ttwo.mp3", "  2\tthree.ogg"]);
  }

  #[test]
  fn test_playlist_listing_is_stable() {
    let first = run(&["playlist"], &[THREE_TRACKS]);
    let second = run(&["playlist"], &[THREE_TRACKS]);
    assert_eq!(first.output, second.output);
  }

  #[test]
  fn test_playlist_raw() {
    let run = run(&["playlist", "raw"], &[THREE_TRACKS]);
    run.result.unwrap();
    assert_eq!(run.output, "/music/one.mp3\n/music/two.mp3\nthree.ogg\n");
  }

  #[test]
  fn test_playlist_jump() {
    let run = run(&["playlist", "2"], &[THREE_TRACKS]);
    run.result.unwrap();
    assert_eq!(run.sent.last().unwrap(), "playlist-play-index 2");
  }

  #[test]
  fn test_playlist_index_out_of_range() {
    let run = run(&["playlist", "3"], &[THREE_TRACKS]);
    assert!(matches!(run.result, Err(CommandError::PlaylistIndex(3))));
    assert!(!run.sent.iter().any(|line| line.starts_with("playlist-play-index")));
  }

  #[test]
  fn test_playlist_negative_index() {
    let run = run(&["playlist", "-1"], &[THREE_TRACKS]);
    match run.result {
      Err(e @ CommandError::PlaylistIndex(-1)) => {
        assert_eq!(e.to_string(), "incorrect playlist position -1")
      }
      Err(e) => panic!("Expected range error, got {:?}", e),
      Ok(()) => panic!("Expected range error"),
    }
    assert!(run.sent.is_empty());
  }

  #[test]
  fn test_playlist_bad_argument_never_connects() {
    let dir = tempfile::tempdir().unwrap();
    let locator = Locator::new(StateDir::new(dir.path()), None);
    let command = Command::Playlist {
      target: Some("first".to_string()),
    };
    let result = execute(
      &command,
      &locator,
      |_| -> Result<ScriptedTransport, CommandError> { panic!("should not connect") },
      &mut Vec::new(),
    );
    assert!(matches!(result, Err(CommandError::PlaylistTarget(_))));
  }

  #[test]
  fn test_simple_commands() {
    for (arg, expected) in [
      ("pause", "cycle pause"),
      ("next", "playlist-next"),
      ("prev", "playlist-prev"),
      ("loop", "cycle-values loop-file 'inf' 'no'"),
    ] {
      let run = run(&[arg], &[]);
      run.result.unwrap();
      assert_eq!(run.sent, vec![expected]);
    }
  }

  #[test]
  fn test_custom_prints_reply() {
    let reply = r#"{"data":null,"request_id":0,"error":"success"}"#;
    let run = run(&["-", "set", "volume", "-10"], &[reply]);
    run.result.unwrap();
    assert_eq!(run.sent, vec!["set volume -10"]);
    assert_eq!(run.output, format!("{reply}\n"));
  }

  #[test]
  fn test_kill_removes_state_without_connecting() {
    let dir = tempfile::tempdir().unwrap();
    let state = StateDir::new(dir.path().join("mpv-mp"));
    state.ensure().unwrap();
    let locator = Locator::new(state, None).with_process_name("sleep");

    let mut child = std::process::Command::new("sleep").arg("30").spawn().unwrap();
    locator.state().write_handle(child.id()).unwrap();

    let result = execute(
      &Command::Kill,
      &locator,
      |_| -> Result<ScriptedTransport, CommandError> { panic!("should not connect") },
      &mut Vec::new(),
    );
    result.unwrap();
    assert!(!child.wait().unwrap().success());
    assert!(!locator.state().root().exists());
  }

  #[test]
  fn test_kill_on_clean_state_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let state = StateDir::new(dir.path().join("mpv-mp"));
    state.ensure().unwrap();
    let locator = Locator::new(state, None);

    let mut out = Vec::new();
    execute(
      &Command::Kill,
      &locator,
      |_| -> Result<ScriptedTransport, CommandError> { panic!("should not connect") },
      &mut out,
    )
    .unwrap();
    assert!(out.is_empty());
    assert!(!locator.state().root().exists());
  }

  #[test]
  fn test_looks_like_track() {
    assert!(looks_like_track("song.mp3"));
    assert!(looks_like_track("/music/album/01.flac"));
    assert!(!looks_like_track("mydir"));
    assert!(!looks_like_track("some.dir/list"));
  }

  #[test]
  fn test_no_arguments_is_usage_error() {
    let err = Cli::try_parse_from(["mpv-mp"]).unwrap_err();
    assert!(err.use_stderr());
  }
}
