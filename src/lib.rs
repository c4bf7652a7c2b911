use std::io;
use std::process::ExitCode;

use clap::Parser;
use log::LevelFilter;
use thiserror::Error;

pub mod command;
pub mod config;
pub mod mpv;

pub use command::{Cli, Command, CommandError};
pub use config::{AppConfig, ConfigError};
use mpv::{Locator, StateDir};

const PROGRAM: &str = "mpv-mp";

#[derive(Error, Debug)]
pub enum Error {
  #[error(transparent)]
  Config(#[from] ConfigError),
  #[error(transparent)]
  Command(#[from] CommandError),
}

/// Log to stderr; each `-v` raises the configured level one step.
fn init_logging(base: LevelFilter, verbose: u8) {
  let level = match verbose {
    0 => base,
    1 => base.max(LevelFilter::Info),
    _ => base.max(LevelFilter::Debug),
  };

  let _ = env_logger::Builder::new()
    .filter_level(level)
    .format_timestamp(None)
    .target(env_logger::Target::Stderr)
    .try_init();
}

fn run_cli(cli: &Cli) -> Result<(), Error> {
  let config = AppConfig::load_default()?;
  init_logging(config.level_filter()?, cli.verbose);

  let locator = Locator::new(StateDir::default(), config.mpv_path());
  let mut stdout = io::stdout().lock();
  command::execute(&cli.command, &locator, command::connect_instance, &mut stdout)?;
  Ok(())
}

/// Parse arguments, run one command and map the outcome to an exit code.
pub fn run() -> ExitCode {
  let cli = match Cli::try_parse() {
    Ok(cli) => cli,
    Err(e) => {
      // Usage errors exit 1; --help and --version are not errors.
      let code = if e.use_stderr() { 1 } else { 0 };
      let _ = e.print();
      return ExitCode::from(code);
    }
  };

  match run_cli(&cli) {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      log::debug!("{:?}", e);
      eprintln!("{PROGRAM}: {e}");
      ExitCode::FAILURE
    }
  }
}
