use std::process::ExitCode;

fn main() -> ExitCode {
  mpv_mp_lib::run()
}
