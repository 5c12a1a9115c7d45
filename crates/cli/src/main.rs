use std::process::ExitCode;

fn main() -> ExitCode {
    valuequote_cli::run()
}
