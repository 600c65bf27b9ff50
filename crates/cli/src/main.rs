use std::process::ExitCode;

fn main() -> ExitCode {
    partbot_cli::run()
}
