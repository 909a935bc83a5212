use std::process::ExitCode;

fn main() -> ExitCode {
    spinbot_cli::run()
}
