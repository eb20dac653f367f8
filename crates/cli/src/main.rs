use std::process::ExitCode;

fn main() -> ExitCode {
    minuteman_cli::run()
}
