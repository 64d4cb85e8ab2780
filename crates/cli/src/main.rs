use std::process::ExitCode;

fn main() -> ExitCode {
    aktly_cli::run()
}
