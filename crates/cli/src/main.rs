use std::process::ExitCode;

fn main() -> ExitCode {
    maitred_cli::run()
}
