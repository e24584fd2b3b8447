// ABOUTME: Entry point for the taskhop binary
// ABOUTME: Runs the CLI and turns its outcome into a process exit code

use std::process::ExitCode;
use taskhop::cli::{exit_code_for, App};

#[tokio::main]
async fn main() -> ExitCode {
    let (app, args) = match App::from_args() {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::from(2);
        }
    };

    match app.run(args).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code_for(&e))
        }
    }
}
