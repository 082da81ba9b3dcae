// This is a CLI binary: reporting a startup failure on stderr is its job.
#![allow(clippy::print_stderr)]

use std::process::ExitCode;

use clap::Parser;
use config_validator_cli::cli::{self, Cli};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli::run(&cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
