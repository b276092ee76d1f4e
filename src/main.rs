use std::process::ExitCode;

use clap::Parser;

#[tokio::main]
async fn main() -> ExitCode {
    labtap_lib::run(labtap_lib::Cli::parse()).await
}
