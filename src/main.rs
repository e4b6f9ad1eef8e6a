//! Flash Ledger operator CLI

use std::process::ExitCode;

use clap::Parser;

#[expect(clippy::print_stdout, reason = "commands report their results on stdout")]
mod cli;

#[tokio::main]
#[expect(clippy::print_stderr, reason = "failures are reported on stderr")]
async fn main() -> ExitCode {
    _ = dotenvy::dotenv();

    let cli = cli::Cli::parse();

    if let Err(error) = cli.run().await {
        eprintln!("{error}");

        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
