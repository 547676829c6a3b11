use clap::Parser;
use std::process::ExitCode;
use tracing::info;

mod cli;
mod initializers;

use cli::CLI;
use initializers::init_tracing;

fn main() -> eyre::Result<ExitCode> {
    let CLI { opts } = CLI::parse();

    init_tracing(&opts)?;
    txtrace_vm::init();
    info!(request = ?opts.request, "Tracing transaction");

    if cli::run(&opts)? {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
