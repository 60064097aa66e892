mod cli;
mod commands;
mod installers;
mod libs;
mod logger;
mod schemas;

use clap::Parser;
use cli::cmd_enums::{Cli, Commands};
use commands::{plan, run, verify, version};
use libs::error_reporter::ErrorReporter;
use std::panic;

fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.command {
        Some(Commands::Run(args)) => run::run(args),
        Some(Commands::Plan(args)) => plan::run(args),
        Some(Commands::Verify(args)) => verify::run(args),
        Some(Commands::Version) => Ok(version::run()),
        None => run::run(cli.run),
    }
}

fn main() {
    let cli = Cli::parse();
    logger::init(cli.debug);

    // The outermost boundary: typed failures were already reported by the
    // orchestrator, anything else is reported here.
    let code = match panic::catch_unwind(|| dispatch(cli)) {
        Ok(Ok(code)) => code,
        Ok(Err(err)) => ErrorReporter.report_unexpected(&err, None),
        Err(payload) => ErrorReporter.report_panic(payload.as_ref()),
    };
    std::process::exit(code);
}
