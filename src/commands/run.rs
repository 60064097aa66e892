// This file contains the primary logic for the `devbox-provision run` command.
// It prepares the run (paths, plan, platform), wires the real environment and
// process runner into the orchestrator and turns the summary into an exit code.

use crate::cli::cmd_enums::RunArgs;
use crate::commands::{Prepared, prepare};
use crate::libs::command_runner::SystemRunner;
use crate::libs::interrupt;
use crate::libs::orchestrator::{DryRunEntry, Orchestrator};
use crate::libs::preflight::{Environment, SystemEnvironment};
use crate::{log_debug, log_info};
use anyhow::{Context, Result};
use colored::Colorize;
use prettytable::{Table, format, row};

/// Main entry point for the `run` command.
///
/// # Returns
/// The process exit status: 0 on success, 1 for verification issues (unless
/// lenient), the failing command's status for a Fatal stage, 130 on interrupt.
pub fn run(args: RunArgs) -> Result<i32> {
    log_debug!("Entered run::run() with {:?}", args);

    interrupt::install().context("Failed to install the interrupt handler")?;

    let Prepared {
        plan,
        mut ctx,
        adapter,
    } = prepare(&args.plan, args.backup_dir.as_deref(), &args.skip_preflight)?;

    let env = SystemEnvironment;
    let runner = SystemRunner::new(env.is_root());
    let orchestrator = Orchestrator::new(&plan, &env, adapter.as_ref(), &runner);

    if args.dry_run {
        let entries = orchestrator.dry_run(&ctx);
        if args.json {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        } else {
            dry_run_table(&entries).printstd();
            let pending = entries.iter().filter(|entry| !entry.satisfied).count();
            log_info!("[Dry run] {} of {} stage(s) would be applied", pending, entries.len());
        }
        return Ok(0);
    }

    let summary = orchestrator.run(&mut ctx);
    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialize the run summary")?
        );
    } else {
        summary.print();
    }

    if args.lenient_verify && summary.verification_issues() > 0 {
        log_info!("{} set, missing artifacts do not fail the run", "--lenient-verify".bold());
    }
    Ok(summary.exit_code(args.lenient_verify))
}

fn dry_run_table(entries: &[DryRunEntry]) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
    table.set_titles(row![b->"#", b->"Stage", b->"Kind", b->"State", b->"Would run"]);
    for entry in entries {
        let (state, action) = if entry.satisfied {
            ("satisfied", "-".to_string())
        } else {
            ("pending", entry.action.clone())
        };
        table.add_row(row![entry.index, entry.name, entry.kind, state, action]);
    }
    table
}
