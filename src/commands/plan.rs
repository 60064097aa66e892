// The `devbox-provision plan` command: shows what a run would do, in order,
// without probing or touching the machine.

use crate::cli::cmd_enums::PlanArgs;
use crate::commands::prepare;
use crate::libs::command_runner::SystemRunner;
use crate::libs::plan_loading::ResolvedPlan;
use crate::libs::stage::StageTools;
use crate::libs::utilities::path_helpers::path_exists;
use crate::log_info;
use crate::schemas::plan::Severity;
use anyhow::Result;
use colored::Colorize;
use prettytable::{Table, format, row};

pub fn run(args: PlanArgs) -> Result<i32> {
    let prepared = prepare(&args, None, &[])?;
    let plan = &prepared.plan;

    // Describing a stage never executes anything; the runner is only there to satisfy the tools.
    let runner = SystemRunner::new(false);
    let tools = StageTools {
        adapter: prepared.adapter.as_ref(),
        runner: &runner,
    };

    log_info!("Plan {}", plan.name.bold());
    if let Some(description) = &plan.description {
        log_info!("{}", description.dimmed());
    }

    stage_table(plan, &tools).printstd();

    if !plan.backup_paths.is_empty() {
        println!();
        let mut backups = Table::new();
        backups.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
        backups.set_titles(row![b->"Backed up before the first stage", b->"Currently"]);
        for path in &plan.backup_paths {
            let state = if path_exists(path) { "exists" } else { "absent" };
            backups.add_row(row![path.display(), state]);
        }
        backups.printstd();
    }

    if !plan.artifacts.is_empty() {
        println!();
        let mut artifacts = Table::new();
        artifacts.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
        artifacts.set_titles(row![b->"Verified artifact", b->"Check"]);
        for artifact in &plan.artifacts {
            artifacts.add_row(row![artifact.name, format!("{:?}", artifact.check)]);
        }
        artifacts.printstd();
    }

    Ok(0)
}

fn stage_table(plan: &ResolvedPlan, tools: &StageTools) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
    table.set_titles(row![b->"#", b->"Stage", b->"Kind", b->"Severity", b->"Action"]);
    for (i, stage) in plan.stages.iter().enumerate() {
        let severity = match stage.severity() {
            Severity::Fatal => "fatal",
            Severity::Warning => "warning",
        };
        table.add_row(row![i + 1, stage.name(), stage.kind(), severity, stage.describe(tools)]);
    }
    table
}
