// The stage abstraction: a named unit of work with a side-effect-free
// satisfied-probe, an idempotent apply-action and a severity policy.
//
// The provided methods are the single place that decides skip / apply / record,
// so every concrete stage kind gets identical semantics.

use crate::installers::PlatformAdapter;
use crate::libs::command_runner::CommandRunner;
use crate::libs::errors::{EXIT_INTERRUPTED, StageError};
use crate::libs::interrupt;
use crate::libs::outcome::{Failure, Outcome};
use crate::libs::run_context::{RunContext, StageStatus};
use crate::schemas::plan::Severity;
use crate::{log_error, log_info, log_success, log_warn};
use colored::Colorize;

/// Collaborators injected into every stage: the platform adapter selected at
/// startup and the process runner.
pub struct StageTools<'a> {
    pub adapter: &'a dyn PlatformAdapter,
    pub runner: &'a dyn CommandRunner,
}

pub trait Stage {
    fn name(&self) -> &str;

    fn severity(&self) -> Severity;

    /// The action kind, for tables and dry runs (`package`, `git_clone`, ...).
    fn kind(&self) -> &'static str;

    /// One-line description of what apply would do.
    fn describe(&self, tools: &StageTools) -> String;

    /// Pure query: is the end state of this stage already in place?
    fn is_satisfied(&self, ctx: &RunContext, tools: &StageTools) -> bool;

    /// Performs the work. Must tolerate being invoked on an already-satisfied state.
    fn apply(&self, ctx: &RunContext, tools: &StageTools) -> Result<(), StageError>;

    /// Probe, then apply if needed, then classify the result by severity.
    /// Warnings are recorded in `ctx` here; a Fatal is returned for the
    /// orchestrator to halt on.
    fn run(&self, ctx: &mut RunContext, tools: &StageTools) -> Outcome {
        if self.skip_if_satisfied(ctx, tools) {
            return Outcome::Success;
        }
        self.apply_and_record(ctx, tools)
    }

    /// Runs the probe and records a skip when it passes.
    fn skip_if_satisfied(&self, ctx: &mut RunContext, tools: &StageTools) -> bool {
        if !self.is_satisfied(ctx, tools) {
            return false;
        }
        log_info!("[Stage {}] {} already satisfied, skipping", ctx.stage_index(), self.name().bold());
        ctx.record_stage(self.name(), StageStatus::Skipped);
        true
    }

    /// Applies the stage and records how it ended. Nothing is started once the
    /// run has been interrupted, whatever the severity.
    fn apply_and_record(&self, ctx: &mut RunContext, tools: &StageTools) -> Outcome {
        let label = format!("[Stage {}]", ctx.stage_index());

        if interrupt::is_interrupted() {
            log_error!("{} {} not started: interrupted", label, self.name().bold().red());
            ctx.record_stage(self.name(), StageStatus::Failed);
            return Outcome::Fatal(Failure::new(
                self.name(),
                "interrupted before apply started",
                EXIT_INTERRUPTED,
            ));
        }

        log_info!("{} {}", label, self.describe(tools).dimmed());
        match self.apply(ctx, tools) {
            Ok(()) => {
                log_success!("{} {} done", label, self.name().bold());
                ctx.record_stage(self.name(), StageStatus::Applied);
                Outcome::Success
            }
            Err(err) if err.is_interrupt() || self.severity() == Severity::Fatal => {
                log_error!("{} {} failed: {}", label, self.name().bold().red(), err);
                ctx.record_stage(self.name(), StageStatus::Failed);
                Outcome::Fatal(Failure::new(self.name(), err.to_string(), err.exit_code()))
            }
            Err(err) => {
                log_warn!("{} {} failed (continuing): {}", label, self.name().bold().yellow(), err);
                ctx.record_stage(self.name(), StageStatus::Warning);
                ctx.record_issue(self.name(), err.to_string());
                Outcome::Warning(Failure::new(self.name(), err.to_string(), err.exit_code()))
            }
        }
    }
}
