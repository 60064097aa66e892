// Drives one provisioning run: Preflight, Backup, the ordered stages, then
// Verification.
//
// `Orchestrator::run` is the single error boundary of a run. Every phase
// reports an `Outcome`; the first Fatal short-circuits the remaining phases,
// marks the stages that never ran and hands the failure to the error reporter.
// Whatever happens, the caller gets a `RunSummary` back.

use crate::installers::PlatformAdapter;
use crate::libs::backup_manager::BackupManager;
use crate::libs::command_runner::CommandRunner;
use crate::libs::error_reporter::ErrorReporter;
use crate::libs::errors::EXIT_INTERRUPTED;
use crate::libs::interrupt;
use crate::libs::outcome::Failure;
use crate::libs::plan_loading::ResolvedPlan;
use crate::libs::preflight::{Environment, PreflightChecker};
use crate::libs::run_context::{Issue, PlatformInfo, RunContext, StageRecord, StageStatus};
use crate::libs::stage::StageTools;
use crate::libs::utilities::timestamps::{current_timestamp, format_duration};
use crate::libs::verification::{VerificationEngine, VerificationReport};
use crate::{log_error, log_info, log_step, log_success, log_warn};
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;

/// Final classification of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    /// No Fatal, but warnings were recorded or verification found missing artifacts.
    CompletedWithIssues,
    Failed,
}

/// Everything a run produced, for the terminal summary and `--json`.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub profile: String,
    pub platform: PlatformInfo,
    pub started_at: String,
    pub stages: Vec<StageRecord>,
    pub warnings: Vec<Issue>,
    pub backup_path: Option<PathBuf>,
    /// Source paths copied into the snapshot.
    pub backed_up: Vec<PathBuf>,
    /// Absent when a Fatal stopped the run before verification.
    pub verification: Option<VerificationReport>,
    pub status: RunStatus,
    pub failure: Option<Failure>,
    pub duration_secs: f64,
    #[serde(skip)]
    fatal_exit_code: Option<i32>,
}

impl RunSummary {
    pub fn verification_issues(&self) -> usize {
        self.verification
            .as_ref()
            .map(VerificationReport::issue_count)
            .unwrap_or(0)
    }

    /// Exit status for this run. Stage warnings alone never fail the process;
    /// missing artifacts do unless `lenient_verify` is set.
    pub fn exit_code(&self, lenient_verify: bool) -> i32 {
        match self.status {
            RunStatus::Failed => self.fatal_exit_code.unwrap_or(1),
            _ if self.verification_issues() > 0 && !lenient_verify => 1,
            _ => 0,
        }
    }

    /// Prints the human summary to stderr.
    pub fn print(&self) {
        let count = |status: StageStatus| self.stages.iter().filter(|r| r.status == status).count();
        log_step!("[Summary] Profile '{}' on {}/{}", self.profile.bold(), self.platform.os, self.platform.arch);
        log_info!(
            "[Summary] {} applied, {} skipped, {} warning(s), {} failed, {} not run",
            count(StageStatus::Applied),
            count(StageStatus::Skipped),
            count(StageStatus::Warning),
            count(StageStatus::Failed),
            count(StageStatus::NotRun)
        );
        for warning in &self.warnings {
            log_warn!("[Summary] {}: {}", warning.origin.yellow(), warning.reason);
        }
        if let Some(path) = &self.backup_path {
            log_info!(
                "[Summary] Backup snapshot of {} path(s): {}",
                self.backed_up.len(),
                path.display().to_string().cyan()
            );
        }
        if let Some(report) = &self.verification {
            if !report.artifacts.is_empty() {
                eprint!("{}", report.to_table());
            }
            let missing: Vec<&str> = report.missing().map(|artifact| artifact.name.as_str()).collect();
            if !missing.is_empty() {
                log_warn!("[Summary] Missing artifact(s): {}", missing.join(", "));
            }
        }
        let elapsed = format_duration(&std::time::Duration::from_secs_f64(self.duration_secs));
        match self.status {
            RunStatus::Success => log_success!("Provisioning finished in {}", elapsed),
            RunStatus::CompletedWithIssues => {
                log_warn!("Provisioning completed with issues in {}", elapsed)
            }
            RunStatus::Failed => log_error!("Provisioning failed after {}", elapsed),
        }
    }
}

/// What a dry run found for one stage.
#[derive(Debug, Clone, Serialize)]
pub struct DryRunEntry {
    pub index: usize,
    pub name: String,
    pub kind: &'static str,
    pub satisfied: bool,
    pub action: String,
}

pub struct Orchestrator<'a> {
    plan: &'a ResolvedPlan,
    env: &'a dyn Environment,
    adapter: &'a dyn PlatformAdapter,
    runner: &'a dyn CommandRunner,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        plan: &'a ResolvedPlan,
        env: &'a dyn Environment,
        adapter: &'a dyn PlatformAdapter,
        runner: &'a dyn CommandRunner,
    ) -> Self {
        Orchestrator {
            plan,
            env,
            adapter,
            runner,
        }
    }

    fn tools(&self) -> StageTools<'a> {
        StageTools {
            adapter: self.adapter,
            runner: self.runner,
        }
    }

    /// Runs the whole plan against `ctx`.
    pub fn run(&self, ctx: &mut RunContext) -> RunSummary {
        let started = Instant::now();
        let started_at = current_timestamp();
        log_step!(
            "Provisioning '{}' ({} stage(s)) with {}",
            self.plan.name.bold(),
            self.plan.stages.len(),
            self.adapter.name().cyan()
        );

        let (verification, failure, fatal_exit_code) = match self.execute(ctx) {
            Ok(report) => (Some(report), None, None),
            Err(failure) => {
                self.mark_not_run(ctx);
                let code = ErrorReporter.report(&failure, ctx.backup_dir());
                (None, Some(failure), Some(code))
            }
        };

        let status = if failure.is_some() {
            RunStatus::Failed
        } else if !ctx.issues().is_empty()
            || verification.as_ref().is_some_and(|report| !report.is_clean())
        {
            RunStatus::CompletedWithIssues
        } else {
            RunStatus::Success
        };

        RunSummary {
            profile: self.plan.name.clone(),
            platform: ctx.platform.clone(),
            started_at,
            stages: ctx.records().to_vec(),
            warnings: ctx.issues().to_vec(),
            backup_path: ctx.backup_dir().map(|dir| dir.to_path_buf()),
            backed_up: ctx
                .backup()
                .map(|snapshot| snapshot.sources().to_vec())
                .unwrap_or_default(),
            verification,
            status,
            failure,
            duration_secs: started.elapsed().as_secs_f64(),
            fatal_exit_code,
        }
    }

    fn execute(&self, ctx: &mut RunContext) -> Result<VerificationReport, Failure> {
        PreflightChecker::new(self.env, &self.plan.preflight)
            .check_all(ctx)
            .halt_on_fatal()?;
        if interrupt::is_interrupted() {
            return Err(Failure::new("preflight", "interrupted during preflight", EXIT_INTERRUPTED));
        }

        let tools = self.tools();
        let total = self.plan.stages.len();
        let mut backup_attempted = false;
        for stage in &self.plan.stages {
            if interrupt::is_interrupted() {
                return Err(Failure::new(
                    stage.name(),
                    "interrupted before the stage started",
                    EXIT_INTERRUPTED,
                ));
            }
            let index = ctx.advance_stage();
            log_step!("[Stage {}/{}] {}", index, total, stage.name());
            if stage.skip_if_satisfied(ctx, &tools) {
                continue;
            }

            // The snapshot is taken right before the first stage that mutates anything.
            if !backup_attempted {
                backup_attempted = true;
                BackupManager
                    .backup_if_present(&self.plan.backup_paths, ctx)
                    .halt_on_fatal()?;
            }
            stage.apply_and_record(ctx, &tools).halt_on_fatal()?;
        }

        Ok(VerificationEngine.verify(&self.plan.artifacts, ctx))
    }

    /// Every stage without a record never started. The current stage may have
    /// been entered without a record when the backup failed.
    fn mark_not_run(&self, ctx: &mut RunContext) {
        let recorded = ctx.records().len();
        for stage in self.plan.stages.iter().skip(recorded) {
            if ctx.stage_index() <= ctx.records().len() {
                ctx.advance_stage();
            }
            ctx.record_stage(stage.name(), StageStatus::NotRun);
        }
    }

    /// Probes every stage without applying anything and without taking a backup.
    pub fn dry_run(&self, ctx: &RunContext) -> Vec<DryRunEntry> {
        let tools = self.tools();
        self.plan
            .stages
            .iter()
            .enumerate()
            .map(|(i, stage)| DryRunEntry {
                index: i + 1,
                name: stage.name().to_string(),
                kind: stage.kind(),
                satisfied: stage.is_satisfied(ctx, &tools),
                action: stage.describe(&tools),
            })
            .collect()
    }
}
