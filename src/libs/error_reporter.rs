// Diagnostic summary for runs that end abnormally.
//
// The reporter only explains: the cause, where the backup snapshot is, and what
// to look at next. It never rolls anything back. Its return value is the exit
// status the process should terminate with.

use crate::libs::errors::{EXIT_INTERRUPTED, EXIT_SPAWN_FAILED};
use crate::libs::outcome::Failure;
use crate::{log_error, log_info, log_warn};
use colored::Colorize;
use std::any::Any;
use std::path::Path;

pub struct ErrorReporter;

impl ErrorReporter {
    /// Reports a Fatal outcome and returns its exit status.
    pub fn report(&self, failure: &Failure, backup_dir: Option<&Path>) -> i32 {
        log_error!("Run aborted in {}: {}", failure.origin.bold().red(), failure.reason);
        self.report_backup(backup_dir);
        for hint in troubleshooting_hints(failure) {
            log_info!("  {} {}", "hint:".cyan(), hint);
        }
        exit_status(failure.exit_code)
    }

    /// Reports a failure that never became an `Outcome` (plan, platform or I/O
    /// errors surfacing as `anyhow`).
    pub fn report_unexpected(&self, err: &anyhow::Error, backup_dir: Option<&Path>) -> i32 {
        log_error!("{}", err);
        for cause in err.chain().skip(1) {
            log_error!("  caused by: {}", cause);
        }
        self.report_backup(backup_dir);
        log_info!(
            "  {} Re-run with {} for the full command log.",
            "hint:".cyan(),
            "--debug".bold()
        );
        1
    }

    /// Reports a panic caught at the top-level boundary.
    pub fn report_panic(&self, payload: &(dyn Any + Send)) -> i32 {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        log_error!("Internal error: {}", message);
        log_info!(
            "  {} This is a bug in devbox-provision. Re-running is safe; completed stages are skipped.",
            "hint:".cyan()
        );
        1
    }

    fn report_backup(&self, backup_dir: Option<&Path>) {
        match backup_dir {
            Some(dir) => log_warn!(
                "Pre-existing files were saved to {}. Nothing was restored automatically.",
                dir.display().to_string().cyan()
            ),
            None => log_info!("No backup snapshot was taken during this run."),
        }
    }
}

/// A zero status would report success for a failed run.
fn exit_status(code: i32) -> i32 {
    if code == 0 { 1 } else { code }
}

/// Hints specific to where the run failed, always ending with the re-run note.
pub fn troubleshooting_hints(failure: &Failure) -> Vec<String> {
    let reason = failure.reason.as_str();
    let mut hints = Vec::new();

    match failure.origin.as_str() {
        "preflight" if failure.exit_code == EXIT_INTERRUPTED => {
            hints.push("The run was interrupted before anything was changed.".into());
        }
        _ if failure.exit_code == EXIT_INTERRUPTED => {
            hints.push(format!(
                "Stage '{}' was interrupted and may be partially applied.",
                failure.origin
            ));
        }
        "preflight" if reason.starts_with("running as root") => {
            hints.push("Run as your regular user. Individual commands ask for sudo when they need it.".into());
        }
        "preflight" if reason.starts_with("no internet connection") => {
            hints.push("Check the network connection, DNS resolution and any HTTPS_PROXY settings.".into());
        }
        "preflight" if reason.starts_with("upstream host") => {
            hints.push("The upstream host may be down or blocked by a firewall. Try again later.".into());
        }
        "preflight" if reason.starts_with("insufficient disk space") => {
            hints.push(
                "Free up space on that volume, or lower `preflight.min_free_bytes` in a custom plan.".into(),
            );
        }
        "preflight" => {
            hints.push(
                "Individual checks can be skipped with --skip-preflight (privilege, connectivity, disk).".into(),
            );
        }
        "backup" => {
            hints.push(
                "Check permissions on the backup location, or point DEVBOX_PROVISION_BACKUP_DIR elsewhere."
                    .into(),
            );
        }
        _ if failure.exit_code == EXIT_SPAWN_FAILED => {
            hints.push("A required program could not be started. Check that it is installed and on PATH.".into());
        }
        _ => {
            hints.push(format!(
                "Stage '{}' failed. Re-run with --debug to see every command it executed.",
                failure.origin
            ));
            hints.push("Package manager errors often clear after refreshing the package index.".into());
        }
    }

    hints.push("Re-running is safe: stages that already completed are detected and skipped.".into());
    hints
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn propagates_the_failures_exit_status() {
        let failure = Failure::new("install zsh", "`apt-get install -y zsh` exited with status 100", 100);
        assert_eq!(ErrorReporter.report(&failure, None), 100);

        let zero = Failure::new("preflight", "odd", 0);
        assert_eq!(ErrorReporter.report(&zero, Some(Path::new("/tmp/backups/x"))), 1);
    }

    #[test]
    fn hints_follow_the_failure_origin() {
        let disk = Failure::new(
            "preflight",
            "insufficient disk space on /home: 50.0 MiB available, 100.0 MiB required",
            1,
        );
        let hints = troubleshooting_hints(&disk);
        assert!(hints[0].contains("min_free_bytes"));
        assert!(hints.last().unwrap().starts_with("Re-running is safe"));

        let interrupted = Failure::new("oh-my-zsh", "interrupted", EXIT_INTERRUPTED);
        assert!(troubleshooting_hints(&interrupted)[0].contains("partially applied"));

        let early = Failure::new("preflight", "interrupted during preflight", EXIT_INTERRUPTED);
        assert!(troubleshooting_hints(&early)[0].contains("before anything was changed"));

        let stage = Failure::new("install zsh", "exited with status 100", 100);
        assert!(troubleshooting_hints(&stage)[0].contains("install zsh"));
    }

    #[test]
    fn unexpected_errors_and_panics_exit_with_one() {
        let err = anyhow::anyhow!("disk on fire").context("loading plan");
        assert_eq!(ErrorReporter.report_unexpected(&err, None), 1);

        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(ErrorReporter.report_panic(payload.as_ref()), 1);
    }
}
