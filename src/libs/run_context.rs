// Process-wide state for a single invocation.
// Constructed once at startup, owned by the orchestrator for the run's lifetime
// and handed explicitly to every component. Nothing here is persisted.

use crate::libs::backup_manager::BackupSnapshot;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// What was resolved about the machine before the run started.
#[derive(Debug, Clone, Serialize)]
pub struct PlatformInfo {
    /// Normalized OS name (`linux`, `macos`).
    pub os: String,
    /// Normalized architecture (`x86_64`, `arm64`).
    pub arch: String,
    /// Name of the selected package manager adapter (`apt`, `brew`, ...).
    pub package_manager: String,
    /// The user's login shell from the user database, read at startup.
    pub login_shell: Option<String>,
}

/// A non-fatal problem attributed to a stage or component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub origin: String,
    pub reason: String,
}

/// How a single stage ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// The probe reported the work as already done; apply was not invoked.
    Skipped,
    Applied,
    /// Apply failed on a Warning-severity stage.
    Warning,
    /// Apply failed on a Fatal-severity stage (or was interrupted).
    Failed,
    /// Never reached because an earlier stage was Fatal.
    NotRun,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageRecord {
    pub index: usize,
    pub name: String,
    pub status: StageStatus,
}

#[derive(Debug)]
pub struct RunContext {
    pub platform: PlatformInfo,
    /// Installation root; `~` in plans expands to this.
    pub root: PathBuf,
    /// Parent directory under which the backup snapshot is created.
    pub backup_base: PathBuf,
    backup: Option<BackupSnapshot>,
    issues: Vec<Issue>,
    records: Vec<StageRecord>,
    stage_index: usize,
}

impl RunContext {
    pub fn new(platform: PlatformInfo, root: PathBuf, backup_base: PathBuf) -> Self {
        RunContext {
            platform,
            root,
            backup_base,
            backup: None,
            issues: Vec::new(),
            records: Vec::new(),
            stage_index: 0,
        }
    }

    pub fn backup(&self) -> Option<&BackupSnapshot> {
        self.backup.as_ref()
    }

    pub fn backup_dir(&self) -> Option<&Path> {
        self.backup.as_ref().map(BackupSnapshot::dir)
    }

    /// Stores the run's snapshot. A run has at most one; a second call is ignored
    /// and returns `false`.
    pub fn set_backup(&mut self, snapshot: BackupSnapshot) -> bool {
        if self.backup.is_some() {
            return false;
        }
        self.backup = Some(snapshot);
        true
    }

    pub fn record_issue(&mut self, origin: impl Into<String>, reason: impl Into<String>) {
        self.issues.push(Issue {
            origin: origin.into(),
            reason: reason.into(),
        });
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    /// Advances to the next stage and returns its 1-based index.
    pub fn advance_stage(&mut self) -> usize {
        self.stage_index += 1;
        self.stage_index
    }

    pub fn stage_index(&self) -> usize {
        self.stage_index
    }

    pub fn record_stage(&mut self, name: &str, status: StageStatus) {
        self.records.push(StageRecord {
            index: self.stage_index,
            name: name.to_string(),
            status,
        });
    }

    pub fn records(&self) -> &[StageRecord] {
        &self.records
    }
}

#[cfg(test)]
pub(crate) fn test_context(root: &Path) -> RunContext {
    RunContext::new(
        PlatformInfo {
            os: "linux".into(),
            arch: "x86_64".into(),
            package_manager: "fake".into(),
            login_shell: Some("/bin/bash".into()),
        },
        root.to_path_buf(),
        root.join(".devbox-provision").join("backups"),
    )
}
