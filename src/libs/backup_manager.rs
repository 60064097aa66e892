// Snapshots pre-existing user state before any stage overwrites it.
//
// The snapshot directory is created lazily, on the first path that actually
// exists, so a fresh machine gets no empty backup directory. Once the run has
// a snapshot it is never touched again; recovery from it is manual.

use crate::libs::outcome::{Failure, Outcome};
use crate::libs::run_context::RunContext;
use crate::libs::utilities::path_helpers::{copy_recursively, path_exists, snapshot_relative_path};
use crate::libs::utilities::timestamps::snapshot_stamp;
use crate::{log_debug, log_info, log_step, log_success, log_warn};
use chrono::{DateTime, Local};
use colored::Colorize;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const ORIGIN: &str = "backup";

/// A write-once, timestamped directory holding copies of pre-existing paths.
#[derive(Debug, Clone, Serialize)]
pub struct BackupSnapshot {
    dir: PathBuf,
    sources: Vec<PathBuf>,
    created_at: DateTime<Local>,
}

impl BackupSnapshot {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The original paths that were successfully copied into the snapshot.
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }
}

pub struct BackupManager;

impl BackupManager {
    /// Copies every existing path of `paths` into a new snapshot under `ctx.backup_base`.
    ///
    /// Individual copy failures are Warnings. Failing to create the snapshot
    /// directory itself is Fatal: nothing could be preserved at all.
    pub fn backup_if_present(&self, paths: &[PathBuf], ctx: &mut RunContext) -> Outcome {
        if ctx.backup().is_some() {
            log_debug!("[Backup] Snapshot already taken for this run, not taking another.");
            return Outcome::Success;
        }

        let present: Vec<&PathBuf> = paths.iter().filter(|path| path_exists(path)).collect();
        if present.is_empty() {
            log_info!("[Backup] Nothing to back up ({} monitored path(s) absent)", paths.len());
            return Outcome::Success;
        }
        log_step!("[Backup] Backing up {} existing path(s)", present.len());

        let now = Local::now();
        let dir = match create_snapshot_dir(&ctx.backup_base, &snapshot_stamp(&now)) {
            Ok(dir) => dir,
            Err(err) => {
                return Outcome::Fatal(Failure::new(
                    ORIGIN,
                    format!(
                        "could not create backup directory under {}: {err}",
                        ctx.backup_base.display()
                    ),
                    1,
                ));
            }
        };

        let mut sources = Vec::new();
        let mut failed = Vec::new();
        for path in present {
            let target = dir.join(snapshot_relative_path(path, &ctx.root));
            match copy_recursively(path, &target) {
                Ok(()) => {
                    log_debug!(
                        "[Backup] {} -> {}",
                        path.display(),
                        target.display().to_string().dimmed()
                    );
                    sources.push(path.clone());
                }
                Err(err) => {
                    log_warn!("[Backup] Could not back up {}: {}", path.display().to_string().yellow(), err);
                    ctx.record_issue(ORIGIN, format!("could not back up {}: {err}", path.display()));
                    failed.push(path.display().to_string());
                }
            }
        }

        log_success!(
            "[Backup] Snapshot written to {}",
            dir.display().to_string().cyan()
        );
        ctx.set_backup(BackupSnapshot {
            dir,
            sources,
            created_at: now,
        });

        if failed.is_empty() {
            Outcome::Success
        } else {
            Outcome::Warning(Failure::new(
                ORIGIN,
                format!("partial backup, not copied: {}", failed.join(", ")),
                1,
            ))
        }
    }
}

/// Creates `<base>/<stamp>`, or `<stamp>-1`, `<stamp>-2`, ... when an earlier
/// run in the same second already used the name.
fn create_snapshot_dir(base: &Path, stamp: &str) -> io::Result<PathBuf> {
    fs::create_dir_all(base)?;
    let mut suffix = 0u32;
    loop {
        let name = if suffix == 0 {
            stamp.to_string()
        } else {
            format!("{stamp}-{suffix}")
        };
        let candidate = base.join(name);
        match fs::create_dir(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => suffix += 1,
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::run_context::test_context;
    use tempfile::tempdir;

    #[test]
    fn copies_present_paths_and_ignores_absent_ones() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        fs::write(root.join(".zshrc"), "export ZSH=1\n").unwrap();
        fs::create_dir_all(root.join(".oh-my-zsh/custom")).unwrap();
        fs::write(root.join(".oh-my-zsh/custom/theme.zsh"), "theme").unwrap();

        let mut ctx = test_context(root);
        let paths = vec![
            root.join(".zshrc"),
            root.join(".oh-my-zsh"),
            root.join(".p10k.zsh"),
        ];
        assert_eq!(BackupManager.backup_if_present(&paths, &mut ctx), Outcome::Success);

        let snapshot = ctx.backup().expect("snapshot created");
        assert!(snapshot.dir().starts_with(&ctx.backup_base));
        assert_eq!(
            fs::read_to_string(snapshot.dir().join(".zshrc")).unwrap(),
            "export ZSH=1\n"
        );
        assert_eq!(
            fs::read_to_string(snapshot.dir().join(".oh-my-zsh/custom/theme.zsh")).unwrap(),
            "theme"
        );
        assert!(!snapshot.dir().join(".p10k.zsh").exists());
        assert_eq!(snapshot.sources().len(), 2);
    }

    #[test]
    fn no_snapshot_directory_when_nothing_exists() {
        let tmp = tempdir().unwrap();
        let mut ctx = test_context(tmp.path());
        let paths = vec![tmp.path().join(".zshrc")];

        assert_eq!(BackupManager.backup_if_present(&paths, &mut ctx), Outcome::Success);
        assert!(ctx.backup().is_none());
        assert!(!ctx.backup_base.exists());
    }

    #[test]
    fn same_second_runs_get_distinct_directories() {
        let tmp = tempdir().unwrap();
        let first = create_snapshot_dir(tmp.path(), "20261019-142503").unwrap();
        let second = create_snapshot_dir(tmp.path(), "20261019-142503").unwrap();
        assert_ne!(first, second);
        assert!(second.ends_with("20261019-142503-1"));
    }

    #[test]
    fn unreadable_paths_become_warnings() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempdir().unwrap();
        let root = tmp.path();
        let locked = root.join("locked");
        fs::create_dir_all(&locked).unwrap();
        fs::write(locked.join("secret"), "x").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Root can read anything; the scenario only exists for regular users.
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        fs::write(root.join(".zshrc"), "x").unwrap();
        let mut ctx = test_context(root);
        let outcome = BackupManager.backup_if_present(&[locked.clone(), root.join(".zshrc")], &mut ctx);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert!(matches!(outcome, Outcome::Warning(ref f) if f.origin == "backup"));
        assert_eq!(ctx.issues().len(), 1);
        assert_eq!(ctx.backup().unwrap().sources(), &[root.join(".zshrc")]);
    }

    #[test]
    fn a_run_takes_at_most_one_snapshot() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        fs::write(root.join(".zshrc"), "x").unwrap();
        let mut ctx = test_context(root);
        let paths = vec![root.join(".zshrc")];

        BackupManager.backup_if_present(&paths, &mut ctx);
        let first = ctx.backup_dir().unwrap().to_path_buf();
        BackupManager.backup_if_present(&paths, &mut ctx);

        assert_eq!(ctx.backup_dir().unwrap(), first);
        assert_eq!(fs::read_dir(&ctx.backup_base).unwrap().count(), 1);
    }
}
