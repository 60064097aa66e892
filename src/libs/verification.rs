// Post-run verification gate.
//
// Every expected artifact is re-probed from scratch, without looking at what
// the stages reported. A stage can succeed and still leave the machine short
// (a half-finished clone, a binary installed outside PATH); this is where that
// shows up.

use crate::libs::run_context::RunContext;
use crate::libs::utilities::platform::binary_available;
use crate::{log_step, log_success, log_warn};
use colored::Colorize;
use prettytable::{Table, format, row};
use serde::Serialize;
use std::path::PathBuf;

/// How an artifact is probed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "target")]
pub enum ArtifactCheck {
    Binary(String),
    Directory(PathBuf),
    File(PathBuf),
}

impl ArtifactCheck {
    fn kind(&self) -> &'static str {
        match self {
            ArtifactCheck::Binary(_) => "binary",
            ArtifactCheck::Directory(_) => "directory",
            ArtifactCheck::File(_) => "file",
        }
    }

    fn target(&self) -> String {
        match self {
            ArtifactCheck::Binary(name) => name.clone(),
            ArtifactCheck::Directory(path) | ArtifactCheck::File(path) => path.display().to_string(),
        }
    }

    fn is_present(&self) -> bool {
        match self {
            ArtifactCheck::Binary(name) => binary_available(name),
            ArtifactCheck::Directory(path) => path.is_dir(),
            ArtifactCheck::File(path) => path.is_file(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedArtifact {
    pub name: String,
    pub check: ArtifactCheck,
}

impl ExpectedArtifact {
    pub fn new(name: impl Into<String>, check: ArtifactCheck) -> Self {
        ExpectedArtifact {
            name: name.into(),
            check,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactStatus {
    pub name: String,
    #[serde(flatten)]
    pub check: ArtifactCheck,
    pub present: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VerificationReport {
    pub artifacts: Vec<ArtifactStatus>,
}

impl VerificationReport {
    pub fn issue_count(&self) -> usize {
        self.missing().count()
    }

    pub fn is_clean(&self) -> bool {
        self.issue_count() == 0
    }

    pub fn missing(&self) -> impl Iterator<Item = &ArtifactStatus> {
        self.artifacts.iter().filter(|artifact| !artifact.present)
    }

    /// Table rendering for the terminal.
    pub fn to_table(&self) -> Table {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
        table.set_titles(row![b->"Artifact", b->"Kind", b->"Target", b->"Status"]);
        for artifact in &self.artifacts {
            let status = if artifact.present { "present" } else { "MISSING" };
            table.add_row(row![
                artifact.name,
                artifact.check.kind(),
                artifact.check.target(),
                status
            ]);
        }
        table
    }
}

pub struct VerificationEngine;

impl VerificationEngine {
    pub fn verify(&self, expected: &[ExpectedArtifact], _ctx: &RunContext) -> VerificationReport {
        log_step!("[Verify] Re-probing {} expected artifact(s)", expected.len());

        let artifacts: Vec<ArtifactStatus> = expected
            .iter()
            .map(|artifact| {
                let present = artifact.check.is_present();
                if !present {
                    log_warn!(
                        "[Verify] Missing {} '{}': {}",
                        artifact.check.kind(),
                        artifact.name.yellow(),
                        artifact.check.target()
                    );
                }
                ArtifactStatus {
                    name: artifact.name.clone(),
                    check: artifact.check.clone(),
                    present,
                }
            })
            .collect();

        let report = VerificationReport { artifacts };
        if report.is_clean() {
            log_success!("[Verify] All artifacts present");
        } else {
            log_warn!("[Verify] {} artifact(s) missing", report.issue_count());
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::run_context::test_context;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn counts_each_missing_artifact_once() {
        let tmp = tempdir().unwrap();
        fs::create_dir_all(tmp.path().join(".oh-my-zsh")).unwrap();
        fs::write(tmp.path().join(".zshrc"), "x").unwrap();

        let expected = vec![
            ExpectedArtifact::new("shell", ArtifactCheck::Binary("sh".into())),
            ExpectedArtifact::new("framework", ArtifactCheck::Directory(tmp.path().join(".oh-my-zsh"))),
            ExpectedArtifact::new("rc", ArtifactCheck::File(tmp.path().join(".zshrc"))),
            ExpectedArtifact::new("plugin", ArtifactCheck::Directory(tmp.path().join("plugins/x"))),
            ExpectedArtifact::new("tool", ArtifactCheck::Binary("definitely-not-a-real-binary-xyz".into())),
        ];
        let report = VerificationEngine.verify(&expected, &test_context(tmp.path()));

        assert_eq!(report.issue_count(), 2);
        let missing: Vec<&str> = report.missing().map(|a| a.name.as_str()).collect();
        assert_eq!(missing, vec!["plugin", "tool"]);
    }

    #[test]
    fn a_file_does_not_satisfy_a_directory_probe() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("thing"), "x").unwrap();
        let expected = vec![ExpectedArtifact::new(
            "thing",
            ArtifactCheck::Directory(tmp.path().join("thing")),
        )];
        assert_eq!(VerificationEngine.verify(&expected, &test_context(tmp.path())).issue_count(), 1);
    }

    #[test]
    fn empty_expectations_are_clean() {
        let tmp = tempdir().unwrap();
        let report = VerificationEngine.verify(&[], &test_context(tmp.path()));
        assert!(report.is_clean());
        assert_eq!(report.to_table().len(), 0);
    }
}
