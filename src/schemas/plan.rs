// Defines the data structures (schemas) for provisioning plans.
// A plan is the YAML document that declares the preflight thresholds,
// the paths to back up, the ordered stage list and the artifacts to verify.
// Both the embedded profiles and user-supplied `--plan` files use this schema.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn default_upstream() -> String {
    "https://github.com".to_string()
}

fn default_general_host() -> String {
    "https://www.google.com".to_string()
}

// 100 MiB
fn default_min_free_bytes() -> u64 {
    100 * 1024 * 1024
}

fn default_timeout_secs() -> u64 {
    5
}

/// Top-level plan document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Short name shown in logs and in the run summary (e.g. "shell").
    pub name: String,
    /// Optional one-line description, shown by the `plan` command.
    #[serde(default)]
    pub description: Option<String>,
    /// The host the run depends on (package mirrors, git remotes).
    /// Probed by the connectivity preflight.
    #[serde(default = "default_upstream")]
    pub upstream: String,
    /// Plan variables, usable as `${NAME}` in every path and command.
    /// Values may reference the built-ins (`ROOT`, `HOME`, `OS`, `ARCH`) and each other.
    #[serde(default)]
    pub vars: BTreeMap<String, String>,
    #[serde(default)]
    pub preflight: PreflightConfig,
    /// Paths that stages may overwrite. Existing ones are copied to the backup snapshot.
    #[serde(default)]
    pub backup: Vec<String>,
    /// Ordered stage list. Executed strictly in declaration order.
    pub stages: Vec<StageEntry>,
    /// End-state artifacts re-probed once all stages have run.
    #[serde(default)]
    pub verify: Vec<ArtifactEntry>,
}

/// Preflight thresholds and hosts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreflightConfig {
    /// Any well-known host, proves general internet access.
    #[serde(default = "default_general_host")]
    pub general_host: String,
    /// Overrides `Plan::upstream` for the upstream connectivity probe.
    #[serde(default)]
    pub upstream_host: Option<String>,
    /// The free space required on the volume holding `disk_path`.
    #[serde(default = "default_min_free_bytes")]
    pub min_free_bytes: u64,
    /// Defaults to the installation root.
    #[serde(default)]
    pub disk_path: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for PreflightConfig {
    fn default() -> Self {
        PreflightConfig {
            general_host: default_general_host(),
            upstream_host: None,
            min_free_bytes: default_min_free_bytes(),
            disk_path: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// What happens to the run when a stage's apply-action fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Halts the stage list and routes to the error reporter.
    #[default]
    Fatal,
    /// Recorded, surfaced in the summary, the run continues.
    Warning,
}

/// A single stage declaration. Exactly one action key must be present.
///
/// ```yaml
/// - name: install zsh
///   package:
///     packages: [zsh, git]
/// - name: fonts
///   severity: warning
///   download:
///     url: https://example.com/font.ttf
///     dest: ~/.local/share/fonts/font.ttf
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageEntry {
    pub name: String,
    #[serde(default)]
    pub severity: Severity,
    /// Extra paths this stage overwrites; merged into the plan-level backup list.
    #[serde(default)]
    pub backup: Vec<String>,
    #[serde(flatten)]
    pub actions: StageActions,
}

impl StageEntry {
    /// The single action this stage declares. Zero or several action keys are
    /// rejected with the reason as the error.
    pub fn action(&self) -> Result<StageAction, String> {
        let mut declared = self.actions.declared();
        match declared.len() {
            1 => Ok(declared.remove(0)),
            0 => Err(format!("no action declared (expected one of {})", ACTION_KEYS.join(", "))),
            _ => {
                let kinds: Vec<&str> = declared.iter().map(StageAction::kind).collect();
                Err(format!("declares {} actions ({}), exactly one is allowed", kinds.len(), kinds.join(", ")))
            }
        }
    }
}

const ACTION_KEYS: [&str; 6] = ["package", "git_clone", "download", "file", "command", "default_shell"];

/// Every action key a stage may carry. Serde keeps all of them so that a
/// stage declaring two actions is reported instead of losing one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageActions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<PackageAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_clone: Option<GitCloneAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download: Option<DownloadAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<CommandAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_shell: Option<DefaultShellAction>,
}

impl StageActions {
    fn declared(&self) -> Vec<StageAction> {
        [
            self.package.clone().map(StageAction::Package),
            self.git_clone.clone().map(StageAction::GitClone),
            self.download.clone().map(StageAction::Download),
            self.file.clone().map(StageAction::File),
            self.command.clone().map(StageAction::Command),
            self.default_shell.clone().map(StageAction::DefaultShell),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

/// The apply-action of a stage, keyed by kind.
#[derive(Debug, Clone)]
pub enum StageAction {
    Package(PackageAction),
    GitClone(GitCloneAction),
    Download(DownloadAction),
    File(FileAction),
    Command(CommandAction),
    DefaultShell(DefaultShellAction),
}

impl StageAction {
    /// The YAML key of the action, used in tables and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            StageAction::Package(_) => "package",
            StageAction::GitClone(_) => "git_clone",
            StageAction::Download(_) => "download",
            StageAction::File(_) => "file",
            StageAction::Command(_) => "command",
            StageAction::DefaultShell(_) => "default_shell",
        }
    }
}

/// Install packages through the detected package manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageAction {
    pub packages: Vec<PackageRef>,
    /// Binaries whose presence on PATH means the stage is already satisfied.
    /// Defaults to the package names.
    #[serde(default)]
    pub provides: Vec<String>,
    /// Refresh the package index (`apt-get update`, `brew update`, ...) first.
    #[serde(default)]
    pub refresh: bool,
}

/// A package name, optionally with per-package-manager overrides:
///
/// ```yaml
/// packages:
///   - git
///   - { name: docker, apt: docker.io }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum PackageRef {
    Name(String),
    Detailed {
        name: String,
        #[serde(flatten)]
        overrides: BTreeMap<String, String>,
    },
}

impl PackageRef {
    /// The generic package name.
    pub fn name(&self) -> &str {
        match self {
            PackageRef::Name(name) => name,
            PackageRef::Detailed { name, .. } => name,
        }
    }

    /// The name to hand to the given package manager (`apt`, `brew`, ...).
    pub fn name_for(&self, manager: &str) -> &str {
        match self {
            PackageRef::Name(name) => name,
            PackageRef::Detailed { name, overrides } => {
                overrides.get(manager).map(String::as_str).unwrap_or(name)
            }
        }
    }
}

/// Shallow clone of a git repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitCloneAction {
    pub repo: String,
    pub dest: String,
    #[serde(default)]
    pub branch: Option<String>,
}

/// Fetch a single file over HTTP(S).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadAction {
    pub url: String,
    pub dest: String,
    /// Lowercase hex SHA-256 of the expected content.
    #[serde(default)]
    pub sha256: Option<String>,
    /// Octal file mode, e.g. "0755".
    #[serde(default)]
    pub mode: Option<String>,
}

/// Write literal content to a file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileAction {
    pub dest: String,
    pub content: String,
}

/// Run an arbitrary shell command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandAction {
    pub run: String,
    /// Run through `sudo` when not already root.
    #[serde(default)]
    pub elevate: bool,
    /// Satisfied when this path exists.
    #[serde(default)]
    pub creates: Option<String>,
    /// Satisfied when this command exits 0.
    #[serde(default)]
    pub unless: Option<String>,
}

/// Switch the user's login shell with `chsh`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultShellAction {
    pub shell: String,
}

/// An expected end-state artifact. Exactly one probe key must be present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl ArtifactEntry {
    /// The single probe this artifact declares.
    pub fn probe(&self) -> Result<ArtifactProbe, String> {
        let mut declared: Vec<ArtifactProbe> = [
            self.binary.clone().map(ArtifactProbe::Binary),
            self.directory.clone().map(ArtifactProbe::Directory),
            self.file.clone().map(ArtifactProbe::File),
        ]
        .into_iter()
        .flatten()
        .collect();
        match declared.len() {
            1 => Ok(declared.remove(0)),
            0 => Err("no probe declared (expected one of binary, directory, file)".to_string()),
            n => Err(format!("declares {n} probes, exactly one is allowed")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactProbe {
    /// A binary resolvable on PATH.
    Binary(String),
    Directory(String),
    File(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stage_kinds_and_defaults() {
        let yaml = r#"
name: sample
stages:
  - name: base packages
    package:
      packages: [zsh, { name: docker, apt: docker.io }]
      refresh: true
  - name: plugins
    severity: warning
    git_clone:
      repo: https://github.com/zsh-users/zsh-autosuggestions
      dest: "${ROOT}/plugins/zsh-autosuggestions"
verify:
  - name: zsh
    binary: zsh
"#;
        let plan: Plan = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(plan.upstream, "https://github.com");
        assert_eq!(plan.preflight.min_free_bytes, 100 * 1024 * 1024);
        assert_eq!(plan.stages.len(), 2);
        assert_eq!(plan.stages[0].severity, Severity::Fatal);
        assert_eq!(plan.stages[1].severity, Severity::Warning);
        assert_eq!(plan.stages[1].action().unwrap().kind(), "git_clone");

        let Ok(StageAction::Package(pkg)) = plan.stages[0].action() else {
            panic!("expected a package stage");
        };
        assert!(pkg.refresh);
        assert_eq!(pkg.packages[1].name(), "docker");
        assert_eq!(pkg.packages[1].name_for("apt"), "docker.io");
        assert_eq!(pkg.packages[1].name_for("brew"), "docker");
        assert_eq!(plan.verify[0].probe(), Ok(ArtifactProbe::Binary("zsh".into())));
    }

    #[test]
    fn stage_without_action_is_rejected() {
        let yaml = "name: broken\nstages:\n  - name: nothing\n";
        let plan: Plan = serde_yaml::from_str(yaml).unwrap();
        assert!(plan.stages[0].action().unwrap_err().starts_with("no action declared"));
    }

    #[test]
    fn stage_with_two_actions_is_rejected() {
        let yaml = r#"
name: ambiguous
stages:
  - name: rc
    file: { dest: "~/.zshrc", content: "x" }
    command: { run: "rm -rf ~/.zshrc" }
"#;
        let plan: Plan = serde_yaml::from_str(yaml).unwrap();
        let reason = plan.stages[0].action().unwrap_err();
        assert!(reason.contains("file, command"), "{reason}");
    }

    #[test]
    fn artifact_needs_exactly_one_probe() {
        let both: ArtifactEntry = serde_yaml::from_str("{ name: zsh, binary: zsh, file: /bin/zsh }").unwrap();
        assert_eq!(both.probe().unwrap_err(), "declares 2 probes, exactly one is allowed");

        let none: ArtifactEntry = serde_yaml::from_str("{ name: zsh }").unwrap();
        assert!(none.probe().is_err());
    }
}
