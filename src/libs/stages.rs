// Concrete stage kinds, one per plan action.
//
// Each kind pairs a cheap, read-only probe with an apply-action that is safe to
// re-run. The probe decides whether the orchestrator skips the stage; apply
// still guards against re-entry because probes can be wrong when the platform
// misbehaves.

use crate::libs::command_runner::CommandSpec;
use crate::libs::errors::{PlanError, StageError};
use crate::libs::http;
use crate::libs::plan_loading::Expander;
use crate::libs::run_context::RunContext;
use crate::libs::stage::{Stage, StageTools};
use crate::libs::utilities::platform::binary_available;
use crate::log_debug;
use crate::schemas::plan::{PackageRef, Severity, StageAction, StageEntry};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;

/// Downloads may be large; connectivity probes use the much shorter preflight timeout.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Builds the stage for a plan entry, expanding every path it mentions.
pub fn build_stage(entry: &StageEntry, expander: &Expander) -> Result<Box<dyn Stage>, PlanError> {
    let name = entry.name.clone();
    let severity = entry.severity;
    let invalid = |reason: &str| PlanError::InvalidStage {
        stage: entry.name.clone(),
        reason: reason.to_string(),
    };

    let action = entry.action().map_err(|reason| invalid(&reason))?;
    let stage: Box<dyn Stage> = match &action {
        StageAction::Package(action) => {
            if action.packages.is_empty() {
                return Err(invalid("package stage lists no packages"));
            }
            Box::new(PackageStage {
                name,
                severity,
                packages: action.packages.clone(),
                provides: action.provides.clone(),
                refresh: action.refresh,
            })
        }
        StageAction::GitClone(action) => Box::new(GitCloneStage {
            name,
            severity,
            repo: expander.expand(&action.repo)?,
            dest: expander.expand_path(&action.dest)?,
            branch: action.branch.clone(),
        }),
        StageAction::Download(action) => Box::new(DownloadStage {
            name,
            severity,
            url: expander.expand(&action.url)?,
            dest: expander.expand_path(&action.dest)?,
            sha256: action.sha256.as_ref().map(|hash| hash.trim().to_lowercase()),
            mode: match &action.mode {
                Some(mode) => Some(
                    u32::from_str_radix(mode.trim_start_matches("0o"), 8)
                        .map_err(|_| invalid(&format!("invalid file mode '{mode}', expected octal such as 0755")))?,
                ),
                None => None,
            },
        }),
        StageAction::File(action) => Box::new(FileStage {
            name,
            severity,
            dest: expander.expand_path(&action.dest)?,
            content: expander.expand_command(&action.content),
        }),
        StageAction::Command(action) => Box::new(CommandStage {
            name,
            severity,
            script: expander.expand_command(&action.run),
            elevate: action.elevate,
            creates: action
                .creates
                .as_deref()
                .map(|path| expander.expand_path(path))
                .transpose()?,
            unless: action.unless.as_deref().map(|cmd| expander.expand_command(cmd)),
        }),
        StageAction::DefaultShell(action) => Box::new(DefaultShellStage {
            name,
            severity,
            shell: action.shell.clone(),
        }),
    };
    Ok(stage)
}

fn create_parent(path: &Path) -> Result<&Path, StageError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("/"));
    fs::create_dir_all(parent).map_err(|err| StageError::io(parent, err))?;
    Ok(parent)
}

/// Permissions for a file about to replace `dest`: the existing file's, else 0644.
/// Staged temp files are created 0600 and would otherwise keep that mode.
fn replacement_permissions(dest: &Path) -> fs::Permissions {
    fs::metadata(dest)
        .map(|meta| meta.permissions())
        .unwrap_or_else(|_| fs::Permissions::from_mode(0o644))
}

fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Installs packages with the injected platform adapter.
pub struct PackageStage {
    name: String,
    severity: Severity,
    packages: Vec<PackageRef>,
    provides: Vec<String>,
    refresh: bool,
}

impl PackageStage {
    fn probed_binaries(&self) -> Vec<&str> {
        if self.provides.is_empty() {
            self.packages.iter().map(PackageRef::name).collect()
        } else {
            self.provides.iter().map(String::as_str).collect()
        }
    }
}

impl Stage for PackageStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn severity(&self) -> Severity {
        self.severity
    }

    fn kind(&self) -> &'static str {
        "package"
    }

    fn describe(&self, tools: &StageTools) -> String {
        let install = tools
            .adapter
            .resolve_install_command(&tools.adapter.package_names(&self.packages));
        if self.refresh {
            format!("{} && {}", tools.adapter.resolve_update_command().display(), install.display())
        } else {
            install.display()
        }
    }

    fn is_satisfied(&self, _ctx: &RunContext, _tools: &StageTools) -> bool {
        self.probed_binaries().into_iter().all(binary_available)
    }

    fn apply(&self, _ctx: &RunContext, tools: &StageTools) -> Result<(), StageError> {
        if self.refresh {
            tools.runner.run(&tools.adapter.resolve_update_command())?;
        }
        let names = tools.adapter.package_names(&self.packages);
        tools.runner.run(&tools.adapter.resolve_install_command(&names))?;
        Ok(())
    }
}

/// Shallow-clones a repository into `dest`.
pub struct GitCloneStage {
    name: String,
    severity: Severity,
    repo: String,
    dest: PathBuf,
    branch: Option<String>,
}

impl GitCloneStage {
    fn command(&self) -> CommandSpec {
        let mut spec = CommandSpec::new("git").args(["clone", "--depth", "1"]);
        if let Some(branch) = &self.branch {
            spec = spec.arg("--branch").arg(branch);
        }
        spec.arg(&self.repo).arg(self.dest.to_string_lossy())
    }

    fn is_cloned(&self) -> bool {
        self.dest.join(".git").exists()
    }
}

impl Stage for GitCloneStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn severity(&self) -> Severity {
        self.severity
    }

    fn kind(&self) -> &'static str {
        "git_clone"
    }

    fn describe(&self, _tools: &StageTools) -> String {
        self.command().display()
    }

    fn is_satisfied(&self, _ctx: &RunContext, _tools: &StageTools) -> bool {
        self.is_cloned()
    }

    fn apply(&self, _ctx: &RunContext, tools: &StageTools) -> Result<(), StageError> {
        if self.is_cloned() {
            log_debug!("[GitClone] {} already present", self.dest.display());
            return Ok(());
        }
        create_parent(&self.dest)?;
        tools.runner.run(&self.command())?;
        Ok(())
    }
}

/// Fetches a single file, optionally checking its SHA-256 and setting its mode.
pub struct DownloadStage {
    name: String,
    severity: Severity,
    url: String,
    dest: PathBuf,
    sha256: Option<String>,
    mode: Option<u32>,
}

impl Stage for DownloadStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn severity(&self) -> Severity {
        self.severity
    }

    fn kind(&self) -> &'static str {
        "download"
    }

    fn describe(&self, _tools: &StageTools) -> String {
        format!("download {} -> {}", self.url, self.dest.display())
    }

    fn is_satisfied(&self, _ctx: &RunContext, _tools: &StageTools) -> bool {
        if !self.dest.is_file() {
            return false;
        }
        match &self.sha256 {
            Some(expected) => sha256_file(&self.dest).is_ok_and(|actual| &actual == expected),
            None => true,
        }
    }

    fn apply(&self, _ctx: &RunContext, _tools: &StageTools) -> Result<(), StageError> {
        let parent = create_parent(&self.dest)?;
        // Download next to the destination so the final rename stays on one filesystem.
        let mut staging = NamedTempFile::new_in(parent).map_err(|err| StageError::io(parent, err))?;
        http::download_into(&self.url, staging.as_file_mut(), DOWNLOAD_TIMEOUT).map_err(|reason| {
            StageError::Download {
                url: self.url.clone(),
                reason,
            }
        })?;

        if let Some(expected) = &self.sha256 {
            let actual = sha256_file(staging.path()).map_err(|err| StageError::io(staging.path(), err))?;
            if &actual != expected {
                return Err(StageError::Checksum {
                    url: self.url.clone(),
                    expected: expected.clone(),
                    actual,
                });
            }
        }
        let permissions = match self.mode {
            Some(mode) => fs::Permissions::from_mode(mode),
            None => replacement_permissions(&self.dest),
        };
        fs::set_permissions(staging.path(), permissions).map_err(|err| StageError::io(staging.path(), err))?;
        staging
            .persist(&self.dest)
            .map_err(|err| StageError::io(&self.dest, err.error))?;
        Ok(())
    }
}

/// Writes literal content to a file.
pub struct FileStage {
    name: String,
    severity: Severity,
    dest: PathBuf,
    content: String,
}

impl Stage for FileStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn severity(&self) -> Severity {
        self.severity
    }

    fn kind(&self) -> &'static str {
        "file"
    }

    fn describe(&self, _tools: &StageTools) -> String {
        format!("write {} ({} bytes)", self.dest.display(), self.content.len())
    }

    fn is_satisfied(&self, _ctx: &RunContext, _tools: &StageTools) -> bool {
        fs::read_to_string(&self.dest).is_ok_and(|current| current == self.content)
    }

    fn apply(&self, _ctx: &RunContext, _tools: &StageTools) -> Result<(), StageError> {
        let parent = create_parent(&self.dest)?;
        let mut staging = NamedTempFile::new_in(parent).map_err(|err| StageError::io(parent, err))?;
        staging
            .write_all(self.content.as_bytes())
            .map_err(|err| StageError::io(staging.path(), err))?;
        fs::set_permissions(staging.path(), replacement_permissions(&self.dest))
            .map_err(|err| StageError::io(staging.path(), err))?;
        staging
            .persist(&self.dest)
            .map_err(|err| StageError::io(&self.dest, err.error))?;
        Ok(())
    }
}

/// Runs a shell command, guarded by `creates` and/or `unless`.
pub struct CommandStage {
    name: String,
    severity: Severity,
    script: String,
    elevate: bool,
    creates: Option<PathBuf>,
    unless: Option<String>,
}

impl CommandStage {
    fn command(&self) -> CommandSpec {
        let spec = CommandSpec::shell(&self.script);
        if self.elevate { spec.elevated() } else { spec }
    }
}

impl Stage for CommandStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn severity(&self) -> Severity {
        self.severity
    }

    fn kind(&self) -> &'static str {
        "command"
    }

    fn describe(&self, _tools: &StageTools) -> String {
        self.command().display()
    }

    /// Without `creates` or `unless` the command always runs.
    fn is_satisfied(&self, _ctx: &RunContext, tools: &StageTools) -> bool {
        if self.creates.as_deref().is_some_and(Path::exists) {
            return true;
        }
        match &self.unless {
            Some(check) => tools.runner.succeeds(&CommandSpec::shell(check)),
            None => false,
        }
    }

    fn apply(&self, _ctx: &RunContext, tools: &StageTools) -> Result<(), StageError> {
        tools.runner.run(&self.command())?;
        Ok(())
    }
}

/// Makes `shell` the user's login shell.
pub struct DefaultShellStage {
    name: String,
    severity: Severity,
    shell: String,
}

impl DefaultShellStage {
    fn shell_name(&self) -> &str {
        Path::new(&self.shell)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&self.shell)
    }
}

impl Stage for DefaultShellStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn severity(&self) -> Severity {
        self.severity
    }

    fn kind(&self) -> &'static str {
        "default_shell"
    }

    fn describe(&self, _tools: &StageTools) -> String {
        format!("chsh -s $(which {})", self.shell_name())
    }

    fn is_satisfied(&self, ctx: &RunContext, _tools: &StageTools) -> bool {
        ctx.platform
            .login_shell
            .as_deref()
            .and_then(|current| Path::new(current).file_name())
            .is_some_and(|current| current == self.shell_name())
    }

    fn apply(&self, _ctx: &RunContext, tools: &StageTools) -> Result<(), StageError> {
        let path = which::which(&self.shell).map_err(|_| StageError::MissingBinary(self.shell.clone()))?;
        tools
            .runner
            .run(&CommandSpec::new("chsh").arg("-s").arg(path.to_string_lossy()))?;
        Ok(())
    }
}
