// Typed errors for the lower layers of the provisioner.
// The orchestrator converts these into `Outcome`s; the command layer wraps
// them in `anyhow` with context.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Exit status used when the operator interrupts the run (128 + SIGINT).
pub const EXIT_INTERRUPTED: i32 = 130;
/// Exit status used when a program could not be started at all.
pub const EXIT_SPAWN_FAILED: i32 = 127;

/// Failure of an external process.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("`{command}` exited with status {code}")]
    NonZeroExit { command: String, code: i32 },
    #[error("`{command}` was terminated by signal {signal}")]
    Signaled { command: String, signal: i32 },
    #[error("interrupted while running `{command}`")]
    Interrupted { command: String },
}

impl ExecError {
    /// The exit status the process should propagate for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            ExecError::Spawn { .. } => EXIT_SPAWN_FAILED,
            ExecError::NonZeroExit { code, .. } => *code,
            ExecError::Signaled { signal, .. } => 128 + signal,
            ExecError::Interrupted { .. } => EXIT_INTERRUPTED,
        }
    }
}

/// Failure of a stage's apply-action.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("download of {url} failed: {reason}")]
    Download { url: String, reason: String },
    #[error("checksum mismatch for {url}: expected {expected}, got {actual}")]
    Checksum {
        url: String,
        expected: String,
        actual: String,
    },
    #[error("`{0}` could not be resolved on PATH")]
    MissingBinary(String),
}

impl StageError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StageError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            StageError::Exec(exec) => exec.exit_code(),
            _ => 1,
        }
    }

    /// An interrupt always halts the run, whatever the stage's severity.
    pub fn is_interrupt(&self) -> bool {
        matches!(self, StageError::Exec(ExecError::Interrupted { .. }))
    }
}

/// Problems loading or resolving a plan.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("unknown profile '{name}' (available: {available})")]
    UnknownProfile { name: String, available: String },
    #[error("could not read plan file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not parse plan '{origin}': {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("plan '{0}' declares no stages")]
    NoStages(String),
    #[error("stage name '{0}' is declared more than once")]
    DuplicateStage(String),
    #[error("variable '{var}' is not defined (used in '{input}')")]
    UnknownVariable { var: String, input: String },
    #[error("variables could not be resolved: {0}")]
    UnresolvedVariables(String),
    #[error("stage '{stage}' is invalid: {reason}")]
    InvalidStage { stage: String, reason: String },
    #[error("artifact '{artifact}' is invalid: {reason}")]
    InvalidArtifact { artifact: String, reason: String },
}

/// Problems selecting a platform adapter.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("unsupported operating system '{0}'")]
    UnsupportedOs(String),
    #[error("no supported package manager found on {os} (looked for: {looked_for})")]
    NoPackageManager { os: String, looked_for: String },
    #[error("unknown package manager '{0}' (expected one of: brew, apt, dnf, pacman)")]
    UnknownPackageManager(String),
}
