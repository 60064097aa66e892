use serde::Serialize;
use std::fmt;

/// Why a checked operation did not plainly succeed, and who is responsible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    /// The stage name or component (`preflight`, `backup`, ...) the failure belongs to.
    pub origin: String,
    pub reason: String,
    /// Exit status to propagate when this failure terminates the run.
    pub exit_code: i32,
}

impl Failure {
    pub fn new(origin: impl Into<String>, reason: impl Into<String>, exit_code: i32) -> Self {
        Failure {
            origin: origin.into(),
            reason: reason.into(),
            exit_code,
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.origin, self.reason)
    }
}

/// Tri-state result of every checked operation in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// Aborts the run.
    Fatal(Failure),
    /// Already recorded in the `RunContext`; the run continues.
    Warning(Failure),
}

impl Outcome {
    /// Lets the orchestrator use `?` on a phase: only a Fatal short-circuits.
    pub fn halt_on_fatal(self) -> Result<(), Failure> {
        match self {
            Outcome::Fatal(failure) => Err(failure),
            Outcome::Success | Outcome::Warning(_) => Ok(()),
        }
    }
}
