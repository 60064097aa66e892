// This is the main module file for the `libs` directory.
// It declares the building blocks of a provisioning run, from plan loading
// through the orchestrator down to process execution.

// Write-once snapshot of pre-existing user state.
pub mod backup_manager;
// External process execution behind the `CommandRunner` seam.
pub mod command_runner;
// Diagnostic summary and exit status for aborted runs.
pub mod error_reporter;
// Typed errors of the lower layers.
pub mod errors;
// Connectivity probes and downloads over `ureq`.
pub mod http;
// SIGINT/SIGTERM flag.
pub mod interrupt;
// Preflight, Backup, Stages, Verification.
pub mod orchestrator;
pub mod outcome;
// Installation root and backup directory resolution.
pub mod paths;
// Plan documents, embedded profiles and variable expansion.
pub mod plan_loading;
// Read-only environment checks.
pub mod preflight;
pub mod run_context;
// The `Stage` trait and its shared run semantics.
pub mod stage;
// Concrete stage kinds.
pub mod stages;
pub mod utilities;
// Post-run re-probe of expected artifacts.
pub mod verification;
