// This file implements the application's logging system.
// It provides macros for the fixed tag vocabulary of the human log
// (INFO, SUCCESS, WARN, ERROR, STEP, DEBUG) and handles conditional output,
// especially for debug messages, with colored terminal output.
// Everything goes to stderr so stdout stays free for `--json` summaries.

use colored::*; // Used for adding color to log tags.
use std::sync::OnceLock; // Ensures the DEBUG_ENABLED flag is initialized exactly once.
use std::sync::atomic::{AtomicBool, Ordering}; // For thread-safe, atomic control of the debug flag.

/// The tags a log line can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Info,
    Success,
    Warn,
    Error,
    Step,
    Debug,
}

impl Tag {
    /// Returns the colored, bracketed label printed in front of a message.
    pub fn label(self) -> ColoredString {
        match self {
            Tag::Info => "[INFO]".bright_blue(),
            Tag::Success => "[SUCCESS]".bright_green(),
            Tag::Warn => "[WARN]".bright_yellow(),
            Tag::Error => "[ERROR]".bright_red(),
            Tag::Step => "[STEP]".bright_magenta().bold(),
            Tag::Debug => "[DEBUG]".dimmed(),
        }
    }
}

/// Writes a single tagged line to stderr. Used by all `log_*!` macros.
pub fn emit(tag: Tag, message: String) {
    if tag == Tag::Debug && !is_debug_enabled() {
        return;
    }
    eprintln!("{} {}", tag.label(), message);
}

// `log_info!` for general application progress and informational messages.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => ($crate::logger::emit($crate::logger::Tag::Info, format!($($arg)*)));
}

// `log_success!` when a unit of work completed as intended.
#[macro_export]
macro_rules! log_success {
    ($($arg:tt)*) => ($crate::logger::emit($crate::logger::Tag::Success, format!($($arg)*)));
}

// `log_warn!` for non-critical issues or noteworthy conditions.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => ($crate::logger::emit($crate::logger::Tag::Warn, format!($($arg)*)));
}

// `log_error!` for critical errors requiring immediate attention.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => ($crate::logger::emit($crate::logger::Tag::Error, format!($($arg)*)));
}

// `log_step!` marks the start of a stage or phase.
#[macro_export]
macro_rules! log_step {
    ($($arg:tt)*) => ($crate::logger::emit($crate::logger::Tag::Step, format!($($arg)*)));
}

// `log_debug!` for detailed internal application tracing.
// Messages are only printed if debug mode is enabled via `is_debug_enabled()`.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if $crate::logger::is_debug_enabled() {
            $crate::logger::emit($crate::logger::Tag::Debug, format!($($arg)*));
        }
    };
}

// Global flag to control debug logging, ensured to be initialized once.
static DEBUG_ENABLED: OnceLock<AtomicBool> = OnceLock::new();

/// Initializes the logger, setting the global debug mode.
/// This function should be called once at application startup.
///
/// In debug mode a `tracing` subscriber is installed as well, so the structured
/// events emitted around process execution and HTTP probes become visible.
///
/// # Arguments
/// * `debug`: If `true`, enables debug logging; otherwise, only info, warn, and error messages are printed.
pub fn init(debug: bool) {
    DEBUG_ENABLED
        .get_or_init(|| AtomicBool::new(debug)) // Initialize if not already set.
        .store(debug, Ordering::Relaxed); // Update the flag with the provided debug value.

    if debug {
        // A second init (e.g. from tests) keeps the first subscriber.
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
        log_debug!("Logger initialized in DEBUG mode");
    }
}

/// Checks if debug logging is currently enabled.
/// Used primarily by the `log_debug!` macro.
pub fn is_debug_enabled() -> bool {
    DEBUG_ENABLED
        .get() // Attempt to retrieve the AtomicBool.
        .map(|f| f.load(Ordering::Relaxed)) // Load its value if present.
        .unwrap_or(false) // Default to false if `init` was never called.
}
