// Our custom logging macros to give us nicely formatted (and colored!) output.
use crate::log_warn;
// The 'colored' crate helps us make our console output look pretty and readable.
use colored::Colorize;
use std::path::PathBuf;

/// Detects the current machine's CPU architecture (e.g., "arm64", "x86_64").
///
/// `std::env::consts::ARCH` is the target the binary was compiled for, which is
/// what the running process is. The value is normalized so plans can match on it.
pub fn detect_architecture() -> String {
    normalize_arch(std::env::consts::ARCH)
}

/// Detects the current operating system (e.g., "macos", "linux").
pub fn detect_os() -> String {
    normalize_os(std::env::consts::OS)
}

/// Normalizes various input strings for operating systems into a consistent, lowercase format.
///
/// # Arguments
/// * `os`: An input string (`&str`) representing an OS (e.g., "macOS", "darwin", "Linux").
///
/// # Returns
/// * `String`: The normalized OS string (e.g., "macos", "linux", "windows").
///   If the input is not a known alias, the lowercase version of the input is returned.
pub fn normalize_os(os: &str) -> String {
    match os.to_lowercase().as_str() {
        "macos" | "darwin" | "apple-darwin" => "macos".to_string(),
        "linux" => "linux".to_string(),
        "windows" | "win32" | "win64" => "windows".to_string(),
        other => {
            // Unknown OS variants are passed through; adapter selection rejects them later.
            log_warn!("[Platform] Unknown OS variant '{}', using as-is.", other.purple());
            other.to_string()
        }
    }
}

/// Normalizes various input strings for CPU architectures into a consistent, lowercase format.
///
/// # Arguments
/// * `arch`: An input string (`&str`) representing an architecture (e.g., "AARCH64", "x86_64", "amd64").
///
/// # Returns
/// * `String`: The normalized architecture string (e.g., "arm64", "x86_64").
pub fn normalize_arch(arch: &str) -> String {
    match arch.to_lowercase().as_str() {
        "aarch64" | "arm64" => "arm64".to_string(),
        "amd64" | "x86_64" => "x86_64".to_string(),
        other => {
            log_warn!("[Platform] Unknown ARCH variant '{}', using as-is.", other.purple());
            other.to_string()
        }
    }
}

/// The current user's login shell as recorded in the user database.
///
/// `$SHELL` is only consulted when there is no passwd entry: it keeps the old
/// value until the next login, so it goes stale right after `chsh`.
pub fn login_shell() -> Option<String> {
    let recorded = nix::unistd::User::from_uid(nix::unistd::getuid())
        .ok()
        .flatten()
        .map(|user| user.shell);
    pick_login_shell(recorded, std::env::var("SHELL").ok())
}

fn pick_login_shell(recorded: Option<PathBuf>, env_shell: Option<String>) -> Option<String> {
    match recorded {
        // An empty shell field means /bin/sh.
        Some(shell) if shell.as_os_str().is_empty() => Some("/bin/sh".to_string()),
        Some(shell) => Some(shell.to_string_lossy().into_owned()),
        None => env_shell,
    }
}

/// Whether a binary resolves on PATH.
pub fn binary_available(name: &str) -> bool {
    which::which(name).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn os_aliases_are_normalized() {
        assert_eq!(normalize_os("Darwin"), "macos");
        assert_eq!(normalize_os("Linux"), "linux");
        assert_eq!(normalize_os("win64"), "windows");
        assert_eq!(normalize_os("freebsd"), "freebsd");
    }

    #[test]
    fn arch_aliases_are_normalized() {
        assert_eq!(normalize_arch("aarch64"), "arm64");
        assert_eq!(normalize_arch("AMD64"), "x86_64");
        assert_eq!(normalize_arch("riscv64"), "riscv64");
    }

    #[test]
    fn user_database_wins_over_a_stale_shell_variable() {
        assert_eq!(
            pick_login_shell(Some(PathBuf::from("/usr/bin/zsh")), Some("/bin/bash".into())),
            Some("/usr/bin/zsh".to_string())
        );
        assert_eq!(pick_login_shell(Some(PathBuf::new()), None), Some("/bin/sh".to_string()));
        assert_eq!(pick_login_shell(None, Some("/bin/bash".into())), Some("/bin/bash".to_string()));
        assert_eq!(pick_login_shell(None, None), None);
    }

    #[test]
    fn shell_is_always_available() {
        assert!(binary_available("sh"));
        assert!(!binary_available("definitely-not-a-real-binary-xyz"));
    }
}
