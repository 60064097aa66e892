// This module is the home of the platform adapters: one implementation per
// package-manager family, each resolving the concrete install and update
// commands for the current machine.
//
// An adapter is selected once at startup (`select_adapter`) and injected into
// every stage. Stages never branch on the operating system themselves.

use crate::libs::command_runner::CommandSpec;
use crate::libs::errors::PlatformError;
use crate::schemas::plan::PackageRef;
use crate::{log_debug, log_info};
use colored::Colorize;

/// Declares the `brew` module, Homebrew on macOS.
pub(crate) mod brew;

/// Declares the `apt` module, for Debian, Ubuntu and derivatives.
pub(crate) mod apt;

/// Declares the `dnf` module, for Fedora, RHEL and derivatives.
pub(crate) mod dnf;

/// Declares the `pacman` module, for Arch Linux and derivatives.
pub(crate) mod pacman;

/// The capability set every platform family exposes to the stages.
pub trait PlatformAdapter {
    /// Short identifier, also the key for per-manager package name overrides.
    fn name(&self) -> &'static str;

    /// Command that installs the given (already manager-specific) package names.
    fn resolve_install_command(&self, packages: &[String]) -> CommandSpec;

    /// Command that refreshes the package index.
    fn resolve_update_command(&self) -> CommandSpec;

    /// Maps plan package references to the names this manager knows them by.
    fn package_names(&self, packages: &[PackageRef]) -> Vec<String> {
        packages
            .iter()
            .map(|package| package.name_for(self.name()).to_string())
            .collect()
    }
}

/// Package managers probed on Linux, in order of preference.
const LINUX_MANAGERS: [(&str, &str); 3] = [("apt", "apt-get"), ("dnf", "dnf"), ("pacman", "pacman")];

/// Builds an adapter by name, used for the `--package-manager` override.
pub fn adapter_by_name(name: &str) -> Result<Box<dyn PlatformAdapter>, PlatformError> {
    match name.to_lowercase().as_str() {
        "brew" | "homebrew" => Ok(Box::new(brew::BrewAdapter)),
        "apt" | "apt-get" => Ok(Box::new(apt::AptAdapter)),
        "dnf" => Ok(Box::new(dnf::DnfAdapter)),
        "pacman" => Ok(Box::new(pacman::PacmanAdapter)),
        other => Err(PlatformError::UnknownPackageManager(other.to_string())),
    }
}

/// Selects the adapter for this machine.
///
/// # Arguments
/// * `os`: normalized OS name, see `utilities::platform::detect_os`.
/// * `preferred`: explicit package manager name, skips detection when set.
/// * `is_available`: reports whether a binary is resolvable on PATH.
pub fn select_adapter(
    os: &str,
    preferred: Option<&str>,
    is_available: impl Fn(&str) -> bool,
) -> Result<Box<dyn PlatformAdapter>, PlatformError> {
    if let Some(name) = preferred {
        log_info!("[Platform] Using package manager {} (explicitly requested)", name.bold());
        return adapter_by_name(name);
    }

    let adapter: Box<dyn PlatformAdapter> = match os {
        "macos" => {
            if !is_available("brew") {
                return Err(PlatformError::NoPackageManager {
                    os: os.to_string(),
                    looked_for: "brew".to_string(),
                });
            }
            Box::new(brew::BrewAdapter)
        }
        "linux" => {
            let found = LINUX_MANAGERS.iter().find(|(_, binary)| {
                let present = is_available(binary);
                log_debug!("[Platform] Probing for {}: {}", binary, present);
                present
            });
            match found {
                Some((name, _)) => adapter_by_name(name)?,
                None => {
                    return Err(PlatformError::NoPackageManager {
                        os: os.to_string(),
                        looked_for: LINUX_MANAGERS
                            .iter()
                            .map(|(_, binary)| *binary)
                            .collect::<Vec<_>>()
                            .join(", "),
                    });
                }
            }
        }
        other => return Err(PlatformError::UnsupportedOs(other.to_string())),
    };

    log_info!(
        "[Platform] Detected {} with package manager {}",
        os.cyan(),
        adapter.name().bold()
    );
    Ok(adapter)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linux_prefers_apt_then_dnf_then_pacman() {
        let adapter = select_adapter("linux", None, |bin| bin == "dnf" || bin == "pacman").unwrap();
        assert_eq!(adapter.name(), "dnf");

        let adapter = select_adapter("linux", None, |_| true).unwrap();
        assert_eq!(adapter.name(), "apt");
    }

    #[test]
    fn macos_requires_homebrew() {
        assert_eq!(select_adapter("macos", None, |bin| bin == "brew").unwrap().name(), "brew");
        assert!(matches!(
            select_adapter("macos", None, |_| false),
            Err(PlatformError::NoPackageManager { .. })
        ));
    }

    #[test]
    fn explicit_choice_skips_detection() {
        let adapter = select_adapter("linux", Some("pacman"), |_| false).unwrap();
        assert_eq!(adapter.name(), "pacman");
        assert!(matches!(
            select_adapter("linux", Some("zypper"), |_| true),
            Err(PlatformError::UnknownPackageManager(_))
        ));
    }

    #[test]
    fn unsupported_os_is_an_error() {
        assert!(matches!(
            select_adapter("windows", None, |_| true),
            Err(PlatformError::UnsupportedOs(os)) if os == "windows"
        ));
    }

    #[test]
    fn package_names_apply_overrides() {
        let packages: Vec<PackageRef> =
            serde_yaml::from_str("[git, {name: docker, apt: docker.io}]").unwrap();
        assert_eq!(apt::AptAdapter.package_names(&packages), vec!["git", "docker.io"]);
        assert_eq!(brew::BrewAdapter.package_names(&packages), vec!["git", "docker"]);
    }
}
