// Imports the `Colorize` trait for adding color to console output.
use colored::Colorize;
// Provides `PathBuf` for working with file paths.
use std::path::{Path, PathBuf};
// Custom logging macros for various log levels.
use crate::{log_debug, log_info};
// Relative overrides are taken from the current directory.
use crate::libs::plan_loading::absolutize;
// Errors at this level are reported through `anyhow`.
use anyhow::{Context, Result};

/// Where backup snapshots go when nothing else is configured, relative to the root.
const DEFAULT_BACKUP_SUBDIR: &str = ".devbox-provision/backups";

/// The two directories every run needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPaths {
    /// Installation root; `~` and `${ROOT}` in plans expand to this.
    pub root: PathBuf,
    /// Parent of the timestamped backup snapshot directories.
    pub backup_base: PathBuf,
}

/// Determines the installation root and the backup base directory.
///
/// # Arguments
/// * `root_override`: `--root` / `DEVBOX_PROVISION_ROOT`; defaults to the user's home directory.
/// * `backup_override`: `DEVBOX_PROVISION_BACKUP_DIR`; defaults to `<root>/.devbox-provision/backups`.
///
/// # Returns
/// The resolved, absolute `RunPaths`, or an error when no home directory can be determined
/// and no root was given.
pub fn resolve_paths(root_override: Option<&Path>, backup_override: Option<&Path>) -> Result<RunPaths> {
    log_debug!("Root override: {:?}, backup override: {:?}", root_override, backup_override);

    // An explicit root wins; otherwise the home directory as reported by `dirs`.
    let root = match root_override {
        Some(path) => absolutize(path),
        None => dirs::home_dir().context("Could not determine the home directory; pass --root")?,
    };

    let backup_base = match backup_override {
        Some(path) => absolutize(path),
        None => root.join(DEFAULT_BACKUP_SUBDIR),
    };

    log_info!("Installation root: {}", root.display().to_string().cyan());
    log_debug!("Backup snapshots go under: {}", backup_base.display().to_string().yellow());
    Ok(RunPaths { root, backup_base })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backup_base_defaults_under_the_root() {
        let paths = resolve_paths(Some(Path::new("/srv/dev")), None).unwrap();
        assert_eq!(paths.root, PathBuf::from("/srv/dev"));
        assert_eq!(paths.backup_base, PathBuf::from("/srv/dev/.devbox-provision/backups"));
    }

    #[test]
    fn explicit_backup_directory_wins() {
        let paths = resolve_paths(Some(Path::new("/srv/dev")), Some(Path::new("/var/backups/dev"))).unwrap();
        assert_eq!(paths.backup_base, PathBuf::from("/var/backups/dev"));
    }

    #[test]
    fn relative_roots_are_made_absolute() {
        let paths = resolve_paths(Some(Path::new("sandbox")), None).unwrap();
        assert!(paths.root.is_absolute());
        assert!(paths.root.ends_with("sandbox"));
    }
}
