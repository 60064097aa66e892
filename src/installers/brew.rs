//! # Homebrew Adapter
//!
//! Resolves install and update commands for Homebrew on macOS.
//! Homebrew refuses to run as root, so nothing here is ever elevated.

use super::PlatformAdapter;
use crate::libs::command_runner::CommandSpec;

pub struct BrewAdapter;

impl PlatformAdapter for BrewAdapter {
    fn name(&self) -> &'static str {
        "brew"
    }

    /// `brew install <formula>...`
    fn resolve_install_command(&self, packages: &[String]) -> CommandSpec {
        CommandSpec::new("brew")
            .arg("install")
            .args(packages.iter().cloned())
    }

    fn resolve_update_command(&self) -> CommandSpec {
        CommandSpec::new("brew").arg("update")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brew_commands_are_never_elevated() {
        let install = BrewAdapter.resolve_install_command(&["zsh".into(), "git".into()]);
        assert_eq!(install.display(), "brew install zsh git");
        assert!(!install.elevate);
        assert!(!BrewAdapter.resolve_update_command().elevate);
    }
}
