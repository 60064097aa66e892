// Arch Linux adapter.

use super::PlatformAdapter;
use crate::libs::command_runner::CommandSpec;

pub struct PacmanAdapter;

impl PlatformAdapter for PacmanAdapter {
    fn name(&self) -> &'static str {
        "pacman"
    }

    /// `--needed` keeps re-runs from reinstalling packages that are already current.
    fn resolve_install_command(&self, packages: &[String]) -> CommandSpec {
        CommandSpec::new("pacman")
            .args(["-S", "--needed", "--noconfirm"])
            .args(packages.iter().cloned())
            .elevated()
    }

    fn resolve_update_command(&self) -> CommandSpec {
        CommandSpec::new("pacman").arg("-Sy").elevated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pacman_install_skips_up_to_date_packages() {
        let install = PacmanAdapter.resolve_install_command(&["zsh".into()]);
        assert_eq!(install.display(), "sudo pacman -S --needed --noconfirm zsh");
        assert_eq!(PacmanAdapter.resolve_update_command().display(), "sudo pacman -Sy");
    }
}
