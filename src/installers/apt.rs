// Debian / Ubuntu adapter, driving `apt-get` non-interactively.

use super::PlatformAdapter;
use crate::libs::command_runner::CommandSpec;

pub struct AptAdapter;

impl PlatformAdapter for AptAdapter {
    fn name(&self) -> &'static str {
        "apt"
    }

    fn resolve_install_command(&self, packages: &[String]) -> CommandSpec {
        CommandSpec::new("apt-get")
            .args(["install", "-y", "--no-install-recommends"])
            .args(packages.iter().cloned())
            .elevated()
    }

    fn resolve_update_command(&self) -> CommandSpec {
        CommandSpec::new("apt-get").arg("update").elevated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apt_install_is_elevated_and_non_interactive() {
        let install = AptAdapter.resolve_install_command(&["zsh".into()]);
        assert_eq!(install.display(), "sudo apt-get install -y --no-install-recommends zsh");
        assert_eq!(AptAdapter.resolve_update_command().display(), "sudo apt-get update");
    }
}
