// Fedora / RHEL adapter.

use super::PlatformAdapter;
use crate::libs::command_runner::CommandSpec;

pub struct DnfAdapter;

impl PlatformAdapter for DnfAdapter {
    fn name(&self) -> &'static str {
        "dnf"
    }

    fn resolve_install_command(&self, packages: &[String]) -> CommandSpec {
        CommandSpec::new("dnf")
            .args(["install", "-y"])
            .args(packages.iter().cloned())
            .elevated()
    }

    // `makecache` is the closest dnf has to an index refresh.
    fn resolve_update_command(&self) -> CommandSpec {
        CommandSpec::new("dnf").arg("makecache").elevated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dnf_commands() {
        let install = DnfAdapter.resolve_install_command(&["zsh".into(), "git".into()]);
        assert_eq!(install.display(), "sudo dnf install -y zsh git");
        assert_eq!(DnfAdapter.resolve_update_command().display(), "sudo dnf makecache");
    }
}
