// Execution of external processes.
// Every apply-action ends up here: package-manager calls, git clones, chsh and
// arbitrary plan commands. Execution is blocking; the caller waits for each
// process before moving on.

use crate::libs::errors::ExecError;
use crate::libs::interrupt;
use crate::log_debug;
use colored::Colorize;
use std::os::unix::process::ExitStatusExt;
use std::process::{Command, Stdio};

/// A program invocation, independent of how it is eventually executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Run through `sudo` unless the process is already root.
    pub elevate: bool,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        CommandSpec {
            program: program.into(),
            args: Vec::new(),
            elevate: false,
        }
    }

    /// `sh -c <script>`
    pub fn shell(script: impl Into<String>) -> Self {
        CommandSpec::new("sh").arg("-c").arg(script)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn elevated(mut self) -> Self {
        self.elevate = true;
        self
    }

    /// Human readable form, used in logs and error messages.
    pub fn display(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 2);
        if self.elevate {
            parts.push("sudo".to_string());
        }
        parts.push(self.program.clone());
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }

    /// The actual argv to spawn, with `sudo` prepended only when needed.
    pub fn argv(&self, is_root: bool) -> (String, Vec<String>) {
        if self.elevate && !is_root {
            let mut args = Vec::with_capacity(self.args.len() + 1);
            args.push(self.program.clone());
            args.extend(self.args.iter().cloned());
            ("sudo".to_string(), args)
        } else {
            (self.program.clone(), self.args.clone())
        }
    }
}

/// The seam between stages and the operating system.
pub trait CommandRunner {
    /// Runs the command with inherited stdio and waits for it.
    fn run(&self, spec: &CommandSpec) -> Result<(), ExecError>;

    /// Runs the command silently and reports whether it exited 0.
    /// Used by probes, so it must not be used for anything that mutates state.
    fn succeeds(&self, spec: &CommandSpec) -> bool;
}

/// Runs commands with `std::process::Command`.
pub struct SystemRunner {
    is_root: bool,
}

impl SystemRunner {
    pub fn new(is_root: bool) -> Self {
        SystemRunner { is_root }
    }

    fn build(&self, spec: &CommandSpec) -> Command {
        let (program, args) = spec.argv(self.is_root);
        let mut command = Command::new(program);
        command.args(args);
        command
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<(), ExecError> {
        let rendered = spec.display();
        log_debug!("[Exec] Running: {}", rendered.cyan());
        if interrupt::is_interrupted() {
            return Err(ExecError::Interrupted { command: rendered });
        }
        tracing::debug!(program = %spec.program, args = ?spec.args, elevate = spec.elevate, "spawning");

        let status = self
            .build(spec)
            .status()
            .map_err(|source| ExecError::Spawn {
                program: spec.program.clone(),
                source,
            })?;
        tracing::debug!(status = ?status, "process finished");

        if interrupt::is_interrupted() {
            return Err(ExecError::Interrupted { command: rendered });
        }
        if status.success() {
            return Ok(());
        }
        match (status.code(), status.signal()) {
            (Some(code), _) => Err(ExecError::NonZeroExit {
                command: rendered,
                code,
            }),
            (None, Some(signal)) if signal == nix::libc::SIGINT => {
                Err(ExecError::Interrupted { command: rendered })
            }
            (None, Some(signal)) => Err(ExecError::Signaled {
                command: rendered,
                signal,
            }),
            (None, None) => Err(ExecError::NonZeroExit {
                command: rendered,
                code: 1,
            }),
        }
    }

    fn succeeds(&self, spec: &CommandSpec) -> bool {
        log_debug!("[Exec] Probing: {}", spec.display().dimmed());
        self.build(spec)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// Records every invocation and fails the ones it was told to fail.
    #[derive(Default)]
    pub struct RecordingRunner {
        pub calls: RefCell<Vec<String>>,
        failures: HashMap<String, i32>,
        probes: HashMap<String, bool>,
        interrupts: Option<String>,
    }

    impl RecordingRunner {
        /// Any command whose rendered form contains `needle` exits with `code`.
        pub fn failing(mut self, needle: &str, code: i32) -> Self {
            self.failures.insert(needle.to_string(), code);
            self
        }

        /// The command containing `needle` behaves as if Ctrl-C hit while it ran.
        pub fn interrupting(mut self, needle: &str) -> Self {
            self.interrupts = Some(needle.to_string());
            self
        }

        pub fn probe_result(mut self, needle: &str, ok: bool) -> Self {
            self.probes.insert(needle.to_string(), ok);
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }
    }

    impl CommandRunner for RecordingRunner {
        fn run(&self, spec: &CommandSpec) -> Result<(), ExecError> {
            let rendered = spec.display();
            self.calls.borrow_mut().push(rendered.clone());
            if self.interrupts.as_ref().is_some_and(|needle| rendered.contains(needle.as_str())) {
                interrupt::set_interrupted(true);
                return Err(ExecError::Interrupted { command: rendered });
            }
            match self.failures.iter().find(|(needle, _)| rendered.contains(needle.as_str())) {
                Some((_, code)) => Err(ExecError::NonZeroExit {
                    command: rendered,
                    code: *code,
                }),
                None => Ok(()),
            }
        }

        fn succeeds(&self, spec: &CommandSpec) -> bool {
            let rendered = spec.display();
            self.probes
                .iter()
                .find(|(needle, _)| rendered.contains(needle.as_str()))
                .map(|(_, ok)| *ok)
                .unwrap_or(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elevation_only_prefixes_sudo_for_regular_users() {
        let spec = CommandSpec::new("apt-get")
            .args(["install", "-y", "zsh"])
            .elevated();
        assert_eq!(spec.display(), "sudo apt-get install -y zsh");

        let (program, args) = spec.argv(false);
        assert_eq!(program, "sudo");
        assert_eq!(args, vec!["apt-get", "install", "-y", "zsh"]);

        let (program, args) = spec.argv(true);
        assert_eq!(program, "apt-get");
        assert_eq!(args, vec!["install", "-y", "zsh"]);
    }

    #[test]
    #[serial_test::serial]
    fn system_runner_reports_exit_codes() {
        let runner = SystemRunner::new(false);
        assert!(runner.run(&CommandSpec::shell("exit 0")).is_ok());

        match runner.run(&CommandSpec::shell("exit 3")) {
            Err(ExecError::NonZeroExit { code, .. }) => assert_eq!(code, 3),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    #[serial_test::serial]
    fn nothing_is_spawned_after_an_interrupt() {
        let tmp = tempfile::tempdir().unwrap();
        let marker = tmp.path().join("marker");
        let runner = SystemRunner::new(false);

        interrupt::set_interrupted(true);
        let result = runner.run(&CommandSpec::new("touch").arg(marker.to_string_lossy()));
        interrupt::set_interrupted(false);

        assert!(matches!(result, Err(ExecError::Interrupted { .. })));
        assert!(!marker.exists());
    }

    #[test]
    #[serial_test::serial]
    fn system_runner_reports_spawn_failures() {
        let runner = SystemRunner::new(false);
        let err = runner
            .run(&CommandSpec::new("definitely-not-a-real-binary-xyz"))
            .unwrap_err();
        assert_eq!(err.exit_code(), crate::libs::errors::EXIT_SPAWN_FAILED);
    }

    #[test]
    fn probes_are_silent_booleans() {
        let runner = SystemRunner::new(false);
        assert!(runner.succeeds(&CommandSpec::shell("true")));
        assert!(!runner.succeeds(&CommandSpec::shell("false")));
        assert!(!runner.succeeds(&CommandSpec::new("definitely-not-a-real-binary-xyz")));
    }
}
