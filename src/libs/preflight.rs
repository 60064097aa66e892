// Read-only checks that must pass before anything on the machine is touched.
//
// Checks run in a fixed order (privilege, connectivity, disk space) and stop
// at the first failure. Every failure is Fatal: no backup is taken and no
// stage runs.

use crate::libs::outcome::{Failure, Outcome};
use crate::libs::run_context::RunContext;
use crate::libs::utilities::path_helpers::nearest_existing_ancestor;
use crate::{log_debug, log_info, log_step, log_success};
use colored::Colorize;
use std::collections::HashSet;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

const ORIGIN: &str = "preflight";

/// The individual preflight checks, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckKind {
    Privilege,
    Connectivity,
    Disk,
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckKind::Privilege => write!(f, "privilege"),
            CheckKind::Connectivity => write!(f, "connectivity"),
            CheckKind::Disk => write!(f, "disk"),
        }
    }
}

/// What the checks ask of the machine. `SystemEnvironment` is the real one.
pub trait Environment {
    /// Whether the process runs with root identity.
    fn is_root(&self) -> bool;
    fn is_reachable(&self, url: &str, timeout: Duration) -> bool;
    /// Free bytes available to an unprivileged user on the volume holding `path`.
    fn available_bytes(&self, path: &Path) -> io::Result<u64>;
}

pub struct SystemEnvironment;

impl Environment for SystemEnvironment {
    fn is_root(&self) -> bool {
        matches!(sudo::check(), sudo::RunningAs::Root)
    }

    fn is_reachable(&self, url: &str, timeout: Duration) -> bool {
        crate::libs::http::is_reachable(url, timeout)
    }

    fn available_bytes(&self, path: &Path) -> io::Result<u64> {
        let stat = nix::sys::statvfs::statvfs(path).map_err(io::Error::from)?;
        #[allow(clippy::unnecessary_cast)]
        Ok(stat.blocks_available() as u64 * stat.fragment_size() as u64)
    }
}

/// Resolved preflight parameters for one run.
#[derive(Debug, Clone)]
pub struct PreflightSettings {
    pub general_host: String,
    pub upstream_host: String,
    pub min_free_bytes: u64,
    pub disk_path: PathBuf,
    pub timeout: Duration,
    pub skip: HashSet<CheckKind>,
}

pub struct PreflightChecker<'a> {
    env: &'a dyn Environment,
    settings: &'a PreflightSettings,
}

impl<'a> PreflightChecker<'a> {
    pub fn new(env: &'a dyn Environment, settings: &'a PreflightSettings) -> Self {
        PreflightChecker { env, settings }
    }

    /// Runs every enabled check in order; the first failure is returned as Fatal.
    pub fn check_all(&self, _ctx: &RunContext) -> Outcome {
        log_step!("[Preflight] Checking environment preconditions");

        let checks: [(CheckKind, fn(&Self) -> Result<String, String>); 3] = [
            (CheckKind::Privilege, Self::check_privilege),
            (CheckKind::Connectivity, Self::check_connectivity),
            (CheckKind::Disk, Self::check_disk_space),
        ];

        for (kind, check) in checks {
            if self.settings.skip.contains(&kind) {
                log_info!("[Preflight] Skipping {} check (disabled)", kind.to_string().yellow());
                continue;
            }
            match check(self) {
                Ok(message) => log_debug!("[Preflight] {}: {}", kind, message),
                Err(reason) => return Outcome::Fatal(Failure::new(ORIGIN, reason, 1)),
            }
        }

        log_success!("[Preflight] All checks passed");
        Outcome::Success
    }

    fn check_privilege(&self) -> Result<String, String> {
        if self.env.is_root() {
            return Err(
                "running as root; run as a regular user, privileges are requested per command via sudo"
                    .to_string(),
            );
        }
        Ok("running as a regular user".to_string())
    }

    fn check_connectivity(&self) -> Result<String, String> {
        let timeout = self.settings.timeout;
        if !self.env.is_reachable(&self.settings.general_host, timeout) {
            return Err(format!(
                "no internet connection ({} is unreachable)",
                self.settings.general_host
            ));
        }
        if !self.env.is_reachable(&self.settings.upstream_host, timeout) {
            return Err(format!(
                "upstream host {} is unreachable, although general internet access works",
                self.settings.upstream_host
            ));
        }
        Ok(format!(
            "{} and {} reachable",
            self.settings.general_host, self.settings.upstream_host
        ))
    }

    fn check_disk_space(&self) -> Result<String, String> {
        let probe_path = nearest_existing_ancestor(&self.settings.disk_path)
            .unwrap_or_else(|| Path::new("/"));
        let available = self.env.available_bytes(probe_path).map_err(|err| {
            format!("could not determine free space on {}: {err}", probe_path.display())
        })?;
        if available < self.settings.min_free_bytes {
            return Err(format!(
                "insufficient disk space on {}: {} available, {} required",
                probe_path.display(),
                format_bytes(available),
                format_bytes(self.settings.min_free_bytes)
            ));
        }
        Ok(format!("{} free on {}", format_bytes(available), probe_path.display()))
    }
}

/// Renders a byte count with a binary unit, e.g. "1.5 GiB".
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::cell::RefCell;

    /// Scriptable environment that also records which probes ran.
    pub struct FakeEnvironment {
        pub root: bool,
        pub unreachable: Vec<String>,
        pub free_bytes: u64,
        pub probes: RefCell<Vec<String>>,
    }

    impl Default for FakeEnvironment {
        fn default() -> Self {
            FakeEnvironment {
                root: false,
                unreachable: Vec::new(),
                free_bytes: 10 * 1024 * 1024 * 1024,
                probes: RefCell::new(Vec::new()),
            }
        }
    }

    impl Environment for FakeEnvironment {
        fn is_root(&self) -> bool {
            self.probes.borrow_mut().push("privilege".into());
            self.root
        }

        fn is_reachable(&self, url: &str, _timeout: Duration) -> bool {
            self.probes.borrow_mut().push(format!("reach {url}"));
            !self.unreachable.iter().any(|host| host == url)
        }

        fn available_bytes(&self, _path: &Path) -> io::Result<u64> {
            self.probes.borrow_mut().push("disk".into());
            Ok(self.free_bytes)
        }
    }

    pub fn settings(disk_path: &Path) -> PreflightSettings {
        PreflightSettings {
            general_host: "https://general.example".into(),
            upstream_host: "https://upstream.example".into(),
            min_free_bytes: 100 * 1024 * 1024,
            disk_path: disk_path.to_path_buf(),
            timeout: Duration::from_secs(1),
            skip: HashSet::new(),
        }
    }
}
