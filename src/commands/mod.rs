// Register application subcommands.
// Each module corresponds to a specific `devbox-provision` command-line action.
// The preparation shared by all of them (paths, plan, platform, context) lives here.

use crate::cli::cmd_enums::PlanArgs;
use crate::installers::{PlatformAdapter, select_adapter};
use crate::libs::paths::resolve_paths;
use crate::libs::plan_loading::{Builtins, PlanSource, ResolvedPlan, absolutize, load_plan, resolve_plan};
use crate::libs::preflight::CheckKind;
use crate::libs::run_context::{PlatformInfo, RunContext};
use crate::libs::utilities::platform::{binary_available, detect_architecture, detect_os, login_shell};
use crate::log_debug;
use anyhow::{Context, Result};
use std::path::Path;

// Prints the resolved plan as a table.
pub mod plan;
// Full provisioning run (the default command).
pub mod run;
// Re-probes the expected artifacts only.
pub mod verify;
// Displays the version of devbox-provision.
pub mod version;

/// Everything a command needs before it can do its work.
pub(crate) struct Prepared {
    pub plan: ResolvedPlan,
    pub ctx: RunContext,
    pub adapter: Box<dyn PlatformAdapter>,
}

/// Resolves paths, loads the plan, selects the platform adapter and builds
/// the run context. The environment and the user database are read here and
/// nowhere else.
pub(crate) fn prepare(args: &PlanArgs, backup_dir: Option<&Path>, skip: &[CheckKind]) -> Result<Prepared> {
    let paths = resolve_paths(args.root.as_deref(), backup_dir)?;

    let source = match &args.plan {
        Some(path) => PlanSource::File(absolutize(path)),
        None => PlanSource::Profile(args.profile.clone()),
    };
    let plan = load_plan(&source)?;

    let os = detect_os();
    let arch = detect_architecture();
    let adapter = select_adapter(&os, args.package_manager.as_deref(), binary_available)?;

    let builtins = Builtins {
        root: paths.root.clone(),
        home: dirs::home_dir().unwrap_or_else(|| paths.root.clone()),
        os: os.clone(),
        arch: arch.clone(),
    };
    let resolved = resolve_plan(&plan, &builtins, skip.iter().copied().collect())
        .with_context(|| format!("Failed to resolve plan '{}'", plan.name))?;

    let platform = PlatformInfo {
        os,
        arch,
        package_manager: adapter.name().to_string(),
        login_shell: login_shell(),
    };
    log_debug!("Platform: {:?}", platform);

    Ok(Prepared {
        plan: resolved,
        ctx: RunContext::new(platform, paths.root, paths.backup_base),
        adapter,
    })
}
