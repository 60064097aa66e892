// Loading, validating and resolving provisioning plans.
//
// A plan comes either from an embedded profile (`shell`, `docker`, `browser`)
// or from a YAML file on disk. Resolution expands `~` and `${VAR}` in every
// path, builds the concrete stages and the verification artifacts, and turns
// the preflight section into settings. After this point nothing reads the
// plan document again.

use crate::libs::errors::PlanError;
use crate::libs::preflight::{CheckKind, PreflightSettings};
use crate::libs::stage::Stage;
use crate::libs::stages::build_stage;
use crate::libs::verification::{ArtifactCheck, ExpectedArtifact};
use crate::schemas::plan::{ArtifactProbe, Plan};
use crate::{log_debug, log_info};
use colored::Colorize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Embedded profiles, by name.
const PROFILES: [(&str, &str); 3] = [
    ("shell", include_str!("../../profiles/shell.yaml")),
    ("docker", include_str!("../../profiles/docker.yaml")),
    ("browser", include_str!("../../profiles/browser.yaml")),
];

/// Where a plan comes from.
#[derive(Debug, Clone)]
pub enum PlanSource {
    Profile(String),
    File(PathBuf),
}

pub fn profile_names() -> Vec<&'static str> {
    PROFILES.iter().map(|(name, _)| *name).collect()
}

/// Reads and validates a plan document.
pub fn load_plan(source: &PlanSource) -> Result<Plan, PlanError> {
    let (origin, contents) = match source {
        PlanSource::Profile(name) => {
            let (_, yaml) = PROFILES
                .iter()
                .find(|(profile, _)| profile.eq_ignore_ascii_case(name))
                .ok_or_else(|| PlanError::UnknownProfile {
                    name: name.clone(),
                    available: profile_names().join(", "),
                })?;
            log_info!("Using built-in profile: {}", name.cyan());
            (format!("profile {name}"), (*yaml).to_string())
        }
        PlanSource::File(path) => {
            log_info!("Using plan file: {}", path.display().to_string().cyan());
            let contents = fs::read_to_string(path).map_err(|source| PlanError::Read {
                path: path.clone(),
                source,
            })?;
            (path.display().to_string(), contents)
        }
    };

    let plan: Plan =
        serde_yaml::from_str(&contents).map_err(|source| PlanError::Parse { origin, source })?;
    validate(&plan)?;
    log_debug!("Loaded plan '{}' with {} stage(s)", plan.name, plan.stages.len());
    Ok(plan)
}

fn validate(plan: &Plan) -> Result<(), PlanError> {
    if plan.stages.is_empty() {
        return Err(PlanError::NoStages(plan.name.clone()));
    }
    let mut seen = HashSet::new();
    for stage in &plan.stages {
        if !seen.insert(stage.name.as_str()) {
            return Err(PlanError::DuplicateStage(stage.name.clone()));
        }
        stage.action().map_err(|reason| PlanError::InvalidStage {
            stage: stage.name.clone(),
            reason,
        })?;
    }
    for artifact in &plan.verify {
        artifact.probe().map_err(|reason| PlanError::InvalidArtifact {
            artifact: artifact.name.clone(),
            reason,
        })?;
    }
    Ok(())
}

/// Values every plan can reference without declaring them.
#[derive(Debug, Clone)]
pub struct Builtins {
    pub root: PathBuf,
    pub home: PathBuf,
    pub os: String,
    pub arch: String,
}

/// Expands `~` (to the installation root) and `${VAR}` references.
#[derive(Debug, Clone)]
pub struct Expander {
    root: String,
    vars: HashMap<String, String>,
}

impl Expander {
    /// Resolves the plan's variables against the built-ins. Variables may
    /// reference each other in any order; cycles and unknown names are errors.
    pub fn new(builtins: &Builtins, plan_vars: &BTreeMap<String, String>) -> Result<Self, PlanError> {
        let root = builtins.root.to_string_lossy().into_owned();
        let mut vars: HashMap<String, String> = HashMap::from([
            ("ROOT".to_string(), root.clone()),
            ("HOME".to_string(), builtins.home.to_string_lossy().into_owned()),
            ("OS".to_string(), builtins.os.clone()),
            ("ARCH".to_string(), builtins.arch.clone()),
        ]);

        let mut pending: Vec<(&String, &String)> = plan_vars.iter().collect();
        while !pending.is_empty() {
            let before = pending.len();
            let mut still_pending = Vec::new();
            for (name, value) in pending {
                let partial = Expander {
                    root: root.clone(),
                    vars: vars.clone(),
                };
                match partial.expand(value) {
                    Ok(expanded) => {
                        vars.insert(name.clone(), expanded);
                    }
                    Err(_) => still_pending.push((name, value)),
                }
            }
            if still_pending.len() == before {
                let names: Vec<&str> = still_pending.iter().map(|(name, _)| name.as_str()).collect();
                return Err(PlanError::UnresolvedVariables(names.join(", ")));
            }
            pending = still_pending;
        }

        Ok(Expander { root, vars })
    }

    /// Strict expansion for paths and URLs: unknown variables are errors.
    pub fn expand(&self, input: &str) -> Result<String, PlanError> {
        shellexpand::full_with_context(
            input,
            || Some(self.root.as_str()),
            |var: &str| match self.vars.get(var) {
                Some(value) => Ok(Some(value.as_str())),
                None => Err(var.to_string()),
            },
        )
        .map(|expanded| expanded.into_owned())
        .map_err(|err| PlanError::UnknownVariable {
            var: err.var_name,
            input: input.to_string(),
        })
    }

    pub fn expand_path(&self, input: &str) -> Result<PathBuf, PlanError> {
        self.expand(input).map(PathBuf::from)
    }

    /// Lenient expansion for shell commands: known plan variables are
    /// substituted, anything else (`$PATH`, `$1`) is left for the shell.
    pub fn expand_command(&self, input: &str) -> String {
        shellexpand::env_with_context_no_errors(input, |var: &str| {
            self.vars.get(var).map(String::as_str)
        })
        .into_owned()
    }
}

/// A plan with every path expanded and every stage built.
pub struct ResolvedPlan {
    pub name: String,
    pub description: Option<String>,
    pub preflight: PreflightSettings,
    pub backup_paths: Vec<PathBuf>,
    pub stages: Vec<Box<dyn Stage>>,
    pub artifacts: Vec<ExpectedArtifact>,
}

/// Resolves a loaded plan for the given machine.
pub fn resolve_plan(
    plan: &Plan,
    builtins: &Builtins,
    skip_checks: HashSet<CheckKind>,
) -> Result<ResolvedPlan, PlanError> {
    let expander = Expander::new(builtins, &plan.vars)?;

    let preflight = PreflightSettings {
        general_host: expander.expand(&plan.preflight.general_host)?,
        upstream_host: expander.expand(
            plan.preflight
                .upstream_host
                .as_deref()
                .unwrap_or(&plan.upstream),
        )?,
        min_free_bytes: plan.preflight.min_free_bytes,
        disk_path: match &plan.preflight.disk_path {
            Some(path) => expander.expand_path(path)?,
            None => builtins.root.clone(),
        },
        timeout: Duration::from_secs(plan.preflight.timeout_secs),
        skip: skip_checks,
    };

    // Plan-level paths first, then each stage's own, without duplicates.
    let mut backup_paths: Vec<PathBuf> = Vec::new();
    let declared = plan
        .backup
        .iter()
        .chain(plan.stages.iter().flat_map(|stage| stage.backup.iter()));
    for raw in declared {
        let path = expander.expand_path(raw)?;
        if !backup_paths.contains(&path) {
            backup_paths.push(path);
        }
    }

    let stages = plan
        .stages
        .iter()
        .map(|entry| {
            log_debug!("[Plan] Building stage '{}'", entry.name);
            build_stage(entry, &expander)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let artifacts = plan
        .verify
        .iter()
        .map(|entry| {
            let probe = entry.probe().map_err(|reason| PlanError::InvalidArtifact {
                artifact: entry.name.clone(),
                reason,
            })?;
            let check = match probe {
                ArtifactProbe::Binary(name) => ArtifactCheck::Binary(expander.expand(&name)?),
                ArtifactProbe::Directory(path) => ArtifactCheck::Directory(expander.expand_path(&path)?),
                ArtifactProbe::File(path) => ArtifactCheck::File(expander.expand_path(&path)?),
            };
            Ok(ExpectedArtifact::new(&entry.name, check))
        })
        .collect::<Result<Vec<_>, PlanError>>()?;

    Ok(ResolvedPlan {
        name: plan.name.clone(),
        description: plan.description.clone(),
        preflight,
        backup_paths,
        stages,
        artifacts,
    })
}

/// Resolves `path` relative to the current directory when it is not absolute.
pub fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::verification::ArtifactCheck;

    fn builtins() -> Builtins {
        Builtins {
            root: PathBuf::from("/home/dev"),
            home: PathBuf::from("/home/dev"),
            os: "linux".into(),
            arch: "x86_64".into(),
        }
    }

    #[test]
    fn every_profile_loads_and_resolves() {
        for name in profile_names() {
            let plan = load_plan(&PlanSource::Profile(name.to_string()))
                .unwrap_or_else(|err| panic!("profile {name}: {err}"));
            let resolved = resolve_plan(&plan, &builtins(), HashSet::new())
                .unwrap_or_else(|err| panic!("profile {name}: {err}"));
            assert!(!resolved.stages.is_empty(), "profile {name} has no stages");
            assert!(!resolved.artifacts.is_empty(), "profile {name} verifies nothing");
        }
    }

    #[test]
    fn unknown_profile_lists_the_available_ones() {
        let err = load_plan(&PlanSource::Profile("emacs".into())).unwrap_err();
        assert!(err.to_string().contains("shell, docker, browser"));
    }

    #[test]
    fn variables_reference_builtins_and_each_other() {
        let vars = BTreeMap::from([
            ("A_PLUGINS".to_string(), "${ZSH_CUSTOM}/plugins".to_string()),
            ("ZSH_CUSTOM".to_string(), "${ROOT}/.oh-my-zsh/custom".to_string()),
        ]);
        let expander = Expander::new(&builtins(), &vars).unwrap();
        assert_eq!(
            expander.expand("${A_PLUGINS}/zsh-autosuggestions").unwrap(),
            "/home/dev/.oh-my-zsh/custom/plugins/zsh-autosuggestions"
        );
        assert_eq!(expander.expand("~/.zshrc").unwrap(), "/home/dev/.zshrc");
    }

    #[test]
    fn unknown_and_cyclic_variables_are_rejected() {
        let expander = Expander::new(&builtins(), &BTreeMap::new()).unwrap();
        assert!(matches!(
            expander.expand("${NOPE}/x"),
            Err(PlanError::UnknownVariable { var, .. }) if var == "NOPE"
        ));

        let cyclic = BTreeMap::from([
            ("A".to_string(), "${B}".to_string()),
            ("B".to_string(), "${A}".to_string()),
        ]);
        assert!(matches!(
            Expander::new(&builtins(), &cyclic),
            Err(PlanError::UnresolvedVariables(names)) if names == "A, B"
        ));
    }

    #[test]
    fn commands_keep_shell_variables() {
        let vars = BTreeMap::from([("ZSH".to_string(), "${ROOT}/.oh-my-zsh".to_string())]);
        let expander = Expander::new(&builtins(), &vars).unwrap();
        assert_eq!(
            expander.expand_command("test -d ${ZSH} && echo $PATH"),
            "test -d /home/dev/.oh-my-zsh && echo $PATH"
        );
    }

    #[test]
    fn resolution_merges_backup_paths_and_expands_artifacts() {
        let yaml = r#"
name: sample
backup: ["~/.zshrc"]
preflight:
  min_free_bytes: 1024
stages:
  - name: write zshrc
    backup: ["~/.zshrc", "~/.zprofile"]
    file:
      dest: "~/.zshrc"
      content: "export ZSH=1"
verify:
  - name: zshrc
    file: "~/.zshrc"
"#;
        let plan: Plan = serde_yaml::from_str(yaml).unwrap();
        let resolved = resolve_plan(&plan, &builtins(), HashSet::new()).unwrap();
        assert_eq!(
            resolved.backup_paths,
            vec![PathBuf::from("/home/dev/.zshrc"), PathBuf::from("/home/dev/.zprofile")]
        );
        assert_eq!(resolved.preflight.upstream_host, "https://github.com");
        assert_eq!(resolved.preflight.disk_path, PathBuf::from("/home/dev"));
        assert_eq!(resolved.preflight.min_free_bytes, 1024);
        assert_eq!(
            resolved.artifacts[0].check,
            ArtifactCheck::File(PathBuf::from("/home/dev/.zshrc"))
        );
    }

    #[test]
    fn duplicate_stage_names_are_rejected() {
        let yaml = r#"
name: dup
stages:
  - name: same
    command: { run: "true" }
  - name: same
    command: { run: "true" }
"#;
        let plan: Plan = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(validate(&plan), Err(PlanError::DuplicateStage(name)) if name == "same"));
    }

    #[test]
    fn ambiguous_stages_and_artifacts_fail_validation() {
        let two_actions: Plan = serde_yaml::from_str(
            r#"
name: ambiguous
stages:
  - name: rc
    file: { dest: "~/.zshrc", content: "x" }
    command: { run: "rm ~/.zshrc" }
"#,
        )
        .unwrap();
        assert!(matches!(
            validate(&two_actions),
            Err(PlanError::InvalidStage { stage, reason }) if stage == "rc" && reason.contains("file, command")
        ));

        let two_probes: Plan = serde_yaml::from_str(
            r#"
name: ambiguous
stages:
  - name: ok
    command: { run: "true" }
verify:
  - { name: zsh, binary: zsh, file: /bin/zsh }
"#,
        )
        .unwrap();
        assert!(matches!(
            validate(&two_probes),
            Err(PlanError::InvalidArtifact { artifact, .. }) if artifact == "zsh"
        ));
    }
}
