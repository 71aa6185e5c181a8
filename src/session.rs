//! One `box` session from invocation to exit code.
//!
//! `plan` turns an invocation into the effective configuration (loading, merging or saving a
//! named image). `SessionRunner` then resolves the image, prepares the network, mounts
//! volumes and runs the container. Mounts are scoped to `run`: they are released on every
//! return path, including an interrupt between stages.

use std::path::PathBuf;

use crate::config::{
    validate_image_name, ConfigStore, NamedImageConfig, RunOverrides, SaveOutcome,
};
use crate::docker::{ContainerRuntime, RunRequest};
use crate::errors::{BoxError, EXIT_ERROR};
use crate::images::detect::DetectionRules;
use crate::images::{planned_image, ImageResolver, ImageSpec};
use crate::mounts::{ordered_specs, MountProvider, MountResolver, MountSession};
use crate::network::NetworkPolicy;
use crate::specs::{Access, PortSpec};

/// Which named image, if any, an invocation refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// No name: a throwaway session on an anonymous derived image.
    Fresh,
    /// `-n NAME`: save the invocation's configuration and rebuild the named image.
    Save(String),
    /// `-i NAME`: run a saved configuration with the invocation layered on top.
    Saved(String),
}

#[derive(Debug, Clone)]
pub struct Invocation {
    pub target: Target,
    /// Configuration described by the invocation's flags (fresh and save targets).
    pub config: NamedImageConfig,
    /// Additions to a saved configuration (saved target).
    pub overrides: RunOverrides,
    pub force: bool,
    pub dry_run: bool,
}

/// Effective configuration for this invocation and the named image it belongs to, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub config: NamedImageConfig,
    pub name: Option<String>,
    /// Rebuild the named image even when it exists (fresh save).
    pub rebuild: bool,
}

impl Plan {
    pub fn ports(&self) -> Result<Vec<PortSpec>, BoxError> {
        self.config
            .ports
            .iter()
            .map(|p| PortSpec::parse(p))
            .collect::<Result<Vec<_>, _>>()
            .map_err(BoxError::Config)
    }

    pub fn image_spec(&self) -> ImageSpec {
        ImageSpec::from_config(&self.config, self.name.as_deref())
    }

    pub fn network_policy(&self) -> NetworkPolicy {
        NetworkPolicy::new(self.config.network, self.config.http_proxy.clone())
    }

    pub fn mount_specs(&self) -> Vec<(String, Access)> {
        ordered_specs(&self.config.read_only, &self.config.read_write)
    }
}

/// Work out the configuration to run. `None` means the user declined an overwrite.
///
/// `confirm` is asked before an existing name is replaced without `force`. A dry run never
/// writes the store.
pub fn plan<F>(
    store: &mut ConfigStore,
    inv: Invocation,
    confirm: F,
) -> Result<Option<Plan>, BoxError>
where
    F: FnOnce(&str, &NamedImageConfig) -> bool,
{
    let name = match inv.target {
        Target::Fresh => {
            return Ok(Some(Plan {
                config: inv.config,
                name: None,
                rebuild: false,
            }))
        }
        Target::Saved(name) => {
            let saved = store.get(&name).ok_or_else(|| BoxError::UnknownImage {
                name: name.clone(),
                known: store.list(),
            })?;
            return Ok(Some(Plan {
                config: saved.merged_with(inv.overrides),
                name: Some(name),
                rebuild: false,
            }));
        }
        Target::Save(name) => name,
    };

    validate_image_name(&name).map_err(BoxError::Config)?;
    if inv.dry_run {
        return Ok(Some(Plan {
            config: inv.config,
            name: Some(name),
            rebuild: false,
        }));
    }

    let use_err = crate::color_enabled_stderr();
    match store.save(&name, inv.config.clone(), inv.force, confirm) {
        SaveOutcome::Cancelled => {
            crate::log_info_stderr(use_err, &format!("Kept existing '{name}'; nothing to do."));
            Ok(None)
        }
        SaveOutcome::Saved { persisted } => {
            if persisted {
                crate::log_ok_stderr(
                    use_err,
                    &format!("Saved '{name}' to {}", store.path().display()),
                );
            }
            Ok(Some(Plan {
                config: inv.config,
                name: Some(name),
                rebuild: true,
            }))
        }
    }
}

/// Host-side context for running (or previewing) a planned session.
pub struct SessionRunner<'a> {
    provider: &'a dyn MountProvider,
    rules: DetectionRules,
    cwd: PathBuf,
    tty: bool,
    env: Vec<(String, String)>,
    verbose: bool,
    interrupted: Box<dyn Fn() -> bool + 'a>,
}

impl<'a> SessionRunner<'a> {
    pub fn new(provider: &'a dyn MountProvider, rules: DetectionRules, cwd: PathBuf) -> Self {
        Self {
            provider,
            rules,
            cwd,
            tty: false,
            env: Vec::new(),
            verbose: false,
            interrupted: Box::new(crate::signals::interrupted),
        }
    }

    pub fn tty(mut self, yes: bool) -> Self {
        self.tty = yes;
        self
    }

    /// Extra `-e` variables passed after the proxy settings.
    pub fn envs(mut self, vars: Vec<(String, String)>) -> Self {
        self.env.extend(vars);
        self
    }

    pub fn verbose(mut self, yes: bool) -> Self {
        self.verbose = yes;
        self
    }

    /// Replace the process-wide signal flag as the source of interrupts.
    pub fn interrupt_check(mut self, check: impl Fn() -> bool + 'a) -> Self {
        self.interrupted = Box::new(check);
        self
    }

    fn check_interrupt(&self) -> Result<(), BoxError> {
        if (self.interrupted)() {
            return Err(BoxError::Interrupted);
        }
        Ok(())
    }

    fn request(
        &self,
        program: &str,
        image: String,
        mounts: &MountSession<'_>,
        plan: &Plan,
        policy: &NetworkPolicy,
    ) -> Result<RunRequest, BoxError> {
        Ok(RunRequest::new(program, image)
            .tty(self.tty)
            .mounts(mounts.mounts())
            .ports(plan.ports()?)
            .network(policy)
            .envs(self.env.clone())
            .command(plan.config.command.clone(), plan.config.multiplex))
    }

    /// The command a run would execute, without touching the runtime or mounting anything.
    pub fn preview(&self, program: &str, plan: &Plan) -> Result<String, BoxError> {
        let image = planned_image(&self.rules, &self.cwd, &plan.image_spec());
        let mounts = MountResolver::new(self.provider, self.cwd.clone())
            .dry_run(true)
            .resolve_all(&plan.mount_specs());
        self.request(program, image, &mounts, plan, &plan.network_policy())?
            .preview()
    }

    /// Run the session to completion and return its exit code.
    pub fn run(&self, runtime: &dyn ContainerRuntime, plan: &Plan) -> Result<u8, BoxError> {
        // bad ports fail before anything is built or mounted
        plan.ports()?;
        let spec = plan.image_spec();
        let resolver = ImageResolver::new(runtime, self.rules.clone(), self.cwd.clone());
        let image = match plan.name.as_deref() {
            Some(name) if plan.rebuild => resolver.build_named(name, &spec),
            _ => resolver.resolve(&spec),
        };
        let image = match image {
            Err(e) if (self.interrupted)() => {
                tracing::debug!(error = %e, "image resolution ended by interrupt");
                return Err(BoxError::Interrupted);
            }
            other => other?,
        };
        self.check_interrupt()?;

        let policy = plan.network_policy();
        policy.prepare(runtime);

        // Dropping the session unmounts what it mounted, on every exit path below.
        let mounts =
            MountResolver::new(self.provider, self.cwd.clone()).resolve_all(&plan.mount_specs());
        self.check_interrupt()?;

        let req = self.request(runtime.program(), image, &mounts, plan, &policy)?;
        let args = req.args()?;
        if self.verbose {
            let use_err = crate::color_enabled_stderr();
            crate::log_info_stderr(use_err, &format!("image: {}", req.image()));
            crate::log_info_stderr(use_err, &format!("workdir: {}", req.workdir()));
            eprintln!("{}", req.preview()?);
        }

        let code = runtime
            .run_session(&args)
            .map_err(|e| BoxError::Config(format!("failed to start session: {e:#}")))?;
        self.check_interrupt()?;
        tracing::debug!(code, "session finished");
        Ok(u8::try_from(code).unwrap_or(EXIT_ERROR))
    }
}
