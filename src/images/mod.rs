#![allow(clippy::module_name_repetitions)]
//! Base image selection and derived image lifecycle.
//!
//! Derived images are cached locally and identified by name:
//! - anonymous: `box-<base tag with ':' and '/' as '-'>[-tmux]`
//! - named:     `box-named-<name>[-tmux]`
//!
//! An existing derived image is always reused as-is; only a missing one is built.

pub mod detect;
pub mod dockerfile;

use std::path::{Path, PathBuf};

use crate::config::NamedImageConfig;
use crate::docker::runtime::ContainerRuntime;
use crate::errors::BoxError;
use crate::util::id::create_short_id;
use detect::{DetectionRules, EnvKind};

/// What the session image is derived from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageSpec {
    pub environment: Option<EnvKind>,
    pub version: Option<String>,
    pub custom_name: Option<String>,
    pub multiplex: bool,
    pub command: Vec<String>,
    pub setup: Option<String>,
}

impl ImageSpec {
    pub fn from_config(config: &NamedImageConfig, custom_name: Option<&str>) -> Self {
        ImageSpec {
            environment: config.environment,
            version: config.version.clone(),
            custom_name: custom_name.map(str::to_string),
            multiplex: config.multiplex,
            command: config.command.clone(),
            setup: config.setup.clone(),
        }
    }
}

/// Selected base image and how it was chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseImage {
    pub kind: EnvKind,
    pub tag: String,
    /// True when the kind came from auto-detection rather than an explicit flag.
    pub detected: bool,
}

pub fn base_tag(kind: EnvKind, version: Option<&str>) -> String {
    match kind {
        EnvKind::Node => format!("node:{}", version.unwrap_or("lts")),
        EnvKind::Python => format!("python:{}", version.unwrap_or("latest")),
        EnvKind::Alpine => "alpine:latest".to_string(),
    }
}

/// Name of the anonymous derived image for `base`.
pub fn derived_name(base: &str, multiplex: bool) -> String {
    let safe = base.replace([':', '/'], "-");
    format!("box-{safe}{}", if multiplex { "-tmux" } else { "" })
}

pub fn named_image_name(name: &str, multiplex: bool) -> String {
    format!("box-named-{name}{}", if multiplex { "-tmux" } else { "" })
}

/// Base image for `spec`: explicit environment, else detection, else Alpine.
pub fn select_base(rules: &DetectionRules, cwd: &Path, spec: &ImageSpec) -> BaseImage {
    let (kind, detected) = match spec.environment {
        Some(k) => (k, false),
        None => match rules.detect(&spec.command, cwd) {
            Some(k) => (k, true),
            None => (EnvKind::Alpine, false),
        },
    };
    BaseImage {
        kind,
        tag: base_tag(kind, spec.version.as_deref()),
        detected,
    }
}

/// Image a session would run on, without consulting the runtime (used by `--dry-run`).
pub fn planned_image(rules: &DetectionRules, cwd: &Path, spec: &ImageSpec) -> String {
    match spec.custom_name.as_deref() {
        Some(name) => named_image_name(name, spec.multiplex),
        None => derived_name(&select_base(rules, cwd, spec).tag, spec.multiplex),
    }
}

pub struct ImageResolver<'a> {
    runtime: &'a dyn ContainerRuntime,
    rules: DetectionRules,
    cwd: PathBuf,
    use_err: bool,
}

impl<'a> ImageResolver<'a> {
    pub fn new(runtime: &'a dyn ContainerRuntime, rules: DetectionRules, cwd: PathBuf) -> Self {
        Self {
            runtime,
            rules,
            cwd,
            use_err: crate::color_enabled_stderr(),
        }
    }

    pub fn base_image(&self, spec: &ImageSpec) -> BaseImage {
        select_base(&self.rules, &self.cwd, spec)
    }

    /// Image reference a session for `spec` runs on, building it when missing.
    pub fn resolve(&self, spec: &ImageSpec) -> Result<String, BoxError> {
        if let Some(name) = spec.custom_name.as_deref() {
            let target = named_image_name(name, spec.multiplex);
            if self.runtime.image_exists(&target) {
                return Ok(target);
            }
            return self.build_named(name, spec);
        }
        let base = self.base_image(spec);
        self.announce(&base, spec);
        Ok(self.ensure_derived(&base.tag, spec.multiplex))
    }

    fn announce(&self, base: &BaseImage, spec: &ImageSpec) {
        if base.detected {
            crate::log_info_stderr(
                self.use_err,
                &format!(
                    "Auto-detected {} environment for command: {}",
                    base.kind.title(),
                    spec.command.join(" ")
                ),
            );
        }
    }

    /// Anonymous derived image for `(base, multiplex)`; the base tag itself when the build
    /// fails.
    pub fn ensure_derived(&self, base: &str, multiplex: bool) -> String {
        let target = derived_name(base, multiplex);
        if self.runtime.image_exists(&target) {
            tracing::debug!(image = %target, "derived image present");
            return target;
        }
        self.pull_base(base);
        let tools = if multiplex { "with tmux" } else { "with bash" };
        crate::log_info_stderr(
            self.use_err,
            &format!("Building box image {tools}: {target}"),
        );
        match self
            .runtime
            .build(&target, &dockerfile::render(base, multiplex))
        {
            Ok(()) => {
                crate::log_ok_stderr(self.use_err, &format!("Built {target}"));
                target
            }
            Err(e) => {
                crate::warn_print(&format!("{e:#}"));
                crate::warn_print(&format!("falling back to base image: {base}"));
                base.to_string()
            }
        }
    }

    fn pull_base(&self, base: &str) {
        crate::log_info_stderr(self.use_err, &format!("Pulling base image: {base}"));
        if let Err(e) = self.runtime.pull(base) {
            tracing::debug!(error = %format!("{e:#}"), "pull failed");
            crate::warn_print(&format!(
                "could not pull {base}, trying to build anyway..."
            ));
        }
    }

    /// (Re)build the named image for `name`, replacing any previous one.
    ///
    /// Without a setup command the inline Dockerfile is built under the named tag. With one,
    /// the command runs in a fresh container from the plain derived image and the result is
    /// committed. The setup container is removed on every path.
    pub fn build_named(&self, name: &str, spec: &ImageSpec) -> Result<String, BoxError> {
        let base = self.base_image(spec);
        self.announce(&base, spec);
        let target = named_image_name(name, spec.multiplex);

        let Some(setup) = spec.setup.as_deref().filter(|s| !s.trim().is_empty()) else {
            self.pull_base(&base.tag);
            crate::log_info_stderr(
                self.use_err,
                &format!("Building named image: {target}"),
            );
            return match self
                .runtime
                .build(&target, &dockerfile::render(&base.tag, spec.multiplex))
            {
                Ok(()) => {
                    crate::log_ok_stderr(self.use_err, &format!("Built {target}"));
                    Ok(target)
                }
                Err(e) => {
                    crate::warn_print(&format!("{e:#}"));
                    crate::warn_print(&format!("falling back to base image: {}", base.tag));
                    Ok(base.tag)
                }
            };
        };

        crate::util::reject_newlines(setup, "setup command").map_err(|detail| {
            BoxError::SetupFailed {
                name: name.to_string(),
                detail,
            }
        })?;
        let from = self.ensure_derived(&base.tag, spec.multiplex);
        let container = format!("box-setup-{name}-{}", create_short_id());
        crate::log_info_stderr(
            self.use_err,
            &format!("Running setup for '{name}' in {container}: {setup}"),
        );

        let outcome = self.run_setup_and_commit(&container, &from, setup, &target);
        if !self.runtime.remove_container(&container) {
            tracing::debug!(container = %container, "setup container removal failed");
        }
        outcome.map_err(|detail| BoxError::SetupFailed {
            name: name.to_string(),
            detail,
        })?;
        crate::log_ok_stderr(self.use_err, &format!("Committed {target}"));
        Ok(target)
    }

    fn run_setup_and_commit(
        &self,
        container: &str,
        image: &str,
        setup: &str,
        target: &str,
    ) -> Result<(), String> {
        let code = self
            .runtime
            .run_setup(container, image, setup)
            .map_err(|e| format!("{e:#}"))?;
        if code != 0 {
            return Err(format!("setup command exited with status {code}"));
        }
        self.runtime
            .commit(container, target)
            .map_err(|e| format!("{e:#}"))
    }
}

/// Result of `--clean`.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub removed: Vec<String>,
    pub failed: Vec<String>,
}

impl CleanReport {
    pub fn total(&self) -> usize {
        self.removed.len() + self.failed.len()
    }
}

/// Remove every locally cached `box-*` image. Saved configurations are not touched.
pub fn clean_images(runtime: &dyn ContainerRuntime) -> Result<CleanReport, BoxError> {
    let images = runtime
        .list_box_images()
        .map_err(|e| BoxError::Config(format!("failed to list box images: {e:#}")))?;
    let mut report = CleanReport::default();
    for image in images {
        match runtime.remove_image(&image) {
            Ok(()) => report.removed.push(image),
            Err(e) => {
                tracing::debug!(image = %image, error = %format!("{e:#}"), "rmi failed");
                report.failed.push(image);
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};
    use std::cell::RefCell;
    use std::collections::HashSet;

    #[derive(Default)]
    struct FakeRuntime {
        images: RefCell<HashSet<String>>,
        calls: RefCell<Vec<String>>,
        fail_build: bool,
        setup_exit: i32,
        fail_commit: bool,
    }

    impl FakeRuntime {
        fn with_images(images: &[&str]) -> Self {
            let f = FakeRuntime::default();
            f.images
                .borrow_mut()
                .extend(images.iter().map(|s| s.to_string()));
            f
        }
        fn log(&self, s: String) {
            self.calls.borrow_mut().push(s);
        }
        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }
    }

    impl ContainerRuntime for FakeRuntime {
        fn program(&self) -> &str {
            "docker"
        }
        fn image_exists(&self, image: &str) -> bool {
            self.log(format!("exists {image}"));
            self.images.borrow().contains(image)
        }
        fn pull(&self, image: &str) -> Result<()> {
            self.log(format!("pull {image}"));
            Err(anyhow!("offline"))
        }
        fn build(&self, tag: &str, dockerfile: &str) -> Result<()> {
            self.log(format!("build {tag} {}", dockerfile.lines().next().unwrap_or("")));
            if self.fail_build {
                return Err(anyhow!("build failed"));
            }
            self.images.borrow_mut().insert(tag.to_string());
            Ok(())
        }
        fn run_setup(&self, container: &str, image: &str, command: &str) -> Result<i32> {
            self.log(format!("setup {container} {image} {command}"));
            Ok(self.setup_exit)
        }
        fn commit(&self, container: &str, image: &str) -> Result<()> {
            self.log(format!("commit {container} {image}"));
            if self.fail_commit {
                return Err(anyhow!("commit failed"));
            }
            self.images.borrow_mut().insert(image.to_string());
            Ok(())
        }
        fn remove_container(&self, container: &str) -> bool {
            self.log(format!("rm {container}"));
            true
        }
        fn network_exists(&self, _: &str) -> bool {
            true
        }
        fn create_internal_network(&self, _: &str) -> Result<()> {
            Ok(())
        }
        fn list_box_images(&self) -> Result<Vec<String>> {
            let mut v: Vec<String> = self.images.borrow().iter().cloned().collect();
            v.sort();
            Ok(v)
        }
        fn remove_image(&self, image: &str) -> Result<()> {
            if image.contains("busy") {
                return Err(anyhow!("image in use"));
            }
            self.images.borrow_mut().remove(image);
            Ok(())
        }
        fn run_session(&self, _: &[String]) -> Result<i32> {
            Ok(0)
        }
    }

    fn resolver(rt: &FakeRuntime) -> ImageResolver<'_> {
        ImageResolver::new(rt, DetectionRules::default(), PathBuf::from("/nonexistent-box-cwd"))
    }

    fn spec(cmd: &[&str]) -> ImageSpec {
        ImageSpec {
            command: cmd.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_names() {
        assert_eq!(derived_name("node:18", false), "box-node-18");
        assert_eq!(derived_name("python:3.10", true), "box-python-3.10-tmux");
        assert_eq!(derived_name("ghcr.io/x/y:1", false), "box-ghcr.io-x-y-1");
        assert_eq!(named_image_name("my-app", false), "box-named-my-app");
        assert_eq!(named_image_name("my-app", true), "box-named-my-app-tmux");
    }

    #[test]
    fn test_version_applies_to_detected_environment() {
        let rt = FakeRuntime::default();
        let mut s = spec(&["python", "script.py"]);
        s.version = Some("3.9".into());
        let base = resolver(&rt).base_image(&s);
        assert_eq!(base.tag, "python:3.9");
        assert!(base.detected);
        assert_eq!(derived_name(&base.tag, false), "box-python-3.9");
    }

    #[test]
    fn test_explicit_flag_wins_over_detection() {
        let rt = FakeRuntime::default();
        let mut s = spec(&["npm", "start"]);
        s.environment = Some(EnvKind::Python);
        let base = resolver(&rt).base_image(&s);
        assert_eq!(base.tag, "python:latest");
        assert!(!base.detected);
        assert_eq!(resolver(&rt).base_image(&spec(&["ls"])).tag, "alpine:latest");
        assert_eq!(resolver(&rt).base_image(&spec(&["npm"])).tag, "node:lts");
    }

    #[test]
    fn test_resolve_builds_once_then_reuses() {
        let rt = FakeRuntime::default();
        let r = resolver(&rt);
        let first = r.resolve(&spec(&["npm", "start"])).unwrap();
        assert_eq!(first, "box-node-lts");
        assert_eq!(
            rt.calls(),
            vec![
                "exists box-node-lts",
                "pull node:lts",
                "build box-node-lts FROM node:lts"
            ]
        );

        rt.calls.borrow_mut().clear();
        let second = r.resolve(&spec(&["npm", "start"])).unwrap();
        assert_eq!(second, first);
        assert_eq!(rt.calls(), vec!["exists box-node-lts"]);
    }

    #[test]
    fn test_build_failure_degrades_to_base() {
        let rt = FakeRuntime {
            fail_build: true,
            ..Default::default()
        };
        let mut s = spec(&[]);
        s.multiplex = true;
        assert_eq!(resolver(&rt).resolve(&s).unwrap(), "alpine:latest");
    }

    #[test]
    fn test_existing_named_image_is_reused() {
        let rt = FakeRuntime::with_images(&["box-named-python-app-tmux"]);
        let mut s = spec(&["python", "app.py"]);
        s.custom_name = Some("python-app".into());
        s.multiplex = true;
        assert_eq!(resolver(&rt).resolve(&s).unwrap(), "box-named-python-app-tmux");
        assert_eq!(rt.calls(), vec!["exists box-named-python-app-tmux"]);
    }

    #[test]
    fn test_named_without_setup_builds_dockerfile() {
        let rt = FakeRuntime::default();
        let mut s = spec(&["npm", "start"]);
        s.environment = Some(EnvKind::Node);
        s.version = Some("18".into());
        let img = resolver(&rt).build_named("test-app", &s).unwrap();
        assert_eq!(img, "box-named-test-app");
        assert!(rt.calls().contains(&"pull node:18".to_string()));
        assert!(rt
            .calls()
            .contains(&"build box-named-test-app FROM node:18".to_string()));
    }

    #[test]
    fn test_named_setup_commits_and_removes_container() {
        let rt = FakeRuntime::with_images(&["box-node-lts"]);
        let mut s = spec(&["npm", "start"]);
        s.environment = Some(EnvKind::Node);
        s.setup = Some("npm install -g pnpm".into());
        let img = resolver(&rt).build_named("dev", &s).unwrap();
        assert_eq!(img, "box-named-dev");
        let calls = rt.calls();
        let setup = calls.iter().position(|c| c.starts_with("setup box-setup-dev-"));
        let commit = calls.iter().position(|c| c.starts_with("commit box-setup-dev-"));
        let rm = calls.iter().position(|c| c.starts_with("rm box-setup-dev-"));
        assert!(setup < commit && commit < rm, "order: {calls:?}");
        assert!(calls[setup.unwrap()].ends_with("box-node-lts npm install -g pnpm"));
    }

    #[test]
    fn test_failed_setup_does_not_commit_but_cleans_up() {
        let rt = FakeRuntime {
            setup_exit: 2,
            ..FakeRuntime::with_images(&["box-alpine-latest"])
        };
        let mut s = spec(&[]);
        s.setup = Some("exit 2".into());
        let err = resolver(&rt).build_named("broken", &s).unwrap_err();
        assert!(matches!(err, BoxError::SetupFailed { .. }));
        assert!(err.to_string().contains("status 2"));
        let calls = rt.calls();
        assert!(!calls.iter().any(|c| c.starts_with("commit")));
        assert!(calls.iter().any(|c| c.starts_with("rm box-setup-broken-")));
    }

    #[test]
    fn test_failed_commit_still_cleans_up() {
        let rt = FakeRuntime {
            fail_commit: true,
            ..FakeRuntime::with_images(&["box-alpine-latest"])
        };
        let mut s = spec(&[]);
        s.setup = Some("true".into());
        assert!(resolver(&rt).build_named("x", &s).is_err());
        assert!(rt.calls().iter().any(|c| c.starts_with("rm box-setup-x-")));
    }

    #[test]
    fn test_planned_image_needs_no_runtime() {
        let rules = DetectionRules::default();
        let cwd = Path::new("/nonexistent-box-cwd");
        let mut s = spec(&["python", "script.py"]);
        s.version = Some("3.9".into());
        assert_eq!(planned_image(&rules, cwd, &s), "box-python-3.9");
        s.custom_name = Some("mydev".into());
        s.multiplex = true;
        assert_eq!(planned_image(&rules, cwd, &s), "box-named-mydev-tmux");
    }

    #[test]
    fn test_clean_reports_removed_and_failed() {
        let rt = FakeRuntime::with_images(&["box-alpine-latest", "box-named-busy", "box-node-lts"]);
        let report = clean_images(&rt).unwrap();
        assert_eq!(report.removed, vec!["box-alpine-latest", "box-node-lts"]);
        assert_eq!(report.failed, vec!["box-named-busy"]);
        assert_eq!(report.total(), 3);
    }
}
