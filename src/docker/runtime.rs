#![allow(clippy::module_name_repetitions)]
//! Container runtime discovery and the subprocess-backed runtime.

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use which::which;

use crate::errors::BoxError;
use crate::util::exec::{ExecOutput, ExecRequest, ExecService};

/// Operations the session lifecycle needs from docker or podman.
pub trait ContainerRuntime {
    /// Program name shown in previews (`docker` or `podman`).
    fn program(&self) -> &str;
    fn image_exists(&self, image: &str) -> bool;
    fn pull(&self, image: &str) -> Result<()>;
    /// `build -t <tag> -` with `dockerfile` on stdin.
    fn build(&self, tag: &str, dockerfile: &str) -> Result<()>;
    /// Run `command` in a new named container (kept after exit) with output streamed to the
    /// terminal; returns the command's exit code.
    fn run_setup(&self, container: &str, image: &str, command: &str) -> Result<i32>;
    fn commit(&self, container: &str, image: &str) -> Result<()>;
    fn remove_container(&self, container: &str) -> bool;
    fn network_exists(&self, network: &str) -> bool;
    fn create_internal_network(&self, network: &str) -> Result<()>;
    /// References (`repo:tag`) of every image whose name starts with `box-`.
    fn list_box_images(&self) -> Result<Vec<String>>;
    fn remove_image(&self, image: &str) -> Result<()>;
    /// Run an interactive session with inherited stdio; returns the exit code.
    fn run_session(&self, args: &[String]) -> Result<i32>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeKind {
    Docker,
    Podman,
}

impl RuntimeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuntimeKind::Docker => "docker",
            RuntimeKind::Podman => "podman",
        }
    }

    fn from_path(p: &Path) -> Self {
        let name = p
            .file_name()
            .map(|n| n.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if name.contains("podman") {
            RuntimeKind::Podman
        } else {
            RuntimeKind::Docker
        }
    }

    /// What to tell the user when the binary exists but does not answer.
    pub fn remediation(&self) -> &'static str {
        match self {
            RuntimeKind::Docker => {
                "Start Docker Desktop, or run `sudo systemctl start docker` on Linux."
            }
            RuntimeKind::Podman => {
                "Run `podman machine start` (macOS/Windows) or check the podman service."
            }
        }
    }
}

impl fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Find the runtime binary: `BOX_CONTAINER_RUNTIME` (name or path) when set, otherwise
/// docker, then podman, on PATH.
pub fn detect_runtime() -> Result<(RuntimeKind, PathBuf), BoxError> {
    if let Ok(forced) = env::var("BOX_CONTAINER_RUNTIME") {
        let forced = forced.trim();
        if !forced.is_empty() {
            return which(forced)
                .map(|p| (RuntimeKind::from_path(&p), p))
                .map_err(|_| {
                    BoxError::RuntimeNotFound(format!(
                        "container runtime '{forced}' (from BOX_CONTAINER_RUNTIME) was not found in PATH"
                    ))
                });
        }
    }
    for kind in [RuntimeKind::Docker, RuntimeKind::Podman] {
        if let Ok(p) = which(kind.as_str()) {
            return Ok((kind, p));
        }
    }
    Err(BoxError::RuntimeNotFound(
        "no container runtime found: install Docker (https://docs.docker.com/get-docker/) or Podman (https://podman.io/)"
            .to_string(),
    ))
}

const PROBE_TIMEOUT: Duration = Duration::from_secs(20);
const QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Runtime driven through its command-line interface.
#[derive(Debug, Clone)]
pub struct CliRuntime {
    kind: RuntimeKind,
    path: PathBuf,
    exec: ExecService,
}

impl CliRuntime {
    pub fn new(kind: RuntimeKind, path: PathBuf) -> Self {
        Self {
            kind,
            path,
            exec: ExecService::new(QUERY_TIMEOUT),
        }
    }

    /// Detect and health-probe the runtime; both failures are fatal at startup.
    pub fn connect() -> Result<Self, BoxError> {
        let (kind, path) = detect_runtime()?;
        let rt = Self::new(kind, path);
        rt.probe()?;
        Ok(rt)
    }

    pub fn kind(&self) -> RuntimeKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `version` must succeed, otherwise the daemon (or podman machine) is not reachable.
    pub fn probe(&self) -> Result<(), BoxError> {
        let unavailable = || BoxError::RuntimeUnavailable {
            runtime: self.kind.to_string(),
            remediation: self.kind.remediation().to_string(),
        };
        match self.exec(&["version"], PROBE_TIMEOUT) {
            Ok(out) if out.success() => Ok(()),
            Ok(out) => {
                tracing::debug!(stderr = %out.stderr.trim(), "runtime version probe failed");
                Err(unavailable())
            }
            Err(e) => {
                tracing::debug!(error = %e, "runtime version probe failed");
                Err(unavailable())
            }
        }
    }

    fn exec(&self, args: &[&str], timeout: Duration) -> Result<ExecOutput> {
        tracing::debug!(runtime = %self.kind, ?args, "runtime call");
        self.exec
            .run(ExecRequest::new(&self.path).args(args).timeout(timeout))
    }

    fn exec_checked(&self, args: &[&str], timeout: Duration) -> Result<ExecOutput> {
        let out = self.exec(args, timeout)?;
        if !out.success() {
            bail!(
                "{} {} failed: {}",
                self.kind,
                args.first().copied().unwrap_or_default(),
                last_line(&out.stderr)
            );
        }
        Ok(out)
    }
}

fn last_line(s: &str) -> String {
    s.lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("no error output")
        .to_string()
}

/// Exit code of a finished child; signals map to 128 + signo like a shell does.
pub(crate) fn exit_code_of(status: std::process::ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(sig) = status.signal() {
            return 128 + sig;
        }
    }
    1
}

impl ContainerRuntime for CliRuntime {
    fn program(&self) -> &str {
        self.kind.as_str()
    }

    fn image_exists(&self, image: &str) -> bool {
        self.exec(&["image", "inspect", image], QUERY_TIMEOUT)
            .map(|o| o.success())
            .unwrap_or(false)
    }

    fn pull(&self, image: &str) -> Result<()> {
        self.exec_checked(&["pull", image], Duration::ZERO)
            .map(|_| ())
    }

    fn build(&self, tag: &str, dockerfile: &str) -> Result<()> {
        let out = self
            .exec
            .run(
                ExecRequest::new(&self.path)
                    .args(["build", "-t", tag, "-"])
                    .stdin(dockerfile)
                    .timeout(Duration::ZERO),
            )
            .with_context(|| format!("failed to start build of {tag}"))?;
        if !out.success() {
            bail!("build of {tag} failed: {}", last_line(&out.stderr));
        }
        Ok(())
    }

    fn run_setup(&self, container: &str, image: &str, command: &str) -> Result<i32> {
        let out = self
            .exec
            .run(
                ExecRequest::new(&self.path)
                    .args(["run", "--name", container, image, "/bin/sh", "-c", command])
                    .timeout(Duration::ZERO)
                    .capture_output(false),
            )
            .with_context(|| format!("failed to start setup container {container}"))?;
        Ok(exit_code_of(out.status))
    }

    fn commit(&self, container: &str, image: &str) -> Result<()> {
        self.exec_checked(&["commit", container, image], Duration::ZERO)
            .map(|_| ())
    }

    fn remove_container(&self, container: &str) -> bool {
        self.exec(&["rm", "-f", container], QUERY_TIMEOUT)
            .map(|o| o.success())
            .unwrap_or(false)
    }

    fn network_exists(&self, network: &str) -> bool {
        self.exec(&["network", "inspect", network], QUERY_TIMEOUT)
            .map(|o| o.success())
            .unwrap_or(false)
    }

    fn create_internal_network(&self, network: &str) -> Result<()> {
        self.exec_checked(&["network", "create", "--internal", network], QUERY_TIMEOUT)
            .map(|_| ())
    }

    fn list_box_images(&self) -> Result<Vec<String>> {
        let out = self.exec_checked(
            &[
                "images",
                "--filter",
                "reference=box-*",
                "--format",
                "{{.Repository}}:{{.Tag}}",
            ],
            QUERY_TIMEOUT,
        )?;
        Ok(out
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn remove_image(&self, image: &str) -> Result<()> {
        self.exec_checked(&["rmi", image], Duration::from_secs(120))
            .map(|_| ())
    }

    fn run_session(&self, args: &[String]) -> Result<i32> {
        let mut child = Command::new(&self.path)
            .args(args)
            .spawn()
            .with_context(|| format!("failed to start {}", self.kind))?;
        let status = crate::signals::wait_forwarding(&mut child)
            .with_context(|| format!("failed to wait for {}", self.kind))?;
        Ok(exit_code_of(status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_path() {
        assert_eq!(
            RuntimeKind::from_path(Path::new("/usr/bin/podman")),
            RuntimeKind::Podman
        );
        assert_eq!(
            RuntimeKind::from_path(Path::new("/usr/local/bin/docker")),
            RuntimeKind::Docker
        );
    }

    #[test]
    fn test_remediation_is_runtime_specific() {
        assert!(RuntimeKind::Podman.remediation().contains("podman machine start"));
        assert!(RuntimeKind::Docker.remediation().contains("Docker Desktop"));
    }

    #[test]
    fn test_last_line_of_stderr() {
        assert_eq!(last_line("a\nerror: boom\n\n"), "error: boom");
        assert_eq!(last_line(""), "no error output");
    }

    #[cfg(unix)]
    #[test]
    fn test_probe_reports_unavailable_runtime() {
        // `false` exits 1 for any arguments, like a runtime whose daemon is down
        let Ok(path) = which("false") else { return };
        let rt = CliRuntime::new(RuntimeKind::Podman, path);
        match rt.probe() {
            Err(BoxError::RuntimeUnavailable {
                runtime,
                remediation,
            }) => {
                assert_eq!(runtime, "podman");
                assert!(remediation.contains("podman machine start"));
            }
            other => panic!("expected RuntimeUnavailable, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_code_passthrough() {
        let status = Command::new("sh").args(["-c", "exit 7"]).status().unwrap();
        assert_eq!(exit_code_of(status), 7);
    }
}
