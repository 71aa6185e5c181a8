#![allow(clippy::module_name_repetitions)]
//! Runtime `run` command construction and preview rendering.

use crate::docker::env::push_env_kv;
use crate::errors::BoxError;
use crate::mounts::ResolvedMount;
use crate::network::NetworkPolicy;
use crate::specs::{PortSpec, CONTAINER_HOME};
use crate::util::{shell_escape, shell_join, ShellScript};

/// tmux session and window name inside the container.
pub const TMUX_SESSION: &str = "box";

/// One-line script run by `/bin/bash -c` as the container's entry.
///
/// - `cd <workdir>` first when a mount directory was selected (failure ignored)
/// - multiplexed: `tmux new-session -s box -n box [<command>]`
/// - otherwise the shell-escaped command, or `exec /bin/bash` for an interactive shell
pub fn startup_script(
    workdir: Option<&str>,
    command: &[String],
    multiplex: bool,
) -> Result<String, BoxError> {
    for word in command {
        crate::util::reject_newlines(word, "command").map_err(BoxError::Config)?;
    }
    let mut script = ShellScript::new();
    if let Some(dir) = workdir {
        script.cd_soft(dir);
    }
    let joined = shell_join(command);
    match (multiplex, command.is_empty()) {
        (true, true) => script.push(format!(
            "tmux new-session -s {TMUX_SESSION} -n {TMUX_SESSION}"
        )),
        (true, false) => script.push(format!(
            "tmux new-session -s {TMUX_SESSION} -n {TMUX_SESSION} {}",
            shell_escape(&joined)
        )),
        (false, true) => script.push("exec /bin/bash"),
        (false, false) => script.push(joined),
    };
    script
        .build()
        .map_err(|e| BoxError::Config(e.to_string()))
}

/// Everything needed for one `run` invocation. Built incrementally, rendered once.
#[derive(Debug, Clone)]
pub struct RunRequest {
    program: String,
    image: String,
    tty: bool,
    volumes: Vec<String>,
    workdir: Option<String>,
    ports: Vec<PortSpec>,
    network_args: Vec<String>,
    env: Vec<(String, String)>,
    command: Vec<String>,
    multiplex: bool,
}

impl RunRequest {
    pub fn new(program: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            image: image.into(),
            tty: true,
            volumes: Vec::new(),
            workdir: None,
            ports: Vec::new(),
            network_args: Vec::new(),
            env: Vec::new(),
            command: Vec::new(),
            multiplex: false,
        }
    }

    /// With a terminal attached the session gets `-it`, otherwise only `-i`.
    pub fn tty(mut self, yes: bool) -> Self {
        self.tty = yes;
        self
    }

    /// Add mounts in order; the first one decides the working directory.
    pub fn mounts(mut self, mounts: &[ResolvedMount]) -> Self {
        for m in mounts {
            if self.workdir.is_none() {
                self.workdir = Some(m.destination.clone());
            }
            self.volumes.push(m.volume_arg());
        }
        self
    }

    pub fn ports(mut self, ports: Vec<PortSpec>) -> Self {
        self.ports.extend(ports);
        self
    }

    pub fn network(mut self, policy: &NetworkPolicy) -> Self {
        self.network_args = policy.network_args();
        self.env.extend(policy.env_vars());
        self
    }

    pub fn env(mut self, key: impl Into<String>, val: impl Into<String>) -> Self {
        self.env.push((key.into(), val.into()));
        self
    }

    pub fn envs<I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.env.extend(vars);
        self
    }

    pub fn command(mut self, command: Vec<String>, multiplex: bool) -> Self {
        self.command = command;
        self.multiplex = multiplex;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    /// Container working directory: the first mount's destination, else the home dir.
    pub fn workdir(&self) -> &str {
        self.workdir.as_deref().unwrap_or(CONTAINER_HOME)
    }

    /// Arguments after the program name.
    pub fn args(&self) -> Result<Vec<String>, BoxError> {
        let mut args: Vec<String> = vec!["run".into(), "--rm".into()];
        args.push(if self.tty { "-it" } else { "-i" }.into());
        for v in &self.volumes {
            args.push("-v".into());
            args.push(v.clone());
        }
        for p in &self.ports {
            args.push("-p".into());
            args.push(p.to_arg());
        }
        args.extend(self.network_args.iter().cloned());
        for (k, v) in &self.env {
            push_env_kv(&mut args, k, v);
        }
        args.push("-w".into());
        args.push(self.workdir().to_string());
        args.push(self.image.clone());
        args.push("/bin/bash".into());
        args.push("-c".into());
        args.push(startup_script(
            self.workdir.as_deref(),
            &self.command,
            self.multiplex,
        )?);
        Ok(args)
    }

    /// The exact invocation, shell-escaped, for `--dry-run` and `--verbose`.
    pub fn preview(&self) -> Result<String, BoxError> {
        let mut words = vec![self.program.clone()];
        words.extend(self.args()?);
        Ok(shell_join(&words))
    }
}
