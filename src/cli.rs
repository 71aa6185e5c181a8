use std::ffi::OsString;

use box_cli::config::{NamedImageConfig, Override, RunOverrides};
use box_cli::images::detect::EnvKind;
use box_cli::network::{validate_proxy, NetworkMode};
use clap::Parser;

fn parse_proxy(s: &str) -> Result<String, String> {
    validate_proxy(s)
}

#[derive(Parser, Debug)]
#[command(
    name = "box",
    about = "Run commands in disposable, isolated Docker/Podman containers.",
    override_usage = "box [OPTIONS] [COMMAND]...",
    after_long_help = "Examples:\n  box npm start                          # Node image auto-detected\n  box -V 3.9 python script.py            # python:3.9\n  box -ro ~/data -rw ~/code bash         # data read-only, code read-write\n  box -rw alice@build01:/srv/app bash    # SSHFS mount of a remote directory\n  box -N python analyze.py               # no network access\n  box -n mydev --node -p 3000 npm start  # save as 'mydev' and run\n  box -i mydev                           # run the saved 'mydev' image\n  box --list\n  box --clean\n\n",
    after_help = "\n"
)]
pub(crate) struct Cli {
    /// Use a Node.js base image (node:<version|lts>)
    #[arg(long, conflicts_with_all = ["py", "image"])]
    pub(crate) node: bool,

    /// Use a Python base image (python:<version|latest>)
    #[arg(long, conflicts_with = "image")]
    pub(crate) py: bool,

    /// Run a saved named image
    #[arg(short = 'i', long = "image", value_name = "NAME", conflicts_with_all = ["name", "image_version"])]
    pub(crate) image: Option<String>,

    /// Base image version (e.g. 18 for Node, 3.9 for Python)
    #[arg(short = 'V', long = "image-version", value_name = "VERSION")]
    pub(crate) image_version: Option<String>,

    /// Publish a port: PORT or HOST:CONTAINER (repeatable)
    #[arg(short = 'p', long = "port", value_name = "PORT")]
    pub(crate) port: Vec<String>,

    /// Mount read-only (-ro): PATH[:DEST] or [user@]host:path[:DEST] (repeatable)
    #[arg(long = "read-only", value_name = "PATH")]
    pub(crate) read_only: Vec<String>,

    /// Mount read-write (-rw): PATH[:DEST] or [user@]host:path[:DEST] (repeatable)
    #[arg(long = "read-write", value_name = "PATH")]
    pub(crate) read_write: Vec<String>,

    /// Run the session inside tmux
    #[arg(short = 't', long)]
    pub(crate) tmux: bool,

    /// Save this configuration as a named image, build it, then run it
    #[arg(short = 'n', long = "name", value_name = "NAME")]
    pub(crate) name: Option<String>,

    /// Shell command baked into the named image at build time
    #[arg(long = "setup", value_name = "CMD", requires = "name")]
    pub(crate) setup: Option<String>,

    /// Overwrite an existing named image without asking
    #[arg(short = 'f', long)]
    pub(crate) force: bool,

    /// Remove all box-* images (saved configurations are kept)
    #[arg(long, conflicts_with_all = ["list", "name", "image"])]
    pub(crate) clean: bool,

    /// List saved named images
    #[arg(short = 'l', long, conflicts_with_all = ["name", "image"])]
    pub(crate) list: bool,

    /// Disable networking (--network none)
    #[arg(short = 'N', long = "no-network", conflicts_with_all = ["internal_network", "full_network"])]
    pub(crate) no_network: bool,

    /// Join the internal-only network (no outside access)
    #[arg(long = "internal-network", conflicts_with = "full_network")]
    pub(crate) internal_network: bool,

    /// Unrestricted networking (overrides a saved restriction)
    #[arg(long = "full-network")]
    pub(crate) full_network: bool,

    /// Proxy URL exported as HTTP(S)_PROXY in the container
    #[arg(long = "http-proxy", value_name = "URL", value_parser = parse_proxy, conflicts_with = "no_proxy")]
    pub(crate) http_proxy: Option<String>,

    /// Drop a saved proxy for this run
    #[arg(long = "no-proxy")]
    pub(crate) no_proxy: bool,

    /// Print the container command without building, mounting or running anything
    #[arg(long)]
    pub(crate) dry_run: bool,

    /// Print the container command before running it
    #[arg(long)]
    pub(crate) verbose: bool,

    /// Colorize output: auto|always|never
    #[arg(long = "color", value_enum)]
    pub(crate) color: Option<box_cli::ColorMode>,

    /// Print version
    #[arg(long = "version")]
    pub(crate) version: bool,

    /// Command to run in the container (default: interactive bash)
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "COMMAND")]
    pub(crate) command: Vec<String>,
}

impl Cli {
    pub(crate) fn environment(&self) -> Option<EnvKind> {
        if self.node {
            Some(EnvKind::Node)
        } else if self.py {
            Some(EnvKind::Python)
        } else {
            None
        }
    }

    /// Explicit network choice, if any.
    pub(crate) fn network_override(&self) -> Option<NetworkMode> {
        if self.full_network {
            Some(NetworkMode::Unrestricted)
        } else if self.no_network || self.internal_network {
            Some(NetworkMode::from_flags(self.no_network, self.internal_network))
        } else {
            None
        }
    }

    pub(crate) fn proxy_override(&self) -> Override<String> {
        match (&self.http_proxy, self.no_proxy) {
            (Some(p), _) => Override::Set(p.clone()),
            (None, true) => Override::Clear,
            (None, false) => Override::Inherit,
        }
    }

    /// Configuration for a fresh (unnamed or about-to-be-saved) session.
    pub(crate) fn to_config(&self) -> NamedImageConfig {
        NamedImageConfig {
            environment: self.environment(),
            version: self.image_version.clone(),
            multiplex: self.tmux,
            command: self.command.clone(),
            ports: self.port.clone(),
            read_only: self.read_only.clone(),
            read_write: self.read_write.clone(),
            network: self.network_override().unwrap_or_default(),
            http_proxy: self.proxy_override().into_option(),
            setup: self.setup.clone(),
        }
    }

    /// What this invocation layers over a saved configuration.
    pub(crate) fn to_overrides(&self) -> RunOverrides {
        RunOverrides {
            multiplex: self.tmux,
            command: self.command.clone(),
            ports: self.port.clone(),
            read_only: self.read_only.clone(),
            read_write: self.read_write.clone(),
            network: self.network_override(),
            http_proxy: self.proxy_override(),
        }
    }
}

/// Options that consume the following argument as their value.
const VALUE_OPTIONS: &[&str] = &[
    "-i",
    "--image",
    "-V",
    "--image-version",
    "-p",
    "--port",
    "-ro",
    "--read-only",
    "-rw",
    "--read-write",
    "-n",
    "--name",
    "--setup",
    "--http-proxy",
    "--color",
];

/// Rewrite the two-letter `-ro`/`-rw` spellings to their long forms.
///
/// Only tokens before the container command are touched, so `box ls -rw` is left alone.
pub(crate) fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    let mut out = Vec::new();
    let mut iter = args.into_iter();
    if let Some(prog) = iter.next() {
        out.push(prog);
    }
    let mut expect_value = false;
    let mut in_command = false;
    for arg in iter {
        if in_command {
            out.push(arg);
            continue;
        }
        if expect_value {
            expect_value = false;
            out.push(arg);
            continue;
        }
        let s = arg.to_string_lossy();
        match s.as_ref() {
            "--" => in_command = true,
            "-ro" => {
                out.push(OsString::from("--read-only"));
                expect_value = true;
                continue;
            }
            "-rw" => {
                out.push(OsString::from("--read-write"));
                expect_value = true;
                continue;
            }
            v if VALUE_OPTIONS.contains(&v) => expect_value = true,
            v if !v.starts_with('-') || v == "-" => in_command = true,
            _ => {}
        }
        out.push(arg);
    }
    out
}
