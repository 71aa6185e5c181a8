//! Disposable, isolated command-line sessions in Docker or Podman containers.
//!
//! A session image is derived from a base image chosen from the invoked command (Node,
//! Python or Alpine), optionally with tmux. Local and SSH directories can be mounted, ports
//! published and network access restricted. Named configurations are saved per user and
//! rebuilt into named images on demand.
//!
//! Module map:
//! - `specs`: port and volume spec parsing
//! - `config`: named image configurations (`~/.box-cli/config.json`)
//! - `images`: base image detection and derived image lifecycle
//! - `mounts`: local and SSHFS mount resolution with scoped cleanup
//! - `network`: network modes and proxy environment
//! - `docker`: runtime detection and the `run` invocation
//! - `session`: planning and running one session over the pieces above
//! - `color`, `ui`, `telemetry`, `signals`, `util`, `errors`: ambient plumbing

pub mod color;
pub mod config;
pub mod docker;
pub mod errors;
pub mod images;
pub mod mounts;
pub mod network;
pub mod session;
pub mod signals;
pub mod specs;
pub mod telemetry;
pub mod ui;
pub mod util;

pub use color::{
    color_enabled_stderr, color_enabled_stdout, log_error_stderr, log_info_stderr,
    log_ok_stderr, log_warn_stderr, paint, set_color_mode, ColorMode,
};
pub use errors::BoxError;
pub use ui::warn_print;
pub use util::{shell_escape, shell_join, ShellScript};
