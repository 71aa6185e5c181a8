#![allow(clippy::module_name_repetitions)]
//! Container runtime integration.
//!
//! - `runtime`: detection, health probe and the `ContainerRuntime` seam
//! - `run`: session `run` invocation and its preview
//! - `env`: `-e` helpers and the `BOX_ENV_*` opt-in

pub mod env;
pub mod run;
pub mod runtime;

pub use run::{startup_script, RunRequest};
pub use runtime::{detect_runtime, CliRuntime, ContainerRuntime, RuntimeKind};
