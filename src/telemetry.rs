//! Diagnostic tracing output, opt-in through `BOX_LOG`.
//!
//! User-facing messages never go through tracing; they use the color helpers. Tracing
//! events carry runtime calls, mount attempts and similar detail for debugging.

use std::env;

use once_cell::sync::OnceCell;
use tracing_subscriber::prelude::*;

static INIT: OnceCell<()> = OnceCell::new();

/// Filter directive from `BOX_LOG` (e.g. `debug`, `box_cli=trace`), when set and non-empty.
fn log_filter_env() -> Option<String> {
    env::var("BOX_LOG")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Install a stderr fmt subscriber when `BOX_LOG` is set. Returns whether one was installed.
pub fn init() -> bool {
    if INIT.get().is_some() {
        return false;
    }
    let Some(filter) = log_filter_env() else {
        return false;
    };
    let env_filter = tracing_subscriber::EnvFilter::try_new(&filter)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);
    if tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .is_err()
    {
        eprintln!("box: log init skipped (global subscriber already set)");
        return false;
    }
    let _ = INIT.set(());
    true
}
