//! Top-level command handlers for the `box` binary.
//!
//! stdout carries machine-readable output only (`--list`, `--dry-run` previews); progress,
//! warnings and errors go to stderr.

mod session;

use box_cli::config::ConfigStore;
use box_cli::docker::CliRuntime;
use box_cli::images::clean_images;
use box_cli::BoxError;

use crate::cli::Cli;

pub(crate) fn dispatch(cli: &Cli) -> Result<u8, BoxError> {
    if cli.list {
        return run_list();
    }
    if cli.clean {
        return run_clean();
    }
    session::run_session(cli)
}

/// Saved names with a one-line summary each. Needs no container runtime.
fn run_list() -> Result<u8, BoxError> {
    let store = ConfigStore::load();
    let names = store.list();
    if names.is_empty() {
        let use_err = box_cli::color_enabled_stderr();
        box_cli::log_info_stderr(
            use_err,
            &format!("No named images saved ({}).", store.path().display()),
        );
        return Ok(0);
    }
    let use_out = box_cli::color_enabled_stdout();
    let width = names.iter().map(String::len).max().unwrap_or(0);
    for name in &names {
        let summary = store.summary(name).unwrap_or_default();
        let padded = format!("{name:<width$}");
        println!("{}  {summary}", box_cli::paint(use_out, "\x1b[34;1m", &padded));
    }
    Ok(0)
}

fn run_clean() -> Result<u8, BoxError> {
    let use_err = box_cli::color_enabled_stderr();
    let runtime = CliRuntime::connect()?;
    let report = clean_images(&runtime)?;
    if report.total() == 0 {
        box_cli::log_info_stderr(use_err, "No box images to remove.");
        return Ok(0);
    }
    for image in &report.failed {
        box_cli::warn_print(&format!("could not remove {image} (in use?)"));
    }
    box_cli::log_ok_stderr(
        use_err,
        &format!(
            "Removed {}/{} box images. Saved configurations were kept.",
            report.removed.len(),
            report.total()
        ),
    );
    Ok(0)
}
