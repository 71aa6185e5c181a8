use std::process::ExitCode;

use clap::Parser;

mod cli;
mod commands;

use crate::cli::{normalize_args, Cli};

fn main() -> ExitCode {
    let cli = Cli::parse_from(normalize_args(std::env::args_os()));

    if let Some(mode) = cli.color {
        box_cli::set_color_mode(mode);
    }
    box_cli::telemetry::init();

    if cli.version {
        println!("box {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::from(0);
    }

    box_cli::signals::install();

    match commands::dispatch(&cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            let use_err = box_cli::color_enabled_stderr();
            box_cli::log_error_stderr(use_err, &format!("box: {e}"));
            ExitCode::from(e.exit_code())
        }
    }
}
