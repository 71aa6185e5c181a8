use std::env;

use box_cli::config::{ConfigStore, NamedImageConfig};
use box_cli::docker::env::prefixed_env;
use box_cli::docker::{detect_runtime, CliRuntime};
use box_cli::images::detect::DetectionRules;
use box_cli::mounts::sshfs::Sshfs;
use box_cli::session::{plan, Invocation, SessionRunner, Target};
use box_cli::BoxError;

use crate::cli::Cli;

pub(crate) fn run_session(cli: &Cli) -> Result<u8, BoxError> {
    let cwd = env::current_dir()?;
    let mut store = ConfigStore::load();

    let Some(plan) = plan(&mut store, invocation(cli), confirm_overwrite)? else {
        return Ok(0);
    };
    let sshfs = Sshfs::new();
    let tty = atty::is(atty::Stream::Stdin) && atty::is(atty::Stream::Stdout);
    let runner = SessionRunner::new(&sshfs, DetectionRules::with_overrides(store.detection()), cwd)
        .tty(tty)
        .envs(prefixed_env())
        .verbose(cli.verbose);

    if cli.dry_run {
        let program = detect_runtime()
            .map(|(kind, _)| kind.as_str())
            .unwrap_or("docker");
        println!("{}", runner.preview(program, &plan)?);
        return Ok(0);
    }

    let runtime = CliRuntime::connect()?;
    tracing::debug!(runtime = %runtime.kind(), path = %runtime.path().display(), "runtime ready");
    runner.run(&runtime, &plan)
}

fn invocation(cli: &Cli) -> Invocation {
    let target = match (cli.image.as_deref(), cli.name.as_deref()) {
        (Some(name), _) => Target::Saved(name.to_string()),
        (None, Some(name)) => Target::Save(name.to_string()),
        (None, None) => Target::Fresh,
    };
    Invocation {
        target,
        config: cli.to_config(),
        overrides: cli.to_overrides(),
        force: cli.force,
        dry_run: cli.dry_run,
    }
}

fn confirm_overwrite(name: &str, existing: &NamedImageConfig) -> bool {
    let use_err = box_cli::color_enabled_stderr();
    box_cli::log_warn_stderr(use_err, &format!("Named image '{name}' already exists:"));
    for line in existing.summary_lines() {
        eprintln!("  {line}");
    }
    box_cli::ui::confirm_on_stdin(&format!("Overwrite '{name}'?"))
}
