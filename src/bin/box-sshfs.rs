//! Standalone SSHFS helper: mount a remote directory locally, list or clean up mounts.
//!
//! Mounts created here live outside any `box` session; `--cleanup` removes every mount under
//! the managed base directory, including ones a crashed session left behind.

use std::path::PathBuf;
use std::process::ExitCode;

use box_cli::mounts::sshfs::Sshfs;
use box_cli::mounts::MountProvider;
use box_cli::specs::parse_remote_volume;
use box_cli::util::{absolutize, basename, expand_tilde};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "box-sshfs",
    version,
    about = "Mount a remote directory over SSH (sshfs) and manage box SSH mounts.",
    after_long_help = "Examples:\n  box-sshfs alice@build01:/srv/app          # mount on ./app until Ctrl+C\n  box-sshfs -r build01:/var/log ~/logs      # read-only\n  box-sshfs -d alice@build01:/srv/app       # mount and exit\n  box-sshfs --list\n  box-sshfs --unmount ./app\n  box-sshfs --cleanup\n\n"
)]
struct Args {
    /// Remote directory: [user@]host:path
    #[arg(value_name = "REMOTE", required_unless_present_any = ["list", "unmount", "cleanup"])]
    remote: Option<String>,

    /// Local mount point (default: ./<basename of the remote path>)
    #[arg(value_name = "LOCAL")]
    local: Option<String>,

    /// Mount read-only
    #[arg(short = 'r', long = "read-only")]
    read_only: bool,

    /// List active SSHFS mounts
    #[arg(short = 'l', long, conflicts_with_all = ["remote", "unmount", "cleanup"])]
    list: bool,

    /// Unmount PATH
    #[arg(short = 'u', long, value_name = "PATH", conflicts_with_all = ["remote", "cleanup"])]
    unmount: Option<String>,

    /// Unmount every mount under the box mount directory
    #[arg(short = 'c', long, conflicts_with = "remote")]
    cleanup: bool,

    /// Mount and exit instead of waiting for Ctrl+C
    #[arg(short = 'd', long)]
    daemon: bool,

    /// Colorize output: auto|always|never
    #[arg(long = "color", value_enum)]
    color: Option<box_cli::ColorMode>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Some(mode) = args.color {
        box_cli::set_color_mode(mode);
    }
    box_cli::telemetry::init();
    box_cli::signals::install();

    let sshfs = Sshfs::new();
    let code = if args.list {
        list(&sshfs)
    } else if let Some(path) = args.unmount.as_deref() {
        unmount(&sshfs, path)
    } else if args.cleanup {
        cleanup(&sshfs)
    } else {
        match args.remote.as_deref() {
            Some(remote) => mount(&sshfs, remote, args.local.as_deref(), args.read_only, args.daemon),
            None => 1,
        }
    };
    ExitCode::from(code)
}

fn list(sshfs: &Sshfs) -> u8 {
    let mounts = sshfs.active_mounts();
    if mounts.is_empty() {
        let use_err = box_cli::color_enabled_stderr();
        box_cli::log_info_stderr(use_err, "No active SSHFS mounts.");
        return 0;
    }
    for m in mounts {
        println!("{} on {}", m.source, m.target.display());
    }
    0
}

fn unmount(sshfs: &Sshfs, path: &str) -> u8 {
    let use_err = box_cli::color_enabled_stderr();
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let target = absolutize(&expand_tilde(path), &cwd);
    if sshfs.unmount(&target) {
        box_cli::log_ok_stderr(use_err, &format!("Unmounted {}", target.display()));
        0
    } else {
        box_cli::log_error_stderr(use_err, &format!("failed to unmount {}", target.display()));
        1
    }
}

fn cleanup(sshfs: &Sshfs) -> u8 {
    let use_err = box_cli::color_enabled_stderr();
    let (ok, failed) = sshfs.cleanup_all();
    for p in &failed {
        box_cli::warn_print(&format!("could not unmount {}", p.display()));
    }
    box_cli::log_info_stderr(
        use_err,
        &format!(
            "Cleaned up {} mount(s) under {}",
            ok.len(),
            sshfs.base().display()
        ),
    );
    if failed.is_empty() {
        0
    } else {
        1
    }
}

fn mount(sshfs: &Sshfs, remote: &str, local: Option<&str>, read_only: bool, daemon: bool) -> u8 {
    let use_err = box_cli::color_enabled_stderr();
    let Some(spec) = parse_remote_volume(remote) else {
        box_cli::log_error_stderr(
            use_err,
            &format!("box-sshfs: invalid remote '{remote}': expected [user@]host:path"),
        );
        return 1;
    };
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let local = match local {
        Some(l) => l.to_string(),
        None => basename(&spec.remote_path).unwrap_or_else(|| "ssh_mount".to_string()),
    };
    let point = absolutize(&expand_tilde(&local), &cwd);
    if let Err(e) = std::fs::create_dir_all(&point) {
        box_cli::log_error_stderr(
            use_err,
            &format!("box-sshfs: cannot create {}: {e}", point.display()),
        );
        return 1;
    }

    let target = spec.target();
    box_cli::log_info_stderr(
        use_err,
        &format!("Mounting {target} on {}", point.display()),
    );
    if let Err(e) = sshfs.mount_to(&target, &point, read_only) {
        box_cli::log_error_stderr(use_err, &format!("box-sshfs: {e}"));
        return 1;
    }
    box_cli::log_ok_stderr(
        use_err,
        &format!(
            "Mounted {target} on {}{}",
            point.display(),
            if read_only { " (read-only)" } else { "" }
        ),
    );

    if daemon {
        eprintln!("Unmount with: box-sshfs --unmount {}", point.display());
        return 0;
    }
    eprintln!("Press Ctrl+C to unmount and exit.");
    box_cli::signals::wait_for_interrupt();
    if sshfs.unmount(&point) {
        box_cli::log_ok_stderr(use_err, &format!("Unmounted {}", point.display()));
        0
    } else {
        box_cli::warn_print(&format!(
            "failed to unmount {}; run `box-sshfs --unmount {}`",
            point.display(),
            point.display()
        ));
        1
    }
}
