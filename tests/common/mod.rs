#![allow(dead_code)]
use std::path::Path;
use std::process::{Command, Output, Stdio};

/// `box` with a scratch HOME and config dir, a clean environment and no stdin.
pub fn box_cmd(home: &Path) -> Command {
    command(env!("CARGO_BIN_EXE_box"), home)
}

pub fn sshfs_cmd(home: &Path) -> Command {
    command(env!("CARGO_BIN_EXE_box-sshfs"), home)
}

fn command(bin: &str, home: &Path) -> Command {
    let mut cmd = Command::new(bin);
    cmd.env_clear()
        .env("PATH", std::env::var("PATH").unwrap_or_default())
        .env("HOME", home)
        .env("BOX_CLI_HOME", home.join(".box-cli"))
        .env("NO_COLOR", "1")
        .current_dir(home)
        .stdin(Stdio::null());
    cmd
}

pub fn seed_config(home: &Path, json: &str) {
    let dir = home.join(".box-cli");
    std::fs::create_dir_all(&dir).expect("create config dir");
    std::fs::write(dir.join("config.json"), json).expect("write config");
}

pub fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

pub fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

pub fn assert_ok(out: &Output) {
    assert!(
        out.status.success(),
        "exited {:?}\nstdout:\n{}\nstderr:\n{}",
        out.status.code(),
        stdout(out),
        stderr(out)
    );
}
