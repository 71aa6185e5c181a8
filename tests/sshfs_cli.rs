mod common;

use common::{sshfs_cmd, stderr};

#[test]
fn test_help_mentions_cleanup() {
    let home = tempfile::tempdir().expect("tmpdir");
    let out = sshfs_cmd(home.path()).arg("--help").output().expect("run box-sshfs");
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains("--cleanup"));
}

#[test]
fn test_local_path_is_not_a_remote() {
    let home = tempfile::tempdir().expect("tmpdir");
    let out = sshfs_cmd(home.path())
        .arg("/srv/app")
        .output()
        .expect("run box-sshfs");
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("invalid remote"), "{}", stderr(&out));
}

#[test]
fn test_remote_required_without_action() {
    let home = tempfile::tempdir().expect("tmpdir");
    let out = sshfs_cmd(home.path()).output().expect("run box-sshfs");
    assert!(!out.status.success());
}
