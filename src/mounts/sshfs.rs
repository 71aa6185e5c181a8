//! `sshfs`-backed mount provider and mount-table helpers.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use which::which;

use super::MountProvider;
use crate::util::exec::{ExecRequest, ExecService};

const MOUNT_TIMEOUT: Duration = Duration::from_secs(15);
const CHECK_TIMEOUT: Duration = Duration::from_secs(5);
const MOUNT_ATTEMPTS: usize = 2;

const SSHFS_OPTIONS: &[&str] = &[
    "StrictHostKeyChecking=accept-new",
    "ConnectTimeout=10",
    "ServerAliveInterval=15",
    "ServerAliveCountMax=3",
    "follow_symlinks",
    "auto_cache",
    "kernel_cache",
    "reconnect",
];

const INSTALL_HINT: &str = "sshfs not found in PATH; install it first \
(Debian/Ubuntu: `sudo apt install sshfs`, macOS: `brew install macos-fuse-t/homebrew-cask/fuse-t-sshfs`)";

/// `-o` value for sshfs.
pub fn sshfs_options(read_only: bool) -> String {
    let mut opts: Vec<&str> = SSHFS_OPTIONS.to_vec();
    if read_only {
        opts.push("ro");
    }
    opts.join(",")
}

/// One row of the system mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub source: String,
    pub target: PathBuf,
    pub fstype: String,
}

/// Parse `mount` output in either the Linux (`src on dst type fs (opts)`) or the BSD/macOS
/// (`src on dst (fs, opts)`) layout.
pub fn parse_mount_table(text: &str) -> Vec<MountEntry> {
    let mut out = Vec::new();
    for line in text.lines() {
        let Some((source, rest)) = line.split_once(" on ") else {
            continue;
        };
        let (target, fstype) = if let Some((t, after)) = rest.split_once(" type ") {
            (t, after.split_whitespace().next().unwrap_or(""))
        } else if let Some((t, after)) = rest.rsplit_once(" (") {
            (t, after.split([',', ')']).next().unwrap_or("").trim())
        } else {
            (rest, "")
        };
        out.push(MountEntry {
            source: source.trim().to_string(),
            target: PathBuf::from(target.trim()),
            fstype: fstype.to_string(),
        });
    }
    out
}

#[derive(Debug, Clone)]
pub struct Sshfs {
    base: PathBuf,
    exec: ExecService,
}

impl Sshfs {
    /// Provider with mount points under `<config dir>/ssh-mounts`.
    pub fn new() -> Self {
        Self::with_base(crate::config::ConfigStore::default_dir().join("ssh-mounts"))
    }

    pub fn with_base(base: PathBuf) -> Self {
        Self {
            base,
            exec: ExecService::new(CHECK_TIMEOUT),
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    fn is_managed(&self, path: &Path) -> bool {
        path.parent() == Some(self.base.as_path())
    }

    /// Mount `target` (`[user@]host:path`) on `point`, which must already exist.
    /// Up to two attempts; each is verified by listing the mounted directory.
    pub fn mount_to(&self, target: &str, point: &Path, read_only: bool) -> Result<(), String> {
        if which("sshfs").is_err() {
            return Err(INSTALL_HINT.to_string());
        }
        let opts = sshfs_options(read_only);
        let mut last_err = String::new();
        for attempt in 1..=MOUNT_ATTEMPTS {
            tracing::debug!(%target, point = %point.display(), attempt, "sshfs mount");
            let res = self.exec.run(
                ExecRequest::new("sshfs")
                    .arg(target)
                    .arg(point)
                    .args(["-o", opts.as_str()])
                    .timeout(MOUNT_TIMEOUT),
            );
            match res {
                Ok(out) if out.success() => {
                    return match self.verify(point) {
                        Ok(()) => Ok(()),
                        Err(e) => {
                            self.unmount_quiet(point);
                            Err(e)
                        }
                    };
                }
                Ok(out) => {
                    last_err = out
                        .stderr
                        .lines()
                        .map(str::trim)
                        .filter(|l| !l.is_empty())
                        .last()
                        .unwrap_or("sshfs failed")
                        .to_string();
                }
                Err(e) => last_err = format!("{e:#}"),
            }
            if crate::signals::interrupted() {
                break;
            }
        }
        Err(last_err)
    }

    fn verify(&self, point: &Path) -> Result<(), String> {
        match self.exec.run(
            ExecRequest::new("ls")
                .arg("-la")
                .arg(point)
                .timeout(CHECK_TIMEOUT),
        ) {
            Ok(out) if out.success() => Ok(()),
            Ok(out) => Err(format!(
                "mount appeared to succeed but {} is not accessible: {}",
                point.display(),
                out.stderr.trim()
            )),
            Err(e) => Err(format!("mount verification failed: {e:#}")),
        }
    }

    fn try_cmd(&self, program: &str, args: &[&str], path: &Path) -> bool {
        self.exec
            .run(
                ExecRequest::new(program)
                    .args(args)
                    .arg(path)
                    .timeout(CHECK_TIMEOUT),
            )
            .map(|o| o.success())
            .unwrap_or(false)
    }

    fn unmount_quiet(&self, path: &Path) -> bool {
        if cfg!(target_os = "macos")
            && (self.try_cmd("diskutil", &["unmount"], path)
                || self.try_cmd("diskutil", &["unmount", "force"], path))
        {
            return true;
        }
        if self.try_cmd("umount", &[], path) {
            return true;
        }
        which("fusermount").is_ok() && self.try_cmd("fusermount", &["-u"], path)
    }

    /// Active mounts from the system mount table.
    pub fn mount_table(&self) -> Vec<MountEntry> {
        match self.exec.run(ExecRequest::new("mount").timeout(CHECK_TIMEOUT)) {
            Ok(out) if out.success() => parse_mount_table(&out.stdout),
            _ => Vec::new(),
        }
    }

    /// SSHFS mounts: anything typed sshfs, plus anything under the managed base directory.
    pub fn active_mounts(&self) -> Vec<MountEntry> {
        self.mount_table()
            .into_iter()
            .filter(|e| e.fstype.contains("sshfs") || e.target.starts_with(&self.base))
            .collect()
    }

    /// Unmount everything under the managed base; returns (unmounted, failed) targets.
    pub fn cleanup_all(&self) -> (Vec<PathBuf>, Vec<PathBuf>) {
        let mut ok = Vec::new();
        let mut failed = Vec::new();
        for e in self.mount_table() {
            if !e.target.starts_with(&self.base) {
                continue;
            }
            if self.unmount(&e.target) {
                ok.push(e.target);
            } else {
                failed.push(e.target);
            }
        }
        // leftover empty mount directories
        if let Ok(rd) = fs::read_dir(&self.base) {
            for entry in rd.flatten() {
                let _ = fs::remove_dir(entry.path());
            }
        }
        (ok, failed)
    }
}

impl Default for Sshfs {
    fn default() -> Self {
        Self::new()
    }
}

impl MountProvider for Sshfs {
    fn mount_point(
        &self,
        user: Option<&str>,
        host: &str,
        remote_path: &str,
        read_only: bool,
    ) -> PathBuf {
        self.base.join(format!(
            "{}@{}-{}{}",
            user.unwrap_or("nouser"),
            host,
            remote_path.replace('/', "_"),
            if read_only { "-ro" } else { "" }
        ))
    }

    fn is_mounted(&self, path: &Path) -> bool {
        self.mount_table().iter().any(|e| e.target == path)
    }

    fn mount(
        &self,
        user: Option<&str>,
        host: &str,
        remote_path: &str,
        read_only: bool,
    ) -> Result<PathBuf, String> {
        let target = match user {
            Some(u) => format!("{u}@{host}:{remote_path}"),
            None => format!("{host}:{remote_path}"),
        };
        let point = self.mount_point(user, host, remote_path, read_only);
        fs::create_dir_all(&point)
            .map_err(|e| format!("cannot create mount point {}: {e}", point.display()))?;
        let use_err = crate::color_enabled_stderr();
        crate::log_info_stderr(
            use_err,
            &format!("Mounting {target} to {}...", point.display()),
        );
        match self.mount_to(&target, &point, read_only) {
            Ok(()) => {
                crate::log_ok_stderr(use_err, &format!("SSH mount ready: {target}"));
                Ok(point)
            }
            Err(e) => {
                let _ = fs::remove_dir(&point);
                Err(e)
            }
        }
    }

    fn unmount(&self, path: &Path) -> bool {
        let ok = self.unmount_quiet(path);
        if ok {
            tracing::debug!(path = %path.display(), "unmounted");
            if self.is_managed(path) {
                let _ = fs::remove_dir(path);
            }
        }
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_string() {
        let o = sshfs_options(false);
        assert!(o.starts_with("StrictHostKeyChecking=accept-new,ConnectTimeout=10"));
        assert!(o.ends_with("reconnect"));
        assert!(sshfs_options(true).ends_with(",reconnect,ro"));
    }

    #[test]
    fn test_mount_point_naming() {
        let s = Sshfs::with_base(PathBuf::from("/home/me/.box-cli/ssh-mounts"));
        assert_eq!(
            s.mount_point(Some("alice"), "build01", "/srv/app", false),
            PathBuf::from("/home/me/.box-cli/ssh-mounts/alice@build01-_srv_app")
        );
        assert_eq!(
            s.mount_point(None, "h", "~/p", true),
            PathBuf::from("/home/me/.box-cli/ssh-mounts/nouser@h-~_p-ro")
        );
        assert!(s.is_managed(&s.mount_point(None, "h", "x", false)));
        assert!(!s.is_managed(Path::new("/tmp/elsewhere")));
    }

    #[test]
    fn test_parse_linux_mount_table() {
        let text = "\
proc on /proc type proc (rw,nosuid)
alice@build01:/srv/app on /home/me/.box-cli/ssh-mounts/alice@build01-_srv_app type fuse.sshfs (rw,nosuid,nodev)
";
        let rows = parse_mount_table(text);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].source, "alice@build01:/srv/app");
        assert_eq!(
            rows[1].target,
            PathBuf::from("/home/me/.box-cli/ssh-mounts/alice@build01-_srv_app")
        );
        assert_eq!(rows[1].fstype, "fuse.sshfs");
    }

    #[test]
    fn test_parse_macos_mount_table() {
        let text = "\
/dev/disk3s1s1 on / (apfs, sealed, local, read-only, journaled)
bob@web:/var/www on /Users/bob/.box-cli/ssh-mounts/bob@web-_var_www (macfuse, nodev, nosuid, synchronous, mounted by bob)
";
        let rows = parse_mount_table(text);
        assert_eq!(rows[0].fstype, "apfs");
        assert_eq!(rows[1].fstype, "macfuse");
        assert_eq!(
            rows[1].target,
            PathBuf::from("/Users/bob/.box-cli/ssh-mounts/bob@web-_var_www")
        );
    }
}
