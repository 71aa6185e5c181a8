#![allow(clippy::module_name_repetitions)]
/*!
Volume mount resolution.

- Local specs are expanded and absolutized; destinations default to `/root/<basename>`.
- Remote specs (`[user@]host:path[:dest]`) are mounted on the host through a `MountProvider`
  and the resulting local directory is bind-mounted into the container.
- Order: read-only specs first, then read-write, each in given order. The first mount's
  destination becomes the session's working directory.
- `MountSession` owns the remote mounts it created and unmounts them on drop.
*/

pub mod sshfs;

use std::path::{Path, PathBuf};

use crate::errors::BoxError;
use crate::specs::{
    has_user_part, looks_remote, normalize_destination, parse_local_volume, parse_remote_volume,
    Access, RemoteVolumeSpec, CONTAINER_HOME,
};
use crate::util::{absolutize, basename, expand_tilde};

/// Host-side mounting of remote directories.
pub trait MountProvider {
    /// Syntactic remote check; classification may still prefer an existing local path.
    fn is_remote_spec(&self, spec: &str) -> bool {
        looks_remote(spec)
    }

    /// Local directory a remote target is (or would be) mounted on. Read-only and read-write
    /// mounts of the same target get distinct points so neither reuses the other.
    fn mount_point(
        &self,
        user: Option<&str>,
        host: &str,
        remote_path: &str,
        read_only: bool,
    ) -> PathBuf;

    fn is_mounted(&self, path: &Path) -> bool;

    /// Mount the remote directory and return the local mount point.
    fn mount(
        &self,
        user: Option<&str>,
        host: &str,
        remote_path: &str,
        read_only: bool,
    ) -> Result<PathBuf, String>;

    fn unmount(&self, path: &Path) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecKind {
    Local,
    Remote,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMount {
    /// The spec as given on the command line or in the saved configuration.
    pub spec: String,
    pub source: PathBuf,
    pub destination: String,
    pub access: Access,
}

impl ResolvedMount {
    /// Value for the runtime's `-v` flag.
    pub fn volume_arg(&self) -> String {
        format!(
            "{}:{}:{}",
            self.source.display(),
            self.destination,
            self.access.as_str()
        )
    }
}

/// Specs in mount order: read-only first, then read-write.
pub fn ordered_specs(read_only: &[String], read_write: &[String]) -> Vec<(String, Access)> {
    read_only
        .iter()
        .map(|s| (s.clone(), Access::ReadOnly))
        .chain(read_write.iter().map(|s| (s.clone(), Access::ReadWrite)))
        .collect()
}

pub struct MountResolver<'a> {
    provider: &'a dyn MountProvider,
    cwd: PathBuf,
    dry_run: bool,
    use_err: bool,
}

impl<'a> MountResolver<'a> {
    pub fn new(provider: &'a dyn MountProvider, cwd: PathBuf) -> Self {
        Self {
            provider,
            cwd,
            dry_run: false,
            use_err: crate::color_enabled_stderr(),
        }
    }

    /// Plan remote mounts without mounting anything.
    pub fn dry_run(mut self, yes: bool) -> Self {
        self.dry_run = yes;
        self
    }

    /// Remote only when the spec looks remote and, lacking `user@`, its host segment is not
    /// an existing local path (so `data:/mnt` with a local `data` dir stays local).
    pub fn classify(&self, spec: &str) -> SpecKind {
        if !self.provider.is_remote_spec(spec) {
            return SpecKind::Local;
        }
        if !has_user_part(spec) {
            if let Some((head, _)) = spec.split_once(':') {
                if absolutize(&expand_tilde(head), &self.cwd).exists() {
                    return SpecKind::Local;
                }
            }
        }
        SpecKind::Remote
    }

    pub fn resolve_local(&self, spec: &str, access: Access) -> ResolvedMount {
        let parsed = parse_local_volume(spec);
        let source = absolutize(&expand_tilde(&parsed.source), &self.cwd);
        let destination = match parsed.destination.as_deref() {
            Some(d) => normalize_destination(d),
            None => {
                let name = basename(&source.to_string_lossy()).unwrap_or_else(|| "mnt".into());
                format!("{CONTAINER_HOME}/{name}")
            }
        };
        ResolvedMount {
            spec: spec.to_string(),
            source,
            destination,
            access,
        }
    }

    /// Resolve every spec in order. A spec that fails is reported and skipped; the returned
    /// session holds the rest.
    pub fn resolve_all(&self, specs: &[(String, Access)]) -> MountSession<'a> {
        let mut session = MountSession {
            provider: self.provider,
            mounts: Vec::new(),
            owned: Vec::new(),
            failures: Vec::new(),
        };
        for (spec, access) in specs {
            match self.classify(spec) {
                SpecKind::Local => session.mounts.push(self.resolve_local(spec, *access)),
                SpecKind::Remote => match self.resolve_remote(spec, *access, &mut session) {
                    Ok(m) => session.mounts.push(m),
                    Err(e) => {
                        crate::log_error_stderr(self.use_err, &format!("{e}; skipping"));
                        session.failures.push(e);
                    }
                },
            }
        }
        session
    }

    fn resolve_remote(
        &self,
        spec: &str,
        access: Access,
        session: &mut MountSession<'a>,
    ) -> Result<ResolvedMount, BoxError> {
        let fail = |detail: String| BoxError::Mount {
            spec: spec.to_string(),
            detail,
        };
        let remote: RemoteVolumeSpec = parse_remote_volume(spec)
            .ok_or_else(|| fail("expected [user@]host:path[:dest]".to_string()))?;
        let user = remote.user.as_deref();
        let point =
            self.provider
                .mount_point(user, &remote.host, &remote.remote_path, access.is_read_only());

        let source = if self.dry_run {
            point
        } else if self.provider.is_mounted(&point) {
            crate::log_info_stderr(
                self.use_err,
                &format!("Reusing existing mount of {} at {}", remote.target(), point.display()),
            );
            point
        } else {
            let mounted = self
                .provider
                .mount(user, &remote.host, &remote.remote_path, access.is_read_only())
                .map_err(fail)?;
            session.owned.push(mounted.clone());
            mounted
        };
        Ok(ResolvedMount {
            spec: spec.to_string(),
            source,
            destination: remote.container_destination(),
            access,
        })
    }
}

/// Resolved mounts for one session. Remote mounts created while resolving are unmounted
/// when the session is dropped, newest first.
pub struct MountSession<'a> {
    provider: &'a dyn MountProvider,
    mounts: Vec<ResolvedMount>,
    owned: Vec<PathBuf>,
    failures: Vec<BoxError>,
}

impl MountSession<'_> {
    pub fn mounts(&self) -> &[ResolvedMount] {
        &self.mounts
    }

    pub fn failures(&self) -> &[BoxError] {
        &self.failures
    }

    /// Remote mount points this session will unmount.
    pub fn owned(&self) -> &[PathBuf] {
        &self.owned
    }

    /// Destination of the first mount, used as the working directory.
    pub fn workdir(&self) -> Option<&str> {
        self.mounts.first().map(|m| m.destination.as_str())
    }
}

impl Drop for MountSession<'_> {
    fn drop(&mut self) {
        for path in self.owned.drain(..).rev() {
            if !self.provider.unmount(&path) {
                crate::warn_print(&format!(
                    "failed to unmount {}; run `box-sshfs --unmount {}`",
                    path.display(),
                    path.display()
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct FakeProvider {
        mounted: RefCell<Vec<PathBuf>>,
        unmounted: RefCell<Vec<PathBuf>>,
        modes: RefCell<Vec<(PathBuf, bool)>>,
        refuse_host: Option<&'static str>,
    }

    impl MountProvider for FakeProvider {
        fn mount_point(
            &self,
            user: Option<&str>,
            host: &str,
            remote_path: &str,
            read_only: bool,
        ) -> PathBuf {
            PathBuf::from(format!(
                "/mnt/box/{}@{}-{}{}",
                user.unwrap_or("nouser"),
                host,
                remote_path.replace('/', "_"),
                if read_only { "-ro" } else { "" }
            ))
        }
        fn is_mounted(&self, path: &Path) -> bool {
            self.mounted.borrow().iter().any(|p| p == path)
        }
        fn mount(
            &self,
            user: Option<&str>,
            host: &str,
            remote_path: &str,
            read_only: bool,
        ) -> Result<PathBuf, String> {
            if self.refuse_host == Some(host) {
                return Err("connection refused".into());
            }
            let p = self.mount_point(user, host, remote_path, read_only);
            self.mounted.borrow_mut().push(p.clone());
            self.modes.borrow_mut().push((p.clone(), read_only));
            Ok(p)
        }
        fn unmount(&self, path: &Path) -> bool {
            self.unmounted.borrow_mut().push(path.to_path_buf());
            true
        }
    }

    fn strs(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_local_defaults_and_overrides() {
        let p = FakeProvider::default();
        let r = MountResolver::new(&p, PathBuf::from("/nonexistent-cwd"));
        let m = r.resolve_local("./code", Access::ReadWrite);
        assert_eq!(m.source, PathBuf::from("/nonexistent-cwd/code"));
        assert_eq!(m.destination, "/root/code");
        assert_eq!(m.volume_arg(), "/nonexistent-cwd/code:/root/code:rw");

        let m = r.resolve_local("/srv/data:data", Access::ReadOnly);
        assert_eq!(m.destination, "/root/data");
        assert_eq!(m.volume_arg(), "/srv/data:/root/data:ro");
    }

    #[test]
    fn test_tilde_expands_to_home() {
        let Some(home) = home::home_dir() else { return };
        let p = FakeProvider::default();
        let r = MountResolver::new(&p, PathBuf::from("/"));
        let m = r.resolve_local("~/box-nonexistent-dir", Access::ReadOnly);
        assert!(m.source.starts_with(&home), "{:?}", m.source);
        assert_eq!(m.destination, "/root/box-nonexistent-dir");
    }

    #[test]
    fn test_read_only_before_read_write_and_workdir() {
        let p = FakeProvider::default();
        let r = MountResolver::new(&p, PathBuf::from("/w"));
        let specs = ordered_specs(&strs(&["/a/ro1"]), &strs(&["/a/rw1", "/a/rw2"]));
        let s = r.resolve_all(&specs);
        let dests: Vec<&str> = s.mounts().iter().map(|m| m.destination.as_str()).collect();
        assert_eq!(dests, vec!["/root/ro1", "/root/rw1", "/root/rw2"]);
        assert_eq!(s.workdir(), Some("/root/ro1"));
        assert!(s.owned().is_empty());
    }

    #[test]
    fn test_classification_prefers_existing_local_dir() {
        let td = tempfile::tempdir().unwrap();
        std::fs::create_dir(td.path().join("data")).unwrap();
        let p = FakeProvider::default();
        let r = MountResolver::new(&p, td.path().to_path_buf());
        assert_eq!(r.classify("data:/mnt"), SpecKind::Local);
        assert_eq!(r.classify("server:/srv"), SpecKind::Remote);
        assert_eq!(r.classify("me@data:/srv"), SpecKind::Remote);
        assert_eq!(r.classify("/abs/path"), SpecKind::Local);
    }

    #[test]
    fn test_remote_mounts_are_unmounted_on_drop() {
        let p = FakeProvider::default();
        {
            let r = MountResolver::new(&p, PathBuf::from("/w"));
            let specs = ordered_specs(&strs(&["alice@h1:/srv/www"]), &strs(&["h2:~/proj:code"]));
            let s = r.resolve_all(&specs);
            assert_eq!(s.mounts().len(), 2);
            assert_eq!(s.mounts()[0].destination, "/root/www");
            assert_eq!(s.mounts()[1].destination, "/root/code");
            assert_eq!(
                s.mounts()[0].volume_arg(),
                "/mnt/box/alice@h1-_srv_www-ro:/root/www:ro"
            );
            assert_eq!(s.owned().len(), 2);
            assert!(p.unmounted.borrow().is_empty());
        }
        let unmounted = p.unmounted.borrow();
        assert_eq!(
            *unmounted,
            vec![
                PathBuf::from("/mnt/box/nouser@h2-~_proj"),
                PathBuf::from("/mnt/box/alice@h1-_srv_www-ro"),
            ]
        );
    }

    #[test]
    fn test_failed_remote_is_skipped_and_reported() {
        let p = FakeProvider {
            refuse_host: Some("down"),
            ..Default::default()
        };
        let r = MountResolver::new(&p, PathBuf::from("/w"));
        let specs = ordered_specs(&[], &strs(&["down:/x", "/local/keep"]));
        let s = r.resolve_all(&specs);
        assert_eq!(s.mounts().len(), 1);
        assert_eq!(s.workdir(), Some("/root/keep"));
        assert_eq!(s.failures().len(), 1);
        assert!(s.failures()[0].to_string().contains("down:/x"));
    }

    #[test]
    fn test_existing_mount_is_reused_not_owned() {
        let p = FakeProvider::default();
        p.mounted
            .borrow_mut()
            .push(PathBuf::from("/mnt/box/nouser@h-_data-ro"));
        {
            let r = MountResolver::new(&p, PathBuf::from("/w"));
            let s = r.resolve_all(&ordered_specs(&strs(&["h:/data"]), &[]));
            assert_eq!(s.mounts().len(), 1);
            assert!(s.owned().is_empty());
        }
        assert!(p.unmounted.borrow().is_empty());
    }

    #[test]
    fn test_dry_run_mounts_nothing() {
        let p = FakeProvider::default();
        let r = MountResolver::new(&p, PathBuf::from("/w")).dry_run(true);
        let s = r.resolve_all(&ordered_specs(&[], &strs(&["h:/data"])));
        assert_eq!(s.mounts()[0].source, PathBuf::from("/mnt/box/nouser@h-_data"));
        assert!(p.mounted.borrow().is_empty());
        assert!(s.owned().is_empty());
    }

    #[test]
    fn test_same_target_read_only_and_read_write_mount_separately() {
        let p = FakeProvider::default();
        let r = MountResolver::new(&p, PathBuf::from("/w"));
        let specs = ordered_specs(&strs(&["srv1:/data:a"]), &strs(&["srv1:/data:b"]));
        let s = r.resolve_all(&specs);
        let volumes: Vec<String> = s.mounts().iter().map(ResolvedMount::volume_arg).collect();
        assert_eq!(
            volumes,
            vec![
                "/mnt/box/nouser@srv1-_data-ro:/root/a:ro",
                "/mnt/box/nouser@srv1-_data:/root/b:rw",
            ]
        );
        assert_eq!(
            *p.modes.borrow(),
            vec![
                (PathBuf::from("/mnt/box/nouser@srv1-_data-ro"), true),
                (PathBuf::from("/mnt/box/nouser@srv1-_data"), false),
            ]
        );
        assert_eq!(s.owned().len(), 2);
    }
}
