#![allow(clippy::module_name_repetitions)]
//! Parsing of port and volume specification strings.
//!
//! Stateless: nothing here touches the filesystem except the caller-supplied checks.
//! Forms:
//! - port: `PORT` or `HOST:CONTAINER` (the host part may carry an address)
//! - local volume: `SRC` or `SRC:DEST`
//! - remote volume: `[user@]host:path` or `[user@]host:path:DEST`

use crate::util::{basename, is_windows_drive_path};

/// Home directory inside the container; default parent for mount destinations.
pub const CONTAINER_HOME: &str = "/root";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSpec {
    pub host: String,
    pub container: String,
}

impl PortSpec {
    pub fn parse(spec: &str) -> Result<Self, String> {
        let s = spec.trim();
        if s.is_empty() {
            return Err("empty port specification".to_string());
        }
        let (host, container) = match s.split_once(':') {
            Some((h, c)) => (h.to_string(), c.to_string()),
            None => (s.to_string(), s.to_string()),
        };
        if host.is_empty() || container.is_empty() {
            return Err(format!(
                "invalid port specification '{spec}': expected PORT or HOST:CONTAINER"
            ));
        }
        Ok(PortSpec { host, container })
    }

    /// Value for the runtime's `-p` flag.
    pub fn to_arg(&self) -> String {
        format!("{}:{}", self.host, self.container)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Access {
    ReadOnly,
    ReadWrite,
}

impl Access {
    pub fn as_str(&self) -> &'static str {
        match self {
            Access::ReadOnly => "ro",
            Access::ReadWrite => "rw",
        }
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self, Access::ReadOnly)
    }
}

/// A local volume spec before path expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVolumeSpec {
    pub source: String,
    pub destination: Option<String>,
}

/// A remote (SSH) volume spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteVolumeSpec {
    pub user: Option<String>,
    pub host: String,
    pub remote_path: String,
    pub destination: Option<String>,
}

impl RemoteVolumeSpec {
    /// `user@host:path` or `host:path`, without the destination override.
    pub fn target(&self) -> String {
        match &self.user {
            Some(u) => format!("{}@{}:{}", u, self.host, self.remote_path),
            None => format!("{}:{}", self.host, self.remote_path),
        }
    }

    pub fn container_destination(&self) -> String {
        match self.destination.as_deref() {
            Some(d) => normalize_destination(d),
            None => {
                let name = basename(&self.remote_path).unwrap_or_else(|| self.host.clone());
                format!("{CONTAINER_HOME}/{name}")
            }
        }
    }
}

/// Split a local spec into source and optional destination (first `:` wins).
pub fn parse_local_volume(spec: &str) -> LocalVolumeSpec {
    if !is_windows_drive_path(spec) {
        if let Some((src, dest)) = spec.split_once(':') {
            if !src.is_empty() && !dest.is_empty() {
                return LocalVolumeSpec {
                    source: src.to_string(),
                    destination: Some(dest.to_string()),
                };
            }
        }
    }
    LocalVolumeSpec {
        source: spec.to_string(),
        destination: None,
    }
}

/// Relative destinations are placed under the container home.
pub fn normalize_destination(dest: &str) -> String {
    if dest.starts_with('/') {
        dest.to_string()
    } else {
        format!("{CONTAINER_HOME}/{}", dest.trim_start_matches("./"))
    }
}

/// Split off an optional `user@` prefix and return `(user, host, rest_after_colon)`.
fn split_user_host(spec: &str) -> Option<(Option<&str>, &str, &str)> {
    let (head, rest) = spec.split_once(':')?;
    let (user, host) = match head.split_once('@') {
        Some((u, h)) => (Some(u), h),
        None => (None, head),
    };
    if user.is_some_and(|u| u.is_empty()) {
        return None;
    }
    if host.is_empty() || host.contains('/') || host.contains('@') {
        return None;
    }
    if rest.is_empty() {
        return None;
    }
    Some((user, host, rest))
}

/// Syntactic remote check: `[user@]host:path` that is not an absolute, home-relative,
/// dot-relative or Windows drive path.
pub fn looks_remote(spec: &str) -> bool {
    if spec.starts_with('/')
        || spec.starts_with('~')
        || spec.starts_with('.')
        || is_windows_drive_path(spec)
    {
        return false;
    }
    split_user_host(spec).is_some()
}

/// True when the spec names a user explicitly (`user@host:...`).
pub fn has_user_part(spec: &str) -> bool {
    spec.split_once(':')
        .map(|(head, _)| head.contains('@'))
        .unwrap_or(false)
}

/// Parse a remote spec; a second `:` introduces the container destination.
pub fn parse_remote_volume(spec: &str) -> Option<RemoteVolumeSpec> {
    if !looks_remote(spec) {
        return None;
    }
    let (user, host, rest) = split_user_host(spec)?;
    let (remote_path, destination) = match rest.rsplit_once(':') {
        Some((p, d)) if !p.is_empty() && !d.is_empty() => (p.to_string(), Some(d.to_string())),
        Some(_) => return None,
        None => (rest.to_string(), None),
    };
    Some(RemoteVolumeSpec {
        user: user.map(str::to_string),
        host: host.to_string(),
        remote_path,
        destination,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_single_and_pair() {
        let p = PortSpec::parse("3000").unwrap();
        assert_eq!(p.to_arg(), "3000:3000");
        let p = PortSpec::parse("8080:80").unwrap();
        assert_eq!((p.host.as_str(), p.container.as_str()), ("8080", "80"));
        let p = PortSpec::parse("127.0.0.1:8080:80").unwrap();
        assert_eq!(p.to_arg(), "127.0.0.1:8080:80");
    }

    #[test]
    fn test_port_rejects_empty_parts() {
        assert!(PortSpec::parse("").is_err());
        assert!(PortSpec::parse(":80").is_err());
        assert!(PortSpec::parse("80:").is_err());
    }

    #[test]
    fn test_local_volume_split() {
        assert_eq!(
            parse_local_volume("~/data"),
            LocalVolumeSpec {
                source: "~/data".into(),
                destination: None
            }
        );
        let v = parse_local_volume("./src:app");
        assert_eq!(v.source, "./src");
        assert_eq!(v.destination.as_deref(), Some("app"));
        let v = parse_local_volume("/abs/data:/mnt/data");
        assert_eq!(v.destination.as_deref(), Some("/mnt/data"));
        let v = parse_local_volume("C:\\work");
        assert_eq!(v.destination, None);
    }

    #[test]
    fn test_normalize_destination() {
        assert_eq!(normalize_destination("/opt/x"), "/opt/x");
        assert_eq!(normalize_destination("app"), "/root/app");
        assert_eq!(normalize_destination("./app"), "/root/app");
    }

    #[test]
    fn test_looks_remote_classification() {
        assert!(looks_remote("user@server:/srv/www"));
        assert!(looks_remote("server:~/project"));
        assert!(!looks_remote("/home/me/code"));
        assert!(!looks_remote("~/code:dest"));
        assert!(!looks_remote("./code:dest"));
        assert!(!looks_remote("C:\\work"));
        assert!(!looks_remote("plain-dir"));
        assert!(!looks_remote("a/b:dest"));
        assert!(!looks_remote("host:"));
    }

    #[cfg(unix)]
    #[test]
    fn test_single_letter_host_is_remote() {
        assert!(looks_remote("h:/srv"));
        let r = parse_remote_volume("h:/srv/app").unwrap();
        assert_eq!((r.host.as_str(), r.remote_path.as_str()), ("h", "/srv/app"));
    }

    #[test]
    fn test_parse_remote_with_and_without_destination() {
        let r = parse_remote_volume("alice@build01:/srv/app").unwrap();
        assert_eq!(r.user.as_deref(), Some("alice"));
        assert_eq!(r.host, "build01");
        assert_eq!(r.remote_path, "/srv/app");
        assert_eq!(r.container_destination(), "/root/app");
        assert_eq!(r.target(), "alice@build01:/srv/app");

        let r = parse_remote_volume("build01:/srv/app:/workspace").unwrap();
        assert_eq!(r.user, None);
        assert_eq!(r.remote_path, "/srv/app");
        assert_eq!(r.container_destination(), "/workspace");

        let r = parse_remote_volume("build01:~/proj:code").unwrap();
        assert_eq!(r.container_destination(), "/root/code");
    }

    #[test]
    fn test_remote_destination_falls_back_to_host() {
        let r = parse_remote_volume("build01:~").unwrap();
        assert_eq!(r.container_destination(), "/root/build01");
    }

    #[test]
    fn test_has_user_part() {
        assert!(has_user_part("bob@h:/x"));
        assert!(!has_user_part("h:/x"));
    }
}
