#![allow(clippy::module_name_repetitions)]
//! Named image configurations persisted per user.
//!
//! File: `~/.box-cli/config.json` (directory overridable with `BOX_CLI_HOME`), shaped as
//! `{ "images": { <name>: NamedImageConfig }, "detection": { ... } }`.
//! Loading never fails: a missing or unparsable file yields an empty store. Every field
//! defaults when absent so older and newer files stay readable.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::images::detect::{DetectionOverrides, EnvKind};
use crate::network::NetworkMode;

pub const CONFIG_DIR_NAME: &str = ".box-cli";
pub const CONFIG_FILE_NAME: &str = "config.json";

/// One saved configuration. Fresh runs build the same struct from the command line, so
/// both paths share field list and defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredImage")]
pub struct NamedImageConfig {
    /// None means auto-detect from the command.
    pub environment: Option<EnvKind>,
    pub version: Option<String>,
    pub multiplex: bool,
    pub command: Vec<String>,
    pub ports: Vec<String>,
    pub read_only: Vec<String>,
    pub read_write: Vec<String>,
    pub network: NetworkMode,
    pub http_proxy: Option<String>,
    /// Shell command run once at image build time and committed into the named image.
    pub setup: Option<String>,
}

/// On-disk shape, tolerant of legacy keys and explicit nulls.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StoredImage {
    #[serde(deserialize_with = "lenient")]
    environment: Option<EnvKind>,
    #[serde(alias = "image_version")]
    version: Option<String>,
    #[serde(alias = "tmux", deserialize_with = "nullable")]
    multiplex: bool,
    #[serde(deserialize_with = "nullable")]
    command: Vec<String>,
    #[serde(alias = "port", deserialize_with = "nullable")]
    ports: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    read_only: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    read_write: Vec<String>,
    #[serde(deserialize_with = "lenient")]
    network: Option<NetworkMode>,
    http_proxy: Option<String>,
    setup: Option<String>,
    // legacy flags
    #[serde(deserialize_with = "nullable")]
    node: bool,
    #[serde(deserialize_with = "nullable")]
    py: bool,
    #[serde(deserialize_with = "nullable")]
    no_network: bool,
    #[serde(deserialize_with = "nullable")]
    internal_network: bool,
}

fn nullable<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

/// Values this version does not know (a newer environment or network mode) read as unset
/// instead of discarding the whole file.
fn lenient<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Some(raw) = Option::<serde_json::Value>::deserialize(d)? else {
        return Ok(None);
    };
    match T::deserialize(&raw) {
        Ok(v) => Ok(Some(v)),
        Err(e) => {
            tracing::debug!(value = %raw, error = %e, "ignoring unrecognized config value");
            Ok(None)
        }
    }
}

impl From<StoredImage> for NamedImageConfig {
    fn from(s: StoredImage) -> Self {
        let environment = s.environment.or(if s.node {
            Some(EnvKind::Node)
        } else if s.py {
            Some(EnvKind::Python)
        } else {
            None
        });
        let network = s
            .network
            .unwrap_or_else(|| NetworkMode::from_flags(s.no_network, s.internal_network));
        NamedImageConfig {
            environment,
            version: s.version.filter(|v| !v.trim().is_empty()),
            multiplex: s.multiplex,
            command: s.command,
            ports: s.ports,
            read_only: s.read_only,
            read_write: s.read_write,
            network,
            http_proxy: s.http_proxy.filter(|p| !p.trim().is_empty()),
            setup: s.setup.filter(|c| !c.trim().is_empty()),
        }
    }
}

/// Three-state invocation override: keep the saved value, replace it, or remove it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Override<T> {
    #[default]
    Inherit,
    Set(T),
    Clear,
}

impl<T> Override<T> {
    pub fn apply(self, saved: Option<T>) -> Option<T> {
        match self {
            Override::Inherit => saved,
            Override::Set(v) => Some(v),
            Override::Clear => None,
        }
    }

    pub fn into_option(self) -> Option<T> {
        self.apply(None)
    }
}

/// What the current invocation adds on top of a saved configuration.
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub multiplex: bool,
    pub command: Vec<String>,
    pub ports: Vec<String>,
    pub read_only: Vec<String>,
    pub read_write: Vec<String>,
    /// None inherits the saved mode.
    pub network: Option<NetworkMode>,
    pub http_proxy: Override<String>,
}

impl NamedImageConfig {
    /// Effective configuration for a run of this saved image.
    ///
    /// Saved mounts and ports come first, in saved order, followed by the invocation's; the
    /// mount order decides which destination becomes the working directory.
    pub fn merged_with(&self, inv: RunOverrides) -> NamedImageConfig {
        let mut ports = self.ports.clone();
        ports.extend(inv.ports);
        let mut read_only = self.read_only.clone();
        read_only.extend(inv.read_only);
        let mut read_write = self.read_write.clone();
        read_write.extend(inv.read_write);

        NamedImageConfig {
            environment: self.environment,
            version: self.version.clone(),
            multiplex: self.multiplex || inv.multiplex,
            command: if inv.command.is_empty() {
                self.command.clone()
            } else {
                inv.command
            },
            ports,
            read_only,
            read_write,
            network: inv.network.unwrap_or(self.network),
            http_proxy: inv.http_proxy.apply(self.http_proxy.clone()),
            setup: self.setup.clone(),
        }
    }

    /// Compact description for `--list`.
    pub fn summary_line(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        parts.push(match (self.environment, self.version.as_deref()) {
            (Some(k), Some(v)) => format!("{}:{}", k.as_str(), v),
            (Some(k), None) => k.as_str().to_string(),
            (None, _) => "auto".to_string(),
        });
        if self.multiplex {
            parts.push("tmux".to_string());
        }
        if !self.ports.is_empty() {
            parts.push(format!("ports {}", self.ports.join(" ")));
        }
        if !self.read_only.is_empty() {
            parts.push(format!("ro {}", self.read_only.join(" ")));
        }
        if !self.read_write.is_empty() {
            parts.push(format!("rw {}", self.read_write.join(" ")));
        }
        if self.network != NetworkMode::Unrestricted {
            parts.push(format!("network {}", self.network.as_str()));
        }
        if let Some(p) = &self.http_proxy {
            parts.push(format!("proxy {p}"));
        }
        if self.setup.is_some() {
            parts.push("setup".to_string());
        }
        if !self.command.is_empty() {
            parts.push(format!("cmd: {}", self.command.join(" ")));
        }
        parts.join(", ")
    }

    /// Human-readable description, one `key: value` per line.
    pub fn summary_lines(&self) -> Vec<String> {
        fn list(v: &[String]) -> String {
            if v.is_empty() {
                "-".to_string()
            } else {
                v.join(", ")
            }
        }
        let env = match (self.environment, self.version.as_deref()) {
            (Some(k), Some(v)) => format!("{} {}", k.as_str(), v),
            (Some(k), None) => k.as_str().to_string(),
            (None, Some(v)) => format!("auto-detect (version {v})"),
            (None, None) => "auto-detect".to_string(),
        };
        vec![
            format!("environment: {env}"),
            format!("tmux:        {}", if self.multiplex { "yes" } else { "no" }),
            format!(
                "command:     {}",
                if self.command.is_empty() {
                    "(interactive shell)".to_string()
                } else {
                    self.command.join(" ")
                }
            ),
            format!("ports:       {}", list(&self.ports)),
            format!("read-only:   {}", list(&self.read_only)),
            format!("read-write:  {}", list(&self.read_write)),
            format!("network:     {}", self.network.as_str()),
            format!(
                "http proxy:  {}",
                self.http_proxy.as_deref().unwrap_or("-")
            ),
            format!("setup:       {}", self.setup.as_deref().unwrap_or("-")),
        ]
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub images: BTreeMap<String, NamedImageConfig>,
    #[serde(skip_serializing_if = "DetectionOverrides::is_empty")]
    pub detection: DetectionOverrides,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The in-memory store holds the new configuration; `persisted` tells whether the
    /// file write succeeded.
    Saved { persisted: bool },
    /// The user declined to overwrite; nothing changed.
    Cancelled,
}

/// Validate a user-chosen image name (it becomes part of a runtime image reference).
pub fn validate_image_name(name: &str) -> Result<(), String> {
    let ok_first = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    let ok_rest = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "._-".contains(c));
    if name.is_empty() || name.len() > 64 || !ok_first || !ok_rest {
        return Err(format!(
            "invalid image name '{name}': use lowercase letters, digits, '.', '_' or '-' (max 64 chars)"
        ));
    }
    Ok(())
}

#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    file: ConfigFile,
    /// The file existed but could not be parsed; it is set aside before the next write.
    corrupt: bool,
}

impl ConfigStore {
    /// Per-user configuration directory.
    pub fn default_dir() -> PathBuf {
        if let Ok(v) = env::var("BOX_CLI_HOME") {
            if !v.trim().is_empty() {
                return PathBuf::from(v.trim());
            }
        }
        home::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(CONFIG_DIR_NAME)
    }

    pub fn default_path() -> PathBuf {
        Self::default_dir().join(CONFIG_FILE_NAME)
    }

    pub fn load() -> Self {
        Self::load_from(Self::default_path())
    }

    pub fn load_from(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (file, corrupt) = match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<ConfigFile>(&text) {
                Ok(f) => (f, false),
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "ignoring unparsable config file");
                    (ConfigFile::default(), true)
                }
            },
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::debug!(path = %path.display(), error = %e, "ignoring unreadable config file");
                }
                (ConfigFile::default(), false)
            }
        };
        ConfigStore {
            path,
            file,
            corrupt,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, name: &str) -> Option<&NamedImageConfig> {
        self.file.images.get(name)
    }

    /// Saved names in stable (sorted) order.
    pub fn list(&self) -> Vec<String> {
        self.file.images.keys().cloned().collect()
    }

    /// Multi-line description of a saved configuration.
    pub fn summary(&self, name: &str) -> Option<String> {
        self.get(name).map(|c| c.summary_lines().join("\n"))
    }

    pub fn detection(&self) -> &DetectionOverrides {
        &self.file.detection
    }

    /// Store `config` under `name`.
    ///
    /// An existing entry is replaced only when `force` is set or `confirm` (called with the
    /// name and the existing configuration) answers yes. A failed file write is reported
    /// and does not roll back the in-memory update.
    pub fn save<F>(
        &mut self,
        name: &str,
        config: NamedImageConfig,
        force: bool,
        confirm: F,
    ) -> SaveOutcome
    where
        F: FnOnce(&str, &NamedImageConfig) -> bool,
    {
        if let Some(existing) = self.file.images.get(name) {
            if !force && !confirm(name, existing) {
                return SaveOutcome::Cancelled;
            }
        }
        self.file.images.insert(name.to_string(), config);
        match self.persist() {
            Ok(()) => SaveOutcome::Saved { persisted: true },
            Err(e) => {
                crate::warn_print(&format!(
                    "could not write configuration to {}: {}; the change applies to this run only",
                    self.path.display(),
                    e
                ));
                SaveOutcome::Saved { persisted: false }
            }
        }
    }

    /// Write the whole store atomically (temp file + rename in the same directory).
    pub fn persist(&mut self) -> io::Result<()> {
        let dir = self
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        fs::create_dir_all(&dir)?;
        if self.corrupt && self.path.exists() {
            let aside = self.path.with_extension("json.corrupt");
            if fs::rename(&self.path, &aside).is_ok() {
                crate::warn_print(&format!(
                    "unreadable configuration moved aside to {}",
                    aside.display()
                ));
            }
            self.corrupt = false;
        }
        let mut json = serde_json::to_string_pretty(&self.file)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        json.push('\n');
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}
