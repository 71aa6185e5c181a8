//! Network restriction modes and proxy environment for session containers.

use serde::{Deserialize, Serialize};

use crate::docker::runtime::ContainerRuntime;

/// Runtime network joined by sessions in internal mode.
pub const INTERNAL_NETWORK: &str = "box-internal";

/// Proxy variables set in the container, in this order.
const PROXY_VARS: [&str; 4] = ["HTTP_PROXY", "HTTPS_PROXY", "http_proxy", "https_proxy"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMode {
    #[default]
    #[serde(alias = "full")]
    Unrestricted,
    Internal,
    #[serde(rename = "none")]
    NoNetwork,
}

impl NetworkMode {
    /// Map the legacy boolean pair; no-network wins when both are set.
    pub fn from_flags(no_network: bool, internal: bool) -> Self {
        if no_network {
            NetworkMode::NoNetwork
        } else if internal {
            NetworkMode::Internal
        } else {
            NetworkMode::Unrestricted
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkMode::Unrestricted => "unrestricted",
            NetworkMode::Internal => "internal",
            NetworkMode::NoNetwork => "none",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkPolicy {
    pub mode: NetworkMode,
    pub proxy: Option<String>,
}

impl NetworkPolicy {
    pub fn new(mode: NetworkMode, proxy: Option<String>) -> Self {
        Self { mode, proxy }
    }

    /// `run` flags for the mode; unrestricted adds nothing.
    pub fn network_args(&self) -> Vec<String> {
        match self.mode {
            NetworkMode::Unrestricted => Vec::new(),
            NetworkMode::Internal => vec!["--network".to_string(), INTERNAL_NETWORK.to_string()],
            NetworkMode::NoNetwork => vec!["--network".to_string(), "none".to_string()],
        }
    }

    /// Proxy variables, set in every mode when a proxy is configured.
    pub fn env_vars(&self) -> Vec<(String, String)> {
        match self.proxy.as_deref() {
            Some(p) => PROXY_VARS
                .iter()
                .map(|k| (k.to_string(), p.to_string()))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Create the internal network when internal mode needs it. Failure is only a warning;
    /// the run itself will then report the missing network.
    pub fn prepare(&self, runtime: &dyn ContainerRuntime) {
        if self.mode != NetworkMode::Internal || runtime.network_exists(INTERNAL_NETWORK) {
            return;
        }
        tracing::debug!(network = INTERNAL_NETWORK, "creating internal network");
        if let Err(e) = runtime.create_internal_network(INTERNAL_NETWORK) {
            crate::warn_print(&format!("failed to create internal network: {e:#}"));
        }
    }
}

/// Accept `scheme://host[:port]` proxies (http, https, socks4/5); return the trimmed URL.
pub fn validate_proxy(raw: &str) -> Result<String, String> {
    let raw = raw.trim();
    let parsed =
        url::Url::parse(raw).map_err(|e| format!("invalid proxy URL '{raw}': {e}"))?;
    match parsed.scheme() {
        "http" | "https" | "socks4" | "socks5" | "socks5h" => {}
        other => {
            return Err(format!(
                "invalid proxy URL '{raw}': unsupported scheme '{other}'"
            ))
        }
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(format!("invalid proxy URL '{raw}': missing host"));
    }
    Ok(raw.to_string())
}
