#![allow(clippy::module_name_repetitions)]
//! Runtime `-e` argument helpers and env forwarding policy.
//!
//! No host variable reaches the container implicitly; only proxy settings and the
//! explicit `BOX_ENV_*` opt-in are passed.

use std::env;

/// Keys that `BOX_ENV_*` may not override.
const RESERVED: &[&str] = &["HOME", "USER", "SHELL", "PATH", "PWD"];

pub fn push_env_kv(args: &mut Vec<String>, key: &str, val: &str) {
    args.push("-e".to_string());
    args.push(format!("{key}={val}"));
}

// Opt-in variables via BOX_ENV_<NAME>=<VALUE>; the container receives NAME=VALUE.
// Empty names or values, non [A-Za-z0-9_] names and reserved keys are skipped.
pub fn prefixed_env_from<I>(vars: I) -> Vec<(String, String)>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut pairs: Vec<(String, String)> = vars
        .into_iter()
        .filter_map(|(k, v)| {
            let stripped = k.strip_prefix("BOX_ENV_")?;
            if stripped.is_empty() || v.is_empty() {
                return None;
            }
            let valid = stripped
                .bytes()
                .all(|b| matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_'));
            if !valid || RESERVED.contains(&stripped) {
                return None;
            }
            Some((stripped.to_string(), v))
        })
        .collect();
    // stable order for previews and tests
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    pairs
}

pub fn prefixed_env() -> Vec<(String, String)> {
    prefixed_env_from(env::vars())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kv(k: &str, v: &str) -> (String, String) {
        (k.to_string(), v.to_string())
    }

    #[test]
    fn test_prefixed_env_filters_and_sorts() {
        let got = prefixed_env_from(vec![
            kv("BOX_ENV_ZED", "1"),
            kv("BOX_ENV_API_KEY", "secret"),
            kv("BOX_ENV_", "x"),
            kv("BOX_ENV_EMPTY", ""),
            kv("BOX_ENV_BAD-NAME", "x"),
            kv("BOX_ENV_PATH", "/evil"),
            kv("OTHER", "y"),
            kv("TERM", "xterm-256color"),
            kv("LANG", "C.UTF-8"),
        ]);
        assert_eq!(got, vec![kv("API_KEY", "secret"), kv("ZED", "1")]);
    }

    #[test]
    fn test_push_env_kv() {
        let mut args = Vec::new();
        push_env_kv(&mut args, "HTTP_PROXY", "http://p:1");
        assert_eq!(args, vec!["-e", "HTTP_PROXY=http://p:1"]);
    }
}
