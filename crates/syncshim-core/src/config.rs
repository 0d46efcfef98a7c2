//! Runtime configuration for shim-created threads.
//!
//! Read once from the environment and cached for the life of the process:
//! - `SYNCSHIM_THREAD_STACK`: stack size in bytes. Accepts decimal, `0x` hex,
//!   and `k`/`m` suffixes (`512k`, `2m`). Invalid or tiny values fall back to
//!   the platform default.
//! - `SYNCSHIM_THREAD_NAME`: thread name prefix (default `syncshim`). Threads
//!   are named `<prefix>-<id>`.

use std::sync::OnceLock;

pub const ENV_THREAD_STACK: &str = "SYNCSHIM_THREAD_STACK";
pub const ENV_THREAD_NAME: &str = "SYNCSHIM_THREAD_NAME";

pub const DEFAULT_THREAD_NAME_PREFIX: &str = "syncshim";

/// Smallest stack size honored; anything below is treated as unset.
pub const MIN_THREAD_STACK: usize = 16 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// `None` keeps the platform default.
    pub thread_stack_size: Option<usize>,
    pub thread_name_prefix: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            thread_stack_size: None,
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Resolve from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve from an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let thread_stack_size = lookup(ENV_THREAD_STACK)
            .as_deref()
            .and_then(parse_size)
            .filter(|&size| size >= MIN_THREAD_STACK);
        let thread_name_prefix = lookup(ENV_THREAD_NAME)
            .map(|raw| raw.trim().to_string())
            .filter(|prefix| !prefix.is_empty() && !prefix.contains('\0'))
            .unwrap_or_else(|| DEFAULT_THREAD_NAME_PREFIX.to_string());
        Self {
            thread_stack_size,
            thread_name_prefix,
        }
    }

    /// Name given to the shim thread with identifier `id`.
    #[must_use]
    pub fn thread_name(&self, id: u64) -> String {
        format!("{}-{id}", self.thread_name_prefix)
    }
}

/// Parse a byte size: `65536`, `0x10000`, `64k`, `2M`.
#[must_use]
pub fn parse_size(raw: &str) -> Option<usize> {
    let s = raw.trim().to_ascii_lowercase();
    if let Some(hex) = s.strip_prefix("0x") {
        return usize::from_str_radix(hex, 16).ok();
    }
    let (digits, scale) = if let Some(d) = s.strip_suffix('k') {
        (d, 1024)
    } else if let Some(d) = s.strip_suffix('m') {
        (d, 1024 * 1024)
    } else {
        (s.as_str(), 1)
    };
    digits.trim().parse::<usize>().ok()?.checked_mul(scale)
}

static CONFIG: OnceLock<RuntimeConfig> = OnceLock::new();

/// Process-wide configuration (env read on first call).
pub fn runtime_config() -> &'static RuntimeConfig {
    CONFIG.get_or_init(RuntimeConfig::from_env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn parse_size_forms() {
        assert_eq!(parse_size("65536"), Some(65536));
        assert_eq!(parse_size("0x10000"), Some(65536));
        assert_eq!(parse_size("64k"), Some(65536));
        assert_eq!(parse_size("2M"), Some(2 * 1024 * 1024));
        assert_eq!(parse_size(" 8k "), Some(8192));
        assert_eq!(parse_size("lots"), None);
        assert_eq!(parse_size("-1"), None);
        assert_eq!(parse_size(""), None);
    }

    #[test]
    fn empty_env_gives_defaults() {
        let cfg = RuntimeConfig::from_lookup(|_| None);
        assert_eq!(cfg, RuntimeConfig::default());
        assert_eq!(cfg.thread_name(7), "syncshim-7");
    }

    #[test]
    fn env_values_are_applied() {
        let cfg = RuntimeConfig::from_lookup(lookup_from(&[
            (ENV_THREAD_STACK, "1m"),
            (ENV_THREAD_NAME, "worker"),
        ]));
        assert_eq!(cfg.thread_stack_size, Some(1024 * 1024));
        assert_eq!(cfg.thread_name(3), "worker-3");
    }

    #[test]
    fn tiny_or_bad_stack_is_ignored() {
        let tiny = RuntimeConfig::from_lookup(lookup_from(&[(ENV_THREAD_STACK, "4k")]));
        assert_eq!(tiny.thread_stack_size, None);
        let bad = RuntimeConfig::from_lookup(lookup_from(&[(ENV_THREAD_STACK, "big")]));
        assert_eq!(bad.thread_stack_size, None);
    }

    #[test]
    fn blank_name_prefix_falls_back() {
        let cfg = RuntimeConfig::from_lookup(lookup_from(&[(ENV_THREAD_NAME, "   ")]));
        assert_eq!(cfg.thread_name_prefix, DEFAULT_THREAD_NAME_PREFIX);
    }

    #[test]
    fn runtime_config_is_cached() {
        let a: *const RuntimeConfig = runtime_config();
        let b: *const RuntimeConfig = runtime_config();
        assert_eq!(a, b);
    }
}
