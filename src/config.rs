//! Environment-variable configuration.
//!
//! Loading order mirrors the teacher's `config/loader.rs`: start from
//! defaults, then apply env var overrides. There is no on-disk config file
//! here — this service is configured entirely through the process
//! environment.

use std::collections::HashSet;
use std::env;

/// Resolved runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub redis_url: String,
    pub discovery_server_url: String,
    pub render_external_url: Option<String>,
    /// Interest tags excluded from `popularInterests`, upper-cased.
    pub popularity_denylist: HashSet<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            redis_url: "redis://localhost:6379".to_string(),
            discovery_server_url: String::new(),
            render_external_url: None,
            popularity_denylist: HashSet::new(),
        }
    }
}

impl Config {
    /// Load configuration from the process environment, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        apply_env_overrides(&mut config);
        config
    }
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(v) = env::var("PORT") {
        match v.parse::<u16>() {
            Ok(port) => config.port = port,
            Err(e) => log::warn!("ignoring invalid PORT={v:?}: {e}"),
        }
    }
    if let Ok(v) = env::var("REDIS_URL") {
        config.redis_url = v;
    }
    if let Ok(v) = env::var("DISCOVERY_SERVER_URL") {
        config.discovery_server_url = v;
    }
    if let Ok(v) = env::var("RENDER_EXTERNAL_URL") {
        config.render_external_url = Some(v);
    }
    if let Ok(v) = env::var("POPULARITY_DENYLIST") {
        config.popularity_denylist = v
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_env<F: FnOnce()>(vars: &[(&str, &str)], f: F) {
        // SAFETY: tests in this module run single-threaded (no #[tokio::test]
        // concurrency here) and each test uses env vars unique to itself.
        for (k, v) in vars {
            unsafe { env::set_var(k, v) };
        }
        f();
        for (k, _) in vars {
            unsafe { env::remove_var(k) };
        }
    }

    #[test]
    fn defaults_when_unset() {
        let config = Config::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.redis_url, "redis://localhost:6379");
        assert!(config.popularity_denylist.is_empty());
    }

    #[test]
    fn port_override() {
        with_env(&[("PORT", "8080")], || {
            let config = Config::from_env();
            assert_eq!(config.port, 8080);
        });
    }

    #[test]
    fn invalid_port_falls_back_to_default() {
        with_env(&[("PORT", "not-a-number")], || {
            let config = Config::from_env();
            assert_eq!(config.port, 3000);
        });
    }

    #[test]
    fn denylist_is_trimmed_and_uppercased() {
        with_env(&[("POPULARITY_DENYLIST", " music , Spam,,film ")], || {
            let config = Config::from_env();
            assert!(config.popularity_denylist.contains("MUSIC"));
            assert!(config.popularity_denylist.contains("SPAM"));
            assert!(config.popularity_denylist.contains("FILM"));
            assert_eq!(config.popularity_denylist.len(), 3);
        });
    }

    #[test]
    fn redis_url_override() {
        with_env(&[("REDIS_URL", "redis://example:6380")], || {
            let config = Config::from_env();
            assert_eq!(config.redis_url, "redis://example:6380");
        });
    }
}
