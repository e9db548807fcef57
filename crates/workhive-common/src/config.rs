//! Master-side tunables. Concurrency model and respawn pacing are left to
//! the host; this crate picks sane defaults and lets the host override
//! them — a plain struct the host constructs once at startup, optionally
//! from the environment.

use std::path::PathBuf;
use std::time::Duration;

const SOCKET_DIR_ENV_VAR: &str = "WORKHIVE_SOCKET_DIR";
const RESPAWN_BACKOFF_MS_ENV_VAR: &str = "WORKHIVE_RESPAWN_BACKOFF_MS";
const MAX_LISTENERS_BASELINE_ENV_VAR: &str = "WORKHIVE_MAX_LISTENERS_BASELINE";

/// Configuration the master side needs before it can spawn its first
/// worker: where to put IPC sockets, how long to wait before respawning a
/// crashed keep-alive worker, and the starting listener-count warning
/// threshold (mirrors Node's `EventEmitter.defaultMaxListeners`).
#[derive(Debug, Clone)]
pub struct HiveConfig {
    pub socket_dir: PathBuf,
    pub respawn_backoff: Duration,
    pub max_listeners_baseline: usize,
}

impl HiveConfig {
    pub fn new(socket_dir: PathBuf) -> Self {
        Self {
            socket_dir,
            respawn_backoff: Duration::from_millis(200),
            max_listeners_baseline: 10,
        }
    }

    pub fn with_respawn_backoff(mut self, backoff: Duration) -> Self {
        self.respawn_backoff = backoff;
        self
    }

    pub fn with_max_listeners_baseline(mut self, n: usize) -> Self {
        self.max_listeners_baseline = n;
        self
    }

    /// Build a config from the process environment, falling back to
    /// `Default::default()` for anything unset or unparsable, so the host
    /// doesn't have to wire every field by hand just to override one.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(dir) = std::env::var(SOCKET_DIR_ENV_VAR) {
            cfg.socket_dir = PathBuf::from(dir);
        }
        if let Some(ms) = std::env::var(RESPAWN_BACKOFF_MS_ENV_VAR)
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            cfg.respawn_backoff = Duration::from_millis(ms);
        }
        if let Some(n) = std::env::var(MAX_LISTENERS_BASELINE_ENV_VAR)
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
        {
            cfg.max_listeners_baseline = n;
        }
        cfg
    }
}

impl Default for HiveConfig {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_values() {
        let cfg = HiveConfig::default();
        assert_eq!(cfg.max_listeners_baseline, 10);
        assert!(cfg.respawn_backoff.as_millis() > 0);
    }

    #[test]
    fn builder_methods_override_defaults() {
        let cfg = HiveConfig::new(PathBuf::from("/tmp/workhive"))
            .with_respawn_backoff(Duration::from_secs(1))
            .with_max_listeners_baseline(50);
        assert_eq!(cfg.socket_dir, PathBuf::from("/tmp/workhive"));
        assert_eq!(cfg.respawn_backoff, Duration::from_secs(1));
        assert_eq!(cfg.max_listeners_baseline, 50);
    }

    #[test]
    fn from_env_reads_overrides_and_falls_back_to_defaults() {
        // Env vars are process-global; run this test's assertions against
        // values that are restored immediately so other tests in this
        // module aren't affected.
        std::env::set_var(SOCKET_DIR_ENV_VAR, "/tmp/workhive-from-env");
        std::env::set_var(RESPAWN_BACKOFF_MS_ENV_VAR, "500");
        std::env::remove_var(MAX_LISTENERS_BASELINE_ENV_VAR);

        let cfg = HiveConfig::from_env();
        assert_eq!(cfg.socket_dir, PathBuf::from("/tmp/workhive-from-env"));
        assert_eq!(cfg.respawn_backoff, Duration::from_millis(500));
        assert_eq!(cfg.max_listeners_baseline, 10);

        std::env::remove_var(SOCKET_DIR_ENV_VAR);
        std::env::remove_var(RESPAWN_BACKOFF_MS_ENV_VAR);
    }

    #[test]
    fn from_env_ignores_unparsable_numeric_overrides() {
        std::env::remove_var(SOCKET_DIR_ENV_VAR);
        std::env::set_var(RESPAWN_BACKOFF_MS_ENV_VAR, "not-a-number");

        let cfg = HiveConfig::from_env();
        assert_eq!(cfg.respawn_backoff, Duration::from_millis(200));

        std::env::remove_var(RESPAWN_BACKOFF_MS_ENV_VAR);
    }
}
