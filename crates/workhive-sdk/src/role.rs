//! Process-role probe.
//!
//! `Role` is resolved once per process and constant for its lifetime. The
//! decision of *how* a process comes to be a worker — who sets the
//! environment, who forks whom — belongs to the host program entry point,
//! which is out of scope for this crate. What's in scope is a single,
//! cheap, deterministic probe that both the master-side and worker-side
//! code can condition on.
//!
//! The convention is the same one Node's `cluster` module uses: the
//! spawning side sets a sentinel environment variable naming the worker
//! before exec'ing the child; its absence means "this is the master".

use std::env;

/// The env var a `ChildSpawner` sets on worker processes before exec. Its
/// value is the worker's `WorkerId`.
pub const WORKER_ID_ENV_VAR: &str = "WORKHIVE_WORKER_ID";

/// Whether the current process is the keep-alive flag (`"1"`/`"0"`), set
/// alongside `WORKER_ID_ENV_VAR` so a respawned worker can report its own
/// keep-alive flag without round-tripping to the master first.
pub const KEEP_ALIVE_ENV_VAR: &str = "WORKHIVE_KEEP_ALIVE";

/// The role a process plays in the hive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Master,
    Worker,
}

impl Role {
    /// Resolve the role of the current process from the environment.
    pub fn current() -> Self {
        if env::var_os(WORKER_ID_ENV_VAR).is_some() {
            Role::Worker
        } else {
            Role::Master
        }
    }

    pub fn is_master(self) -> bool {
        matches!(self, Role::Master)
    }

    pub fn is_worker(self) -> bool {
        matches!(self, Role::Worker)
    }
}

/// Read this worker's own ID from the environment. `None` on the master.
pub fn self_worker_id() -> Option<String> {
    env::var(WORKER_ID_ENV_VAR).ok()
}

/// Read this worker's own keep-alive flag from the environment.
pub fn self_keep_alive() -> bool {
    env::var(KEEP_ALIVE_ENV_VAR)
        .map(|v| v == "1")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Env vars are process-global; serialize the tests that touch them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn master_when_env_var_absent() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::remove_var(WORKER_ID_ENV_VAR);
        assert_eq!(Role::current(), Role::Master);
        assert!(Role::current().is_master());
    }

    #[test]
    fn worker_when_env_var_present() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var(WORKER_ID_ENV_VAR, "w1");
        env::set_var(KEEP_ALIVE_ENV_VAR, "1");
        assert_eq!(Role::current(), Role::Worker);
        assert_eq!(self_worker_id().as_deref(), Some("w1"));
        assert!(self_keep_alive());
        env::remove_var(WORKER_ID_ENV_VAR);
        env::remove_var(KEEP_ALIVE_ENV_VAR);
    }
}
