//! Error hierarchy. `emit`/`broadcast`/`to` never propagate an error —
//! delivery is best-effort and reserved-name rejection surfaces as `false`
//! — but misuse (calling a master-only operation from a worker, or
//! `getWorker` from the master) and spawn/channel failures are synchronous
//! and typed.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HiveError {
    /// A master-only operation (`Hive::emit`, `::to`, `::broadcast`,
    /// `::get_workers`) was called from a worker process.
    #[error("'{0}' is master-only and cannot be called from a worker process")]
    MasterOnly(&'static str),

    /// A worker-only operation (`Hive::get_worker`) was called from the
    /// master process.
    #[error("'{0}' is worker-only and cannot be called from the master process")]
    WorkerOnly(&'static str),

    /// No worker is registered under the given ID.
    #[error("no worker registered with id '{0}'")]
    UnknownWorker(String),

    /// A worker ID was already registered.
    #[error("worker id '{0}' is already registered")]
    DuplicateWorker(String),

    /// The child channel for a worker failed; surfaced via the handle's
    /// `error` event rather than retried.
    #[error("channel error for worker '{worker_id}': {message}")]
    Channel { worker_id: String, message: String },

    /// Spawning the child process failed outright (before any `online`).
    #[error("failed to spawn worker '{worker_id}': {message}")]
    SpawnFailed { worker_id: String, message: String },
}

pub type Result<T> = std::result::Result<T, HiveError>;
