//! Worker-side bootstrap: connects to the master over the IPC socket the
//! spawning collaborator set up (`workhive_common::channel::UnixSocketSpawner`),
//! then pumps inbound envelopes through the worker-side router and forwards
//! the results to the caller — `workhive::hive::Hive`'s worker branch, or
//! the `workhive-demo` binary directly in tests.

use crate::router::{self, WorkerInbound};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use workhive_common::channel::{connect_worker_socket, IPC_SOCKET_ENV_VAR};
use workhive_common::{ChildChannel, Diag, HiveError, Result};
use workhive_sdk::role;

/// A live connection back to the master, plus the channel of
/// already-classified inbound messages — the worker-side demultiplex has
/// already run by the time these arrive.
pub struct WorkerConnection {
    pub id: String,
    pub keep_alive: bool,
    pub channel: Arc<dyn ChildChannel>,
    pub inbound: mpsc::UnboundedReceiver<WorkerInbound>,
}

/// Reads `WORKHIVE_WORKER_ID`/`WORKHIVE_KEEP_ALIVE`/`WORKHIVE_IPC_SOCKET`
/// (set by `UnixSocketSpawner`) and connects to the master's socket.
/// Returns an error if this process isn't actually running as a worker.
/// The role probe is constant for the process lifetime, so a caller
/// invoking this from the master is a programming error, not a runtime
/// condition to recover from.
pub async fn connect() -> Result<WorkerConnection> {
    let id = role::self_worker_id().ok_or(HiveError::WorkerOnly("workhive_worker::connect"))?;
    let keep_alive = role::self_keep_alive();

    let socket_path: PathBuf = std::env::var_os(IPC_SOCKET_ENV_VAR)
        .ok_or_else(|| HiveError::Channel {
            worker_id: id.clone(),
            message: format!("{IPC_SOCKET_ENV_VAR} not set"),
        })?
        .into();

    let (channel, mut raw_inbound) = connect_worker_socket(&socket_path).await?;
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let diag = Diag::for_worker(&id);

    tokio::spawn(async move {
        while let Some(envelope) = raw_inbound.recv().await {
            if let Some(routed) = router::handle_inbound(envelope) {
                if inbound_tx.send(routed).is_err() {
                    return;
                }
            } else {
                diag.warn("dropped an envelope this process cannot legitimately receive");
            }
        }
    });

    Ok(WorkerConnection {
        id,
        keep_alive,
        channel,
        inbound: inbound_rx,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_without_worker_env_fails_fast() {
        // No WORKHIVE_WORKER_ID set in the test process — this must return
        // an error rather than hang waiting on a socket that doesn't exist.
        let result = connect().await;
        assert!(matches!(result, Err(HiveError::WorkerOnly(_))));
    }
}
