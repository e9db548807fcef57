//! Worker-side inbound demultiplex: every `{event, data}` message is
//! re-emitted on the local process event bus; the bare reboot control
//! message terminates the process with the reboot sentinel exit code.

use serde_json::Value;
use workhive_common::{Envelope, WorkerDescriptor, REBOOT_SENTINEL_EXIT_CODE};

/// What the worker-side runtime should do with one inbound envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerInbound {
    /// The initial bootstrap sent the moment the channel comes online:
    /// materializes the local self-worker handle.
    Online { id: String, keep_alive: bool },
    /// A user event to re-emit on the local process bus.
    User { event: String, data: Vec<Value> },
    /// Response to a `----get-workers----` request.
    GetWorkersResp { workers: Vec<WorkerDescriptor> },
}

/// Route one envelope arriving from the master. Returns `None` for
/// envelopes that never legitimately flow master → worker inbound handling
/// beyond a process exit (`Reboot`, handled here as a direct side effect)
/// or that are protocol violations on this side (`Transmit`/`Broadcast`/
/// `GetWorkersReq` only ever originate *from* a worker).
pub fn handle_inbound(envelope: Envelope) -> Option<WorkerInbound> {
    match envelope {
        Envelope::Online { id, keep_alive } => Some(WorkerInbound::Online { id, keep_alive }),
        Envelope::User { event, data, .. } => Some(WorkerInbound::User { event, data }),
        Envelope::GetWorkersResp { workers } => Some(WorkerInbound::GetWorkersResp { workers }),
        Envelope::Reboot => {
            std::process::exit(REBOOT_SENTINEL_EXIT_CODE);
        }
        Envelope::Transmit { .. } | Envelope::Broadcast { .. } | Envelope::GetWorkersReq { .. } => None,
    }
}
