//! Worker registry: maps worker ID to handle state, child PID, and
//! channel; tracks the `reborn` flag that distinguishes a worker's first
//! birth from a keep-alive respawn.
//!
//! `DashMap` gives lock-free concurrent reads across the per-child pump
//! tasks, while all registry *mutation* is still only ever performed from
//! the lifecycle controller's per-worker task, so there's a single logical
//! owner of the registry even though reads can come from anywhere.

use dashmap::DashMap;
use std::sync::Arc;
use workhive_common::{ChildChannel, Envelope, HiveError, Result, WireWorkerState, WorkerDescriptor};

/// The lifecycle state of a registered worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Connecting,
    Online,
    Closed,
}

impl From<WorkerState> for WireWorkerState {
    fn from(s: WorkerState) -> Self {
        match s {
            WorkerState::Connecting => WireWorkerState::Connecting,
            WorkerState::Online => WireWorkerState::Online,
            WorkerState::Closed => WireWorkerState::Closed,
        }
    }
}

/// One entry per live (or connecting) worker ID.
#[derive(Clone)]
struct WorkerEntry {
    keep_alive: bool,
    state: WorkerState,
    pid: u32,
    reborn: bool,
    channel: Arc<dyn ChildChannel>,
}

/// Maps `WorkerID ↔ WorkerHandle ↔ child PID ↔ channel`.
#[derive(Default)]
pub struct WorkerRegistry {
    workers: DashMap<String, WorkerEntry>,
}

impl WorkerRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Insert on fork. `reborn` is `false` for an initial fork, `true` for
    /// a respawn.
    pub fn insert(&self, id: &str, keep_alive: bool, pid: u32, reborn: bool, channel: Arc<dyn ChildChannel>) {
        self.workers.insert(
            id.to_string(),
            WorkerEntry {
                keep_alive,
                state: WorkerState::Connecting,
                pid,
                reborn,
                channel,
            },
        );
    }

    /// Re-point an existing ID at a freshly forked child (respawn), keeping
    /// the registry entry alive under the same ID. At most one live child
    /// exists per ID at any time.
    pub fn respawn(&self, id: &str, pid: u32, channel: Arc<dyn ChildChannel>) {
        if let Some(mut entry) = self.workers.get_mut(id) {
            entry.state = WorkerState::Connecting;
            entry.pid = pid;
            entry.reborn = true;
            entry.channel = channel;
        }
    }

    pub fn set_online(&self, id: &str) {
        if let Some(mut entry) = self.workers.get_mut(id) {
            entry.state = WorkerState::Online;
        }
    }

    /// Whether this worker's most recent fork was a respawn rather than its
    /// first birth. Only the first birth of an ID should fire `online`.
    pub fn is_reborn(&self, id: &str) -> bool {
        self.workers.get(id).map(|e| e.reborn).unwrap_or(false)
    }

    pub fn keep_alive(&self, id: &str) -> bool {
        self.workers.get(id).map(|e| e.keep_alive).unwrap_or(false)
    }

    pub fn channel(&self, id: &str) -> Option<Arc<dyn ChildChannel>> {
        self.workers.get(id).map(|e| e.channel.clone())
    }

    pub fn state(&self, id: &str) -> Option<WorkerState> {
        self.workers.get(id).map(|e| e.state)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.workers.contains_key(id)
    }

    /// Remove on terminal exit. A `closed` worker keeps no channel entry at
    /// all — this crate doesn't retain `closed` entries, it drops them.
    pub fn remove(&self, id: &str) {
        self.workers.remove(id);
    }

    /// Worker descriptors for every `online` worker, for get-workers
    /// responses and the class-level `getWorkers`.
    pub fn online_descriptors(&self) -> Vec<WorkerDescriptor> {
        self.workers
            .iter()
            .filter(|e| e.state == WorkerState::Online)
            .map(|e| WorkerDescriptor {
                id: e.key().clone(),
                keep_alive: e.keep_alive,
                state: e.state.into(),
            })
            .collect()
    }

    pub fn online_ids(&self) -> Vec<String> {
        self.workers
            .iter()
            .filter(|e| e.state == WorkerState::Online)
            .map(|e| e.key().clone())
            .collect()
    }

    /// Every ID with a live `ChildChannel`, `connecting` or `online` alike
    /// — broadcast fans out unconditionally to every registered channel, it
    /// is not gated on `online`.
    pub fn all_ids(&self) -> Vec<String> {
        self.workers.iter().map(|e| e.key().clone()).collect()
    }

    /// Deliver `envelope` to a specific worker's channel, or a typed error
    /// if the ID is unknown.
    pub fn send_to(&self, id: &str, envelope: Envelope) -> Result<()> {
        match self.channel(id) {
            Some(channel) => channel.send(envelope),
            None => Err(HiveError::UnknownWorker(id.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use workhive_common::channel::MemoryChannel;

    #[test]
    fn insert_then_online_then_remove() {
        let reg = WorkerRegistry::new();
        let chan = MemoryChannel::new();
        reg.insert("a", true, 100, false, chan);
        assert_eq!(reg.state("a"), Some(WorkerState::Connecting));
        assert!(!reg.is_reborn("a"));

        reg.set_online("a");
        assert_eq!(reg.state("a"), Some(WorkerState::Online));
        assert_eq!(reg.online_ids(), vec!["a".to_string()]);

        reg.remove("a");
        assert!(!reg.contains("a"));
        assert!(reg.online_ids().is_empty());
    }

    #[test]
    fn respawn_preserves_id_and_marks_reborn() {
        let reg = WorkerRegistry::new();
        reg.insert("b", true, 1, false, MemoryChannel::new());
        reg.set_online("b");
        assert!(!reg.is_reborn("b"));

        reg.respawn("b", 2, MemoryChannel::new());
        assert_eq!(reg.state("b"), Some(WorkerState::Connecting));
        assert!(reg.is_reborn("b"));
        assert!(reg.contains("b"));
    }

    #[test]
    fn send_to_unknown_worker_is_typed_error() {
        let reg = WorkerRegistry::new();
        let err = reg
            .send_to("ghost", Envelope::Reboot)
            .expect_err("unknown worker must error");
        assert!(matches!(err, HiveError::UnknownWorker(id) if id == "ghost"));
    }

    #[test]
    fn online_descriptors_only_include_online_workers() {
        let reg = WorkerRegistry::new();
        reg.insert("a", false, 1, false, MemoryChannel::new());
        reg.insert("b", true, 2, false, MemoryChannel::new());
        reg.set_online("a");
        let descriptors = reg.online_descriptors();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].id, "a");
    }
}
