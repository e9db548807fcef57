//! `Hive`: the process-wide supervisor object, the class-level facade. An
//! explicit object rather than a bare static singleton, dispatching to a
//! `MasterHive` or `WorkerHive` depending on `Role::current()`.

use crate::handle::WorkerHandle;
use crate::master::MasterHive;
use crate::worker::WorkerHive;
use serde_json::Value;
use std::sync::Arc;
use workhive_common::{ChildSpawner, HiveConfig, HiveError, Result, WorkerDescriptor};
use workhive_sdk::Role;

/// The process-wide supervisor. One instance per process; master and
/// worker processes each construct the half that matches their role.
pub enum Hive {
    Master(Arc<MasterHive>),
    Worker(Arc<WorkerHive>),
}

impl Hive {
    /// Start the master side: owns the worker registry and lifecycle
    /// controller, forks children through `spawner`.
    pub fn start_master(config: HiveConfig, spawner: Arc<dyn ChildSpawner>) -> Arc<Self> {
        Arc::new(Hive::Master(MasterHive::new(config, spawner)))
    }

    /// Connect the worker side back to its master. This process must
    /// already be a worker per `Role::current()`; the role probe itself is
    /// evaluated by whoever decides to call `start_master` vs
    /// `connect_worker`, which is the host entry point, out of scope here.
    pub async fn connect_worker() -> Result<Arc<Self>> {
        Ok(Arc::new(Hive::Worker(WorkerHive::connect().await?)))
    }

    pub fn role(&self) -> Role {
        match self {
            Hive::Master(_) => Role::Master,
            Hive::Worker(_) => Role::Worker,
        }
    }

    /// Fork a new worker. Master-only.
    pub async fn spawn(&self, id: &str, keep_alive: bool) -> Result<Arc<WorkerHandle>> {
        match self {
            Hive::Master(master) => master.spawn(id, keep_alive).await,
            Hive::Worker(_) => Err(HiveError::MasterOnly("Hive::spawn")),
        }
    }

    /// Look up an existing handle by ID. On the master this is any
    /// registered worker; on a worker this only ever resolves to its own
    /// ID — peers are only visible as `WorkerDescriptor`s via
    /// `get_workers`, since only the local handle is a live, emitting
    /// object.
    pub fn worker(&self, id: &str) -> Option<Arc<WorkerHandle>> {
        match self {
            Hive::Master(master) => master.worker(id),
            Hive::Worker(worker) => {
                if worker.id() == id {
                    worker.self_handle_if_ready()
                } else {
                    None
                }
            }
        }
    }

    /// Class-level `on("online", ...)`. Both sides accept this; the master
    /// fires it once per worker birth (never on respawn), the worker fires
    /// it once its own bootstrap completes (firing immediately if
    /// registered after the fact).
    pub fn on_online(&self, listener: impl Fn(Arc<WorkerHandle>) + Send + Sync + 'static) {
        match self {
            Hive::Master(master) => master.on_online(listener),
            Hive::Worker(worker) => worker.on_online(listener),
        }
    }

    /// Class-level `on("exit", ...)`, gated on the same keep-alive rule as
    /// the master's respawn classification.
    pub fn on_exit(&self, listener: impl Fn(Arc<WorkerHandle>, Option<i32>, Option<String>) + Send + Sync + 'static) {
        match self {
            Hive::Master(master) => master.on_exit(listener),
            Hive::Worker(worker) => worker.on_exit(listener),
        }
    }

    /// Class-level `to(...)`. Master-only.
    pub fn to(&self, ids: impl IntoIterator<Item = String>) -> Result<()> {
        match self {
            Hive::Master(master) => {
                master.to(ids);
                Ok(())
            }
            Hive::Worker(_) => Err(HiveError::MasterOnly("Hive::to")),
        }
    }

    /// Class-level `emit`. Master-only.
    pub fn emit(&self, event: &str, data: Vec<Value>) -> Result<bool> {
        match self {
            Hive::Master(master) => Ok(master.emit(event, data)),
            Hive::Worker(_) => Err(HiveError::MasterOnly("Hive::emit")),
        }
    }

    /// Class-level `broadcast`. Master-only.
    pub fn broadcast(&self, event: &str, data: Vec<Value>) -> Result<bool> {
        match self {
            Hive::Master(master) => Ok(master.broadcast(event, data)),
            Hive::Worker(_) => Err(HiveError::MasterOnly("Hive::broadcast")),
        }
    }

    /// Class-level `getWorkers`. Available on both sides: the master
    /// returns its live handle cache; a worker issues a control request
    /// through its own handle, deferring until bootstrap.
    pub async fn get_workers(&self) -> Result<Vec<Arc<WorkerHandle>>> {
        match self {
            Hive::Master(master) => Ok(master.get_workers().await),
            Hive::Worker(worker) => {
                let descriptors = worker.get_workers().await;
                let self_handle = worker.get_worker().await;
                Ok(descriptors
                    .into_iter()
                    .map(|d| {
                        if d.id == self_handle.id() {
                            self_handle.clone()
                        } else {
                            peer_view(d, self_handle.id())
                        }
                    })
                    .collect())
            }
        }
    }

    /// Worker-only `getWorker`.
    pub async fn get_worker(&self) -> Result<Arc<WorkerHandle>> {
        match self {
            Hive::Master(_) => Err(HiveError::WorkerOnly("Hive::get_worker")),
            Hive::Worker(worker) => Ok(worker.get_worker().await),
        }
    }
}

/// A read-only stand-in for a peer's `WorkerHandle`, returned by a
/// worker-side `get_workers` for every ID other than `self`. It carries no
/// live backend of its own — `on`/`emit` on it are no-ops — since a
/// worker process has no channel to any process but its master; reaching
/// a peer by event requires `self_handle.to(peer_id).emit(...)` instead.
fn peer_view(descriptor: WorkerDescriptor, _self_id: &str) -> Arc<WorkerHandle> {
    WorkerHandle::new(descriptor.id, descriptor.keep_alive, Arc::new(NullBackend))
}

struct NullBackend;

#[async_trait::async_trait]
impl crate::handle::Backend for NullBackend {
    fn role(&self) -> Role {
        Role::Worker
    }
    fn emit_self(&self, _id: &str, _event: String, _data: Vec<Value>) {}
    fn emit_targeted(&self, _id: &str, _to_ids: Vec<String>, _event: String, _data: Vec<Value>) {}
    fn emit_broadcast(&self, _id: &str, _event: String, _data: Vec<Value>) {}
    fn request_exit(&self, _id: &str) {}
    fn request_reboot(&self, _id: &str) {}
    async fn get_workers(&self, _id: &str) -> Vec<WorkerDescriptor> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use workhive_common::channel::MemorySpawner;

    fn master_hive() -> Arc<Hive> {
        let spawner = Arc::new(MemorySpawner::new());
        let config = HiveConfig::default().with_respawn_backoff(std::time::Duration::from_millis(1));
        Hive::start_master(config, spawner)
    }

    #[tokio::test]
    async fn worker_only_ops_error_from_master() {
        let hive = master_hive();
        let err = hive.get_worker().await.unwrap_err();
        assert!(matches!(err, HiveError::WorkerOnly(_)));
    }

    #[tokio::test]
    async fn spawn_then_lookup_round_trips() {
        let hive = master_hive();
        hive.spawn("a", false).await.unwrap();
        assert!(hive.worker("a").is_some());
        assert!(hive.worker("ghost").is_none());
    }

    #[tokio::test]
    async fn class_to_and_emit_are_master_only() {
        let hive = master_hive();
        assert!(hive.to(["a".to_string()]).is_ok());
        assert!(hive.emit("hello", vec![]).is_ok());
        assert!(hive.broadcast("hello", vec![]).is_ok());
    }
}
