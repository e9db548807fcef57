//! Worker-side half of the class-level facade.
//!
//! `WorkerHive` connects back to the master over the channel
//! `workhive-worker::runtime::connect` set up, materializes the single
//! local `WorkerHandle` on the first `online` bootstrap, and defers
//! `get_worker`/`get_workers` until that bootstrap has happened —
//! `getWorker` uses the same deferral mechanism as `getWorkers` rather than
//! a separate one-off wait.

use crate::handle::{Backend, WorkerHandle};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{oneshot, Notify, OnceCell};
use workhive_common::{ChildChannel, Diag, Envelope, Result, WorkerDescriptor};
use workhive_sdk::Role;
use workhive_worker::WorkerInbound;

type OnlineListener = dyn Fn(Arc<WorkerHandle>) + Send + Sync;
type ExitListener = dyn Fn(Arc<WorkerHandle>, Option<i32>, Option<String>) + Send + Sync;

/// Sends every outbound envelope over the IPC channel back to the master,
/// and resolves `get_workers` replies via a FIFO queue of pending oneshots.
struct WorkerBackend {
    id: String,
    channel: Arc<dyn ChildChannel>,
    pending_get_workers: parking_lot::Mutex<std::collections::VecDeque<oneshot::Sender<Vec<WorkerDescriptor>>>>,
}

#[async_trait]
impl Backend for WorkerBackend {
    fn role(&self) -> Role {
        Role::Worker
    }

    fn emit_self(&self, id: &str, event: String, data: Vec<Value>) {
        let _ = self.channel.send(Envelope::User {
            from_id: Some(id.to_string()),
            event,
            data,
        });
    }

    fn emit_targeted(&self, id: &str, to_ids: Vec<String>, event: String, data: Vec<Value>) {
        let _ = self.channel.send(Envelope::Transmit {
            from_id: id.to_string(),
            to_ids,
            event,
            data,
        });
    }

    fn emit_broadcast(&self, id: &str, event: String, data: Vec<Value>) {
        let _ = self.channel.send(Envelope::Broadcast {
            from_id: id.to_string(),
            event,
            data,
        });
    }

    fn request_exit(&self, _id: &str) {
        std::process::exit(0);
    }

    fn request_reboot(&self, _id: &str) {
        std::process::exit(workhive_common::REBOOT_SENTINEL_EXIT_CODE);
    }

    async fn get_workers(&self, id: &str) -> Vec<WorkerDescriptor> {
        let (tx, rx) = oneshot::channel();
        self.pending_get_workers.lock().push_back(tx);
        let _ = self.channel.send(Envelope::GetWorkersReq { from_id: id.to_string() });
        rx.await.unwrap_or_default()
    }
}

/// The worker-side supervisor: a single local `WorkerHandle`, materialized
/// lazily on the first `online` bootstrap.
pub struct WorkerHive {
    id: String,
    keep_alive: bool,
    backend: Arc<WorkerBackend>,
    self_handle: OnceCell<Arc<WorkerHandle>>,
    online_ready: Notify,
    online_listeners: parking_lot::Mutex<Vec<Arc<OnlineListener>>>,
    exit_listeners: parking_lot::Mutex<Vec<Arc<ExitListener>>>,
    diag: Diag,
}

impl WorkerHive {
    /// Connect to the master using the env vars `UnixSocketSpawner` set on
    /// this process, which the role probe uses to decide this process is a
    /// worker. Fails fast if called from the master.
    pub async fn connect() -> Result<Arc<Self>> {
        let conn = workhive_worker::connect().await?;
        let backend = Arc::new(WorkerBackend {
            id: conn.id.clone(),
            channel: conn.channel,
            pending_get_workers: parking_lot::Mutex::new(std::collections::VecDeque::new()),
        });

        let hive = Arc::new(Self {
            id: conn.id,
            keep_alive: conn.keep_alive,
            backend,
            self_handle: OnceCell::new(),
            online_ready: Notify::new(),
            online_listeners: parking_lot::Mutex::new(Vec::new()),
            exit_listeners: parking_lot::Mutex::new(Vec::new()),
            diag: Diag::named("workhive::hive::worker"),
        });

        spawn_inbound_pump(hive.clone(), conn.inbound);
        install_exit_handler(hive.clone());
        Ok(hive)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The local handle if the `online` bootstrap has already happened,
    /// without waiting for it (used by `Hive::worker` for a synchronous
    /// lookup; `get_worker` is the async, deferring counterpart).
    pub fn self_handle_if_ready(&self) -> Option<Arc<WorkerHandle>> {
        self.self_handle.get().cloned()
    }

    pub fn on_online(&self, listener: impl Fn(Arc<WorkerHandle>) + Send + Sync + 'static) {
        let listener: Arc<OnlineListener> = Arc::new(listener);
        self.online_listeners.lock().push(listener.clone());
        // If bootstrap already happened before this registration, fire
        // immediately rather than silently missing the event.
        if let Some(handle) = self.self_handle.get() {
            listener(handle.clone());
        }
    }

    pub fn on_exit(&self, listener: impl Fn(Arc<WorkerHandle>, Option<i32>, Option<String>) + Send + Sync + 'static) {
        self.exit_listeners.lock().push(Arc::new(listener));
    }

    /// Worker-only `getWorker`: the single local handle, deferring until
    /// `online` bootstrap completes.
    pub async fn get_worker(self: &Arc<Self>) -> Arc<WorkerHandle> {
        self.wait_for_online().await
    }

    /// Worker-only `getWorkers`: issues a get-workers request through the
    /// local handle (which defers to bootstrap internally since it shares
    /// the same backend).
    pub async fn get_workers(self: &Arc<Self>) -> Vec<WorkerDescriptor> {
        let handle = self.wait_for_online().await;
        handle.get_workers().await
    }

    async fn wait_for_online(&self) -> Arc<WorkerHandle> {
        loop {
            if let Some(handle) = self.self_handle.get() {
                return handle.clone();
            }
            self.online_ready.notified().await;
        }
    }

    fn on_bootstrap(self: &Arc<Self>) {
        let handle = WorkerHandle::new(self.id.clone(), self.keep_alive, self.backend.clone());
        if self.self_handle.set(handle.clone()).is_ok() {
            self.online_ready.notify_waiters();
            for listener in self.online_listeners.lock().iter() {
                listener(handle.clone());
            }
        }
    }

    fn on_user_event(&self, event: &str, data: &[Value]) {
        if let Some(handle) = self.self_handle.get() {
            handle.fire_user_event(event, data);
        } else {
            self.diag.warn(&format!("dropped '{event}' received before online bootstrap"));
        }
    }

    fn on_get_workers_resp(&self, workers: Vec<WorkerDescriptor>) {
        if let Some(tx) = self.backend.pending_get_workers.lock().pop_front() {
            let _ = tx.send(workers);
        }
    }

    fn fire_exit_listeners(&self, code: Option<i32>, signal: Option<String>) {
        if let Some(handle) = self.self_handle.get() {
            for listener in self.exit_listeners.lock().iter() {
                listener(handle.clone(), code, signal.clone());
            }
        }
    }
}

fn spawn_inbound_pump(hive: Arc<WorkerHive>, mut inbound: tokio::sync::mpsc::UnboundedReceiver<WorkerInbound>) {
    tokio::spawn(async move {
        while let Some(message) = inbound.recv().await {
            match message {
                WorkerInbound::Online { .. } => hive.on_bootstrap(),
                WorkerInbound::User { event, data } => hive.on_user_event(&event, &data),
                WorkerInbound::GetWorkersResp { workers } => hive.on_get_workers_resp(workers),
            }
        }
    });
}

/// Registers a termination-signal handler so class-level `on_exit`
/// listeners fire before this worker process actually exits, gated on the
/// same keep-alive rule as the master's respawn classification.
/// Best-effort: a `SIGKILL`'d process never runs this.
fn install_exit_handler(hive: Arc<WorkerHive>) {
    let result = ctrlc::set_handler(move || {
        let keep_alive = hive.keep_alive;
        if !keep_alive {
            hive.fire_exit_listeners(None, Some("SIGINT".to_string()));
        }
        std::process::exit(0);
    });
    if let Err(e) = result {
        tracing::debug!("could not install worker exit handler: {e}");
    }
}
