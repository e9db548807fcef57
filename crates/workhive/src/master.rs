//! Master-side half of the class-level facade.
//!
//! `MasterHive` owns the registry/controller pair from `workhive-core` plus
//! the handle cache and class-level (`on_online`/`on_exit`) listener lists.
//! It is the concrete type behind `Hive::Master`; `Hive` itself just routes
//! to whichever side matches `Role::current()`.

use crate::handle::{Backend, WorkerHandle};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use workhive_common::{ChildSpawner, Diag, HiveConfig, Result, WorkerDescriptor};
use workhive_core::{LifecycleEvent, WorkerController, WorkerRegistry};
use workhive_sdk::Role;

type OnlineListener = dyn Fn(Arc<WorkerHandle>) + Send + Sync;
type ExitListener = dyn Fn(Arc<WorkerHandle>, Option<i32>, Option<String>) + Send + Sync;

/// Sends every outbound envelope through the registry and defers
/// exit/reboot to the lifecycle controller.
struct MasterBackend {
    registry: Arc<WorkerRegistry>,
    controller: Arc<WorkerController>,
}

#[async_trait]
impl Backend for MasterBackend {
    fn role(&self) -> Role {
        Role::Master
    }

    fn emit_self(&self, id: &str, event: String, data: Vec<Value>) {
        let envelope = workhive_common::Envelope::User {
            from_id: None,
            event,
            data,
        };
        let _ = self.registry.send_to(id, envelope);
    }

    fn emit_targeted(&self, _id: &str, to_ids: Vec<String>, event: String, data: Vec<Value>) {
        for rid in to_ids {
            let envelope = workhive_common::Envelope::User {
                from_id: None,
                event: event.clone(),
                data: data.clone(),
            };
            let _ = self.registry.send_to(&rid, envelope);
        }
    }

    fn emit_broadcast(&self, _id: &str, event: String, data: Vec<Value>) {
        broadcast_to_all(&self.registry, event, data);
    }

    fn request_exit(&self, id: &str) {
        self.controller.request_exit(id);
    }

    fn request_reboot(&self, id: &str) {
        let _ = self.controller.request_reboot(id);
    }

    async fn get_workers(&self, _id: &str) -> Vec<WorkerDescriptor> {
        self.registry.online_descriptors()
    }
}

fn broadcast_to_all(registry: &WorkerRegistry, event: String, data: Vec<Value>) {
    for id in registry.all_ids() {
        let envelope = workhive_common::Envelope::User {
            from_id: None,
            event: event.clone(),
            data: data.clone(),
        };
        let _ = registry.send_to(&id, envelope);
    }
}

/// The master-side supervisor: owns every `WorkerHandle` the process has
/// created, and the class-level `online`/`exit` listener lists.
pub struct MasterHive {
    registry: Arc<WorkerRegistry>,
    controller: Arc<WorkerController>,
    backend: Arc<MasterBackend>,
    handles: dashmap::DashMap<String, Arc<WorkerHandle>>,
    online_listeners: parking_lot::Mutex<Vec<Arc<OnlineListener>>>,
    exit_listeners: parking_lot::Mutex<Vec<Arc<ExitListener>>>,
    class_receivers: parking_lot::Mutex<Option<Vec<String>>>,
    diag: Diag,
}

impl MasterHive {
    pub fn new(config: HiveConfig, spawner: Arc<dyn ChildSpawner>) -> Arc<Self> {
        let registry = WorkerRegistry::new();
        let (controller, events_rx) = WorkerController::new(registry.clone(), spawner, config);
        let backend = Arc::new(MasterBackend {
            registry: registry.clone(),
            controller: controller.clone(),
        });

        let hive = Arc::new(Self {
            registry,
            controller,
            backend,
            handles: dashmap::DashMap::new(),
            online_listeners: parking_lot::Mutex::new(Vec::new()),
            exit_listeners: parking_lot::Mutex::new(Vec::new()),
            class_receivers: parking_lot::Mutex::new(None),
            diag: Diag::named("workhive::hive::master"),
        });

        spawn_lifecycle_pump(hive.clone(), events_rx);
        hive
    }

    /// Fork a new worker under `id`. Fails if `id` is already registered —
    /// at most one live child exists per ID — or if the underlying spawn
    /// fails.
    pub async fn spawn(self: &Arc<Self>, id: &str, keep_alive: bool) -> Result<Arc<WorkerHandle>> {
        if self.handles.contains_key(id) {
            return Err(workhive_common::HiveError::DuplicateWorker(id.to_string()));
        }
        let handle = WorkerHandle::new(id, keep_alive, self.backend.clone());
        self.handles.insert(id.to_string(), handle.clone());
        if let Err(e) = self.controller.fork(id, keep_alive).await {
            self.handles.remove(id);
            return Err(e);
        }
        Ok(handle)
    }

    pub fn worker(&self, id: &str) -> Option<Arc<WorkerHandle>> {
        self.handles.get(id).map(|e| e.value().clone())
    }

    pub fn on_online(&self, listener: impl Fn(Arc<WorkerHandle>) + Send + Sync + 'static) {
        self.online_listeners.lock().push(Arc::new(listener));
    }

    pub fn on_exit(&self, listener: impl Fn(Arc<WorkerHandle>, Option<i32>, Option<String>) + Send + Sync + 'static) {
        self.exit_listeners.lock().push(Arc::new(listener));
    }

    /// Class-level `to(...)`: store the one-shot receiver set consumed by
    /// the next class-level `emit`.
    pub fn to(&self, ids: impl IntoIterator<Item = String>) {
        *self.class_receivers.lock() = Some(ids.into_iter().collect());
    }

    /// Class-level `emit`. Requires a prior `to(...)` — there is no
    /// implicit "self" at the class level, unlike the instance facade —
    /// logged and dropped otherwise.
    pub fn emit(&self, event: &str, data: Vec<Value>) -> bool {
        let targets = self.class_receivers.lock().take();
        if workhive_common::reserved::is_reserved(event) {
            return false;
        }
        match targets {
            Some(to_ids) => {
                for rid in to_ids {
                    let envelope = workhive_common::Envelope::User {
                        from_id: None,
                        event: event.to_string(),
                        data: data.clone(),
                    };
                    let _ = self.registry.send_to(&rid, envelope);
                }
                true
            }
            None => {
                self.diag.warn("Hive::emit called with no prior to(...); dropped");
                false
            }
        }
    }

    /// Class-level `broadcast`.
    pub fn broadcast(&self, event: &str, data: Vec<Value>) -> bool {
        if workhive_common::reserved::is_reserved(event) {
            return false;
        }
        broadcast_to_all(&self.registry, event.to_string(), data);
        true
    }

    /// Class-level `getWorkers`: every handle whose registry state is
    /// `online`.
    pub async fn get_workers(&self) -> Vec<Arc<WorkerHandle>> {
        self.registry
            .online_ids()
            .into_iter()
            .filter_map(|id| self.handles.get(&id).map(|e| e.value().clone()))
            .collect()
    }

    fn handle_lifecycle_event(&self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::Online { id } => {
                if let Some(handle) = self.handles.get(&id).map(|e| e.value().clone()) {
                    for listener in self.online_listeners.lock().iter() {
                        listener(handle.clone());
                    }
                }
            }
            LifecycleEvent::Exit { id, code, signal } => {
                if let Some((_, handle)) = self.handles.remove(&id) {
                    handle.fire_lifecycle(
                        "exit",
                        &[
                            code.map(Value::from).unwrap_or(Value::Null),
                            signal.clone().map(Value::from).unwrap_or(Value::Null),
                        ],
                    );
                    for listener in self.exit_listeners.lock().iter() {
                        listener(handle.clone(), code, signal.clone());
                    }
                }
            }
            LifecycleEvent::UserEvent { id, event, data } => {
                if let Some(handle) = self.handles.get(&id) {
                    handle.fire_user_event(&event, &data);
                }
            }
            LifecycleEvent::ChannelError { id, message } => {
                if let Some(handle) = self.handles.get(&id) {
                    handle.fire_lifecycle("error", &[Value::from(message)]);
                }
            }
        }
    }
}

fn spawn_lifecycle_pump(hive: Arc<MasterHive>, mut events_rx: mpsc::UnboundedReceiver<LifecycleEvent>) {
    tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            hive.handle_lifecycle_event(event);
        }
    });
}
