//! Worker handle facade: the per-ID object exposing
//! `on/once/emit/to/broadcast/exit/reboot/getWorkers/setMaxListeners`.
//! Identical surface on both sides of the process boundary; the
//! `Backend` trait object is where master and worker behavior diverge.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use workhive_common::bus::ListenerId;
use workhive_common::reserved::is_reserved;
use workhive_common::{EventBus, WorkerDescriptor};
use workhive_sdk::Role;

/// Where a `WorkerHandle`'s operations actually go. One impl lives in
/// `workhive-core` territory (`MasterBackend`, master process) and one in
/// `workhive-worker` territory (`WorkerBackend`, worker process); the
/// `Hive` facade picks which to construct based on `Role::current()`.
#[async_trait]
pub trait Backend: Send + Sync {
    fn role(&self) -> Role;

    /// Addressing mode 1: no prior `to(...)`.
    fn emit_self(&self, id: &str, event: String, data: Vec<Value>);
    /// Addressing mode 2: a `to(...)`-selected target set.
    fn emit_targeted(&self, id: &str, to_ids: Vec<String>, event: String, data: Vec<Value>);
    /// Addressing mode 3: unconditional fan-out.
    fn emit_broadcast(&self, id: &str, event: String, data: Vec<Value>);

    fn request_exit(&self, id: &str);
    fn request_reboot(&self, id: &str);

    async fn get_workers(&self, id: &str) -> Vec<WorkerDescriptor>;
}

/// Per-ID emitter facade.
pub struct WorkerHandle {
    id: String,
    keep_alive: bool,
    bus: EventBus,
    receivers: parking_lot::Mutex<Option<Vec<String>>>,
    backend: Arc<dyn Backend>,
}

impl WorkerHandle {
    pub fn new(id: impl Into<String>, keep_alive: bool, backend: Arc<dyn Backend>) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            keep_alive,
            bus: EventBus::default(),
            receivers: parking_lot::Mutex::new(None),
            backend,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// `on(evt, fn)`. Reserved names may still be subscribed to — masking
    /// only applies to the `emit` surface — since the lifecycle controller
    /// fires `error`/`exit` on this same bus internally (see
    /// `fire_lifecycle`).
    pub fn on(&self, event: &str, callback: impl Fn(&[Value]) + Send + Sync + 'static) -> ListenerId {
        self.bus.on(event, callback)
    }

    pub fn once(&self, event: &str, callback: impl Fn(&[Value]) + Send + Sync + 'static) -> ListenerId {
        self.bus.once(event, callback)
    }

    pub fn remove_listener(&self, event: &str, listener: ListenerId) {
        self.bus.remove(event, listener);
    }

    /// `to(...)`: store a one-shot receiver set, consumed by the next
    /// `emit`.
    pub fn to(&self, ids: impl IntoIterator<Item = String>) -> &Self {
        *self.receivers.lock() = Some(ids.into_iter().collect());
        self
    }

    /// `emit(evt, ...data)`. Reserved names always return `false` with no
    /// side effect; the one-shot receiver set is cleared either way.
    pub fn emit(&self, event: &str, data: Vec<Value>) -> bool {
        let targets = self.receivers.lock().take();
        if is_reserved(event) {
            return false;
        }
        match targets {
            Some(to_ids) => self.backend.emit_targeted(&self.id, to_ids, event.to_string(), data),
            None => self.backend.emit_self(&self.id, event.to_string(), data),
        }
        true
    }

    /// `broadcast(evt, ...data)`. `online` — and, by the same reserved-name
    /// guard, every other lifecycle/control name — is rejected here too.
    pub fn broadcast(&self, event: &str, data: Vec<Value>) -> bool {
        if is_reserved(event) {
            return false;
        }
        self.backend.emit_broadcast(&self.id, event.to_string(), data);
        true
    }

    /// `exit()`: kill the child (master) or terminate self (worker).
    pub fn exit(&self) {
        self.backend.request_exit(&self.id);
    }

    /// `reboot()`.
    pub fn reboot(&self) {
        self.backend.request_reboot(&self.id);
    }

    /// `getWorkers(cb?)`: delegates to the class method on master; issues a
    /// control request on worker. Returns raw descriptors; `Hive` wraps
    /// this to reconstruct `WorkerHandle` objects where it owns the handle
    /// cache.
    pub async fn get_workers(&self) -> Vec<WorkerDescriptor> {
        self.backend.get_workers(&self.id).await
    }

    pub fn set_max_listeners(&self, n: usize) {
        self.bus.set_max_listeners(n);
    }

    pub fn max_listeners(&self) -> usize {
        self.bus.max_listeners()
    }

    /// Invoked by `Hive` when the lifecycle controller or worker-side
    /// router delivers a user event addressed to this handle — the "self"
    /// addressing mode, or worker-side re-emission onto the local bus.
    pub fn fire_user_event(&self, event: &str, data: &[Value]) {
        self.bus.emit(event, data);
    }

    /// Invoked internally by `Hive` to fire `online`/`error`/`exit` — these
    /// bypass `emit`'s reserved-name rejection because they originate from
    /// the controller, not user code.
    pub fn fire_lifecycle(&self, event: &str, data: &[Value]) {
        self.bus.emit(event, data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RecordingBackend {
        self_calls: parking_lot::Mutex<Vec<(String, String, Vec<Value>)>>,
        targeted_calls: parking_lot::Mutex<Vec<(String, Vec<String>, String, Vec<Value>)>>,
        broadcast_calls: parking_lot::Mutex<Vec<(String, String, Vec<Value>)>>,
    }

    impl RecordingBackend {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                self_calls: parking_lot::Mutex::new(Vec::new()),
                targeted_calls: parking_lot::Mutex::new(Vec::new()),
                broadcast_calls: parking_lot::Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Backend for RecordingBackend {
        fn role(&self) -> Role {
            Role::Master
        }
        fn emit_self(&self, id: &str, event: String, data: Vec<Value>) {
            self.self_calls.lock().push((id.to_string(), event, data));
        }
        fn emit_targeted(&self, id: &str, to_ids: Vec<String>, event: String, data: Vec<Value>) {
            self.targeted_calls.lock().push((id.to_string(), to_ids, event, data));
        }
        fn emit_broadcast(&self, id: &str, event: String, data: Vec<Value>) {
            self.broadcast_calls.lock().push((id.to_string(), event, data));
        }
        fn request_exit(&self, _id: &str) {}
        fn request_reboot(&self, _id: &str) {}
        async fn get_workers(&self, _id: &str) -> Vec<WorkerDescriptor> {
            vec![]
        }
    }

    #[test]
    fn emit_with_no_target_uses_self_addressing() {
        let backend = RecordingBackend::new();
        let handle = WorkerHandle::new("a", false, backend.clone());
        assert!(handle.emit("hello", vec![Value::from(1)]));
        assert_eq!(backend.self_calls.lock().len(), 1);
        assert!(backend.targeted_calls.lock().is_empty());
    }

    #[test]
    fn to_then_emit_uses_targeted_addressing_and_clears_receivers() {
        let backend = RecordingBackend::new();
        let handle = WorkerHandle::new("a", false, backend.clone());
        handle.to(["b".to_string(), "c".to_string()]);
        assert!(handle.emit("ping", vec![]));
        assert_eq!(backend.targeted_calls.lock().len(), 1);

        // receivers is one-shot: a second emit without a new `to` goes self.
        assert!(handle.emit("ping", vec![]));
        assert_eq!(backend.self_calls.lock().len(), 1);
    }

    #[test]
    fn reserved_names_are_rejected_and_clear_receivers() {
        let backend = RecordingBackend::new();
        let handle = WorkerHandle::new("a", false, backend.clone());
        handle.to(["b".to_string()]);
        assert!(!handle.emit("online", vec![]));
        assert!(backend.targeted_calls.lock().is_empty());
        assert!(backend.self_calls.lock().is_empty());

        // Reserved rejection still consumed the receiver set.
        assert!(handle.emit("hello", vec![]));
        assert_eq!(backend.self_calls.lock().len(), 1);
    }

    #[test]
    fn broadcast_rejects_reserved_names() {
        let backend = RecordingBackend::new();
        let handle = WorkerHandle::new("a", false, backend.clone());
        assert!(!handle.broadcast("----reboot----", vec![]));
        assert!(handle.broadcast("news", vec![]));
        assert_eq!(backend.broadcast_calls.lock().len(), 1);
    }

    #[test]
    fn listeners_fire_in_order_via_fire_user_event() {
        let backend = RecordingBackend::new();
        let handle = WorkerHandle::new("a", false, backend);
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        handle.on("hello", move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        handle.fire_user_event("hello", &[Value::from(1)]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
