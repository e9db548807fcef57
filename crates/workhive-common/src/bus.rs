//! A small ordered-listener event bus: a mapping from event name to an
//! ordered list of listener callbacks. Used both for a worker's
//! process-wide local bus (`workhive-worker::runtime`) and as the backing
//! store of a `WorkerHandle`'s own listener map (`workhive::handle`) — the
//! same shape either way, which is what makes listeners survive a reboot
//! for free: keep the same `EventBus` instance alive across a respawn
//! rather than rebuilding it.

use serde_json::Value;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

pub type ListenerId = u64;
pub type Callback = Arc<dyn Fn(&[Value]) + Send + Sync>;

struct Listener {
    id: ListenerId,
    once: bool,
    callback: Callback,
}

/// An ordered, per-event listener list plus a configurable max-listener
/// limit.
pub struct EventBus {
    listeners: parking_lot::Mutex<std::collections::HashMap<String, Vec<Listener>>>,
    next_id: AtomicU64,
    max_listeners: AtomicUsize,
}

impl EventBus {
    pub fn new(max_listeners: usize) -> Self {
        Self {
            listeners: parking_lot::Mutex::new(std::collections::HashMap::new()),
            next_id: AtomicU64::new(1),
            max_listeners: AtomicUsize::new(max_listeners),
        }
    }

    fn add(&self, event: &str, once: bool, callback: Callback) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.listeners
            .lock()
            .entry(event.to_string())
            .or_default()
            .push(Listener { id, once, callback });
        id
    }

    pub fn on(&self, event: &str, callback: impl Fn(&[Value]) + Send + Sync + 'static) -> ListenerId {
        self.add(event, false, Arc::new(callback))
    }

    pub fn once(&self, event: &str, callback: impl Fn(&[Value]) + Send + Sync + 'static) -> ListenerId {
        self.add(event, true, Arc::new(callback))
    }

    /// Invoke every listener registered for `event`, in registration order,
    /// then drop the `once` ones. Synchronous; does not await delivery.
    pub fn emit(&self, event: &str, data: &[Value]) {
        let callbacks: Vec<Callback> = {
            let mut guard = self.listeners.lock();
            let Some(list) = guard.get_mut(event) else {
                return;
            };
            let callbacks = list.iter().map(|l| l.callback.clone()).collect();
            list.retain(|l| !l.once);
            callbacks
        };
        for callback in callbacks {
            callback(data);
        }
    }

    pub fn remove(&self, event: &str, id: ListenerId) {
        if let Some(list) = self.listeners.lock().get_mut(event) {
            list.retain(|l| l.id != id);
        }
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.lock().get(event).map(Vec::len).unwrap_or(0)
    }

    pub fn set_max_listeners(&self, n: usize) {
        self.max_listeners.store(n, Ordering::SeqCst);
    }

    pub fn max_listeners(&self) -> usize {
        self.max_listeners.load(Ordering::SeqCst)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listeners_fire_in_registration_order() {
        let bus = EventBus::default();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let o1 = order.clone();
        let o2 = order.clone();
        bus.on("e", move |_| o1.lock().push(1));
        bus.on("e", move |_| o2.lock().push(2));
        bus.emit("e", &[]);
        assert_eq!(*order.lock(), vec![1, 2]);
    }

    #[test]
    fn once_listener_fires_only_once() {
        let bus = EventBus::default();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        bus.once("e", move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        bus.emit("e", &[]);
        bus.emit("e", &[]);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(bus.listener_count("e"), 0);
    }

    #[test]
    fn remove_drops_only_the_named_listener() {
        let bus = EventBus::default();
        let id = bus.on("e", |_| {});
        bus.on("e", |_| {});
        assert_eq!(bus.listener_count("e"), 2);
        bus.remove("e", id);
        assert_eq!(bus.listener_count("e"), 1);
    }

    #[test]
    fn emit_with_no_listeners_does_not_panic() {
        let bus = EventBus::default();
        bus.emit("nothing-registered", &[Value::from(1)]);
    }

    #[test]
    fn max_listeners_is_configurable() {
        let bus = EventBus::default();
        assert_eq!(bus.max_listeners(), 10);
        bus.set_max_listeners(50);
        assert_eq!(bus.max_listeners(), 50);
    }
}
