//! Master-side event router.
//!
//! Demultiplexes every envelope arriving from a child channel into either a
//! direct registry-mediated delivery (`Transmit`/`Broadcast`/
//! `GetWorkersReq` are fully handled here) or a `Dispatch::ToHandle` the
//! caller (the lifecycle controller) forwards on to the master-side
//! `WorkerHandle` listeners for the originating worker's own ID — the
//! "self" addressing mode.

use crate::registry::WorkerRegistry;
use workhive_common::{Diag, Envelope};

/// What the router could not resolve internally and needs the caller to
/// act on.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// Deliver `event(data)` to the master-side listeners of the handle
    /// with this ID (self-addressed user event).
    ToHandle {
        id: String,
        event: String,
        data: Vec<serde_json::Value>,
    },
    /// Fully handled inside the router (registry writes, or a response
    /// already sent back over the originating channel).
    Handled,
}

/// Route one inbound envelope from `from_id`'s channel.
pub fn handle_inbound(registry: &WorkerRegistry, from_id: &str, envelope: Envelope, diag: &Diag) -> Dispatch {
    match envelope {
        Envelope::User { event, data, .. } => Dispatch::ToHandle {
            id: from_id.to_string(),
            event,
            data,
        },

        Envelope::Transmit { to_ids, event, data, .. } => {
            for rid in &to_ids {
                let outbound = Envelope::User {
                    from_id: Some(from_id.to_string()),
                    event: event.clone(),
                    data: data.clone(),
                };
                if let Err(e) = registry.send_to(rid, outbound) {
                    diag.warn(&format!("transmit from '{from_id}' to '{rid}' failed: {e}"));
                }
            }
            Dispatch::Handled
        }

        Envelope::Broadcast { event, data, .. } => {
            for id in registry.all_ids() {
                let outbound = Envelope::User {
                    from_id: Some(from_id.to_string()),
                    event: event.clone(),
                    data: data.clone(),
                };
                if let Err(e) = registry.send_to(&id, outbound) {
                    diag.warn(&format!("broadcast from '{from_id}' to '{id}' failed: {e}"));
                }
            }
            Dispatch::Handled
        }

        Envelope::GetWorkersReq { from_id } => {
            let workers = registry.online_descriptors();
            if let Err(e) = registry.send_to(&from_id, Envelope::GetWorkersResp { workers }) {
                diag.warn(&format!("get-workers response to '{from_id}' failed: {e}"));
            }
            Dispatch::Handled
        }

        // These only ever flow master → worker; receiving one from a
        // worker is a protocol violation, logged and dropped.
        Envelope::Online { .. } | Envelope::GetWorkersResp { .. } | Envelope::Reboot => {
            diag.warn(&format!("unexpected envelope from '{from_id}' on the master side"));
            Dispatch::Handled
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use workhive_common::channel::MemoryChannel;

    fn diag() -> Diag {
        Diag::named("test::router")
    }

    #[test]
    fn transmit_delivers_only_to_named_targets() {
        let reg = WorkerRegistry::new();
        let a = MemoryChannel::new();
        let b = MemoryChannel::new();
        let c = MemoryChannel::new();
        reg.insert("a", false, 1, false, a.clone());
        reg.insert("b", false, 2, false, b.clone());
        reg.insert("c", false, 3, false, c.clone());
        reg.set_online("a");
        reg.set_online("b");
        reg.set_online("c");

        let outcome = handle_inbound(
            &reg,
            "a",
            Envelope::Transmit {
                from_id: "a".into(),
                to_ids: vec!["b".into()],
                event: "ping".into(),
                data: vec![serde_json::json!(42)],
            },
            &diag(),
        );

        assert_eq!(outcome, Dispatch::Handled);
        assert_eq!(b.sent().len(), 1);
        assert!(a.sent().is_empty());
        assert!(c.sent().is_empty());
    }

    #[test]
    fn broadcast_reaches_every_online_worker_including_sender() {
        let reg = WorkerRegistry::new();
        let a = MemoryChannel::new();
        let b = MemoryChannel::new();
        reg.insert("a", false, 1, false, a.clone());
        reg.insert("b", false, 2, false, b.clone());
        reg.set_online("a");
        reg.set_online("b");

        handle_inbound(
            &reg,
            "a",
            Envelope::Broadcast {
                from_id: "a".into(),
                event: "news".into(),
                data: vec![serde_json::json!(7)],
            },
            &diag(),
        );

        assert_eq!(a.sent().len(), 1);
        assert_eq!(b.sent().len(), 1);
    }

    #[test]
    fn user_envelope_dispatches_to_own_handle() {
        let reg = WorkerRegistry::new();
        let outcome = handle_inbound(
            &reg,
            "a",
            Envelope::User {
                from_id: Some("a".into()),
                event: "hello".into(),
                data: vec![serde_json::json!(1), serde_json::json!("x")],
            },
            &diag(),
        );
        assert_eq!(
            outcome,
            Dispatch::ToHandle {
                id: "a".into(),
                event: "hello".into(),
                data: vec![serde_json::json!(1), serde_json::json!("x")],
            }
        );
    }

    #[test]
    fn get_workers_req_responds_with_online_descriptors() {
        let reg = WorkerRegistry::new();
        let a = MemoryChannel::new();
        reg.insert("a", false, 1, false, a.clone());
        reg.set_online("a");

        handle_inbound(&reg, "a", Envelope::GetWorkersReq { from_id: "a".into() }, &diag());

        let sent = a.sent();
        assert_eq!(sent.len(), 1);
        match &sent[0] {
            Envelope::GetWorkersResp { workers } => {
                assert_eq!(workers.len(), 1);
                assert_eq!(workers[0].id, "a");
            }
            other => panic!("expected GetWorkersResp, got {other:?}"),
        }
    }
}
