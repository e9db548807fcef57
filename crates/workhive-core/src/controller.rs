//! Worker lifecycle controller.
//!
//! Owns the fork → online → exit-classification → respawn state machine.
//! One background task per live child pumps `ChildEvent`s out of the
//! spawner and feeds them back through `handle_child_event`; every event
//! that should become user-visible is funneled through a single `mpsc`
//! channel (`LifecycleEvent`) rather than mutating shared state from each
//! task, so there's a single logical owner of the registry even though the
//! real transport runs multiple tokio tasks.

use crate::registry::WorkerRegistry;
use crate::router::{self, Dispatch};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use workhive_common::reserved::REBOOT_SENTINEL_EXIT_CODE;
use workhive_common::{ChildEvent, ChildSpawner, Diag, Envelope, HiveConfig, Result};

/// Events the controller surfaces to the class-level / instance-level
/// façade (`workhive::hive::Hive`). Respawns — accidental exit under
/// keep-alive, or a requested reboot — never produce an `Online`/`Exit`
/// here; only a worker's first birth and its terminal exit do.
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    /// First birth of a worker ID (never fired again across respawns).
    Online { id: String },
    /// Terminal exit: keep-alive is off, or the exit was neither the reboot
    /// sentinel nor accidental.
    Exit {
        id: String,
        code: Option<i32>,
        signal: Option<String>,
    },
    /// A self-addressed user event from a worker's own channel (router
    /// addressing mode 1), to be delivered to that worker's master-side
    /// handle listeners.
    UserEvent { id: String, event: String, data: Vec<Value> },
    /// A channel-level error; never retried.
    ChannelError { id: String, message: String },
}

/// Drives the fork/respawn state machine for every worker the master
/// knows about.
pub struct WorkerController {
    registry: Arc<WorkerRegistry>,
    spawner: Arc<dyn ChildSpawner>,
    config: HiveConfig,
    events_tx: mpsc::UnboundedSender<LifecycleEvent>,
    diag: Diag,
}

impl WorkerController {
    pub fn new(
        registry: Arc<WorkerRegistry>,
        spawner: Arc<dyn ChildSpawner>,
        config: HiveConfig,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<LifecycleEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let controller = Arc::new(Self {
            registry,
            spawner,
            config,
            events_tx,
            diag: Diag::named("workhive::controller"),
        });
        (controller, events_rx)
    }

    /// Fork a brand-new worker under `id`. Fails synchronously if spawning
    /// itself fails; the background pump task is only started once the
    /// child process exists.
    pub async fn fork(self: &Arc<Self>, id: &str, keep_alive: bool) -> Result<()> {
        self.fork_inner(id, keep_alive, false).await
    }

    async fn fork_inner(self: &Arc<Self>, id: &str, keep_alive: bool, reborn: bool) -> Result<()> {
        let spawned = self.spawner.spawn(id, keep_alive).await?;
        if reborn {
            self.registry.respawn(id, spawned.pid, spawned.channel.clone());
        } else {
            self.registry.insert(id, keep_alive, spawned.pid, false, spawned.channel.clone());
        }

        let controller = self.clone();
        let id = id.to_string();
        let mut events = spawned.events;
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                controller.handle_child_event(&id, keep_alive, event).await;
            }
        });

        Ok(())
    }

    async fn handle_child_event(self: &Arc<Self>, id: &str, keep_alive: bool, event: ChildEvent) {
        match event {
            ChildEvent::Online => self.on_online(id, keep_alive),
            ChildEvent::Message(envelope) => self.on_message(id, envelope),
            ChildEvent::Exit { code, signal } => self.on_exit(id, keep_alive, code, signal).await,
            ChildEvent::Error(message) => {
                self.diag.error(&format!("channel error for '{id}': {message}"));
                let _ = self.events_tx.send(LifecycleEvent::ChannelError {
                    id: id.to_string(),
                    message,
                });
            }
        }
    }

    fn on_online(&self, id: &str, keep_alive: bool) {
        self.registry.set_online(id);
        let reborn = self.registry.is_reborn(id);

        // Bootstrap message always goes out, first birth or respawn alike.
        let bootstrap = Envelope::Online {
            id: id.to_string(),
            keep_alive,
        };
        if let Err(e) = self.registry.send_to(id, bootstrap) {
            self.diag.warn(&format!("bootstrap send to '{id}' failed: {e}"));
        }

        if !reborn {
            let _ = self.events_tx.send(LifecycleEvent::Online { id: id.to_string() });
        }
    }

    fn on_message(&self, id: &str, envelope: Envelope) {
        match router::handle_inbound(&self.registry, id, envelope, &self.diag) {
            Dispatch::ToHandle { id, event, data } => {
                let _ = self.events_tx.send(LifecycleEvent::UserEvent { id, event, data });
            }
            Dispatch::Handled => {}
        }
    }

    async fn on_exit(self: &Arc<Self>, id: &str, keep_alive: bool, code: Option<i32>, signal: Option<String>) {
        let reboot_requested = code == Some(REBOOT_SENTINEL_EXIT_CODE);
        let accidental = keep_alive && (code != Some(0) || signal.as_deref() == Some("SIGKILL"));

        if reboot_requested || accidental {
            self.diag.info(&format!(
                "respawning '{id}' (code={code:?}, signal={signal:?}, reboot={reboot_requested})"
            ));
            tokio::time::sleep(self.config.respawn_backoff).await;
            if let Err(e) = self.fork_inner(id, keep_alive, true).await {
                self.diag.error(&format!("respawn of '{id}' failed: {e}"));
                self.registry.remove(id);
                let _ = self.events_tx.send(LifecycleEvent::Exit {
                    id: id.to_string(),
                    code,
                    signal,
                });
            }
            return;
        }

        self.registry.remove(id);
        let _ = self.events_tx.send(LifecycleEvent::Exit {
            id: id.to_string(),
            code,
            signal,
        });
    }

    /// `Handle.exit()` from the master: kill the child.
    pub fn request_exit(&self, id: &str) {
        if let Some(channel) = self.registry.channel(id) {
            channel.kill();
        }
    }

    /// `Handle.reboot()` from the master: send the reboot control message;
    /// the controller's own exit classification treats the resulting `826`
    /// exit as a respawn, not a terminal exit.
    pub fn request_reboot(&self, id: &str) -> Result<()> {
        self.registry.send_to(id, Envelope::Reboot)
    }

    pub fn registry(&self) -> &Arc<WorkerRegistry> {
        &self.registry
    }
}
