//! Child channel adapter and its spawning collaborator.
//!
//! "Fork a child and get online/exit/error callbacks" and "a bidirectional
//! per-child message channel" are treated as external collaborators rather
//! than baked into the controller. They're modeled here as two traits so
//! the lifecycle controller, registry, and router (all in `workhive-core`)
//! can be built
//! and unit-tested against an in-memory double, while `UnixSocketSpawner`
//! supplies the real behavior: spawn the current executable with the
//! worker-role env vars set (see `workhive_sdk::role`) and talk to it over
//! a length-delimited, JSON-framed Unix domain socket — one socket per
//! child, framed with `tokio_util`'s length-delimited codec instead of a
//! hand-rolled 4+4+N byte header.

use crate::envelope::Envelope;
use crate::error::{HiveError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::{UnixListener, UnixStream};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

/// Signals the child channel adapter surfaces asynchronously.
#[derive(Debug, Clone)]
pub enum ChildEvent {
    /// The child is ready to receive messages.
    Online,
    /// A message arrived from the child.
    Message(Envelope),
    /// The child terminated.
    Exit { code: Option<i32>, signal: Option<String> },
    /// A low-level channel error. Not retried.
    Error(String),
}

/// A living child's outbound half: fire-and-forget send, and disposal.
/// `send` is a synchronous enqueue — it does not await delivery. Failures
/// surface later as a `ChildEvent::Error`, never as a return value here.
pub trait ChildChannel: Send + Sync {
    fn send(&self, envelope: Envelope) -> Result<()>;
    fn kill(&self);
}

/// What spawning a worker hands back to the lifecycle controller.
pub struct SpawnedChild {
    pub pid: u32,
    pub channel: Arc<dyn ChildChannel>,
    pub events: mpsc::UnboundedReceiver<ChildEvent>,
}

/// Forks a child process for a worker ID and wires up its channel.
#[async_trait]
pub trait ChildSpawner: Send + Sync {
    async fn spawn(&self, id: &str, keep_alive: bool) -> Result<SpawnedChild>;
}

// ---------------------------------------------------------------------------
// Real implementation: Unix domain socket + re-exec of the current binary.
// ---------------------------------------------------------------------------

/// Spawns workers by re-executing the current binary with
/// `workhive_sdk::role::WORKER_ID_ENV_VAR` set; the child is expected to
/// probe its own role (see `workhive_sdk::role::Role::current`) and run a
/// worker-side event loop rather than the host's master loop.
pub struct UnixSocketSpawner {
    socket_dir: PathBuf,
    exe: PathBuf,
}

/// The env var a spawned worker reads to find its IPC socket.
pub const IPC_SOCKET_ENV_VAR: &str = "WORKHIVE_IPC_SOCKET";

impl UnixSocketSpawner {
    pub fn new(socket_dir: PathBuf) -> std::io::Result<Self> {
        let exe = std::env::current_exe()?;
        Ok(Self { socket_dir, exe })
    }
}

#[async_trait]
impl ChildSpawner for UnixSocketSpawner {
    async fn spawn(&self, id: &str, keep_alive: bool) -> Result<SpawnedChild> {
        let socket_path = self.socket_dir.join(format!("workhive-{}-{}", id, uuid::Uuid::new_v4()));
        let listener = UnixListener::bind(&socket_path).map_err(|e| HiveError::SpawnFailed {
            worker_id: id.to_string(),
            message: format!("binding IPC socket: {e}"),
        })?;

        let mut child = Command::new(&self.exe)
            .env(workhive_sdk::role::WORKER_ID_ENV_VAR, id)
            .env(
                workhive_sdk::role::KEEP_ALIVE_ENV_VAR,
                if keep_alive { "1" } else { "0" },
            )
            .env(IPC_SOCKET_ENV_VAR, &socket_path)
            .spawn()
            .map_err(|e| HiveError::SpawnFailed {
                worker_id: id.to_string(),
                message: format!("spawning child: {e}"),
            })?;

        let pid = child.id().unwrap_or(0);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<Envelope>();

        let accept_tx = events_tx.clone();
        let id_owned = id.to_string();
        tokio::spawn(async move {
            let stream = match listener.accept().await {
                Ok((stream, _)) => stream,
                Err(e) => {
                    let _ = accept_tx.send(ChildEvent::Error(format!(
                        "accepting IPC connection for '{id_owned}': {e}"
                    )));
                    return;
                }
            };
            let _ = accept_tx.send(ChildEvent::Online);
            run_socket_pump(stream, accept_tx, outbound_rx).await;
            let _ = std::fs::remove_file(&socket_path);
        });

        let exit_tx = events_tx.clone();
        tokio::spawn(async move {
            let status = child.wait().await;
            let (code, signal) = match status {
                Ok(status) => (status.code(), unix_signal_name(&status)),
                Err(e) => {
                    let _ = exit_tx.send(ChildEvent::Error(format!("waiting on child: {e}")));
                    return;
                }
            };
            let _ = exit_tx.send(ChildEvent::Exit { code, signal });
        });

        Ok(SpawnedChild {
            pid,
            channel: Arc::new(UnixSocketChannel { pid, outbound_tx }),
            events: events_rx,
        })
    }
}

#[cfg(unix)]
fn unix_signal_name(status: &std::process::ExitStatus) -> Option<String> {
    use std::os::unix::process::ExitStatusExt;
    status.signal().map(|sig| {
        nix::sys::signal::Signal::try_from(sig)
            .map(|s| s.as_str().to_string())
            .unwrap_or_else(|_| format!("SIG{sig}"))
    })
}

#[cfg(not(unix))]
fn unix_signal_name(_status: &std::process::ExitStatus) -> Option<String> {
    None
}

async fn run_socket_pump(
    stream: UnixStream,
    events_tx: mpsc::UnboundedSender<ChildEvent>,
    mut outbound_rx: mpsc::UnboundedReceiver<Envelope>,
) {
    let mut framed = Framed::new(stream, LengthDelimitedCodec::new());
    loop {
        tokio::select! {
            outgoing = outbound_rx.recv() => {
                match outgoing {
                    Some(envelope) => {
                        let Ok(json) = serde_json::to_vec(&envelope) else { continue };
                        if framed.send(Bytes::from(json)).await.is_err() {
                            let _ = events_tx.send(ChildEvent::Error("write failed".into()));
                            return;
                        }
                    }
                    None => return,
                }
            }
            incoming = framed.next() => {
                match incoming {
                    Some(Ok(bytes)) => {
                        match serde_json::from_slice::<Envelope>(&bytes) {
                            Ok(envelope) => {
                                if events_tx.send(ChildEvent::Message(envelope)).is_err() {
                                    return;
                                }
                            }
                            Err(e) => {
                                let _ = events_tx.send(ChildEvent::Error(format!("bad frame: {e}")));
                            }
                        }
                    }
                    Some(Err(e)) => {
                        let _ = events_tx.send(ChildEvent::Error(format!("read failed: {e}")));
                        return;
                    }
                    None => return,
                }
            }
        }
    }
}

struct UnixSocketChannel {
    pid: u32,
    outbound_tx: mpsc::UnboundedSender<Envelope>,
}

impl ChildChannel for UnixSocketChannel {
    fn send(&self, envelope: Envelope) -> Result<()> {
        self.outbound_tx
            .send(envelope)
            .map_err(|_| HiveError::Channel {
                worker_id: String::new(),
                message: "channel closed".into(),
            })
    }

    fn kill(&self) {
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;
            let _ = kill(Pid::from_raw(self.pid as i32), Signal::SIGTERM);
        }
        #[cfg(not(unix))]
        {
            let _ = self.pid;
        }
    }
}

/// Connects the worker side of a `UnixSocketSpawner`-spawned process to its
/// master. Reads the socket path from `IPC_SOCKET_ENV_VAR`.
pub async fn connect_worker_socket(
    socket_path: &std::path::Path,
) -> Result<(Arc<dyn ChildChannel>, mpsc::UnboundedReceiver<Envelope>)> {
    let stream = UnixStream::connect(socket_path)
        .await
        .map_err(|e| HiveError::Channel {
            worker_id: String::new(),
            message: format!("connecting to master socket: {e}"),
        })?;
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut framed = Framed::new(stream, LengthDelimitedCodec::new());
        let mut outbound_rx = outbound_rx;
        loop {
            tokio::select! {
                outgoing = outbound_rx.recv() => {
                    match outgoing {
                        Some(envelope) => {
                            let Ok(json) = serde_json::to_vec::<Envelope>(&envelope) else { continue };
                            if framed.send(Bytes::from(json)).await.is_err() {
                                return;
                            }
                        }
                        None => return,
                    }
                }
                incoming = framed.next() => {
                    match incoming {
                        Some(Ok(bytes)) => {
                            if let Ok(envelope) = serde_json::from_slice::<Envelope>(&bytes) {
                                if inbound_tx.send(envelope).is_err() {
                                    return;
                                }
                            }
                        }
                        _ => return,
                    }
                }
            }
        }
    });

    Ok((
        Arc::new(UnixSocketChannel {
            pid: std::process::id(),
            outbound_tx,
        }),
        inbound_rx,
    ))
}

// ---------------------------------------------------------------------------
// In-memory test double
// ---------------------------------------------------------------------------

/// A `ChildChannel` backed by an in-memory queue. Pairs with
/// `MemorySpawner` so `workhive-core`'s registry/controller/router can be
/// unit-tested without forking real processes.
pub struct MemoryChannel {
    sent: parking_lot::Mutex<Vec<Envelope>>,
    killed: std::sync::atomic::AtomicBool,
}

impl MemoryChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: parking_lot::Mutex::new(Vec::new()),
            killed: std::sync::atomic::AtomicBool::new(false),
        })
    }

    /// Everything sent to this child, in send order.
    pub fn sent(&self) -> Vec<Envelope> {
        self.sent.lock().clone()
    }

    pub fn was_killed(&self) -> bool {
        self.killed.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl ChildChannel for MemoryChannel {
    fn send(&self, envelope: Envelope) -> Result<()> {
        self.sent.lock().push(envelope);
        Ok(())
    }

    fn kill(&self) {
        self.killed.store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

/// A handle the test keeps after spawning, to inspect the channel and to
/// push synthetic lifecycle events (`Online`, `Exit`, `Error`) that would
/// otherwise come from a real child process.
#[derive(Clone)]
pub struct MemoryChildHandle {
    pub channel: Arc<MemoryChannel>,
    events_tx: mpsc::UnboundedSender<ChildEvent>,
}

impl MemoryChildHandle {
    pub fn fire_online(&self) {
        let _ = self.events_tx.send(ChildEvent::Online);
    }

    pub fn fire_exit(&self, code: Option<i32>, signal: Option<&str>) {
        let _ = self.events_tx.send(ChildEvent::Exit {
            code,
            signal: signal.map(str::to_string),
        });
    }

    pub fn fire_message(&self, envelope: Envelope) {
        let _ = self.events_tx.send(ChildEvent::Message(envelope));
    }

    pub fn fire_error(&self, message: &str) {
        let _ = self.events_tx.send(ChildEvent::Error(message.to_string()));
    }
}

/// A `ChildSpawner` that hands out `MemoryChannel`s and retains a
/// `MemoryChildHandle` per worker ID so tests can drive lifecycle events by
/// hand, without forking real processes.
#[derive(Default)]
pub struct MemorySpawner {
    next_pid: std::sync::atomic::AtomicU32,
    handles: dashmap::DashMap<String, MemoryChildHandle>,
}

impl MemorySpawner {
    pub fn new() -> Self {
        Self::default()
    }

    /// The handle for the most recently spawned child under `id`, if any.
    pub fn handle(&self, id: &str) -> Option<MemoryChildHandle> {
        self.handles.get(id).map(|h| h.clone())
    }
}

#[async_trait]
impl ChildSpawner for MemorySpawner {
    async fn spawn(&self, id: &str, _keep_alive: bool) -> Result<SpawnedChild> {
        let pid = self
            .next_pid
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
            + 1;
        let channel = MemoryChannel::new();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        self.handles.insert(
            id.to_string(),
            MemoryChildHandle {
                channel: channel.clone(),
                events_tx,
            },
        );
        Ok(SpawnedChild {
            pid,
            channel,
            events: events_rx,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_spawner_hands_out_increasing_pids() {
        let spawner = MemorySpawner::new();
        let a = spawner.spawn("a", false).await.unwrap();
        let b = spawner.spawn("b", false).await.unwrap();
        assert_ne!(a.pid, b.pid);
    }

    #[test]
    fn memory_channel_records_sends_in_order() {
        let channel = MemoryChannel::new();
        channel
            .send(Envelope::Reboot)
            .unwrap();
        channel
            .send(Envelope::User {
                from_id: None,
                event: "hello".into(),
                data: vec![],
            })
            .unwrap();
        assert_eq!(channel.sent().len(), 2);
        assert!(!channel.was_killed());
        channel.kill();
        assert!(channel.was_killed());
    }

    #[tokio::test]
    async fn memory_spawner_handle_drives_lifecycle_events() {
        let spawner = MemorySpawner::new();
        let mut spawned = spawner.spawn("a", true).await.unwrap();
        let handle = spawner.handle("a").expect("handle registered after spawn");

        handle.fire_online();
        handle.fire_exit(Some(826), None);

        match spawned.events.recv().await {
            Some(ChildEvent::Online) => {}
            other => panic!("expected Online, got {other:?}"),
        }
        match spawned.events.recv().await {
            Some(ChildEvent::Exit { code: Some(826), signal: None }) => {}
            other => panic!("expected Exit{{826}}, got {other:?}"),
        }

        handle.channel.send(Envelope::Reboot).unwrap();
        assert_eq!(handle.channel.sent().len(), 1);
    }

    #[tokio::test]
    async fn memory_spawner_handle_is_none_before_spawn() {
        let spawner = MemorySpawner::new();
        assert!(spawner.handle("nobody").is_none());
    }
}
