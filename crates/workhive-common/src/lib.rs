//! Shared wire format, error types, and child-process plumbing used by both
//! the master-side (`workhive-core`) and worker-side (`workhive-worker`)
//! halves of the event bus, plus the class-level facade crate (`workhive`).

pub mod bus;
pub mod channel;
pub mod config;
pub mod diag;
pub mod envelope;
pub mod error;
pub mod reserved;

pub use bus::{EventBus, ListenerId};
pub use channel::{ChildChannel, ChildEvent, ChildSpawner, SpawnedChild};
pub use config::HiveConfig;
pub use diag::Diag;
pub use envelope::{Envelope, WireWorkerState, WorkerDescriptor};
pub use error::{HiveError, Result};
pub use reserved::{classify, is_reserved, EventName, REBOOT_SENTINEL_EXIT_CODE};
