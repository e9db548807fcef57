//! Worker-side runtime: connects a worker process back to its master over
//! the IPC channel the spawning collaborator set up, and demultiplexes
//! inbound envelopes into bootstrap/user/control-response events. The
//! local process-wide event bus listeners subscribe to live on
//! `workhive::hive::Hive`'s worker branch; this crate only does the
//! connection and routing.

pub mod router;
pub mod runtime;

pub use router::{handle_inbound, WorkerInbound};
pub use runtime::{connect, WorkerConnection};
