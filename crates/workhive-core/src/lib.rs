//! Master-side internals: the worker registry, the lifecycle controller
//! that drives fork/online/exit/respawn, and the inbound event router.
//! Not a binary on its own — `workhive::hive::Hive` (the public facade)
//! and `workhive-demo` are the entry points that use this crate.

pub mod controller;
pub mod registry;
pub mod router;

pub use controller::{LifecycleEvent, WorkerController};
pub use registry::{WorkerRegistry, WorkerState};
pub use router::{handle_inbound, Dispatch};
