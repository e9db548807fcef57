//! `workhive`: the public facade. A symmetric event-emitter API over a
//! process-pool supervisor — the master spawns and manages named workers;
//! a `WorkerHandle` exposes the same `on/once/emit/to/broadcast/exit/
//! reboot/get_workers` surface whether the caller is running in the
//! master or in a worker. `Hive` is the process-wide supervisor object
//! that owns the handle cache and class-level `online`/`exit` listeners,
//! and picks the master or worker backend based on
//! `workhive_sdk::Role::current()`.
//!
//! ```no_run
//! # async fn example() -> workhive_common::Result<()> {
//! use std::sync::Arc;
//! use workhive::Hive;
//! use workhive_common::{channel::UnixSocketSpawner, HiveConfig};
//!
//! let config = HiveConfig::default();
//! let spawner = Arc::new(UnixSocketSpawner::new(config.socket_dir.clone()).expect("ipc dir"));
//! let hive = Hive::start_master(config, spawner);
//!
//! hive.on_online(|w| println!("worker {} online", w.id()));
//! let a = hive.spawn("a", true).await?;
//! a.on("hello", |data| println!("got {data:?}"));
//! # Ok(())
//! # }
//! ```

pub mod handle;
pub mod hive;
mod master;
mod worker;

pub use handle::{Backend, WorkerHandle};
pub use hive::Hive;
pub use master::MasterHive;
pub use worker::WorkerHive;
