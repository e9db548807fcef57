// Minimal host entry point: decides whether this process is the master or
// a worker (`workhive_sdk::role::Role::current`), then runs the matching
// main loop. Stands in for the "host program entry point" the core crates
// deliberately leave out of scope. A worker process is always this same
// binary, re-exec'd by `UnixSocketSpawner` with the worker env vars set —
// there is no separate worker binary, mirroring how the listener/worker
// split some process supervisors use is two binaries mostly for historical
// packaging reasons; workhive's spawn collaborator re-execs itself instead.

use clap::Parser;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use workhive::Hive;
use workhive_common::channel::UnixSocketSpawner;
use workhive_common::HiveConfig;
use workhive_sdk::Role;

#[derive(Parser, Debug)]
#[command(name = "workhive-demo", about = "Process-pool supervisor and event bus demo host")]
struct Cli {
    /// Worker IDs to spawn. Repeat the flag for multiple workers. Ignored
    /// on a re-exec'd worker process.
    #[arg(long = "worker", value_name = "ID")]
    workers: Vec<String>,

    /// Mark every worker spawned via `--worker` as keep-alive.
    #[arg(long)]
    keep_alive: bool,
}

fn main() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build Tokio runtime");

    let exit_code = runtime.block_on(run());
    std::process::exit(exit_code);
}

async fn run() -> i32 {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    match Role::current() {
        Role::Master => run_master().await,
        Role::Worker => run_worker().await,
    }
}

async fn run_master() -> i32 {
    let cli = Cli::parse();
    tracing::info!(
        version = workhive_sdk::build_constants::Package::VERSION,
        "workhive master starting"
    );

    let config = HiveConfig::from_env();
    let spawner = match UnixSocketSpawner::new(config.socket_dir.clone()) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            tracing::error!("failed to initialize the child spawner: {e}");
            return 1;
        }
    };

    let hive = Hive::start_master(config, spawner);

    hive.on_online(|worker| {
        tracing::info!(id = worker.id(), "worker online");
    });
    hive.on_exit(|worker, code, signal| {
        tracing::warn!(id = worker.id(), ?code, ?signal, "worker exited");
    });

    for id in &cli.workers {
        match hive.spawn(id, cli.keep_alive).await {
            Ok(_) => tracing::info!(id, "forked worker"),
            Err(e) => tracing::error!(id, "failed to fork worker: {e}"),
        }
    }

    tokio::select! {
        _ = wait_for_shutdown_signal() => {}
        _ = run_stdin_commands(hive.clone()) => {}
    }
    tracing::info!("shutting down");
    0
}

/// Reads newline-delimited commands from stdin so a driver process can
/// exercise a running master without a real client connection: `spawn
/// <id> [keep-alive]`, `exit <id>`, `reboot <id>`, `workers`. Closing
/// stdin (or a `quit` line) ends the loop, letting the shutdown signal
/// take over. Exists for the demo's own process-level tests; nothing in
/// the core crates depends on this protocol.
async fn run_stdin_commands(hive: Arc<Hive>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("spawn") => {
                if let Some(id) = parts.next() {
                    let keep_alive = parts.next() == Some("keep-alive");
                    match hive.spawn(id, keep_alive).await {
                        Ok(_) => println!("spawned {id}"),
                        Err(e) => println!("spawn-failed {id}: {e}"),
                    }
                }
            }
            Some("exit") => {
                if let Some(id) = parts.next() {
                    match hive.worker(id) {
                        Some(w) => {
                            w.exit();
                            println!("exit-requested {id}");
                        }
                        None => println!("exit-failed {id}: unknown worker"),
                    }
                }
            }
            Some("reboot") => {
                if let Some(id) = parts.next() {
                    match hive.worker(id) {
                        Some(w) => {
                            w.reboot();
                            println!("reboot-requested {id}");
                        }
                        None => println!("reboot-failed {id}: unknown worker"),
                    }
                }
            }
            Some("workers") => match hive.get_workers().await {
                Ok(workers) => {
                    let ids: Vec<&str> = workers.iter().map(|w| w.id()).collect();
                    println!("workers {}", ids.join(","));
                }
                Err(e) => println!("workers-failed: {e}"),
            },
            Some("quit") | None => break,
            Some(other) => println!("unknown-command {other}"),
        }
    }
}

async fn run_worker() -> i32 {
    let hive = match Hive::connect_worker().await {
        Ok(hive) => hive,
        Err(e) => {
            tracing::error!("worker failed to connect to master: {e}");
            return 1;
        }
    };

    hive.on_online(|worker| {
        tracing::info!(id = worker.id(), "connected to master");
    });

    // A real workload would register event listeners and drive its own
    // logic here; the demo just stays alive until the master tells it to
    // exit or reboot (both arrive as process-level side effects of
    // `WorkerHandle::exit`/`reboot`, handled inside the worker backend).
    std::future::pending::<()>().await;
    0
}

async fn wait_for_shutdown_signal() {
    let (tx, mut rx) = tokio::sync::mpsc::channel::<()>(1);
    let result = ctrlc::set_handler(move || {
        let _ = tx.try_send(());
    });
    if let Err(e) = result {
        tracing::warn!("failed to install ctrl-c handler, running until killed: {e}");
        std::future::pending::<()>().await;
    }
    let _ = rx.recv().await;
}
