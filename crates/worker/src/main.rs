// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Foreman worker daemon (fmd)
//!
//! Pulls jobs from the distributed queue and runs them through the
//! execution engine. Exit codes: 0 on normal shutdown, 1 on an
//! unrecoverable startup failure, 130 when interrupted by a signal.

use fm_adapters::AgentRegistry;
use fm_storage::{EventStore, PersistenceAdapter, RedisEventStore, RedisPersistence};
use fm_worker::{JobQueue, RedisJobQueue, WorkerConfig, WorkerNode};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("fmd {}", env!("CARGO_PKG_VERSION"));
                return;
            }
            "--help" | "-h" | "help" => {
                println!("fmd {}", env!("CARGO_PKG_VERSION"));
                println!("Foreman worker daemon - processes execution jobs from the queue");
                println!();
                println!("USAGE:");
                println!("    fmd");
                println!();
                println!("CONFIGURATION:");
                println!("    ~/.config/foreman/config.toml (override with FM_CONFIG)");
                println!("    FM_REDIS_URL overrides the configured Redis URL");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return;
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: fmd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    setup_logging();

    let config = match WorkerConfig::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("fmd: failed to load configuration: {err}");
            std::process::exit(1);
        }
    };

    info!(redis_url = %config.redis_url, "starting worker daemon");

    let queue: Arc<dyn JobQueue> = match RedisJobQueue::connect(&config.redis_url).await {
        Ok(queue) => Arc::new(queue),
        Err(err) => {
            eprintln!("fmd: failed to connect to queue at {}: {err}", config.redis_url);
            std::process::exit(1);
        }
    };
    let event_store: Arc<dyn EventStore> = match RedisEventStore::connect(&config.redis_url).await
    {
        Ok(store) => Arc::new(store),
        Err(err) => {
            eprintln!("fmd: failed to connect to event store: {err}");
            std::process::exit(1);
        }
    };
    let persistence: Arc<dyn PersistenceAdapter> =
        match RedisPersistence::connect(&config.redis_url).await {
            Ok(persistence) => Arc::new(persistence),
            Err(err) => {
                eprintln!("fmd: failed to connect to persistence: {err}");
                std::process::exit(1);
            }
        };

    let registry = AgentRegistry::with_defaults();
    let worker = WorkerNode::new(queue, registry, event_store, persistence, config);

    // Graceful shutdown on SIGINT/SIGTERM; remember whether a signal
    // caused the exit for the 130 exit code.
    let interrupted = Arc::new(AtomicBool::new(false));
    let shutdown = worker.shutdown_handle();
    {
        let interrupted = Arc::clone(&interrupted);
        tokio::spawn(async move {
            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(s) => s,
                Err(err) => {
                    error!(error = %err, "failed to install SIGTERM handler");
                    return;
                }
            };
            let mut sigint = match signal(SignalKind::interrupt()) {
                Ok(s) => s,
                Err(err) => {
                    error!(error = %err, "failed to install SIGINT handler");
                    return;
                }
            };

            tokio::select! {
                _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
                _ = sigint.recv() => info!("received SIGINT, shutting down"),
            }
            interrupted.store(true, Ordering::SeqCst);
            shutdown.cancel();
        });
    }

    if let Err(err) = worker.run().await {
        error!(error = %err, "worker exited with error");
        std::process::exit(1);
    }

    if interrupted.load(Ordering::SeqCst) {
        std::process::exit(130);
    }
}

fn setup_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
