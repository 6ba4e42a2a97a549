//! Ticker simulation
//!
//! Seeds the configured catalogue, runs the engine on a current-thread
//! tokio runtime and logs quotes until ctrl-c or `--duration-secs`. The
//! state is persisted on the way out.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use ticker_bins::common::{init_logging, log_snapshot, print_stats, CommonArgs};
use ticker_core::monitoring::MemoryMonitor;
use ticker_core::resilience::install_panic_handler;
use ticker_core::utils::format_duration;
use ticker_core::{EngineConfig, EngineService, TickerStore, TokioClock};
use tokio::sync::Notify;

/// How often quotes are logged
const STATUS_INTERVAL: Duration = Duration::from_secs(10);

fn main() -> Result<()> {
    // Parse CLI arguments
    let args = CommonArgs::parse();
    let config = args.load_config()?;

    // Initialize logging
    init_logging(&config)?;

    // Install panic handler
    install_panic_handler();

    tracing::info!("=== Ticker Simulation ===");
    tracing::info!("Instruments: {}", config.stocks.len());
    tracing::info!("Update interval: {}ms", config.update_interval_ms);

    // Ctrl-c stores a permit, so a signal before the loop starts is kept
    let shutdown = Arc::new(Notify::new());
    let signal = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        tracing::info!("Received shutdown signal");
        signal.notify_one();
    })
    .context("Failed to install ctrl-c handler")?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    runtime.block_on(run(config, args, shutdown))
}

async fn run(config: EngineConfig, args: CommonArgs, shutdown: Arc<Notify>) -> Result<()> {
    let started = Instant::now();

    let mut store = TickerStore::from_config(config.clone(), Arc::new(TokioClock::new()))?;
    if args.restore {
        match store.load_state_from_storage() {
            Ok(()) => tracing::info!("Restored persisted state"),
            Err(e) => tracing::warn!("Starting from seed catalogue: {}", e),
        }
    }

    let monitor = config
        .memory
        .enabled
        .then(|| MemoryMonitor::for_process(config.memory));

    let (handle, task) = EngineService::spawn(store, monitor);
    tracing::info!("Engine running, press ctrl-c to stop");

    let deadline = async {
        match args.duration_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    let mut status = tokio::time::interval(STATUS_INTERVAL);
    loop {
        tokio::select! {
            _ = shutdown.notified() => break,
            _ = &mut deadline => {
                tracing::info!("Run duration reached");
                break;
            }
            _ = status.tick() => log_snapshot(&handle.snapshot()),
        }
    }

    if let Err(e) = handle.save_state().await {
        tracing::warn!("Failed to persist state on exit: {}", e);
    }

    let last = handle.shutdown().await?;
    task.await.context("Engine task failed")?;

    print_stats(&last, &format_duration(started.elapsed()));
    Ok(())
}
