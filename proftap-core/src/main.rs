//! proftap daemon: a minimal host process wiring the profiling controller to
//! Unix signals.
//!
//! Send `SIGUSR1` to toggle a manual capture, `SIGUSR2` to run one timed
//! capture. `Ctrl-C` shuts down gracefully, cutting short any automatic
//! capture still waiting; `SIGTERM` keeps its default disposition.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use proftap_core::{
    Config, ConfigHandle, Controller, Dispatcher, PprofEngine, logging, spawn_signal_source,
};

#[cfg(feature = "jemalloc")]
#[global_allocator]
static ALLOC: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[cfg(feature = "jemalloc")]
#[allow(non_upper_case_globals)]
#[unsafe(export_name = "malloc_conf")]
pub static malloc_conf: &[u8] = b"prof:true,prof_active:true,lg_prof_sample:19\0";

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_tracing("info")?;

    let config = Config::load().await.context("failed to load configuration")?;
    let handle = ConfigHandle::new(config);

    #[cfg(feature = "jemalloc")]
    if let Err(err) = proftap_core::engine::activate_heap_profiling().await {
        warn!(error = %err, "heap snapshots degraded");
    }

    let engine = PprofEngine::new(handle.get().cpu_frequency_hz);
    let controller = Arc::new(Controller::new(Box::new(engine), handle));

    let shutdown = CancellationToken::new();
    let (event_tx, event_rx) = mpsc::channel(1);
    let signal_task = spawn_signal_source(event_tx, shutdown.clone())
        .context("failed to install signal handlers")?;
    let dispatcher = Dispatcher::new(Arc::clone(&controller), event_rx, shutdown.clone());
    let dispatcher_task = tokio::spawn(dispatcher.run());

    info!(
        pid = std::process::id(),
        "proftap ready: SIGUSR1 toggles manual capture, SIGUSR2 runs one timed capture"
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to wait for interrupt")?;
    info!("interrupt received, shutting down");
    shutdown.cancel();

    dispatcher_task.await.context("dispatcher task failed")?;
    signal_task.await.context("signal task failed")?;

    info!("shutdown complete");
    Ok(())
}
