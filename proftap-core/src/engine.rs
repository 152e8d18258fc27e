//! Sampling engine boundary.
//!
//! The controller treats the profiler itself as an opaque capability: start
//! continuous CPU sampling, stop it and write the collected profile, snapshot
//! the live heap. [`PprofEngine`] is the production implementation — CPU via
//! the `pprof` crate, heap via `jemalloc_pprof` when the `jemalloc` feature
//! is enabled.

use std::io::Write;

use async_trait::async_trait;
use thiserror::Error;

/// Failures raised at the sampling-engine boundary.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("CPU sampling is already active")]
    AlreadyActive,

    #[error("CPU sampler error: {0}")]
    Cpu(String),

    #[error("heap profiler unavailable: {0}")]
    HeapUnavailable(&'static str),

    #[error("heap snapshot error: {0}")]
    Heap(String),

    #[error("sink write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// The opaque profiling capability behind the controller.
///
/// `stop_cpu` with no capture in flight is a no-op, which keeps a stop
/// retryable after a failed heap snapshot.
#[async_trait]
pub trait SamplingEngine: Send {
    /// Begin continuous CPU sampling. Errors if sampling is already active.
    async fn start_cpu(&mut self) -> Result<(), EngineError>;

    /// Stop CPU sampling and write the collected profile into `sink`.
    async fn stop_cpu(&mut self, sink: &mut (dyn Write + Send)) -> Result<(), EngineError>;

    /// Write one snapshot of the live heap fully into `sink`.
    async fn snapshot_heap(&mut self, sink: &mut (dyn Write + Send)) -> Result<(), EngineError>;
}

/// Production engine: `pprof` CPU sampling, jemalloc heap snapshots.
pub struct PprofEngine {
    frequency: i32,
    guard: Option<pprof::ProfilerGuard<'static>>,
}

impl PprofEngine {
    /// `frequency` is the CPU sampling rate in Hz.
    #[must_use]
    pub fn new(frequency: i32) -> Self {
        Self {
            frequency,
            guard: None,
        }
    }

    #[cfg(feature = "jemalloc")]
    async fn dump_heap(&self) -> Result<Vec<u8>, EngineError> {
        let ctl = jemalloc_pprof::PROF_CTL.as_ref().ok_or(
            EngineError::HeapUnavailable("jemalloc profiling control is not initialized"),
        )?;
        let mut ctl = ctl.lock().await;
        if !ctl.activated() {
            return Err(EngineError::HeapUnavailable(
                "jemalloc heap profiling is not activated",
            ));
        }
        ctl.dump_pprof().map_err(|e| EngineError::Heap(e.to_string()))
    }

    #[cfg(not(feature = "jemalloc"))]
    async fn dump_heap(&self) -> Result<Vec<u8>, EngineError> {
        Err(EngineError::HeapUnavailable(
            "built without the jemalloc feature",
        ))
    }
}

#[async_trait]
impl SamplingEngine for PprofEngine {
    async fn start_cpu(&mut self) -> Result<(), EngineError> {
        if self.guard.is_some() {
            return Err(EngineError::AlreadyActive);
        }
        let guard = pprof::ProfilerGuardBuilder::default()
            .frequency(self.frequency)
            .blocklist(&["libc", "libgcc", "pthread", "vdso"])
            .build()
            .map_err(|e| EngineError::Cpu(e.to_string()))?;
        self.guard = Some(guard);
        Ok(())
    }

    async fn stop_cpu(&mut self, sink: &mut (dyn Write + Send)) -> Result<(), EngineError> {
        use pprof::protos::Message as _;

        // Taking the guard commits the stop: sampling ends even if the
        // report below cannot be built.
        let Some(guard) = self.guard.take() else {
            return Ok(());
        };
        let report = guard
            .report()
            .build()
            .map_err(|e| EngineError::Cpu(e.to_string()))?;
        let profile = report.pprof().map_err(|e| EngineError::Cpu(e.to_string()))?;
        let mut body = Vec::new();
        profile
            .encode(&mut body)
            .map_err(|e| EngineError::Cpu(e.to_string()))?;
        sink.write_all(&body)?;
        sink.flush()?;
        Ok(())
    }

    async fn snapshot_heap(&mut self, sink: &mut (dyn Write + Send)) -> Result<(), EngineError> {
        let body = self.dump_heap().await?;
        sink.write_all(&body)?;
        sink.flush()?;
        Ok(())
    }
}

/// Flip jemalloc's profiling on at runtime (`prof.active`). Call once at
/// startup from the embedding binary; a failure leaves CPU capture usable and
/// only heap snapshots degraded.
#[cfg(feature = "jemalloc")]
pub async fn activate_heap_profiling() -> Result<(), EngineError> {
    let ctl = jemalloc_pprof::PROF_CTL.as_ref().ok_or(
        EngineError::HeapUnavailable("jemalloc profiling control is not initialized"),
    )?;
    let mut ctl = ctl.lock().await;
    ctl.activate().map_err(|e| EngineError::Heap(e.to_string()))
}
