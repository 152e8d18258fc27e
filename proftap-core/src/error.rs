//! src/error.rs
//! ============================================================================
//! # `ProftapError`: Unified Error Type for the Profiling Controller
//!
//! Every fallible lifecycle operation returns `Result<T, ProftapError>`. Each
//! variant maps to one class of failure from the controller's error taxonomy:
//! invalid transitions, sink acquisition, engine failures, sink release, and
//! cancellation of an in-flight automatic capture.

use std::{io, path::PathBuf};

use thiserror::Error;

use crate::{engine::EngineError, session::SessionState};

/// Unified error type for all profiling lifecycle operations.
#[derive(Debug, Error)]
pub enum ProftapError {
    /// The requested transition is not the next step of the session cycle.
    /// Reported to the caller; the session is never mutated.
    #[error("session state {from} cannot transition to {to}")]
    InvalidTransition {
        from: SessionState,
        to: SessionState,
    },

    /// The output directory could not be resolved (e.g. CWD unavailable).
    #[error("failed to resolve output directory: {source}")]
    OutputDir {
        #[source]
        source: io::Error,
    },

    /// Creating one of the two sink files failed. No sink is retained when
    /// this is returned.
    #[error("failed to create sink file {path:?}: {source}")]
    SinkCreate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The sampling engine refused to start a CPU capture.
    #[error("failed to start CPU capture: {0}")]
    EngineStart(#[source] EngineError),

    /// Stopping the CPU capture or writing the collected profile failed.
    #[error("failed to stop CPU capture: {0}")]
    EngineStop(#[source] EngineError),

    /// The heap snapshot could not be taken or written. The CPU stop is
    /// already committed when this is returned; the stop remains retryable.
    #[error("failed to write heap snapshot: {0}")]
    HeapSnapshot(#[source] EngineError),

    /// Closing one of the sink files failed. Both close attempts always run;
    /// the session keeps both sinks for a retry.
    #[error("failed to close sink file {path:?}: {source}")]
    SinkClose {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An automatic capture was cut short by shutdown during its timed wait.
    /// The session was still stopped and closed before this is returned.
    #[error("automatic capture cancelled during its timed wait")]
    Cancelled,
}
