//! Runtime-toggled CPU and heap profiling for long-running processes.
//!
//! A process embeds one [`Controller`]; an operator (or watchdog) then turns
//! capture on and off while the process runs — either toggled manually via
//! `SIGUSR1` or as one fixed-duration capture via `SIGUSR2`. Each session
//! writes a `.profile` (CPU samples, pprof protobuf) and a `.heap` (heap
//! snapshot) file pair.

pub mod config;

pub mod controller;

pub mod dispatcher;

pub mod drivers;

pub mod engine;

pub mod error;

pub mod logging;

pub mod session;

pub mod sink;

pub use config::{Config, ConfigHandle};

pub use controller::Controller;

pub use dispatcher::{ControlEvent, Dispatcher, spawn_signal_source};

pub use engine::{EngineError, PprofEngine, SamplingEngine};

pub use error::ProftapError;

pub use session::{Session, SessionState};

pub use sink::SinkPair;
