//! src/controller.rs
//! ============================================================================
//! # Controller: Profiling Session Lifecycle Operations
//!
//! Owns the single [`Session`] and exposes the four lifecycle operations,
//! each of which performs exactly one legal state transition plus one side
//! effect against the sink pair and/or the sampling engine:
//!
//! ```text
//! open_sinks    Idle     -> Waiting   create both sink files
//! start_capture Waiting  -> Active    begin CPU sampling
//! stop_capture  Active   -> Finished  stop CPU sampling, snapshot heap
//! close_sinks   Finished -> Idle      flush and release both sinks
//! ```
//!
//! The session lives behind a `tokio::sync::Mutex`, so concurrent direct
//! calls and dispatcher-triggered calls cannot tear a transition. Every
//! operation validates against the state machine before mutating and leaves
//! the session consistent on both success and failure.

use std::env;

use chrono::Local;
use tokio::sync::Mutex;
use tracing::info;

use crate::{
    config::ConfigHandle,
    engine::SamplingEngine,
    error::ProftapError,
    session::{Session, SessionState},
    sink::SinkPair,
};

/// Sortable local date-time stamp shared by both files of a pair.
const STAMP_FORMAT: &str = "%Y%m%d%H%M%S";

struct Inner {
    session: Session,
    engine: Box<dyn SamplingEngine>,
}

/// The process-wide profiling controller. Construct exactly one and share it
/// (`Arc`) between the event dispatcher and any direct callers.
pub struct Controller {
    inner: Mutex<Inner>,
    config: ConfigHandle,
}

impl Controller {
    #[must_use]
    pub fn new(engine: Box<dyn SamplingEngine>, config: ConfigHandle) -> Self {
        Self {
            inner: Mutex::new(Inner {
                session: Session::new(),
                engine,
            }),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ConfigHandle {
        &self.config
    }

    /// Current session state at the time of the call.
    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.session.state()
    }

    /// Idle → Waiting: create the sink pair for a new capture session.
    ///
    /// File names are `<label>_<stamp>.profile` / `<label>_<stamp>.heap`,
    /// sharing one timestamp, in the configured output directory (process
    /// CWD by default). On any failure the session is untouched and no sink
    /// is retained.
    pub async fn open_sinks(&self, label: &str) -> Result<(), ProftapError> {
        let mut inner = self.inner.lock().await;
        inner.session.check_next(SessionState::Waiting)?;

        let dir = match self.config.get().output_dir.clone() {
            Some(dir) => dir,
            None => env::current_dir().map_err(|source| ProftapError::OutputDir { source })?,
        };
        let stamp = Local::now().format(STAMP_FORMAT).to_string();
        let sinks = SinkPair::create(&dir, label, &stamp)?;

        info!(path = %sinks.profile_path().display(), "profile sink created");
        info!(path = %sinks.heap_path().display(), "heap sink created");
        inner.session = Session::Waiting(sinks);
        Ok(())
    }

    /// Waiting → Active: start continuous CPU sampling.
    ///
    /// An engine failure aborts the transition; the session stays Waiting
    /// with its sinks.
    pub async fn start_capture(&self) -> Result<(), ProftapError> {
        let mut inner = self.inner.lock().await;
        let Inner { session, engine } = &mut *inner;

        let sinks = session.take_sinks(SessionState::Active)?;
        match engine.start_cpu().await {
            Ok(()) => {
                *session = Session::Active(sinks);
                info!("capture started");
                Ok(())
            }
            Err(err) => {
                *session = Session::Waiting(sinks);
                Err(ProftapError::EngineStart(err))
            }
        }
    }

    /// Active → Finished: stop CPU sampling, write the collected profile,
    /// then write one heap snapshot.
    ///
    /// The CPU stop is committed once issued and cannot be rolled back; if
    /// the profile write or the heap snapshot fails, the session stays
    /// Active and the stop can be retried (the engine treats a stop with no
    /// capture in flight as a no-op).
    pub async fn stop_capture(&self) -> Result<(), ProftapError> {
        let mut inner = self.inner.lock().await;
        let Inner { session, engine } = &mut *inner;

        let mut sinks = session.take_sinks(SessionState::Finished)?;
        if let Err(err) = engine.stop_cpu(sinks.profile_file()).await {
            *session = Session::Active(sinks);
            return Err(ProftapError::EngineStop(err));
        }
        if let Err(err) = engine.snapshot_heap(sinks.heap_file()).await {
            *session = Session::Active(sinks);
            return Err(ProftapError::HeapSnapshot(err));
        }

        *session = Session::Finished(sinks);
        info!("capture stopped");
        Ok(())
    }

    /// Finished → Idle: flush and release both sinks.
    ///
    /// Both close attempts run even if the first fails; on any failure the
    /// session stays Finished with both sinks retained for a retry.
    pub async fn close_sinks(&self) -> Result<(), ProftapError> {
        let mut inner = self.inner.lock().await;

        let mut sinks = inner.session.take_sinks(SessionState::Idle)?;
        match sinks.close() {
            Ok(()) => {
                info!(
                    profile = %sinks.profile_path().display(),
                    heap = %sinks.heap_path().display(),
                    "sinks closed"
                );
                Ok(())
            }
            Err(err) => {
                inner.session = Session::Finished(sinks);
                Err(err)
            }
        }
    }

    #[cfg(test)]
    pub(crate) async fn force_session(&self, session: Session) {
        self.inner.lock().await.session = session;
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::{path::Path, sync::Arc, time::Duration};

    use crate::{
        config::{Config, ConfigHandle},
        engine::mock::{MockControls, MockEngine},
    };

    use super::Controller;

    /// Controller backed by a mock engine writing into `dir`.
    pub(crate) fn mock_controller(dir: &Path) -> (Arc<Controller>, MockControls) {
        mock_controller_with_duration(dir, Duration::ZERO)
    }

    pub(crate) fn mock_controller_with_duration(
        dir: &Path,
        auto_duration: Duration,
    ) -> (Arc<Controller>, MockControls) {
        let config = Config {
            output_dir: Some(dir.to_path_buf()),
            auto_duration,
            ..Config::default()
        };
        let (engine, controls) = MockEngine::new();
        let controller = Arc::new(Controller::new(
            Box::new(engine),
            ConfigHandle::new(config),
        ));
        (controller, controls)
    }
}

#[cfg(test)]
mod tests {
    use std::fs::{self, File};
    use std::path::PathBuf;
    use std::sync::atomic::Ordering;

    use super::testing::mock_controller;
    use super::*;

    fn files_with_extension(dir: &std::path::Path, ext: &str) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)
            .expect("read dir")
            .map(|entry| entry.expect("entry").path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some(ext))
            .collect();
        paths.sort();
        paths
    }

    #[tokio::test]
    async fn test_fresh_controller_is_idle() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (controller, _) = mock_controller(dir.path());
        assert_eq!(controller.state().await, SessionState::Idle);
    }

    #[tokio::test]
    async fn test_full_cycle_ends_idle_with_both_files_on_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (controller, _) = mock_controller(dir.path());

        controller.open_sinks("pprof_manual").await.expect("open");
        assert_eq!(controller.state().await, SessionState::Waiting);

        controller.start_capture().await.expect("start");
        assert_eq!(controller.state().await, SessionState::Active);

        controller.stop_capture().await.expect("stop");
        assert_eq!(controller.state().await, SessionState::Finished);

        controller.close_sinks().await.expect("close");
        assert_eq!(controller.state().await, SessionState::Idle);

        let profiles = files_with_extension(dir.path(), "profile");
        let heaps = files_with_extension(dir.path(), "heap");
        assert_eq!(profiles.len(), 1);
        assert_eq!(heaps.len(), 1);
        assert_eq!(
            fs::read(&profiles[0]).expect("read profile"),
            b"mock cpu profile\n"
        );
        assert_eq!(
            fs::read(&heaps[0]).expect("read heap"),
            b"mock heap snapshot\n"
        );
    }

    #[tokio::test]
    async fn test_both_file_names_share_one_stamp() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (controller, _) = mock_controller(dir.path());

        controller.open_sinks("pprof_manual").await.expect("open");

        let profiles = files_with_extension(dir.path(), "profile");
        let heaps = files_with_extension(dir.path(), "heap");
        assert_eq!(profiles[0].file_stem(), heaps[0].file_stem());
        let stem = profiles[0]
            .file_stem()
            .and_then(|s| s.to_str())
            .expect("stem");
        let stamp = stem.strip_prefix("pprof_manual_").expect("label prefix");
        assert_eq!(stamp.len(), 14);
        assert!(stamp.chars().all(|c| c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn test_operations_reject_off_cycle_states() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (controller, _) = mock_controller(dir.path());

        // Everything except open_sinks is illegal from Idle.
        assert!(matches!(
            controller.start_capture().await,
            Err(ProftapError::InvalidTransition { .. })
        ));
        assert!(matches!(
            controller.stop_capture().await,
            Err(ProftapError::InvalidTransition { .. })
        ));
        assert!(matches!(
            controller.close_sinks().await,
            Err(ProftapError::InvalidTransition { .. })
        ));

        controller.open_sinks("x").await.expect("open");
        assert!(matches!(
            controller.open_sinks("x").await,
            Err(ProftapError::InvalidTransition { .. })
        ));
        assert_eq!(controller.state().await, SessionState::Waiting);
    }

    #[tokio::test]
    async fn test_open_sinks_failure_leaves_session_untouched() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (controller, _) = mock_controller(&dir.path().join("missing"));

        let err = controller.open_sinks("x").await.expect_err("must fail");
        assert!(matches!(err, ProftapError::SinkCreate { .. }));
        assert_eq!(controller.state().await, SessionState::Idle);
    }

    #[tokio::test]
    async fn test_engine_start_failure_keeps_waiting() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (controller, controls) = mock_controller(dir.path());

        controller.open_sinks("x").await.expect("open");
        controls.fail_start.store(true, Ordering::Relaxed);

        let err = controller.start_capture().await.expect_err("must fail");
        assert!(matches!(err, ProftapError::EngineStart(_)));
        assert_eq!(controller.state().await, SessionState::Waiting);

        controls.fail_start.store(false, Ordering::Relaxed);
        controller.start_capture().await.expect("retry");
        assert_eq!(controller.state().await, SessionState::Active);
    }

    #[tokio::test]
    async fn test_heap_failure_keeps_active_and_stop_is_retryable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (controller, controls) = mock_controller(dir.path());

        controller.open_sinks("x").await.expect("open");
        controller.start_capture().await.expect("start");
        controls.fail_heap.store(true, Ordering::Relaxed);

        let err = controller.stop_capture().await.expect_err("must fail");
        assert!(matches!(err, ProftapError::HeapSnapshot(_)));
        assert_eq!(controller.state().await, SessionState::Active);

        controls.fail_heap.store(false, Ordering::Relaxed);
        controller.stop_capture().await.expect("retry");
        assert_eq!(controller.state().await, SessionState::Finished);

        // The retried stop went through the engine again, as a no-op.
        assert_eq!(controls.stops.load(Ordering::Relaxed), 2);
        controller.close_sinks().await.expect("close");

        let profiles = files_with_extension(dir.path(), "profile");
        assert_eq!(
            fs::read(&profiles[0]).expect("read"),
            b"mock cpu profile\n",
            "profile written once despite the retry"
        );
    }

    #[tokio::test]
    async fn test_close_failure_keeps_finished_with_sinks_retained() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (controller, _) = mock_controller(dir.path());

        let proc_path = PathBuf::from("/proc/self/status");
        let proc_file = File::open(&proc_path).expect("open proc");
        let heap_path = dir.path().join("x_1.heap");
        let heap_file = File::create(&heap_path).expect("create heap");
        let pair = SinkPair::from_parts((proc_file, proc_path), (heap_file, heap_path));
        controller.force_session(Session::Finished(pair)).await;

        let err = controller.close_sinks().await.expect_err("must fail");
        assert!(matches!(err, ProftapError::SinkClose { .. }));
        assert_eq!(controller.state().await, SessionState::Finished);
    }
}
