//! The two capture protocols built on top of the controller.
//!
//! Both drivers are stateless over a shared [`Controller`] and fail fast:
//! the first operation that errors aborts the remaining steps of that
//! invocation without crashing the caller.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{controller::Controller, error::ProftapError, session::SessionState};

/// Label for manually toggled sessions.
pub const MANUAL_LABEL: &str = "pprof_manual";

/// Label prefix for timed automatic sessions; the configured duration is
/// appended, rendered human-readably (e.g. `pprof_auto_10m`).
pub const AUTO_LABEL_PREFIX: &str = "pprof_auto";

fn auto_label(duration: Duration) -> String {
    let rendered = humantime::format_duration(duration)
        .to_string()
        .replace(' ', "");
    format!("{AUTO_LABEL_PREFIX}_{rendered}")
}

/// Manual toggle: one trigger starts a session when idle, or stops and
/// closes it when active.
///
/// In the transient states (Waiting, Finished) the toggle deliberately does
/// nothing and reports success.
pub async fn manual(controller: &Controller) -> Result<(), ProftapError> {
    match controller.state().await {
        SessionState::Idle => {
            controller.open_sinks(MANUAL_LABEL).await?;
            controller.start_capture().await
        }
        SessionState::Active => {
            controller.stop_capture().await?;
            controller.close_sinks().await
        }
        SessionState::Waiting | SessionState::Finished => Ok(()),
    }
}

/// Timed automatic capture: open, start, wait out the configured duration,
/// stop, close.
///
/// The duration is read from the controller's config once, at entry; a
/// concurrent config change does not affect a wait already in flight. The
/// wait races `shutdown`: on cancellation the session is still stopped and
/// closed — the capture is cut short, never leaked — and
/// [`ProftapError::Cancelled`] is reported.
pub async fn auto(
    controller: &Controller,
    shutdown: &CancellationToken,
) -> Result<(), ProftapError> {
    let duration = controller.config().auto_duration();
    info!(duration = %humantime::format_duration(duration), "automatic capture starting");

    controller.open_sinks(&auto_label(duration)).await?;
    controller.start_capture().await?;

    let cancelled = tokio::select! {
        () = tokio::time::sleep(duration) => false,
        () = shutdown.cancelled() => true,
    };

    controller.stop_capture().await?;
    controller.close_sinks().await?;

    if cancelled {
        info!("automatic capture cut short by shutdown");
        Err(ProftapError::Cancelled)
    } else {
        Ok(())
    }
}
