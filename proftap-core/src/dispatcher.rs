//! Control-event dispatch.
//!
//! A single background task consumes named control events and runs the
//! matching driver to completion before the next event — the dispatcher is
//! the serializer over all event-triggered lifecycle operations. Driver
//! errors are logged and never stop the loop.

use std::{io, sync::Arc};

use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{controller::Controller, drivers};

/// The two named control events understood by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// Start a session when idle, stop and flush it when active.
    ManualToggle,
    /// Run one complete fixed-duration capture.
    AutoStart,
}

/// Background listener translating control events into driver invocations.
pub struct Dispatcher {
    controller: Arc<Controller>,
    events: mpsc::Receiver<ControlEvent>,
    shutdown: CancellationToken,
}

impl Dispatcher {
    #[must_use]
    pub fn new(
        controller: Arc<Controller>,
        events: mpsc::Receiver<ControlEvent>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            controller,
            events,
            shutdown,
        }
    }

    /// Consume events until shutdown is requested or all senders drop.
    pub async fn run(mut self) {
        info!("dispatcher listening for control events");
        loop {
            let event = tokio::select! {
                () = self.shutdown.cancelled() => {
                    info!("dispatcher shutting down");
                    return;
                }
                event = self.events.recv() => match event {
                    Some(event) => event,
                    None => {
                        info!("control event channel closed, dispatcher exiting");
                        return;
                    }
                },
            };

            let result = match event {
                ControlEvent::ManualToggle => drivers::manual(&self.controller).await,
                ControlEvent::AutoStart => {
                    drivers::auto(&self.controller, &self.shutdown).await
                }
            };
            if let Err(err) = result {
                error!(?event, error = %err, "control event failed");
            }
        }
    }
}

/// Forward `SIGUSR1` (manual toggle) and `SIGUSR2` (auto capture) into the
/// dispatcher's event channel.
///
/// Signals arriving while the channel is full are dropped, mirroring how an
/// unserviced OS signal is lost rather than queued. Termination signals are
/// deliberately not installed here — they keep their default disposition.
pub fn spawn_signal_source(
    events: mpsc::Sender<ControlEvent>,
    shutdown: CancellationToken,
) -> io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut usr1 = signal(SignalKind::user_defined1())?;
    let mut usr2 = signal(SignalKind::user_defined2())?;

    Ok(tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                () = shutdown.cancelled() => return,
                received = usr1.recv() => match received {
                    Some(()) => ControlEvent::ManualToggle,
                    None => return,
                },
                received = usr2.recv() => match received {
                    Some(()) => ControlEvent::AutoStart,
                    None => return,
                },
            };
            match events.try_send(event) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(event)) => {
                    debug!(?event, "dispatcher busy, dropping control event");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => return,
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::controller::testing::mock_controller;
    use crate::session::SessionState;

    #[tokio::test]
    async fn test_events_run_drivers_serially_until_channel_closes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (controller, _) = mock_controller(dir.path());
        let (tx, rx) = mpsc::channel(8);
        let dispatcher = Dispatcher::new(Arc::clone(&controller), rx, CancellationToken::new());
        let handle = tokio::spawn(dispatcher.run());

        tx.send(ControlEvent::ManualToggle).await.expect("send");
        tx.send(ControlEvent::ManualToggle).await.expect("send");
        drop(tx);
        handle.await.expect("dispatcher task");

        assert_eq!(controller.state().await, SessionState::Idle);
        let produced = fs::read_dir(dir.path()).expect("read dir").count();
        assert_eq!(produced, 2, "one .profile and one .heap");
    }

    #[tokio::test]
    async fn test_driver_errors_do_not_stop_the_loop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (controller, controls) = mock_controller(dir.path());
        controls.fail_start.store(true, Ordering::Relaxed);

        let (tx, rx) = mpsc::channel(8);
        let dispatcher = Dispatcher::new(Arc::clone(&controller), rx, CancellationToken::new());
        let handle = tokio::spawn(dispatcher.run());

        // First auto fails at start_capture and strands the session in
        // Waiting; the second fails again at open_sinks. Both are logged,
        // neither kills the loop.
        tx.send(ControlEvent::AutoStart).await.expect("send");
        tx.send(ControlEvent::AutoStart).await.expect("send");
        drop(tx);
        handle.await.expect("dispatcher task");

        assert_eq!(controller.state().await, SessionState::Waiting);
    }

    #[tokio::test]
    async fn test_cancellation_ends_the_loop_with_senders_alive() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (controller, _) = mock_controller(dir.path());
        let (tx, rx) = mpsc::channel::<ControlEvent>(8);
        let shutdown = CancellationToken::new();
        let dispatcher = Dispatcher::new(controller, rx, shutdown.clone());
        let handle = tokio::spawn(dispatcher.run());

        shutdown.cancel();
        handle.await.expect("dispatcher task");
        drop(tx);
    }
}
