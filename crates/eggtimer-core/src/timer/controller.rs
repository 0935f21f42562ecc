//! Session controller.
//!
//! Owns the countdown engine, the alarm notifier and the one active
//! [`Session`]. Engine messages are the only thing that moves remaining time
//! forward; any message whose run id is not the session's current run is
//! dropped before it can touch state.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use super::engine::{CountdownEngine, EngineMessage, RunId};
use crate::alarm::{AlarmNotifier, AlarmSink, FireOutcome};
use crate::events::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    AwaitingPrecondition,
    AwaitingAlarmChoice,
    Running,
    Completed,
}

/// Externally observed state of the current cook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub requested_secs: u64,
    pub remaining_secs: f64,
    pub progress_fraction: f64,
    pub status: SessionStatus,
    /// `None` until chosen for the current run.
    pub alarm_enabled: Option<bool>,
    pub run_id: Option<RunId>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            requested_secs: 0,
            remaining_secs: 0.0,
            progress_fraction: 0.0,
            status: SessionStatus::Idle,
            alarm_enabled: None,
            run_id: None,
        }
    }
}

pub struct SessionController<S> {
    engine: CountdownEngine,
    inbox: mpsc::UnboundedReceiver<EngineMessage>,
    notifier: AlarmNotifier<S>,
    session: Session,
    /// Run whose `Stopped` acknowledgement is still expected.
    stopping: Option<RunId>,
    outbox: VecDeque<Event>,
}

impl<S: AlarmSink> SessionController<S> {
    pub fn new(sample_period: Duration, notifier: AlarmNotifier<S>) -> Self {
        let (engine, inbox) = CountdownEngine::new(sample_period);
        Self {
            engine,
            inbox,
            notifier,
            session: Session::default(),
            stopping: None,
            outbox: VecDeque::new(),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn status(&self) -> SessionStatus {
        self.session.status
    }

    /// Whole seconds left, rounded down.
    pub fn remaining_secs(&self) -> u64 {
        self.session.remaining_secs.floor() as u64
    }

    pub fn progress_fraction(&self) -> f64 {
        self.session.progress_fraction
    }

    pub fn notifier(&self) -> &AlarmNotifier<S> {
        &self.notifier
    }

    pub fn engine(&self) -> &CountdownEngine {
        &self.engine
    }

    // ── Confirmation bookkeeping ─────────────────────────────────────

    /// Enter the precondition gate. Clears whatever the last run left behind.
    pub fn begin_confirmation(&mut self) -> bool {
        if self.session.status == SessionStatus::Running {
            debug!("confirmation requested while running, ignored");
            return false;
        }
        self.silence();
        self.session = Session {
            status: SessionStatus::AwaitingPrecondition,
            ..Session::default()
        };
        true
    }

    pub fn precondition_met(&mut self) -> bool {
        if self.session.status != SessionStatus::AwaitingPrecondition {
            return false;
        }
        self.session.status = SessionStatus::AwaitingAlarmChoice;
        true
    }

    /// Leave a pending confirmation without starting a run.
    pub fn abandon_confirmation(&mut self) {
        if matches!(
            self.session.status,
            SessionStatus::AwaitingPrecondition | SessionStatus::AwaitingAlarmChoice
        ) {
            self.session.status = SessionStatus::Idle;
        }
    }

    // ── Intents ──────────────────────────────────────────────────────

    /// Start a run of `total_secs` with the alarm preference latched in.
    ///
    /// Returns `None` if a run is already in progress or the engine could
    /// not start; the latter surfaces later as [`Event::EngineFailed`].
    pub fn request_start(&mut self, total_secs: u64, alarm_enabled: bool) -> Option<Event> {
        if self.session.status == SessionStatus::Running {
            debug!("start requested while running, ignored");
            return None;
        }
        self.silence();

        let Some(run_id) = self.engine.start(total_secs, alarm_enabled) else {
            self.session = Session::default();
            return None;
        };
        self.session = Session {
            requested_secs: total_secs,
            remaining_secs: total_secs as f64,
            progress_fraction: 0.0,
            status: SessionStatus::Running,
            alarm_enabled: Some(alarm_enabled),
            run_id: Some(run_id),
        };
        Some(Event::RunStarted {
            run_id,
            total_secs,
            alarm_enabled,
            at: Utc::now(),
        })
    }

    /// Stop the running countdown. Ignored unless running.
    pub fn request_stop(&mut self) -> Option<Event> {
        if self.session.status != SessionStatus::Running {
            debug!(status = ?self.session.status, "stop requested while not running, ignored");
            return None;
        }
        self.halt()
    }

    /// Stop any run, silence the alarm and return to idle.
    pub fn request_reset(&mut self) -> Option<Event> {
        if self.session.status == SessionStatus::Running {
            return self.halt();
        }
        let silenced = self.silence_now();
        self.session = Session::default();
        silenced
    }

    /// Dismiss a completed run.
    pub fn acknowledge_completion(&mut self) -> Option<Event> {
        if self.session.status != SessionStatus::Completed {
            return None;
        }
        let silenced = self.silence_now();
        self.session = Session::default();
        silenced
    }

    // ── Engine messages ──────────────────────────────────────────────

    /// Wait for the next observable event.
    ///
    /// Cancel safe: a message is applied as soon as it is received.
    pub async fn next_event(&mut self) -> Option<Event> {
        loop {
            if let Some(event) = self.outbox.pop_front() {
                return Some(event);
            }
            let message = self.inbox.recv().await?;
            self.apply(message);
        }
    }

    /// Next event that is already available, without waiting.
    pub fn try_next_event(&mut self) -> Option<Event> {
        loop {
            if let Some(event) = self.outbox.pop_front() {
                return Some(event);
            }
            let message = self.inbox.try_recv().ok()?;
            self.apply(message);
        }
    }

    fn apply(&mut self, message: EngineMessage) {
        if let EngineMessage::InitFailed { run_id, reason } = message {
            warn!(%run_id, %reason, "countdown engine failed to start");
            self.outbox.push_back(Event::EngineFailed {
                reason,
                at: Utc::now(),
            });
            return;
        }

        let run_id = message.run_id();
        if self.session.run_id != Some(run_id) {
            if let EngineMessage::Stopped { run_id } = message {
                if self.stopping == Some(run_id) {
                    debug!(%run_id, "engine acknowledged stop");
                    self.stopping = None;
                    return;
                }
            }
            trace!(%run_id, "dropping message from superseded run");
            return;
        }

        match message {
            EngineMessage::Progress {
                remaining_secs,
                progress_fraction,
                ..
            } => {
                if self.session.status != SessionStatus::Running {
                    return;
                }
                self.session.remaining_secs = remaining_secs.min(self.session.remaining_secs);
                self.session.progress_fraction =
                    progress_fraction.max(self.session.progress_fraction);
                self.outbox.push_back(Event::Progress {
                    run_id,
                    remaining_secs: self.remaining_secs(),
                    progress_fraction: self.session.progress_fraction,
                });
            }
            EngineMessage::Completed { alarm_enabled, .. } => {
                if self.session.status != SessionStatus::Running {
                    return;
                }
                self.session.status = SessionStatus::Completed;
                self.session.remaining_secs = 0.0;
                self.session.progress_fraction = 1.0;
                self.outbox.push_back(Event::RunCompleted {
                    run_id,
                    alarm_enabled,
                    at: Utc::now(),
                });
                if alarm_enabled {
                    self.fire_alarm();
                }
            }
            EngineMessage::Stopped { .. } => {
                // Only the engine's own stop path produces this.
                self.session = Session::default();
            }
            EngineMessage::InitFailed { .. } => {}
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Stop the session's run. Always ends a running session with `RunStopped`.
    fn halt(&mut self) -> Option<Event> {
        let stopped = self.engine.stop();
        self.stopping = stopped;
        if let (None, Some(run_id)) = (stopped, self.session.run_id) {
            // The sampler finished first; its queued `Completed` is now stale.
            debug!(%run_id, "stop overtook an unread completion");
        }
        let ended = stopped.or(self.session.run_id);
        self.silence();
        self.session = Session::default();
        ended.map(|run_id| Event::RunStopped {
            run_id,
            at: Utc::now(),
        })
    }

    fn fire_alarm(&mut self) {
        match self.notifier.fire() {
            FireOutcome::Started => self.outbox.push_back(Event::AlarmFired { at: Utc::now() }),
            FireOutcome::AlreadyFiring => {}
            FireOutcome::Failed(err) => self.outbox.push_back(Event::AlarmFailed {
                reason: err.to_string(),
                at: Utc::now(),
            }),
        }
    }

    fn silence_now(&mut self) -> Option<Event> {
        self.notifier
            .silence()
            .then(|| Event::AlarmSilenced { at: Utc::now() })
    }

    fn silence(&mut self) {
        if let Some(event) = self.silence_now() {
            self.outbox.push_back(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AlarmError;

    #[derive(Debug, Default)]
    struct CountingSink {
        plays: u32,
        stops: u32,
        fail: bool,
    }

    impl AlarmSink for CountingSink {
        fn play(&mut self) -> Result<(), AlarmError> {
            if self.fail {
                return Err(AlarmError::Unavailable("muted".into()));
            }
            self.plays += 1;
            Ok(())
        }

        fn stop(&mut self) {
            self.stops += 1;
        }

        fn rewind(&mut self) {}
    }

    fn controller() -> SessionController<CountingSink> {
        SessionController::new(
            Duration::from_millis(100),
            AlarmNotifier::new(CountingSink::default()),
        )
    }

    fn drain<S: AlarmSink>(ctl: &mut SessionController<S>) -> Vec<Event> {
        std::iter::from_fn(|| ctl.try_next_event()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn completion_fires_alarm_once() {
        let mut ctl = controller();
        assert!(matches!(
            ctl.request_start(3, true),
            Some(Event::RunStarted { total_secs: 3, .. })
        ));

        tokio::time::sleep(Duration::from_secs(5)).await;
        let events = drain(&mut ctl);
        let completed = events
            .iter()
            .filter(|e| matches!(e, Event::RunCompleted { .. }))
            .count();
        assert_eq!(completed, 1);
        assert!(matches!(events.last(), Some(Event::AlarmFired { .. })));
        assert_eq!(ctl.status(), SessionStatus::Completed);
        assert_eq!(ctl.remaining_secs(), 0);
        assert_eq!(ctl.progress_fraction(), 1.0);
        assert_eq!(ctl.notifier().sink().plays, 1);

        assert!(matches!(
            ctl.acknowledge_completion(),
            Some(Event::AlarmSilenced { .. })
        ));
        assert_eq!(ctl.status(), SessionStatus::Idle);
        assert_eq!(ctl.notifier().sink().stops, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_alarm_never_touches_the_sink() {
        let mut ctl = controller();
        ctl.request_start(1, false).unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;

        let events = drain(&mut ctl);
        assert!(events.iter().any(|e| matches!(
            e,
            Event::RunCompleted { alarm_enabled: false, .. }
        )));
        assert_eq!(ctl.status(), SessionStatus::Completed);
        assert_eq!(ctl.acknowledge_completion(), None);
        assert_eq!(ctl.notifier().sink().plays, 0);
        assert_eq!(ctl.notifier().sink().stops, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_drops_in_flight_messages() {
        let mut ctl = controller();
        let Some(Event::RunStarted { run_id, .. }) = ctl.request_start(10, true) else {
            panic!("Expected RunStarted");
        };

        // Let the sampler queue progress that the controller has not read.
        tokio::time::sleep(Duration::from_secs(2)).await;
        let stopped = ctl.request_stop();
        assert!(matches!(stopped, Some(Event::RunStopped { run_id: id, .. }) if id == run_id));
        assert_eq!(ctl.status(), SessionStatus::Idle);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(drain(&mut ctl), Vec::new());
        assert_eq!(ctl.remaining_secs(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_after_unread_completion_still_ends_the_run() {
        let mut ctl = controller();
        let Some(Event::RunStarted { run_id, .. }) = ctl.request_start(3, true) else {
            panic!("Expected RunStarted");
        };

        // The sampler completes while the controller is not reading.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!ctl.engine().is_running());

        let stopped = ctl.request_stop();
        assert!(matches!(stopped, Some(Event::RunStopped { run_id: id, .. }) if id == run_id));
        assert_eq!(ctl.status(), SessionStatus::Idle);
        assert_eq!(drain(&mut ctl), Vec::new());
        assert_eq!(ctl.notifier().sink().plays, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_after_unread_completion_still_ends_the_run() {
        let mut ctl = controller();
        ctl.request_start(2, true).unwrap();
        tokio::time::sleep(Duration::from_secs(4)).await;

        assert!(matches!(ctl.request_reset(), Some(Event::RunStopped { .. })));
        assert_eq!(drain(&mut ctl), Vec::new());
        assert_eq!(ctl.status(), SessionStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn progress_updates_remaining_time() {
        let mut ctl = controller();
        ctl.request_start(300, true).unwrap();
        tokio::time::sleep(Duration::from_secs(150)).await;
        drain(&mut ctl);

        let remaining = ctl.session().remaining_secs;
        assert!((remaining - 150.0).abs() <= 0.1 + f64::EPSILON);
        assert!((ctl.progress_fraction() - 0.5).abs() < 0.001);
        assert_eq!(ctl.status(), SessionStatus::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn start_while_running_is_ignored() {
        let mut ctl = controller();
        ctl.request_start(30, true).unwrap();
        assert_eq!(ctl.request_start(5, false), None);
        assert_eq!(ctl.session().requested_secs, 30);
        assert_eq!(ctl.session().alarm_enabled, Some(true));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_playback_still_completes() {
        let mut ctl = SessionController::new(
            Duration::from_millis(100),
            AlarmNotifier::new(CountingSink {
                fail: true,
                ..CountingSink::default()
            }),
        );
        ctl.request_start(1, true).unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;

        let events = drain(&mut ctl);
        assert!(matches!(events.last(), Some(Event::AlarmFailed { .. })));
        assert_eq!(ctl.status(), SessionStatus::Completed);
        assert_eq!(ctl.acknowledge_completion(), None);
        assert_eq!(ctl.status(), SessionStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_silences_a_ringing_alarm() {
        let mut ctl = controller();
        ctl.request_start(1, true).unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        drain(&mut ctl);
        assert!(ctl.notifier().is_firing());

        assert!(matches!(ctl.request_reset(), Some(Event::AlarmSilenced { .. })));
        assert!(!ctl.notifier().is_firing());
        assert_eq!(ctl.status(), SessionStatus::Idle);
    }

    #[test]
    fn engine_failure_surfaces_once_and_stays_idle() {
        let mut ctl = controller();
        assert_eq!(ctl.request_start(10, true), None);
        assert_eq!(ctl.status(), SessionStatus::Idle);

        let events = drain(&mut ctl);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Event::EngineFailed { .. }));
        assert_eq!(drain(&mut ctl), Vec::new());
    }

    #[test]
    fn confirmation_bookkeeping() {
        let mut ctl = controller();
        assert!(!ctl.precondition_met());
        assert!(ctl.begin_confirmation());
        assert_eq!(ctl.status(), SessionStatus::AwaitingPrecondition);
        assert!(ctl.precondition_met());
        assert_eq!(ctl.status(), SessionStatus::AwaitingAlarmChoice);
        ctl.abandon_confirmation();
        assert_eq!(ctl.status(), SessionStatus::Idle);
    }
}
