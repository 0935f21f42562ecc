//! Gatekeeper - confirmation gates around every cook
//!
//! The gatekeeper is the intent surface of the timer. It wraps the
//! [`SessionController`] so that no run starts without the boiling check and
//! an alarm choice, and no completion or reset goes unacknowledged.
//!
//! ## States
//!
//! ```text
//!  Idle ─start─► AwaitingBoilConfirm ─yes─► AwaitingAlarmChoice ─choice─► Running
//!   ▲                  │ no                                                │ completed
//!   │                  ▼                                                   ▼
//!   ├──ack──── BoilWarningShown                          AlarmShown ◄──────┘
//!   └──────────────────────────────────ack─────────────────────┘
//!
//!  Running / Idle (time left) ─reset─► AwaitingResetConfirm ─yes─► Idle
//!                                                          └─no──► prior state
//! ```
//!
//! The boiling check is asked before every run; nothing is carried over from
//! the previous one except the remembered default for the alarm dialog.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::controller::{SessionController, SessionStatus};
use super::duration::{DurationTable, Hardness, Selection, Size, Temperature};
use crate::alarm::AlarmSink;
use crate::events::Event;

/// Confirmation dialog a front end should be showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialog {
    /// "Is the water boiling?"
    BoilCheck,
    /// "Wait for the water to boil first."
    BoilWarning,
    /// "Play an alarm when done?"
    AlarmChoice,
    /// "Your eggs are ready."
    AlarmNotice,
    /// "Reset the timer?"
    ResetConfirm,
}

/// Where a reset confirmation returns to when cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetOrigin {
    Idle,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GateState {
    Idle,
    AwaitingBoilConfirm,
    BoilWarningShown,
    AwaitingAlarmChoice,
    Running,
    AlarmShown,
    AwaitingResetConfirm { prior: ResetOrigin },
}

impl GateState {
    pub fn dialog(self) -> Option<Dialog> {
        match self {
            GateState::Idle | GateState::Running => None,
            GateState::AwaitingBoilConfirm => Some(Dialog::BoilCheck),
            GateState::BoilWarningShown => Some(Dialog::BoilWarning),
            GateState::AwaitingAlarmChoice => Some(Dialog::AlarmChoice),
            GateState::AlarmShown => Some(Dialog::AlarmNotice),
            GateState::AwaitingResetConfirm { .. } => Some(Dialog::ResetConfirm),
        }
    }
}

impl From<ResetOrigin> for GateState {
    fn from(origin: ResetOrigin) -> Self {
        match origin {
            ResetOrigin::Idle => GateState::Idle,
            ResetOrigin::Running => GateState::Running,
        }
    }
}

/// Gatekeeper - intent surface and confirmation state machine
pub struct Gatekeeper<S> {
    state: GateState,
    selection: Selection,
    table: DurationTable,
    controller: SessionController<S>,
    remembered_alarm: Option<bool>,
}

impl<S: AlarmSink> Gatekeeper<S> {
    pub fn new(table: DurationTable, controller: SessionController<S>) -> Self {
        Self {
            state: GateState::Idle,
            selection: Selection::default(),
            table,
            controller,
            remembered_alarm: None,
        }
    }

    /// Seed the default answer of the alarm dialog, e.g. from storage.
    pub fn with_remembered_alarm(mut self, choice: Option<bool>) -> Self {
        self.remembered_alarm = choice;
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn dialog(&self) -> Option<Dialog> {
        self.state.dialog()
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    /// Countdown length for the current selection.
    pub fn duration_secs(&self) -> u64 {
        self.table.resolve(&self.selection)
    }

    /// Suggested answer for the alarm dialog; defaults to on.
    pub fn alarm_default(&self) -> bool {
        self.remembered_alarm.unwrap_or(true)
    }

    pub fn controller(&self) -> &SessionController<S> {
        &self.controller
    }

    pub fn snapshot(&self) -> Event {
        let session = self.controller.session();
        Event::StateSnapshot {
            status: session.status,
            dialog: self.dialog(),
            selection: self.selection,
            duration_secs: self.duration_secs(),
            remaining_secs: self.controller.remaining_secs(),
            progress_fraction: session.progress_fraction,
            alarm_enabled: session.alarm_enabled,
            at: Utc::now(),
        }
    }

    // ── Selection ────────────────────────────────────────────────────

    pub fn set_temperature(&mut self, temperature: Temperature) -> Option<Event> {
        self.change_selection(|s| s.temperature = temperature)
    }

    pub fn set_size(&mut self, size: Size) -> Option<Event> {
        self.change_selection(|s| s.size = size)
    }

    pub fn set_hardness(&mut self, hardness: Hardness) -> Option<Event> {
        self.change_selection(|s| s.hardness = hardness)
    }

    fn change_selection(&mut self, apply: impl FnOnce(&mut Selection)) -> Option<Event> {
        if self.controller.status() == SessionStatus::Running {
            debug!("selection change while running, ignored");
            return None;
        }
        let mut selection = self.selection;
        apply(&mut selection);
        if selection == self.selection {
            return None;
        }
        self.selection = selection;
        Some(Event::SelectionChanged {
            selection,
            duration_secs: self.duration_secs(),
        })
    }

    // ── Start path ───────────────────────────────────────────────────

    pub fn request_start(&mut self) -> Option<Event> {
        if self.state != GateState::Idle {
            debug!(state = ?self.state, "start requested outside idle, ignored");
            return None;
        }
        if !self.controller.begin_confirmation() {
            return None;
        }
        self.open(GateState::AwaitingBoilConfirm)
    }

    pub fn confirm_boiling(&mut self, boiling: bool) -> Option<Event> {
        if self.state != GateState::AwaitingBoilConfirm {
            debug!(state = ?self.state, "boil confirmation out of turn, ignored");
            return None;
        }
        if boiling {
            self.controller.precondition_met();
            self.open(GateState::AwaitingAlarmChoice)
        } else {
            self.controller.abandon_confirmation();
            self.open(GateState::BoilWarningShown)
        }
    }

    pub fn acknowledge_warning(&mut self) -> Option<Event> {
        if self.state != GateState::BoilWarningShown {
            return None;
        }
        self.state = GateState::Idle;
        Some(Event::DialogClosed)
    }

    /// Latch the alarm preference and start the run.
    pub fn choose_alarm(&mut self, enabled: bool) -> Option<Event> {
        if self.state != GateState::AwaitingAlarmChoice {
            debug!(state = ?self.state, "alarm choice out of turn, ignored");
            return None;
        }
        self.remembered_alarm = Some(enabled);
        let total_secs = self.duration_secs();
        match self.controller.request_start(total_secs, enabled) {
            Some(event) => {
                self.state = GateState::Running;
                Some(event)
            }
            None => {
                // The engine reports why through `next_event`.
                self.state = GateState::Idle;
                Some(Event::DialogClosed)
            }
        }
    }

    // ── Completion ───────────────────────────────────────────────────

    pub fn acknowledge_alarm(&mut self) -> Option<Event> {
        if self.state != GateState::AlarmShown {
            return None;
        }
        self.state = GateState::Idle;
        self.controller
            .acknowledge_completion()
            .or(Some(Event::DialogClosed))
    }

    // ── Stop and reset ───────────────────────────────────────────────

    pub fn request_stop(&mut self) -> Option<Event> {
        match self.state {
            GateState::Running
            | GateState::AwaitingResetConfirm {
                prior: ResetOrigin::Running,
            } => {
                self.state = GateState::Idle;
                self.controller.request_stop()
            }
            GateState::AlarmShown => self.acknowledge_alarm(),
            _ => {
                debug!(state = ?self.state, "stop requested with nothing running, ignored");
                None
            }
        }
    }

    pub fn request_reset(&mut self) -> Option<Event> {
        let prior = match self.state {
            GateState::Running => ResetOrigin::Running,
            GateState::Idle if self.controller.remaining_secs() > 0 => ResetOrigin::Idle,
            _ => {
                debug!(state = ?self.state, "nothing to reset, ignored");
                return None;
            }
        };
        self.open(GateState::AwaitingResetConfirm { prior })
    }

    pub fn confirm_reset(&mut self, confirmed: bool) -> Option<Event> {
        let GateState::AwaitingResetConfirm { prior } = self.state else {
            return None;
        };
        if !confirmed {
            self.state = prior.into();
            return Some(Event::DialogClosed);
        }
        self.state = GateState::Idle;
        self.controller
            .request_reset()
            .or(Some(Event::DialogClosed))
    }

    // ── Engine events ────────────────────────────────────────────────

    pub async fn next_event(&mut self) -> Option<Event> {
        let event = self.controller.next_event().await?;
        self.observe(&event);
        Some(event)
    }

    pub fn try_next_event(&mut self) -> Option<Event> {
        let event = self.controller.try_next_event()?;
        self.observe(&event);
        Some(event)
    }

    fn observe(&mut self, event: &Event) {
        match event {
            Event::RunCompleted { .. } => {
                if matches!(
                    self.state,
                    GateState::Running
                        | GateState::AwaitingResetConfirm {
                            prior: ResetOrigin::Running
                        }
                ) {
                    self.state = GateState::AlarmShown;
                }
            }
            Event::EngineFailed { .. } => {
                if self.state == GateState::Running {
                    self.state = GateState::Idle;
                }
            }
            _ => {}
        }
    }

    fn open(&mut self, state: GateState) -> Option<Event> {
        self.state = state;
        state.dialog().map(|dialog| Event::DialogOpened { dialog })
    }
}
