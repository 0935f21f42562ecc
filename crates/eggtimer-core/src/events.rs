use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::{Dialog, RunId, Selection, SessionStatus};

/// Every externally visible state change produces an Event.
/// Front ends render from these; the CLI prints and records them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A confirmation dialog opened (or replaced the previous one).
    DialogOpened {
        dialog: Dialog,
    },
    /// The open dialog closed without starting or ending a run.
    DialogClosed,
    RunStarted {
        run_id: RunId,
        total_secs: u64,
        alarm_enabled: bool,
        at: DateTime<Utc>,
    },
    Progress {
        run_id: RunId,
        /// Whole seconds left, rounded down.
        remaining_secs: u64,
        progress_fraction: f64,
    },
    RunCompleted {
        run_id: RunId,
        alarm_enabled: bool,
        at: DateTime<Utc>,
    },
    /// Operator-initiated stop. Nothing from this run follows it.
    RunStopped {
        run_id: RunId,
        at: DateTime<Utc>,
    },
    /// The background sampler could not be created; the timer cannot run.
    EngineFailed {
        reason: String,
        at: DateTime<Utc>,
    },
    AlarmFired {
        at: DateTime<Utc>,
    },
    /// Alarm playback could not start; completion continues silently.
    AlarmFailed {
        reason: String,
        at: DateTime<Utc>,
    },
    AlarmSilenced {
        at: DateTime<Utc>,
    },
    SelectionChanged {
        selection: Selection,
        duration_secs: u64,
    },
    StateSnapshot {
        status: SessionStatus,
        dialog: Option<Dialog>,
        selection: Selection,
        duration_secs: u64,
        remaining_secs: u64,
        progress_fraction: f64,
        alarm_enabled: Option<bool>,
        at: DateTime<Utc>,
    },
}
