//! # Eggtimer Core Library
//!
//! This library provides the core logic for the eggtimer boiled-egg countdown.
//! Every front end (the bundled CLI included) drives the same
//! [`Gatekeeper`] and renders the [`Event`]s it emits.
//!
//! ## Architecture
//!
//! - **Duration resolver**: maps temperature, size and hardness to seconds
//! - **Countdown engine**: a sampler task that derives remaining time from a
//!   monotonic start instant, tagging every message with its run id
//! - **Session controller**: applies engine messages to the one active session
//!   and drives the alarm
//! - **Gatekeeper**: the boiling check, alarm choice, completion notice and
//!   reset confirmation around every run
//! - **Storage**: TOML configuration and SQLite cook history
//!
//! ## Key Components
//!
//! - [`Gatekeeper`]: Intent surface and confirmation state machine
//! - [`SessionController`]: Session state and engine message handling
//! - [`CountdownEngine`]: Drift-free countdown sampler
//! - [`AlarmNotifier`]: Idempotent completion alarm
//! - [`Config`]: Application configuration management

pub mod alarm;
pub mod error;
pub mod events;
pub mod storage;
pub mod timer;

pub use alarm::{AlarmNotifier, AlarmSink, FireOutcome, SilentSink, TerminalBell};
pub use error::{AlarmError, ConfigError, CoreError, DatabaseError};
pub use events::Event;
pub use storage::{Config, CookOutcome, CookRecord, Database, NewCook};
pub use timer::{
    CountdownEngine, Dialog, DurationTable, GateState, Gatekeeper, Hardness, RunId, Selection,
    Session, SessionController, SessionStatus, Size, Temperature,
};
