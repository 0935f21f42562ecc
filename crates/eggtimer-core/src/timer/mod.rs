mod controller;
mod duration;
mod engine;
mod gatekeeper;

pub use controller::{Session, SessionController, SessionStatus};
pub use duration::{
    resolve, AdditiveTable, DurationTable, GridTable, Hardness, HardnessMinutes,
    ParseSelectionError, Selection, Size, SizeRow, Temperature,
};
pub use engine::{
    sample, CountdownEngine, EngineCommand, EngineMessage, RunId, DEFAULT_SAMPLE_PERIOD,
};
pub use gatekeeper::{Dialog, GateState, Gatekeeper, ResetOrigin};
