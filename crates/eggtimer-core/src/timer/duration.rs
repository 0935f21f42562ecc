//! Cooking duration lookup.
//!
//! Maps a [`Selection`] to a countdown length in seconds. Two table shapes
//! are supported: additive offsets on top of a per-hardness base, or a full
//! temperature x size x hardness grid in whole minutes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Temperature {
    /// Straight from the fridge.
    Cold,
    Room,
    Hot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Size {
    Small,
    Medium,
    Large,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hardness {
    /// Runny yolk.
    Soft,
    Medium,
    Hard,
}

impl Temperature {
    pub const ALL: [Temperature; 3] = [Temperature::Cold, Temperature::Room, Temperature::Hot];
}

impl Size {
    pub const ALL: [Size; 3] = [Size::Small, Size::Medium, Size::Large];
}

impl Hardness {
    pub const ALL: [Hardness; 3] = [Hardness::Soft, Hardness::Medium, Hardness::Hard];
}

/// Error returned when a selection name cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}' (expected one of: {expected})")]
pub struct ParseSelectionError {
    kind: &'static str,
    value: String,
    expected: &'static str,
}

impl FromStr for Temperature {
    type Err = ParseSelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cold" | "fridge" => Ok(Temperature::Cold),
            "room" => Ok(Temperature::Room),
            "hot" | "warm" => Ok(Temperature::Hot),
            _ => Err(ParseSelectionError {
                kind: "temperature",
                value: s.to_string(),
                expected: "cold, fridge, room, hot",
            }),
        }
    }
}

impl FromStr for Size {
    type Err = ParseSelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "small" | "s" => Ok(Size::Small),
            "medium" | "m" => Ok(Size::Medium),
            "large" | "l" => Ok(Size::Large),
            _ => Err(ParseSelectionError {
                kind: "size",
                value: s.to_string(),
                expected: "small, medium, large",
            }),
        }
    }
}

impl FromStr for Hardness {
    type Err = ParseSelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "soft" | "runny" => Ok(Hardness::Soft),
            "medium" => Ok(Hardness::Medium),
            "hard" => Ok(Hardness::Hard),
            _ => Err(ParseSelectionError {
                kind: "hardness",
                value: s.to_string(),
                expected: "soft, runny, medium, hard",
            }),
        }
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Temperature::Cold => "cold",
            Temperature::Room => "room",
            Temperature::Hot => "hot",
        })
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Size::Small => "small",
            Size::Medium => "medium",
            Size::Large => "large",
        })
    }
}

impl fmt::Display for Hardness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Hardness::Soft => "soft",
            Hardness::Medium => "medium",
            Hardness::Hard => "hard",
        })
    }
}

/// The three user-chosen inputs of a cook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub temperature: Temperature,
    pub size: Size,
    pub hardness: Hardness,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            temperature: Temperature::Cold,
            size: Size::Medium,
            hardness: Hardness::Medium,
        }
    }
}

/// Base seconds per hardness plus signed offsets for size and temperature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdditiveTable {
    #[serde(default = "default_soft_secs")]
    pub soft_secs: i64,
    #[serde(default = "default_medium_secs")]
    pub medium_secs: i64,
    #[serde(default = "default_hard_secs")]
    pub hard_secs: i64,
    #[serde(default = "default_small_offset")]
    pub small_offset_secs: i64,
    #[serde(default = "default_large_offset")]
    pub large_offset_secs: i64,
    #[serde(default = "default_cold_offset")]
    pub cold_offset_secs: i64,
    #[serde(default = "default_hot_offset")]
    pub hot_offset_secs: i64,
}

fn default_soft_secs() -> i64 {
    7 * 60
}
fn default_medium_secs() -> i64 {
    9 * 60
}
fn default_hard_secs() -> i64 {
    11 * 60
}
fn default_small_offset() -> i64 {
    -30
}
fn default_large_offset() -> i64 {
    30
}
fn default_cold_offset() -> i64 {
    45
}
fn default_hot_offset() -> i64 {
    -45
}

impl Default for AdditiveTable {
    fn default() -> Self {
        Self {
            soft_secs: default_soft_secs(),
            medium_secs: default_medium_secs(),
            hard_secs: default_hard_secs(),
            small_offset_secs: default_small_offset(),
            large_offset_secs: default_large_offset(),
            cold_offset_secs: default_cold_offset(),
            hot_offset_secs: default_hot_offset(),
        }
    }
}

impl AdditiveTable {
    fn base(&self, hardness: Hardness) -> i64 {
        match hardness {
            Hardness::Soft => self.soft_secs,
            Hardness::Medium => self.medium_secs,
            Hardness::Hard => self.hard_secs,
        }
    }

    fn size_offset(&self, size: Size) -> i64 {
        match size {
            Size::Small => self.small_offset_secs,
            Size::Medium => 0,
            Size::Large => self.large_offset_secs,
        }
    }

    fn temperature_offset(&self, temperature: Temperature) -> i64 {
        match temperature {
            Temperature::Cold => self.cold_offset_secs,
            Temperature::Room => 0,
            Temperature::Hot => self.hot_offset_secs,
        }
    }
}

/// Minutes for each hardness, used as one cell row of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardnessMinutes {
    pub soft: u64,
    pub medium: u64,
    pub hard: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeRow {
    pub small: HardnessMinutes,
    pub medium: HardnessMinutes,
    pub large: HardnessMinutes,
}

/// Full temperature x size x hardness grid, in whole minutes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridTable {
    pub cold: SizeRow,
    pub room: SizeRow,
    pub hot: SizeRow,
}

impl Default for GridTable {
    fn default() -> Self {
        // Each step up in size or hardness adds a minute; warmer eggs start a minute lower.
        let cell = |soft: u64| HardnessMinutes {
            soft,
            medium: soft + 1,
            hard: soft + 2,
        };
        let row = |start: u64| SizeRow {
            small: cell(start),
            medium: cell(start + 1),
            large: cell(start + 2),
        };
        Self {
            cold: row(3),
            room: row(2),
            hot: row(1),
        }
    }
}

impl GridTable {
    fn minutes(&self, selection: &Selection) -> u64 {
        let row = match selection.temperature {
            Temperature::Cold => &self.cold,
            Temperature::Room => &self.room,
            Temperature::Hot => &self.hot,
        };
        let cell = match selection.size {
            Size::Small => &row.small,
            Size::Medium => &row.medium,
            Size::Large => &row.large,
        };
        match selection.hardness {
            Hardness::Soft => cell.soft,
            Hardness::Medium => cell.medium,
            Hardness::Hard => cell.hard,
        }
    }
}

/// Duration lookup table, tagged by `mode` in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum DurationTable {
    Additive(AdditiveTable),
    Grid(GridTable),
}

impl Default for DurationTable {
    fn default() -> Self {
        DurationTable::Additive(AdditiveTable::default())
    }
}

impl DurationTable {
    /// Countdown length in seconds for `selection`. Never negative.
    pub fn resolve(&self, selection: &Selection) -> u64 {
        match self {
            DurationTable::Additive(table) => {
                let secs = table
                    .base(selection.hardness)
                    .saturating_add(table.size_offset(selection.size))
                    .saturating_add(table.temperature_offset(selection.temperature));
                secs.max(0) as u64
            }
            DurationTable::Grid(table) => table.minutes(selection).saturating_mul(60),
        }
    }
}

/// Resolve with the default additive table.
pub fn resolve(temperature: Temperature, size: Size, hardness: Hardness) -> u64 {
    DurationTable::default().resolve(&Selection {
        temperature,
        size,
        hardness,
    })
}
