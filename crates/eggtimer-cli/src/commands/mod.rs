pub mod config;
pub mod cook;
pub mod history;
pub mod resolve;

use clap::Args;
use eggtimer_core::{Hardness, Selection, Size, Temperature};

/// Egg selection flags shared by `resolve` and `cook`.
#[derive(Args, Debug, Clone)]
pub struct SelectionArgs {
    /// cold, room or hot
    #[arg(long, default_value = "cold")]
    pub temperature: Temperature,
    /// small, medium or large
    #[arg(long, default_value = "medium")]
    pub size: Size,
    /// soft, medium or hard
    #[arg(long, default_value = "medium")]
    pub hardness: Hardness,
}

impl SelectionArgs {
    pub fn selection(&self) -> Selection {
        Selection {
            temperature: self.temperature,
            size: self.size,
            hardness: self.hardness,
        }
    }
}

/// Parse a yes/no answer the way both flags and stdin accept it.
pub fn parse_yes_no(value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" | "true" | "on" => Ok(true),
        "n" | "no" | "false" | "off" => Ok(false),
        other => Err(format!("expected yes or no, got '{other}'")),
    }
}
