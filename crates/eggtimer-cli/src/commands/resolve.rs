use clap::Args;
use eggtimer_core::{Config, Selection};
use serde::Serialize;

use super::SelectionArgs;

#[derive(Args, Debug)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,
}

#[derive(Serialize)]
struct Resolved {
    #[serde(flatten)]
    selection: Selection,
    seconds: u64,
    display: String,
}

/// `mm:ss`, with minutes allowed past 59.
pub fn format_mmss(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

pub fn run(args: ResolveArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let selection = args.selection.selection();
    let seconds = config.durations.resolve(&selection);
    let resolved = Resolved {
        selection,
        seconds,
        display: format_mmss(seconds),
    };
    println!("{}", serde_json::to_string_pretty(&resolved)?);
    Ok(())
}
