use std::io::Write;

use chrono::{DateTime, Utc};
use clap::Args;
use eggtimer_core::{
    AlarmNotifier, AlarmSink, Config, CookOutcome, Database, Dialog, Event, Gatekeeper, NewCook,
    SessionController, SilentSink, TerminalBell,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use super::resolve::format_mmss;
use super::{parse_yes_no, SelectionArgs};

#[derive(Args, Debug)]
pub struct CookArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,
    /// Answer the boiling check up front (yes/no)
    #[arg(long, value_parser = parse_yes_no)]
    pub boiling: Option<bool>,
    /// Answer the alarm question up front (yes/no)
    #[arg(long, value_parser = parse_yes_no)]
    pub alarm: Option<bool>,
}

type Gate = Gatekeeper<Box<dyn AlarmSink>>;

/// One interactive cook: the gatekeeper plus what the terminal shows.
struct CookSession {
    gate: Gate,
    db: Database,
    remember_alarm: bool,
    preset_boiling: Option<bool>,
    preset_alarm: Option<bool>,
    started_at: Option<DateTime<Utc>>,
    total_secs: u64,
    alarm_enabled: bool,
    last_shown: Option<u64>,
    mid_line: bool,
    finished: bool,
}

impl CookSession {
    fn say(&mut self, message: &str) {
        if self.mid_line {
            println!();
            self.mid_line = false;
        }
        println!("{message}");
    }

    fn show_remaining(&mut self, remaining_secs: u64) {
        if self.last_shown == Some(remaining_secs) {
            return;
        }
        self.last_shown = Some(remaining_secs);
        print!("\r{} ", format_mmss(remaining_secs));
        let _ = std::io::stdout().flush();
        self.mid_line = true;
    }

    fn handle(&mut self, event: Option<Event>) -> Result<(), Box<dyn std::error::Error>> {
        let Some(event) = event else {
            return Ok(());
        };
        match event {
            Event::DialogOpened { dialog } => self.prompt(dialog)?,
            Event::RunStarted {
                total_secs,
                alarm_enabled,
                at,
                ..
            } => {
                self.started_at = Some(at);
                self.total_secs = total_secs;
                self.alarm_enabled = alarm_enabled;
                self.say(&format!(
                    "Cooking for {}. Type s to stop, r to reset.",
                    format_mmss(total_secs)
                ));
                self.show_remaining(total_secs);
            }
            Event::Progress { remaining_secs, .. } => self.show_remaining(remaining_secs),
            Event::RunCompleted { .. } => {
                self.show_remaining(0);
                self.record(CookOutcome::Completed);
                self.say("Your eggs are ready! Press Enter to dismiss.");
            }
            Event::RunStopped { .. } => {
                self.record(CookOutcome::Stopped);
                self.say("Timer stopped.");
                self.finished = true;
            }
            Event::EngineFailed { reason, .. } => {
                return Err(format!("timer could not start: {reason}").into());
            }
            Event::AlarmFailed { reason, .. } => {
                self.say(&format!("(alarm unavailable: {reason})"));
            }
            Event::DialogClosed
            | Event::AlarmFired { .. }
            | Event::AlarmSilenced { .. }
            | Event::SelectionChanged { .. }
            | Event::StateSnapshot { .. } => {}
        }
        Ok(())
    }

    fn prompt(&mut self, dialog: Dialog) -> Result<(), Box<dyn std::error::Error>> {
        match dialog {
            Dialog::BoilCheck => match self.preset_boiling.take() {
                Some(boiling) => {
                    self.say(&format!("Is the water boiling? {}", yes_no(boiling)));
                    let event = self.gate.confirm_boiling(boiling);
                    self.handle(event)?;
                }
                None => self.say("Is the water boiling? [y/n]"),
            },
            Dialog::BoilWarning => {
                self.say("Wait for the water to boil, then start again.");
                self.gate.acknowledge_warning();
                self.finished = true;
            }
            Dialog::AlarmChoice => match self.preset_alarm.take() {
                Some(enabled) => {
                    self.say(&format!("Play an alarm when done? {}", yes_no(enabled)));
                    self.choose_alarm(enabled)?;
                }
                None => {
                    let hint = if self.gate.alarm_default() { "[Y/n]" } else { "[y/N]" };
                    self.say(&format!("Play an alarm when done? {hint}"));
                }
            },
            Dialog::AlarmNotice => self.say("Your eggs are ready! Press Enter to dismiss."),
            Dialog::ResetConfirm => self.say("Reset the timer? [y/N]"),
        }
        Ok(())
    }

    fn choose_alarm(&mut self, enabled: bool) -> Result<(), Box<dyn std::error::Error>> {
        if self.remember_alarm {
            if let Err(e) = self.db.set_last_alarm_choice(enabled) {
                warn!(error = %e, "could not remember alarm choice");
            }
        }
        let event = self.gate.choose_alarm(enabled);
        self.handle(event)
    }

    fn acknowledge(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let event = self.gate.acknowledge_alarm();
        self.handle(event)?;
        self.finished = true;
        Ok(())
    }

    /// Apply one line typed by the user to whatever is currently asked.
    fn on_line(&mut self, line: &str) -> Result<(), Box<dyn std::error::Error>> {
        self.mid_line = false;
        let answer = line.trim();
        match self.gate.dialog() {
            Some(Dialog::BoilCheck) => match parse_yes_no(answer) {
                Ok(boiling) => {
                    let event = self.gate.confirm_boiling(boiling);
                    self.handle(event)?;
                }
                Err(e) => self.say(&e),
            },
            Some(Dialog::AlarmChoice) => {
                let choice = if answer.is_empty() {
                    Ok(self.gate.alarm_default())
                } else {
                    parse_yes_no(answer)
                };
                match choice {
                    Ok(enabled) => self.choose_alarm(enabled)?,
                    Err(e) => self.say(&e),
                }
            }
            Some(Dialog::ResetConfirm) => {
                let confirmed = !answer.is_empty() && parse_yes_no(answer).unwrap_or(false);
                let event = self.gate.confirm_reset(confirmed);
                self.handle(event)?;
                if !confirmed {
                    self.last_shown = None;
                }
            }
            Some(Dialog::AlarmNotice) => self.acknowledge()?,
            Some(Dialog::BoilWarning) => {
                self.gate.acknowledge_warning();
                self.finished = true;
            }
            None => match answer {
                "s" | "stop" => {
                    let event = self.gate.request_stop();
                    self.handle(event)?;
                }
                "r" | "reset" => {
                    let event = self.gate.request_reset();
                    self.handle(event)?;
                }
                _ => {
                    self.last_shown = None;
                    self.show_remaining(self.gate.controller().remaining_secs());
                }
            },
        }
        Ok(())
    }

    /// Nobody is left to answer: settle any open question conservatively.
    fn on_eof(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        match self.gate.dialog() {
            Some(Dialog::BoilCheck) => {
                let event = self.gate.confirm_boiling(false);
                self.handle(event)?;
            }
            Some(Dialog::AlarmChoice) => {
                let enabled = self.gate.alarm_default();
                self.choose_alarm(enabled)?;
            }
            Some(Dialog::ResetConfirm) => {
                let event = self.gate.confirm_reset(false);
                self.handle(event)?;
            }
            Some(Dialog::AlarmNotice) => self.acknowledge()?,
            Some(Dialog::BoilWarning) | None => {}
        }
        Ok(())
    }

    fn record(&mut self, outcome: CookOutcome) {
        let Some(started_at) = self.started_at.take() else {
            return;
        };
        let cook = NewCook {
            selection: self.gate.selection(),
            total_secs: self.total_secs,
            alarm_enabled: self.alarm_enabled,
            outcome,
            started_at,
            ended_at: Utc::now(),
        };
        if let Err(e) = self.db.record_cook(&cook) {
            warn!(error = %e, "could not record cook");
        }
    }
}

fn yes_no(answer: bool) -> &'static str {
    if answer {
        "yes"
    } else {
        "no"
    }
}

fn build_gate(config: &Config, remembered: Option<bool>) -> Gate {
    let sink: Box<dyn AlarmSink> = if config.notifications.enabled {
        Box::new(TerminalBell::new(config.bell_interval()))
    } else {
        Box::new(SilentSink)
    };
    let controller = SessionController::new(config.sample_period(), AlarmNotifier::new(sink));
    Gatekeeper::new(config.durations.clone(), controller).with_remembered_alarm(remembered)
}

async fn cook(
    args: CookArgs,
    config: Config,
    db: Database,
) -> Result<(), Box<dyn std::error::Error>> {
    let remember_alarm = config.notifications.remember_alarm_choice;
    let remembered = if remember_alarm {
        db.last_alarm_choice()?
    } else {
        None
    };

    let mut gate = build_gate(&config, remembered);
    let selection = args.selection.selection();
    gate.set_temperature(selection.temperature);
    gate.set_size(selection.size);
    gate.set_hardness(selection.hardness);

    let mut session = CookSession {
        gate,
        db,
        remember_alarm,
        preset_boiling: args.boiling,
        preset_alarm: args.alarm,
        started_at: None,
        total_secs: 0,
        alarm_enabled: false,
        last_shown: None,
        mid_line: false,
        finished: false,
    };

    let event = session.gate.request_start();
    session.handle(event)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    while !session.finished {
        tokio::select! {
            event = session.gate.next_event() => match event {
                Some(event) => {
                    let alarm_notice = matches!(event, Event::RunCompleted { .. });
                    session.handle(Some(event))?;
                    if alarm_notice && !stdin_open {
                        session.acknowledge()?;
                    }
                }
                None => return Err("countdown engine stopped unexpectedly".into()),
            },
            line = lines.next_line(), if stdin_open => match line? {
                Some(line) => session.on_line(&line)?,
                None => {
                    stdin_open = false;
                    session.on_eof()?;
                }
            },
        }
    }
    Ok(())
}

pub fn run(args: CookArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let db = Database::open()?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(cook(args, config, db))
}
