//! Countdown engine.
//!
//! Each run is sampled by its own tokio task on a fixed period. Every sample
//! recomputes the remaining time from the run's start instant, so a late or
//! skipped tick never accumulates drift. Samples travel to the owner over an
//! unbounded channel as [`EngineMessage`]s tagged with the run's [`RunId`].
//!
//! ## Run lifecycle
//!
//! ```text
//! start -> Progress* -> Completed
//! start -> Progress* -> (stop) Stopped
//! start (no runtime)  -> InitFailed
//! ```
//!
//! The id of the active run lives in an atomic. The sampler only sends
//! `Completed` after swapping its own id out of it, and `stop()` only sends
//! `Stopped` after doing the same, so a run ends with exactly one of the two.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Identifies one run. Strictly increasing per engine; never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub u64);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run-{}", self.0)
    }
}

/// No run is active.
const NO_RUN: u64 = 0;

/// Default sampling period.
pub const DEFAULT_SAMPLE_PERIOD: Duration = Duration::from_millis(100);

/// Commands accepted by [`CountdownEngine::handle`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineCommand {
    Start { total_secs: u64, alarm_enabled: bool },
    Stop,
}

/// Messages sent from a run's sampler (or the engine itself) to the owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineMessage {
    Progress {
        run_id: RunId,
        remaining_secs: f64,
        progress_fraction: f64,
    },
    /// Always the last message of a run that ran out.
    Completed { run_id: RunId, alarm_enabled: bool },
    /// Acknowledges `stop()`; the run produced no completion.
    Stopped { run_id: RunId },
    /// The sampler could not be spawned. The engine stays idle.
    InitFailed { run_id: RunId, reason: String },
}

impl EngineMessage {
    pub fn run_id(&self) -> RunId {
        match self {
            EngineMessage::Progress { run_id, .. }
            | EngineMessage::Completed { run_id, .. }
            | EngineMessage::Stopped { run_id }
            | EngineMessage::InitFailed { run_id, .. } => *run_id,
        }
    }
}

/// Remaining seconds and progress fraction after `elapsed` of a `total_secs` run.
pub fn sample(total_secs: u64, elapsed: Duration) -> (f64, f64) {
    let total = total_secs as f64;
    let remaining = (total - elapsed.as_secs_f64()).max(0.0);
    if total_secs == 0 {
        return (0.0, 1.0);
    }
    (remaining, 1.0 - remaining / total)
}

#[derive(Debug)]
struct EngineRun {
    run_id: RunId,
    total_secs: u64,
    alarm_enabled: bool,
    started_at: Instant,
    sampler: JoinHandle<()>,
}

/// Background countdown with drift-free sampling.
///
/// Must be driven from inside a tokio runtime; outside one, `start` reports
/// [`EngineMessage::InitFailed`] instead of running.
#[derive(Debug)]
pub struct CountdownEngine {
    period: Duration,
    next_id: u64,
    active: Arc<AtomicU64>,
    run: Option<EngineRun>,
    tx: mpsc::UnboundedSender<EngineMessage>,
}

impl CountdownEngine {
    /// Create an idle engine and the receiving end of its message channel.
    ///
    /// A zero period is raised to one millisecond.
    pub fn new(period: Duration) -> (Self, mpsc::UnboundedReceiver<EngineMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let engine = Self {
            period: period.max(Duration::from_millis(1)),
            next_id: NO_RUN,
            active: Arc::new(AtomicU64::new(NO_RUN)),
            run: None,
            tx,
        };
        (engine, rx)
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// The run currently being sampled, if any.
    pub fn current_run(&self) -> Option<RunId> {
        let active = self.active.load(Ordering::Acquire);
        self.run
            .as_ref()
            .filter(|run| run.run_id.0 == active)
            .map(|run| run.run_id)
    }

    pub fn is_running(&self) -> bool {
        self.current_run().is_some()
    }

    /// Direct reading of the active run, independent of the sampler.
    pub fn remaining_secs(&self) -> Option<f64> {
        self.current_run()?;
        let run = self.run.as_ref()?;
        Some(sample(run.total_secs, run.started_at.elapsed()).0)
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn handle(&mut self, command: EngineCommand) -> Option<RunId> {
        match command {
            EngineCommand::Start {
                total_secs,
                alarm_enabled,
            } => self.start(total_secs, alarm_enabled),
            EngineCommand::Stop => self.stop(),
        }
    }

    /// Begin a new run, halting the previous one first.
    ///
    /// Returns `None` when the sampler could not be spawned; an
    /// `InitFailed` message is queued in that case.
    pub fn start(&mut self, total_secs: u64, alarm_enabled: bool) -> Option<RunId> {
        self.stop();

        self.next_id += 1;
        let run_id = RunId(self.next_id);

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(err) => {
                warn!(%run_id, error = %err, "cannot spawn countdown sampler");
                let _ = self.tx.send(EngineMessage::InitFailed {
                    run_id,
                    reason: err.to_string(),
                });
                return None;
            }
        };

        let started_at = Instant::now();
        self.active.store(run_id.0, Ordering::Release);
        let sampler = runtime.spawn(run_sampler(
            run_id,
            total_secs,
            alarm_enabled,
            started_at,
            self.period,
            Arc::clone(&self.active),
            self.tx.clone(),
        ));

        info!(%run_id, total_secs, alarm_enabled, "countdown started");
        self.run = Some(EngineRun {
            run_id,
            total_secs,
            alarm_enabled,
            started_at,
            sampler,
        });
        Some(run_id)
    }

    /// Halt the active run. No-op when nothing is running.
    ///
    /// Returns the id of the run that was stopped.
    pub fn stop(&mut self) -> Option<RunId> {
        let run = self.run.take()?;
        run.sampler.abort();

        // A run that already completed has cleared `active` itself.
        if self
            .active
            .compare_exchange(run.run_id.0, NO_RUN, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(run_id = %run.run_id, "stop after completion ignored");
            return None;
        }

        info!(
            run_id = %run.run_id,
            alarm_enabled = run.alarm_enabled,
            "countdown stopped"
        );
        let _ = self.tx.send(EngineMessage::Stopped { run_id: run.run_id });
        Some(run.run_id)
    }
}

impl Drop for CountdownEngine {
    fn drop(&mut self) {
        if let Some(run) = self.run.take() {
            run.sampler.abort();
        }
        self.active.store(NO_RUN, Ordering::Release);
    }
}

async fn run_sampler(
    run_id: RunId,
    total_secs: u64,
    alarm_enabled: bool,
    started_at: Instant,
    period: Duration,
    active: Arc<AtomicU64>,
    tx: mpsc::UnboundedSender<EngineMessage>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        if active.load(Ordering::Acquire) != run_id.0 {
            return;
        }

        let (remaining_secs, progress_fraction) = sample(total_secs, started_at.elapsed());
        let progress = EngineMessage::Progress {
            run_id,
            remaining_secs,
            progress_fraction,
        };
        if tx.send(progress).is_err() {
            return;
        }
        if remaining_secs > 0.0 {
            continue;
        }

        if active
            .compare_exchange(run_id.0, NO_RUN, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            info!(%run_id, "countdown completed");
            let _ = tx.send(EngineMessage::Completed {
                run_id,
                alarm_enabled,
            });
        }
        return;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mut mpsc::UnboundedReceiver<EngineMessage>) -> Vec<EngineMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    fn completions(msgs: &[EngineMessage]) -> usize {
        msgs.iter()
            .filter(|m| matches!(m, EngineMessage::Completed { .. }))
            .count()
    }

    #[test]
    fn sample_is_drift_free() {
        assert_eq!(sample(300, Duration::from_secs(150)), (150.0, 0.5));
        assert_eq!(sample(300, Duration::from_secs(900)), (0.0, 1.0));
        assert_eq!(sample(0, Duration::ZERO), (0.0, 1.0));
    }

    #[tokio::test(start_paused = true)]
    async fn remaining_tracks_elapsed_time() {
        let (mut engine, mut rx) = CountdownEngine::new(DEFAULT_SAMPLE_PERIOD);
        let run_id = engine.start(300, true).unwrap();

        tokio::time::sleep(Duration::from_secs(150)).await;
        let msgs = drain(&mut rx);
        let last = msgs.last().unwrap();
        match last {
            EngineMessage::Progress {
                run_id: id,
                remaining_secs,
                progress_fraction,
            } => {
                assert_eq!(*id, run_id);
                assert!((remaining_secs - 150.0).abs() <= 0.1 + f64::EPSILON);
                assert!((progress_fraction - 0.5).abs() < 0.001);
            }
            other => panic!("Expected Progress, got {other:?}"),
        }
        assert!(engine.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn progress_is_monotonic_and_completion_is_last() {
        let (mut engine, mut rx) = CountdownEngine::new(DEFAULT_SAMPLE_PERIOD);
        engine.start(2, false).unwrap();

        tokio::time::sleep(Duration::from_secs(5)).await;
        let msgs = drain(&mut rx);

        let mut last_remaining = f64::MAX;
        for msg in &msgs[..msgs.len() - 1] {
            match msg {
                EngineMessage::Progress { remaining_secs, .. } => {
                    assert!(*remaining_secs <= last_remaining);
                    last_remaining = *remaining_secs;
                }
                other => panic!("Unexpected {other:?}"),
            }
        }
        assert_eq!(last_remaining, 0.0);
        assert!(matches!(
            msgs.last(),
            Some(EngineMessage::Completed { alarm_enabled: false, .. })
        ));
        assert_eq!(completions(&msgs), 1);
        assert!(!engine.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn skipped_ticks_do_not_accumulate_drift() {
        let (mut engine, mut rx) = CountdownEngine::new(DEFAULT_SAMPLE_PERIOD);
        engine.start(60, true).unwrap();

        // Jump the clock without yielding, as a throttled host would.
        tokio::time::advance(Duration::from_secs(20)).await;
        tokio::task::yield_now().await;
        let msgs = drain(&mut rx);
        match msgs.last() {
            Some(EngineMessage::Progress { remaining_secs, .. }) => {
                assert!((remaining_secs - 40.0).abs() <= 0.1 + f64::EPSILON);
            }
            other => panic!("Expected Progress, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn zero_length_run_completes_immediately() {
        let (mut engine, mut rx) = CountdownEngine::new(DEFAULT_SAMPLE_PERIOD);
        let run_id = engine.start(0, true).unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        let msgs = drain(&mut rx);
        assert_eq!(
            msgs,
            vec![
                EngineMessage::Progress {
                    run_id,
                    remaining_secs: 0.0,
                    progress_fraction: 1.0,
                },
                EngineMessage::Completed {
                    run_id,
                    alarm_enabled: true,
                },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent() {
        let (mut engine, mut rx) = CountdownEngine::new(DEFAULT_SAMPLE_PERIOD);
        assert_eq!(engine.stop(), None);

        let run_id = engine.start(30, true).unwrap();
        assert_eq!(engine.handle(EngineCommand::Stop), Some(run_id));
        assert_eq!(engine.stop(), None);

        tokio::time::sleep(Duration::from_secs(60)).await;
        let msgs = drain(&mut rx);
        let stopped: Vec<_> = msgs
            .iter()
            .filter(|m| matches!(m, EngineMessage::Stopped { .. }))
            .collect();
        assert_eq!(stopped, vec![&EngineMessage::Stopped { run_id }]);
        assert_eq!(completions(&msgs), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_after_completion_is_a_noop() {
        let (mut engine, mut rx) = CountdownEngine::new(DEFAULT_SAMPLE_PERIOD);
        engine.start(1, true).unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(engine.stop(), None);
        let msgs = drain(&mut rx);
        assert_eq!(completions(&msgs), 1);
        assert!(!msgs.iter().any(|m| matches!(m, EngineMessage::Stopped { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn restart_supersedes_previous_run() {
        let (mut engine, mut rx) = CountdownEngine::new(DEFAULT_SAMPLE_PERIOD);
        let first = engine.start(1, true).unwrap();
        let second = engine
            .handle(EngineCommand::Start {
                total_secs: 1,
                alarm_enabled: false,
            })
            .unwrap();
        assert!(second > first);
        assert_eq!(engine.current_run(), Some(second));

        tokio::time::sleep(Duration::from_secs(3)).await;
        let msgs = drain(&mut rx);
        let completed: Vec<_> = msgs
            .iter()
            .filter(|m| matches!(m, EngineMessage::Completed { .. }))
            .map(|m| m.run_id())
            .collect();
        assert_eq!(completed, vec![second]);
        assert!(msgs.contains(&EngineMessage::Stopped { run_id: first }));
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_start_stop_yields_one_completion_per_finished_run() {
        let (mut engine, mut rx) = CountdownEngine::new(DEFAULT_SAMPLE_PERIOD);
        for _ in 0..20 {
            engine.start(1, true);
            tokio::task::yield_now().await;
            engine.stop();
        }
        let last = engine.start(1, true).unwrap();

        tokio::time::sleep(Duration::from_secs(3)).await;
        let msgs = drain(&mut rx);
        let completed: Vec<_> = msgs
            .iter()
            .filter(|m| matches!(m, EngineMessage::Completed { .. }))
            .map(|m| m.run_id())
            .collect();
        assert_eq!(completed, vec![last]);
    }

    #[tokio::test(start_paused = true)]
    async fn remaining_secs_reads_the_clock_directly() {
        let (mut engine, _rx) = CountdownEngine::new(Duration::from_secs(10));
        engine.start(100, true).unwrap();
        tokio::time::advance(Duration::from_secs(25)).await;
        let remaining = engine.remaining_secs().unwrap();
        assert!((remaining - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn start_without_runtime_reports_init_failure() {
        let (mut engine, mut rx) = CountdownEngine::new(DEFAULT_SAMPLE_PERIOD);
        assert_eq!(engine.start(10, true), None);
        assert!(!engine.is_running());

        let msgs = drain(&mut rx);
        assert_eq!(msgs.len(), 1);
        assert!(matches!(
            &msgs[0],
            EngineMessage::InitFailed { run_id: RunId(1), .. }
        ));
    }

    #[test]
    fn commands_are_tagged() {
        let json = serde_json::to_value(EngineCommand::Start {
            total_secs: 5,
            alarm_enabled: true,
        })
        .unwrap();
        assert_eq!(json["type"], "start");
        assert_eq!(json["total_secs"], 5);
    }
}
