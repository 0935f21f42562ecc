//! Completion alarm.
//!
//! [`AlarmNotifier`] is the only owner of the playback resource. It starts
//! playback at most once until silenced, and only touches the sink when it
//! actually has something to start or stop.

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::AlarmError;

/// A playback backend for the alarm.
pub trait AlarmSink: Send {
    /// Begin looping playback.
    fn play(&mut self) -> Result<(), AlarmError>;
    /// Halt playback.
    fn stop(&mut self);
    /// Return to the start of the sound.
    fn rewind(&mut self);
}

impl AlarmSink for Box<dyn AlarmSink> {
    fn play(&mut self) -> Result<(), AlarmError> {
        (**self).play()
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn rewind(&mut self) {
        (**self).rewind()
    }
}

/// Outcome of [`AlarmNotifier::fire`].
#[derive(Debug)]
pub enum FireOutcome {
    Started,
    /// Already playing; nothing was restarted.
    AlreadyFiring,
    /// The sink refused to play. The completion stays silent.
    Failed(AlarmError),
}

#[derive(Debug)]
pub struct AlarmNotifier<S> {
    sink: S,
    firing: bool,
}

impl<S: AlarmSink> AlarmNotifier<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            firing: false,
        }
    }

    pub fn is_firing(&self) -> bool {
        self.firing
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn fire(&mut self) -> FireOutcome {
        if self.firing {
            debug!("alarm already firing");
            return FireOutcome::AlreadyFiring;
        }
        match self.sink.play() {
            Ok(()) => {
                self.firing = true;
                FireOutcome::Started
            }
            Err(err) => {
                warn!(error = %err, "alarm playback failed, completing silently");
                FireOutcome::Failed(err)
            }
        }
    }

    /// Stop and rewind playback. Returns `true` if something was playing.
    pub fn silence(&mut self) -> bool {
        if !self.firing {
            return false;
        }
        self.sink.stop();
        self.sink.rewind();
        self.firing = false;
        true
    }
}

/// Sink that never makes a sound, for when notifications are disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentSink;

impl AlarmSink for SilentSink {
    fn play(&mut self) -> Result<(), AlarmError> {
        Ok(())
    }

    fn stop(&mut self) {}

    fn rewind(&mut self) {}
}

/// Rings the terminal bell on stderr at a fixed interval until stopped.
///
/// The ring count doubles as the playback position.
#[derive(Debug)]
pub struct TerminalBell {
    interval: Duration,
    rings: Arc<AtomicU64>,
    task: Option<JoinHandle<()>>,
}

impl TerminalBell {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            rings: Arc::new(AtomicU64::new(0)),
            task: None,
        }
    }

    pub fn rings(&self) -> u64 {
        self.rings.load(Ordering::Relaxed)
    }
}

impl AlarmSink for TerminalBell {
    fn play(&mut self) -> Result<(), AlarmError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| AlarmError::Unavailable(e.to_string()))?;
        // Surface a closed stderr now rather than from inside the task.
        std::io::stderr().flush()?;

        let rings = Arc::clone(&self.rings);
        let interval = self.interval;
        self.task = Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let mut stderr = std::io::stderr();
                if stderr.write_all(b"\x07").and_then(|_| stderr.flush()).is_err() {
                    return;
                }
                rings.fetch_add(1, Ordering::Relaxed);
            }
        }));
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    fn rewind(&mut self) {
        self.rings.store(0, Ordering::Relaxed);
    }
}

impl Drop for TerminalBell {
    fn drop(&mut self) {
        self.stop();
    }
}
