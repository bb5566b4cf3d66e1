//! Periodic drift sampling and correction.
//!
//! While the reference clock runs, an armed monitor compares the stream's
//! reported position against `clock.current_time() + baseline_offset` once
//! per period. Gross drift (outside the dead-band) is corrected with a hard
//! seek to the expected position; a clean sample disarms the schedule until
//! the next arm request.

use crossbeam::channel::{self, Sender};
use log::{debug, warn};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::clock::{ReferenceClock, TimerPhase};
use crate::config::VideoSettings;
use crate::core::lock;
use crate::core::time::{self, Time};
use crate::playback::{Dispatcher, SessionShared};

/// Sampling period and correction threshold.
///
/// Constants rather than literals so tests can run against accelerated
/// clocks; sessions use the defaults.
#[derive(Debug, Clone, Copy)]
pub struct SyncTuning {
    /// Wall-clock interval between drift samples
    pub period: Duration,
    /// Dead-band: drift at or below this magnitude is ignored
    pub threshold: Time,
}

impl Default for SyncTuning {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(1),
            threshold: time::from_millis(500),
        }
    }
}

/// What a tick decided about the schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TickOutcome {
    KeepArmed,
    Disarm,
}

/// Everything one tick needs, captured at arm time.
struct TickContext {
    clock: Arc<dyn ReferenceClock>,
    shared: Arc<SessionShared>,
    dispatcher: Arc<Dispatcher>,
    /// SyncOffset plus the one-shot arm offset, fixed for this schedule
    baseline_offset: Time,
    threshold: Time,
}

/// One drift sample. Phase gating happens off the dispatcher; the position
/// read and any correction are marshalled onto it.
fn run_tick(ctx: &TickContext) -> TickOutcome {
    match ctx.clock.phase() {
        // Timer reset under us; stop sampling.
        TimerPhase::NotRunning => TickOutcome::Disarm,
        // Stream is paused along with the timer; idle until the next period.
        TimerPhase::Paused => TickOutcome::KeepArmed,
        TimerPhase::Running => {
            let clock = Arc::clone(&ctx.clock);
            let shared = Arc::clone(&ctx.shared);
            let baseline = ctx.baseline_offset;
            let threshold = ctx.threshold;

            let outcome = ctx.dispatcher.invoke(move || {
                shared.with_stream(|stream| {
                    let expected = clock.current_time() + baseline;
                    let position = match stream.position() {
                        Ok(position) => position,
                        Err(e) => {
                            // Transient; skip this sample and retry next period.
                            warn!("drift sample skipped: {e}");
                            return TickOutcome::KeepArmed;
                        }
                    };

                    let delta = position - expected;
                    if delta.abs() <= threshold {
                        TickOutcome::Disarm
                    } else {
                        debug!(
                            "correcting drift of {} with seek to {}",
                            time::format_time(delta),
                            time::format_time(expected),
                        );
                        if let Err(e) = stream.set_position(expected) {
                            warn!("drift correction failed: {e}");
                        }
                        TickOutcome::KeepArmed
                    }
                })
            });

            match outcome {
                // Dispatcher shut down: teardown in flight, schedule is moot.
                None => TickOutcome::Disarm,
                // Stream already released: no-op, the cancel will follow.
                Some(None) => TickOutcome::KeepArmed,
                Some(Some(outcome)) => outcome,
            }
        }
    }
}

/// The armed periodic schedule: a worker thread driven by a tick channel,
/// cancelled through a bounded channel and joined synchronously.
struct CorrectionSchedule {
    cancel_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
    baseline_offset: Time,
}

impl CorrectionSchedule {
    fn start(period: Duration, ctx: TickContext) -> Self {
        let (cancel_tx, cancel_rx) = channel::bounded::<()>(1);
        let baseline_offset = ctx.baseline_offset;
        let handle = thread::Builder::new()
            .name("drift-monitor".to_string())
            .spawn(move || {
                let ticker = channel::tick(period);
                loop {
                    crossbeam::select! {
                        recv(ticker) -> _ => {
                            if run_tick(&ctx) == TickOutcome::Disarm {
                                break;
                            }
                        }
                        recv(cancel_rx) -> _ => break,
                    }
                }
            })
            .unwrap_or_else(|e| panic!("failed to spawn drift monitor thread: {e}"));

        Self {
            cancel_tx,
            handle: Some(handle),
            baseline_offset,
        }
    }

    /// Cancel and wait for the worker to exit. Synchronous: once this
    /// returns, no further tick will run from this schedule.
    fn cancel(mut self) {
        let _ = self.cancel_tx.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

/// Drift monitor: owns at most one [`CorrectionSchedule`] at a time.
pub struct DriftMonitor {
    clock: Arc<dyn ReferenceClock>,
    shared: Arc<SessionShared>,
    dispatcher: Arc<Dispatcher>,
    settings: Arc<Mutex<VideoSettings>>,
    tuning: SyncTuning,
    schedule: Option<CorrectionSchedule>,
}

impl DriftMonitor {
    pub fn new(
        clock: Arc<dyn ReferenceClock>,
        shared: Arc<SessionShared>,
        dispatcher: Arc<Dispatcher>,
        settings: Arc<Mutex<VideoSettings>>,
        tuning: SyncTuning,
    ) -> Self {
        Self {
            clock,
            shared,
            dispatcher,
            settings,
            tuning,
            schedule: None,
        }
    }

    /// Align the stream now and install a fresh periodic schedule.
    ///
    /// `offset` is a one-shot adjustment on top of the configured sync
    /// offset: zero for routine re-arms, non-zero for a manual nudge. Any
    /// existing schedule is cancelled first, so exactly one schedule is
    /// active after return. Must not be called from a dispatcher job (the
    /// cancel join would wait on the dispatcher itself).
    pub fn arm(&mut self, offset: Time) {
        self.disarm();

        let baseline_offset = lock(&self.settings).sync_offset + offset;
        let clock = Arc::clone(&self.clock);
        let shared = Arc::clone(&self.shared);
        self.dispatcher.invoke(move || {
            shared.with_stream(|stream| {
                let target = clock.current_time() + baseline_offset;
                if let Err(e) = stream.set_position(target) {
                    warn!("alignment seek failed: {e}");
                }
            });
        });

        let ctx = TickContext {
            clock: Arc::clone(&self.clock),
            shared: Arc::clone(&self.shared),
            dispatcher: Arc::clone(&self.dispatcher),
            baseline_offset,
            threshold: self.tuning.threshold,
        };
        self.schedule = Some(CorrectionSchedule::start(self.tuning.period, ctx));
    }

    /// Cancel the schedule, if any. Synchronous and idempotent; see
    /// [`DriftMonitor::arm`] for the caller-context restriction.
    pub fn disarm(&mut self) {
        if let Some(schedule) = self.schedule.take() {
            schedule.cancel();
        }
    }

    /// Whether a schedule is installed and its worker still running.
    pub fn is_armed(&self) -> bool {
        self.schedule.as_ref().is_some_and(|s| s.is_active())
    }

    /// Baseline offset of the installed schedule, if any.
    pub fn armed_baseline(&self) -> Option<Time> {
        self.schedule.as_ref().map(|s| s.baseline_offset)
    }
}

impl Drop for DriftMonitor {
    fn drop(&mut self) {
        self.disarm();
    }
}
