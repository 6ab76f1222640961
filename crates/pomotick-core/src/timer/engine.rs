//! Timer engine implementation.
//!
//! The timer engine is a wall-clock-based state machine. It does not use
//! internal threads - while a segment runs the engine arms a single ticker
//! and the host is responsible for calling `tick()` at `ticker_interval()`.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running -> Paused -> Running
//!           |
//!           +-- countdown reaches 0 --> next segment (Idle, or Running with autoStartNext)
//! ```
//!
//! Remaining time is never decremented per tick. `start` stores an absolute
//! end timestamp and every observation recomputes `max(0, end - now)`.
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::new(TimerSettings::default());
//! let _sub = engine.subscribe(|state| println!("{state:?}"));
//! engine.start();
//! // In the event loop, while engine.ticker_interval().is_some():
//! engine.tick();
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::clock::{Clock, SystemClock};
use super::listeners::{Listeners, Subscription};
use super::settings::{SettingsPatch, TimerMode, TimerSettings, TimerStatus};

/// Re-check cadence while a segment runs.
pub const TICK_INTERVAL_MS: u64 = 250;

/// Externally observable state. A fresh value is built for every change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub mode: TimerMode,
    pub status: TimerStatus,
    pub duration_ms: u64,
    pub remaining_ms: u64,
    pub completed_focus: u64,
    pub settings: TimerSettings,
}

/// Emitted once per focus segment that ran down to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusCompleted {
    /// Absolute end timestamp of the segment (epoch milliseconds).
    pub ended_at_ms: u64,
    pub planned_duration_ms: u64,
}

#[derive(Debug, Clone, Copy)]
struct Ticker {
    interval_ms: u64,
}

/// Outcome of comparing the stored end timestamp against the clock.
#[derive(Debug, Default)]
struct Reconciliation {
    changed: bool,
    focus_completed: Option<FocusCompleted>,
}

/// Core timer engine.
///
/// Construct one per process and pass it to whoever issues commands.
pub struct TimerEngine<C: Clock = SystemClock> {
    clock: C,
    settings: TimerSettings,
    mode: TimerMode,
    status: TimerStatus,
    completed_focus: u64,
    /// Remaining time in milliseconds for the current segment.
    remaining_ms: u64,
    /// Absolute end of the running segment (epoch ms). Only set while running.
    end_at_ms: Option<u64>,
    ticker: Option<Ticker>,
    tick_interval_ms: u64,
    disposed: bool,
    state_listeners: Listeners<TimerSnapshot>,
    focus_listeners: Listeners<FocusCompleted>,
}

impl TimerEngine<SystemClock> {
    /// Create a new engine on the system clock.
    ///
    /// Starts `Idle` in focus mode with the full focus duration remaining.
    pub fn new(settings: TimerSettings) -> Self {
        Self::with_clock(settings, SystemClock)
    }
}

impl Default for TimerEngine<SystemClock> {
    fn default() -> Self {
        Self::new(TimerSettings::default())
    }
}

impl<C: Clock> TimerEngine<C> {
    pub fn with_clock(settings: TimerSettings, clock: C) -> Self {
        // Stored settings pass through the same normalization as patches.
        let settings = TimerSettings::default().merged(&SettingsPatch::from(&settings));
        let remaining_ms = settings.duration_ms(TimerMode::Focus);
        Self {
            clock,
            settings,
            mode: TimerMode::Focus,
            status: TimerStatus::Idle,
            completed_focus: 0,
            remaining_ms,
            end_at_ms: None,
            ticker: None,
            tick_interval_ms: TICK_INTERVAL_MS,
            disposed: false,
            state_listeners: Listeners::new(),
            focus_listeners: Listeners::new(),
        }
    }

    pub fn with_tick_interval(mut self, interval_ms: u64) -> Self {
        self.tick_interval_ms = interval_ms.max(1);
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn mode(&self) -> TimerMode {
        self.mode
    }

    pub fn status(&self) -> TimerStatus {
        self.status
    }

    pub fn settings(&self) -> &TimerSettings {
        &self.settings
    }

    pub fn completed_focus(&self) -> u64 {
        self.completed_focus
    }

    /// `Some(interval)` while the periodic re-check is armed.
    pub fn ticker_interval(&self) -> Option<Duration> {
        self.ticker.map(|t| Duration::from_millis(t.interval_ms))
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Snapshot without reconciling against the clock.
    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            mode: self.mode,
            status: self.status,
            duration_ms: self.settings.duration_ms(self.mode),
            remaining_ms: self.remaining_ms,
            completed_focus: self.completed_focus,
            settings: self.settings.clone(),
        }
    }

    // ── Subscriptions ────────────────────────────────────────────────

    /// Receive a snapshot after every state change.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(TimerSnapshot) + 'static,
    {
        self.state_listeners.subscribe(listener)
    }

    /// Receive one event per naturally completed focus segment.
    pub fn on_focus_completed<F>(&self, listener: F) -> Subscription
    where
        F: Fn(FocusCompleted) + 'static,
    {
        self.focus_listeners.subscribe(listener)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Reconcile drift (possibly completing the segment) and return the state.
    pub fn get_state(&mut self) -> TimerSnapshot {
        let outcome = self.reconcile();
        self.publish(outcome);
        self.snapshot()
    }

    pub fn start(&mut self) -> TimerSnapshot {
        if self.status == TimerStatus::Running {
            return self.snapshot();
        }

        if self.status == TimerStatus::Idle || self.remaining_ms == 0 {
            self.remaining_ms = self.settings.duration_ms(self.mode);
        }

        self.status = TimerStatus::Running;
        self.end_at_ms = Some(self.clock.now_ms().saturating_add(self.remaining_ms));
        self.ensure_ticker();
        tracing::debug!(mode = %self.mode, remaining_ms = self.remaining_ms, "timer started");
        self.notify(None);
        self.snapshot()
    }

    pub fn pause(&mut self) -> TimerSnapshot {
        if self.status != TimerStatus::Running {
            return self.snapshot();
        }

        // Flush elapsed time first. A completion found here stands, and
        // whatever segment follows it is the one that ends up paused.
        let outcome = self.reconcile();
        self.status = TimerStatus::Paused;
        self.end_at_ms = None;
        self.stop_ticker();
        tracing::debug!(mode = %self.mode, remaining_ms = self.remaining_ms, "timer paused");
        self.notify(outcome.focus_completed);
        self.snapshot()
    }

    pub fn reset(&mut self) -> TimerSnapshot {
        self.stop_ticker();
        self.status = TimerStatus::Idle;
        self.end_at_ms = None;
        self.remaining_ms = self.settings.duration_ms(self.mode);
        self.notify(None);
        self.snapshot()
    }

    /// Move on without counting the current segment as completed.
    pub fn skip(&mut self) -> TimerSnapshot {
        let next = match self.mode {
            TimerMode::Focus => self.settings.break_after(self.completed_focus),
            _ => TimerMode::Focus,
        };
        tracing::debug!(from = %self.mode, to = %next, "segment skipped");
        self.switch_segment(next, self.settings.auto_start_next);
        self.notify(None);
        self.snapshot()
    }

    /// Jump straight to `mode`, idle. Never counts anything.
    pub fn set_mode(&mut self, mode: TimerMode) -> TimerSnapshot {
        self.switch_segment(mode, false);
        self.notify(None);
        self.snapshot()
    }

    pub fn update_settings(&mut self, patch: &SettingsPatch) -> TimerSnapshot {
        // A running segment settles against its old end timestamp first.
        let outcome = self.reconcile();
        self.settings = self.settings.merged(patch);

        let duration_ms = self.settings.duration_ms(self.mode);
        match self.status {
            TimerStatus::Idle => {
                self.remaining_ms = duration_ms;
            }
            TimerStatus::Paused => {
                self.remaining_ms = self.remaining_ms.min(duration_ms);
            }
            TimerStatus::Running => {
                self.remaining_ms = self.remaining_ms.min(duration_ms);
                self.end_at_ms = Some(self.clock.now_ms().saturating_add(self.remaining_ms));
            }
        }

        self.notify(outcome.focus_completed);
        self.snapshot()
    }

    /// Periodic re-check. Does nothing unless the ticker is armed.
    pub fn tick(&mut self) -> TimerSnapshot {
        if self.ticker.is_some() {
            let outcome = self.reconcile();
            self.publish(outcome);
        }
        self.snapshot()
    }

    /// Stop the ticker and drop every listener. Irreversible.
    pub fn dispose(&mut self) {
        self.stop_ticker();
        self.state_listeners.clear();
        self.focus_listeners.clear();
        self.disposed = true;
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn reconcile(&mut self) -> Reconciliation {
        if self.status != TimerStatus::Running {
            return Reconciliation::default();
        }
        let Some(end_at_ms) = self.end_at_ms else {
            return Reconciliation::default();
        };

        let next_remaining_ms = end_at_ms.saturating_sub(self.clock.now_ms());
        if next_remaining_ms > 0 {
            if next_remaining_ms == self.remaining_ms {
                return Reconciliation::default();
            }
            self.remaining_ms = next_remaining_ms;
            return Reconciliation {
                changed: true,
                focus_completed: None,
            };
        }

        Reconciliation {
            changed: true,
            focus_completed: self.complete_current_segment(end_at_ms),
        }
    }

    /// Natural completion. The only place `completed_focus` changes.
    fn complete_current_segment(&mut self, ended_at_ms: u64) -> Option<FocusCompleted> {
        let planned_duration_ms = self.settings.duration_ms(self.mode);
        let (next, completed) = if self.mode == TimerMode::Focus {
            self.completed_focus += 1;
            let completed = FocusCompleted {
                ended_at_ms,
                planned_duration_ms,
            };
            (self.settings.break_after(self.completed_focus), Some(completed))
        } else {
            (TimerMode::Focus, None)
        };

        tracing::info!(
            from = %self.mode,
            to = %next,
            completed_focus = self.completed_focus,
            "segment completed"
        );
        self.switch_segment(next, self.settings.auto_start_next);
        completed
    }

    fn switch_segment(&mut self, mode: TimerMode, auto_start: bool) {
        self.stop_ticker();
        self.mode = mode;
        self.remaining_ms = self.settings.duration_ms(mode);
        self.end_at_ms = None;

        if auto_start {
            self.status = TimerStatus::Running;
            self.end_at_ms = Some(self.clock.now_ms().saturating_add(self.remaining_ms));
            self.ensure_ticker();
        } else {
            self.status = TimerStatus::Idle;
        }
    }

    fn ensure_ticker(&mut self) {
        if self.disposed || self.ticker.is_some() {
            return;
        }
        self.ticker = Some(Ticker {
            interval_ms: self.tick_interval_ms,
        });
    }

    fn stop_ticker(&mut self) {
        self.ticker = None;
    }

    fn publish(&self, outcome: Reconciliation) {
        if outcome.changed {
            self.notify(outcome.focus_completed);
        }
    }

    fn notify(&self, focus_completed: Option<FocusCompleted>) {
        self.state_listeners.emit(&self.snapshot());
        if let Some(completed) = focus_completed {
            self.focus_listeners.emit(&completed);
        }
    }
}
