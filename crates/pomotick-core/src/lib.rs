//! # Pomotick Core Library
//!
//! Core logic for the pomotick Pomodoro countdown timer. The `pomotick`
//! binary is a thin host over this crate.
//!
//! ## Architecture
//!
//! - **Timer Engine**: A wall-clock-based state machine that cycles focus and
//!   break segments. The caller drives it by invoking `tick()` while a
//!   segment runs
//! - **Storage**: TOML-based settings and SQLite focus history
//! - **Bridge**: JSON-lines request/reply protocol for host processes
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: Core timer state machine
//! - [`SettingsStore`]: Validated, persisted timer settings
//! - [`Database`]: Completed focus sessions and summaries
//! - [`Bridge`]: Untrusted-input boundary in front of the engine

pub mod bridge;
pub mod error;
pub mod events;
pub mod storage;
pub mod timer;

pub use bridge::{Bridge, Reply, Request};
pub use error::{ConfigError, CoreError, DatabaseError, ValidationError};
pub use events::Event;
pub use storage::{Config, Database, FocusSession, RangeSummary, SettingsStore, TodaySummary};
pub use timer::{
    Clock, FocusCompleted, ManualClock, SettingsPatch, Subscription, SystemClock, TimerEngine,
    TimerMode, TimerSettings, TimerSnapshot, TimerStatus, TICK_INTERVAL_MS,
};
