mod clock;
mod engine;
mod listeners;
mod settings;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{FocusCompleted, TimerEngine, TimerSnapshot, TICK_INTERVAL_MS};
pub use listeners::{Listeners, Subscription};
pub use settings::{SettingsPatch, TimerMode, TimerSettings, TimerStatus, MS_PER_MINUTE};
