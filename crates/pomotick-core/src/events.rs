use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::{FocusCompleted, TimerSnapshot};

/// Engine notifications as they cross the process boundary.
/// The host forwards one line per event; the history recorder consumes
/// `FocusCompleted`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    StateChanged {
        state: TimerSnapshot,
        at: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    FocusCompleted {
        ended_at_ms: u64,
        planned_duration_ms: u64,
        at: DateTime<Utc>,
    },
}

impl Event {
    pub fn state_changed(state: TimerSnapshot) -> Self {
        Event::StateChanged {
            state,
            at: Utc::now(),
        }
    }

    pub fn focus_completed(completed: FocusCompleted) -> Self {
        Event::FocusCompleted {
            ended_at_ms: completed.ended_at_ms,
            planned_duration_ms: completed.planned_duration_ms,
            at: Utc::now(),
        }
    }
}
