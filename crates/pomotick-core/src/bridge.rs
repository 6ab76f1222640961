//! JSON-lines request/reply bridge between a host process and the engine.
//!
//! Requests are objects tagged by `"cmd"`. Everything arriving here is
//! untrusted: mode names and settings payloads are validated before the
//! engine sees them, and a rejected request never touches timer state.

use std::rc::Rc;

use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;
use crate::storage::{validate_settings_patch, Database, RangeSummary, SettingsStore, TodaySummary};
use crate::timer::{Clock, Subscription, SystemClock, TimerEngine, TimerMode, TimerSnapshot};

fn default_range_days() -> u32 {
    7
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "camelCase")]
pub enum Request {
    GetState,
    Start,
    Pause,
    Reset,
    Skip,
    SetMode {
        mode: Value,
    },
    UpdateSettings {
        settings: Value,
    },
    TodaySummary,
    RangeSummary {
        #[serde(default = "default_range_days")]
        days: u32,
    },
    Quit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Reply {
    State { state: TimerSnapshot },
    TodaySummary { summary: TodaySummary },
    RangeSummary { summary: RangeSummary },
    Error { message: String },
    Closed,
}

impl Reply {
    fn error(message: impl std::fmt::Display) -> Self {
        Reply::Error {
            message: message.to_string(),
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Reply::Closed)
    }
}

/// Owns the engine and its collaborators for one host process.
pub struct Bridge<C: Clock = SystemClock> {
    engine: TimerEngine<C>,
    settings: Option<SettingsStore>,
    history: Option<Rc<Database>>,
    recorder: Option<Subscription>,
}

impl<C: Clock> Bridge<C> {
    pub fn new(engine: TimerEngine<C>) -> Self {
        Self {
            engine,
            settings: None,
            history: None,
            recorder: None,
        }
    }

    /// Persist accepted settings updates through `store`.
    pub fn with_settings_store(mut self, store: SettingsStore) -> Self {
        self.settings = Some(store);
        self
    }

    /// Record every naturally completed focus segment into `db`.
    pub fn with_history(mut self, db: Database) -> Self {
        let db = Rc::new(db);
        let recorder_db = Rc::clone(&db);
        let subscription = self.engine.on_focus_completed(move |completed| {
            match recorder_db.append_focus_session(&completed) {
                Ok(session) => tracing::info!(id = %session.id, "focus session recorded"),
                Err(e) => tracing::warn!(error = %e, "failed to record focus session"),
            }
        });
        if let Some(previous) = self.recorder.replace(subscription) {
            previous.unsubscribe();
        }
        self.history = Some(db);
        self
    }

    pub fn engine(&self) -> &TimerEngine<C> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut TimerEngine<C> {
        &mut self.engine
    }

    /// Handle one line as read off the wire, before any UTF-8 decoding.
    pub fn handle_raw_line(&mut self, raw: &[u8]) -> Reply {
        match std::str::from_utf8(raw) {
            Ok(line) => self.handle_line(line),
            Err(e) => {
                tracing::debug!(error = %e, "rejected non-UTF-8 request line");
                Reply::error(ValidationError::InvalidPayload {
                    what: "request".into(),
                    message: e.to_string(),
                })
            }
        }
    }

    /// Parse one protocol line and handle it.
    pub fn handle_line(&mut self, line: &str) -> Reply {
        match serde_json::from_str::<Request>(line.trim()) {
            Ok(request) => self.handle(request),
            Err(e) => {
                tracing::debug!(error = %e, "rejected request line");
                Reply::error(ValidationError::InvalidPayload {
                    what: "request".into(),
                    message: e.to_string(),
                })
            }
        }
    }

    pub fn handle(&mut self, request: Request) -> Reply {
        if self.engine.is_disposed() {
            return Reply::Closed;
        }

        let state = match request {
            Request::GetState => self.engine.get_state(),
            Request::Start => self.engine.start(),
            Request::Pause => self.engine.pause(),
            Request::Reset => self.engine.reset(),
            Request::Skip => self.engine.skip(),
            Request::SetMode { mode } => match parse_mode(&mode) {
                Ok(mode) => self.engine.set_mode(mode),
                Err(e) => return Reply::error(e),
            },
            Request::UpdateSettings { settings } => match validate_settings_patch(&settings) {
                Ok(patch) => {
                    let state = self.engine.update_settings(&patch);
                    self.persist_settings();
                    state
                }
                Err(e) => return Reply::error(e),
            },
            Request::TodaySummary => {
                return match self.history_db() {
                    Ok(db) => match db.today_summary(Local::now()) {
                        Ok(summary) => Reply::TodaySummary { summary },
                        Err(e) => Reply::error(e),
                    },
                    Err(reply) => reply,
                };
            }
            Request::RangeSummary { days } => {
                return match self.history_db() {
                    Ok(db) => match db.range_summary(days, Local::now()) {
                        Ok(summary) => Reply::RangeSummary { summary },
                        Err(e) => Reply::error(e),
                    },
                    Err(reply) => reply,
                };
            }
            Request::Quit => {
                self.dispose();
                return Reply::Closed;
            }
        };

        Reply::State { state }
    }

    /// Stop the engine and drop the history recorder.
    pub fn dispose(&mut self) {
        if let Some(recorder) = self.recorder.take() {
            recorder.unsubscribe();
        }
        self.engine.dispose();
    }

    fn history_db(&self) -> Result<&Database, Reply> {
        self.history
            .as_deref()
            .ok_or_else(|| Reply::error("history is not available"))
    }

    fn persist_settings(&mut self) {
        let Some(store) = self.settings.as_mut() else {
            return;
        };
        if let Err(e) = store.save(self.engine.settings()) {
            tracing::warn!(path = %store.path().display(), error = %e, "failed to persist settings");
        }
    }
}

fn parse_mode(value: &Value) -> Result<TimerMode, ValidationError> {
    match value.as_str() {
        Some(raw) => raw.parse(),
        None => Err(ValidationError::InvalidMode(value.to_string())),
    }
}
