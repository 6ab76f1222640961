//! SQLite-based focus history.
//!
//! Provides persistent storage for:
//! - Focus segments that ran to completion
//! - Today / last-N-days summaries on local calendar-day boundaries

use std::path::Path;

use chrono::{DateTime, Days, Local, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::data_dir;
use super::migrations;
use crate::error::{DatabaseError, Result, ValidationError};
use crate::timer::{FocusCompleted, MS_PER_MINUTE};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusSession {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub planned_duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodaySummary {
    pub date: String,
    pub pomodoros: u64,
    pub focus_minutes: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeSummary {
    pub from_date: String,
    pub to_date: String,
    pub days: u32,
    pub pomodoros: u64,
    pub focus_minutes: f64,
}

/// SQLite database for the focus history.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `~/.config/pomotick/pomotick.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        Self::open_at(&data_dir()?.join("pomotick.db"))
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        migrations::migrate(&conn).map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Append one completed focus segment.
    ///
    /// # Errors
    /// Rejects a zero planned duration or timestamps outside chrono's range,
    /// and returns an error if the insert fails.
    pub fn append_focus_session(&self, completed: &FocusCompleted) -> Result<FocusSession> {
        let invalid = |field: &str, message: &str| ValidationError::InvalidValue {
            field: field.to_string(),
            message: message.to_string(),
        };

        if completed.planned_duration_ms == 0 {
            return Err(invalid("plannedDurationMs", "must be > 0").into());
        }
        let ended_at_ms = i64::try_from(completed.ended_at_ms)
            .map_err(|_| invalid("endedAtMs", "out of range"))?;
        let planned_ms = i64::try_from(completed.planned_duration_ms)
            .map_err(|_| invalid("plannedDurationMs", "out of range"))?;
        let ended_at = Utc
            .timestamp_millis_opt(ended_at_ms)
            .single()
            .ok_or_else(|| invalid("endedAtMs", "out of range"))?;
        let started_at = ended_at - chrono::Duration::milliseconds(planned_ms);

        let session = FocusSession {
            id: Uuid::new_v4().to_string(),
            started_at,
            ended_at,
            planned_duration_ms: completed.planned_duration_ms,
        };

        self.conn.execute(
            "INSERT INTO focus_sessions (id, started_at, ended_at, ended_at_ms, planned_duration_ms)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                session.id,
                session.started_at.to_rfc3339_opts(SecondsFormat::Millis, true),
                session.ended_at.to_rfc3339_opts(SecondsFormat::Millis, true),
                ended_at_ms,
                planned_ms,
            ],
        )?;
        Ok(session)
    }

    /// All recorded sessions, oldest first.
    pub fn sessions(&self) -> Result<Vec<FocusSession>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, started_at, ended_at, planned_duration_ms
             FROM focus_sessions
             ORDER BY ended_at_ms, id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        let mut sessions = Vec::new();
        for row in rows {
            let (id, started_at, ended_at, planned_ms) = row?;
            sessions.push(FocusSession {
                id,
                started_at: parse_timestamp(&started_at)?,
                ended_at: parse_timestamp(&ended_at)?,
                planned_duration_ms: planned_ms.max(0) as u64,
            });
        }
        Ok(sessions)
    }

    /// Sessions that ended on `now`'s local calendar day.
    pub fn today_summary(&self, now: DateTime<Local>) -> Result<TodaySummary> {
        let today = now.date_naive();
        let start = start_of_local_day(today);
        let end = today
            .checked_add_days(Days::new(1))
            .map(start_of_local_day)
            .unwrap_or(now);

        let (pomodoros, total_ms) = self.aggregate(start.timestamp_millis(), end.timestamp_millis())?;
        Ok(TodaySummary {
            date: format_local_date(today),
            pomodoros,
            focus_minutes: total_ms as f64 / MS_PER_MINUTE,
        })
    }

    /// Sessions from local midnight `days - 1` days ago up to `now` inclusive.
    pub fn range_summary(&self, days: u32, now: DateTime<Local>) -> Result<RangeSummary> {
        let days = days.max(1);
        let today = now.date_naive();
        let first_day = today
            .checked_sub_days(Days::new(u64::from(days - 1)))
            .unwrap_or(NaiveDate::MIN);
        let start = start_of_local_day(first_day);

        let (pomodoros, total_ms) =
            self.aggregate(start.timestamp_millis(), now.timestamp_millis().saturating_add(1))?;
        Ok(RangeSummary {
            from_date: format_local_date(first_day),
            to_date: format_local_date(today),
            days,
            pomodoros,
            focus_minutes: total_ms as f64 / MS_PER_MINUTE,
        })
    }

    /// Count and total planned ms for sessions ending in `[from_ms, to_ms)`.
    fn aggregate(&self, from_ms: i64, to_ms: i64) -> Result<(u64, u64)> {
        let (count, total) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(planned_duration_ms), 0)
             FROM focus_sessions
             WHERE ended_at_ms >= ?1 AND ended_at_ms < ?2",
            params![from_ms, to_ms],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
        )?;
        Ok((count.max(0) as u64, total.max(0) as u64))
    }
}

/// Local midnight of `date`. Falls back to UTC midnight when a DST gap
/// swallows it.
fn start_of_local_day(date: NaiveDate) -> DateTime<Local> {
    let midnight = date.and_time(NaiveTime::MIN);
    Local
        .from_local_datetime(&midnight)
        .earliest()
        .unwrap_or_else(|| Local.from_utc_datetime(&midnight))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::QueryFailed(format!("bad timestamp '{raw}': {e}")).into())
}

fn format_local_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
