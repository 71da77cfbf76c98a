//! SQLite persistence layer for settings, cached timer state, session
//! records and tasks.

use crate::collaborators::{DurableCache, SessionStore, SettingsSource, StoreResult};
use crate::models::{
    Analytics, DailyStats, FocusSummary, NewSessionRecord, NewTask, ProjectStats, RecordId,
    SessionRecord, SessionType, Settings, Task, TaskId, TimerState,
};
use chrono::{
    DateTime, Datelike, Days, Local, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Utc,
};
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

const SETTINGS_KEY: &str = "config";
const TIMER_STATE_KEY: &str = "timer_state";

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to create database directory")]
    DirectoryCreation,
    #[error("Session record {0} not found")]
    RecordNotFound(RecordId),
    #[error("Task {0} not found")]
    TaskNotFound(TaskId),
}

pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens the database in the platform data directory.
    pub fn new() -> Result<Self, DatabaseError> {
        Self::open(Self::db_path())
    }

    /// Opens or creates the database at `path`, initializing tables if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DatabaseError> {
        let path = path.as_ref();

        // Ensure directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|_| DatabaseError::DirectoryCreation)?;
        }

        let conn = Connection::open(path)?;
        // Several connections share the file (UI thread, record worker).
        conn.busy_timeout(Duration::from_secs(2))?;
        Self::initialize_tables(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing).
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_tables(&conn)?;
        Ok(Self { conn })
    }

    fn initialize_tables(conn: &Connection) -> Result<(), DatabaseError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                project TEXT NOT NULL DEFAULT 'Personal',
                estimated_pomodoros INTEGER NOT NULL DEFAULT 1,
                completed_pomodoros INTEGER NOT NULL DEFAULT 0,
                completed INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS pomodoro_sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                task_id INTEGER REFERENCES tasks(id),
                session_type TEXT NOT NULL,
                duration_mins INTEGER NOT NULL,
                completed INTEGER NOT NULL DEFAULT 0,
                started_at TEXT NOT NULL,
                completed_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_started_at
                ON pomodoro_sessions (started_at);
        "#,
        )?;
        Self::add_task_columns(conn)?;
        Ok(())
    }

    /// Brings a task table created before project and pomodoro tracking up
    /// to date.
    fn add_task_columns(conn: &Connection) -> Result<(), DatabaseError> {
        const COLUMNS: [(&str, &str); 3] = [
            ("project", "TEXT NOT NULL DEFAULT 'Personal'"),
            ("estimated_pomodoros", "INTEGER NOT NULL DEFAULT 1"),
            ("completed_pomodoros", "INTEGER NOT NULL DEFAULT 0"),
        ];
        for (name, definition) in COLUMNS {
            let exists: bool = conn.query_row(
                "SELECT COUNT(*) FROM pragma_table_info('tasks') WHERE name = ?",
                [name],
                |row| row.get::<_, i64>(0).map(|count| count > 0),
            )?;
            if !exists {
                conn.execute_batch(&format!(
                    "ALTER TABLE tasks ADD COLUMN {} {};",
                    name, definition
                ))?;
            }
        }
        Ok(())
    }

    pub fn db_path() -> PathBuf {
        ProjectDirs::from("com", "focusbar", "Focusbar")
            .map(|dirs| dirs.data_dir().join("focusbar.db"))
            .unwrap_or_else(|| PathBuf::from("focusbar.db"))
    }

    fn get_value(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let value = self
            .conn
            .query_row("SELECT value FROM settings WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn put_value(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)",
            [key, value],
        )?;
        Ok(())
    }

    /// Loads settings from the database, returning defaults if not found.
    pub fn load_settings(&self) -> Result<Settings, DatabaseError> {
        match self.get_value(SETTINGS_KEY)? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Settings::default()),
        }
    }

    /// Saves settings to the database.
    pub fn save_settings(&self, settings: &Settings) -> Result<(), DatabaseError> {
        let json = serde_json::to_string(settings)?;
        self.put_value(SETTINGS_KEY, &json)
    }

    /// Saves the live timer state.
    pub fn save_timer_state(&self, state: &TimerState) -> Result<(), DatabaseError> {
        let json = serde_json::to_string(state)?;
        self.put_value(TIMER_STATE_KEY, &json)
    }

    /// Loads the cached timer state. Unreadable values count as absent.
    pub fn load_timer_state(&self) -> Option<TimerState> {
        let json = match self.get_value(TIMER_STATE_KEY) {
            Ok(value) => value?,
            Err(e) => {
                warn!("failed to read cached timer state: {}", e);
                return None;
            }
        };
        match serde_json::from_str(&json) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!("discarding corrupt timer state: {}", e);
                None
            }
        }
    }

    /// Inserts a started session and returns its id.
    pub fn create_session(&self, record: &NewSessionRecord) -> Result<RecordId, DatabaseError> {
        self.conn.execute(
            "INSERT INTO pomodoro_sessions (task_id, session_type, duration_mins, completed, started_at)
             VALUES (?, ?, ?, 0, ?)",
            params![
                record.task_id,
                record.session_type.as_db_value(),
                record.duration_mins,
                timestamp(Utc::now()),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Marks a session complete and stamps its completion time.
    ///
    /// A completed focus session also counts toward its task. Completing
    /// an already completed session changes nothing.
    pub fn complete_session(&self, id: RecordId) -> Result<(), DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;

        let row: Option<(bool, String, Option<TaskId>)> = tx
            .query_row(
                "SELECT completed, session_type, task_id FROM pomodoro_sessions WHERE id = ?",
                [id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        let (completed, session_type, task_id) = row.ok_or(DatabaseError::RecordNotFound(id))?;
        if completed {
            return Ok(());
        }

        tx.execute(
            "UPDATE pomodoro_sessions SET completed = 1, completed_at = ? WHERE id = ?",
            params![timestamp(Utc::now()), id],
        )?;
        if let (Some(task_id), Some(SessionType::Focus)) =
            (task_id, SessionType::from_db_value(&session_type))
        {
            tx.execute(
                "UPDATE tasks SET completed_pomodoros = completed_pomodoros + 1 WHERE id = ?",
                [task_id],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Gets a single session record.
    #[cfg(test)]
    pub fn get_session(&self, id: RecordId) -> Result<Option<SessionRecord>, DatabaseError> {
        let record = self
            .conn
            .query_row(
                "SELECT id, task_id, session_type, duration_mins, completed, started_at, completed_at
                 FROM pomodoro_sessions WHERE id = ?",
                [id],
                session_from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Lists sessions started within `[from, to)`, oldest first.
    pub fn sessions_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<SessionRecord>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, task_id, session_type, duration_mins, completed, started_at, completed_at
             FROM pomodoro_sessions
             WHERE started_at >= ? AND started_at < ?
             ORDER BY started_at, id",
        )?;
        let rows = stmt.query_map([timestamp(from), timestamp(to)], session_from_row)?;
        let records = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Gets completed focus work for a local calendar date.
    pub fn daily_stats(&self, date: NaiveDate) -> Result<DailyStats, DatabaseError> {
        let (from, to) = local_day_bounds(date);
        let mut stats = DailyStats::new(date);
        for record in self.sessions_between(from, to)? {
            if record.completed && record.session_type == SessionType::Focus {
                stats.completed_pomodoros += 1;
                stats.total_focus_minutes += record.duration_mins;
            }
        }
        Ok(stats)
    }

    /// Sums completed focus sessions started within `[from, to)`.
    pub fn focus_summary(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<FocusSummary, DatabaseError> {
        let mut summary = FocusSummary::default();
        for record in self.sessions_between(from, to)? {
            if record.completed && record.session_type == SessionType::Focus {
                summary.sessions += 1;
                summary.minutes += record.duration_mins;
            }
        }
        Ok(summary)
    }

    /// Sums every completed focus session on record.
    pub fn all_time_summary(&self) -> Result<FocusSummary, DatabaseError> {
        let summary = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(duration_mins), 0)
             FROM pomodoro_sessions
             WHERE completed = 1 AND session_type = ?",
            [SessionType::Focus.as_db_value()],
            |row| {
                Ok(FocusSummary {
                    sessions: row.get(0)?,
                    minutes: row.get(1)?,
                })
            },
        )?;
        Ok(summary)
    }

    /// Task and pomodoro totals per project, busiest first.
    pub fn project_stats(&self) -> Result<Vec<ProjectStats>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT project, COUNT(*), COALESCE(SUM(completed_pomodoros), 0)
             FROM tasks
             GROUP BY project
             ORDER BY SUM(completed_pomodoros) DESC, project",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ProjectStats {
                project: row.get(0)?,
                tasks: row.get(1)?,
                completed_pomodoros: row.get(2)?,
            })
        })?;
        let projects = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(projects)
    }

    /// Gathers the day, week, all-time and task figures around `date`.
    pub fn analytics(&self, date: NaiveDate) -> Result<Analytics, DatabaseError> {
        let (week_start, week_end) = week_bounds(date);
        let (tasks_completed, tasks_total): (u32, u32) = self.conn.query_row(
            "SELECT COALESCE(SUM(completed), 0), COUNT(*) FROM tasks",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(Analytics {
            today: self.daily_stats(date)?,
            week: self.focus_summary(local_day_bounds(week_start).0, local_day_bounds(week_end).0)?,
            all_time: self.all_time_summary()?,
            tasks_completed,
            tasks_total,
            projects: self.project_stats()?,
        })
    }

    /// Lists tasks that are not completed, oldest first.
    pub fn open_tasks(&self) -> Result<Vec<Task>, DatabaseError> {
        self.query_tasks("WHERE completed = 0")
    }

    /// Lists every task, oldest first.
    pub fn all_tasks(&self) -> Result<Vec<Task>, DatabaseError> {
        self.query_tasks("")
    }

    fn query_tasks(&self, filter: &str) -> Result<Vec<Task>, DatabaseError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, title, project, estimated_pomodoros, completed_pomodoros, completed
             FROM tasks {} ORDER BY id",
            filter
        ))?;
        let rows = stmt.query_map([], |row| {
            Ok(Task {
                id: row.get(0)?,
                title: row.get(1)?,
                project: row.get(2)?,
                estimated_pomodoros: row.get(3)?,
                completed_pomodoros: row.get(4)?,
                completed: row.get(5)?,
            })
        })?;
        let tasks = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    /// Adds an open task and returns it.
    pub fn add_task(&self, task: &NewTask) -> Result<Task, DatabaseError> {
        self.conn.execute(
            "INSERT INTO tasks (title, project, estimated_pomodoros, completed_pomodoros, completed, created_at)
             VALUES (?, ?, ?, 0, 0, ?)",
            params![
                task.title,
                task.project,
                task.estimated_pomodoros,
                timestamp(Utc::now())
            ],
        )?;
        Ok(Task {
            id: self.conn.last_insert_rowid(),
            title: task.title.clone(),
            project: task.project.clone(),
            estimated_pomodoros: task.estimated_pomodoros,
            completed_pomodoros: 0,
            completed: false,
        })
    }

    /// Marks a task done so it leaves the task menu.
    pub fn complete_task(&self, id: TaskId) -> Result<(), DatabaseError> {
        let updated = self
            .conn
            .execute("UPDATE tasks SET completed = 1 WHERE id = ?", [id])?;
        if updated == 0 {
            return Err(DatabaseError::TaskNotFound(id));
        }
        Ok(())
    }

    /// Deletes a task. Its session records stay, unattributed.
    pub fn delete_task(&self, id: TaskId) -> Result<(), DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE pomodoro_sessions SET task_id = NULL WHERE task_id = ?",
            [id],
        )?;
        let deleted = tx.execute("DELETE FROM tasks WHERE id = ?", [id])?;
        if deleted == 0 {
            return Err(DatabaseError::TaskNotFound(id));
        }
        tx.commit()?;
        Ok(())
    }

    #[cfg(test)]
    fn execute_raw(&self, sql: &str) -> Result<(), DatabaseError> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }
}

impl DurableCache for Database {
    fn save(&mut self, state: &TimerState) -> StoreResult<()> {
        Ok(self.save_timer_state(state)?)
    }

    fn load(&self) -> Option<TimerState> {
        self.load_timer_state()
    }
}

impl SessionStore for Database {
    fn create(&mut self, record: &NewSessionRecord) -> StoreResult<RecordId> {
        Ok(self.create_session(record)?)
    }

    fn complete(&mut self, id: RecordId) -> StoreResult<()> {
        Ok(self.complete_session(id)?)
    }
}

impl SettingsSource for Database {
    fn fetch(&self) -> StoreResult<Settings> {
        Ok(self.load_settings()?)
    }
}

/// Fixed-width UTC timestamps so text comparison matches time order.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<SessionRecord> {
    let session_type: String = row.get(2)?;
    let session_type = SessionType::from_db_value(&session_type).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown session type: {}", session_type).into(),
        )
    })?;
    let started_at: String = row.get(5)?;
    let completed_at: Option<String> = row.get(6)?;

    Ok(SessionRecord {
        id: row.get(0)?,
        task_id: row.get(1)?,
        session_type,
        duration_mins: row.get(3)?,
        completed: row.get(4)?,
        started_at: parse_timestamp(5, &started_at)?,
        completed_at: completed_at
            .map(|value| parse_timestamp(6, &value))
            .transpose()?,
    })
}

/// UTC bounds of a local calendar day.
fn local_day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start_of = |day: NaiveDate| {
        let midnight = day.and_time(NaiveTime::MIN);
        Local
            .from_local_datetime(&midnight)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
    };
    let next = date.succ_opt().unwrap_or(date);
    (start_of(date), start_of(next))
}

/// First day of the Sunday-based week containing `date`, and the first day
/// of the following week.
fn week_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let offset = u64::from(date.weekday().num_days_from_sunday());
    let start = date.checked_sub_days(Days::new(offset)).unwrap_or(date);
    let end = start.checked_add_days(Days::new(7)).unwrap_or(start);
    (start, end)
}
