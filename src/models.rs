//! Data models for the Focusbar application.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a persisted session record.
pub type RecordId = i64;

/// Identifier of a task in the task list.
pub type TaskId = i64;

const DEFAULT_FOCUS_MINS: u32 = 25;
const DEFAULT_SHORT_BREAK_MINS: u32 = 5;
const DEFAULT_LONG_BREAK_MINS: u32 = 15;
const DEFAULT_LONG_BREAK_AFTER: u32 = 4;

/// Project a task lands in when none is given.
pub const DEFAULT_PROJECT: &str = "Personal";

/// The kind of interval the timer is counting down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Focus,
    ShortBreak,
    LongBreak,
}

impl SessionType {
    pub const ALL: [SessionType; 3] = [Self::Focus, Self::ShortBreak, Self::LongBreak];

    pub fn is_break(self) -> bool {
        !matches!(self, Self::Focus)
    }

    /// Value stored in the `session_type` column.
    pub fn as_db_value(self) -> &'static str {
        match self {
            Self::Focus => "focus",
            Self::ShortBreak => "short_break",
            Self::LongBreak => "long_break",
        }
    }

    pub fn from_db_value(value: &str) -> Option<Self> {
        match value {
            "focus" => Some(Self::Focus),
            "short_break" => Some(Self::ShortBreak),
            "long_break" => Some(Self::LongBreak),
            _ => None,
        }
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Focus => "Focus",
            Self::ShortBreak => "Short break",
            Self::LongBreak => "Long break",
        };
        f.write_str(label)
    }
}

/// Live state of the countdown, owned by the timer engine.
///
/// Serialized to the durable cache after every mutation so a restart picks
/// up where the previous run left off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub is_running: bool,
    pub is_paused: bool,
    /// Remaining seconds in the active session.
    pub current_time: u32,
    /// Full length of the active session in seconds.
    pub total_time: u32,
    pub session_type: SessionType,
    /// Focus sessions entered so far, starting at 1.
    pub session_number: u32,
    #[serde(default)]
    pub current_task_id: Option<TaskId>,
}

impl Default for TimerState {
    fn default() -> Self {
        Self::initial(&Settings::default())
    }
}

impl TimerState {
    /// Idle first focus session sized from the given settings.
    pub fn initial(settings: &Settings) -> Self {
        let total = settings.duration_secs(SessionType::Focus);
        Self {
            is_running: false,
            is_paused: false,
            current_time: total,
            total_time: total,
            session_type: SessionType::Focus,
            session_number: 1,
            current_task_id: None,
        }
    }

    /// Returns true while the countdown should be decrementing.
    pub fn is_ticking(&self) -> bool {
        self.is_running && !self.is_paused
    }

    /// Returns true when no session has been started or it was reset.
    pub fn is_idle(&self) -> bool {
        !self.is_running
    }

    /// Returns the elapsed fraction (0.0 to 1.0) of the active session.
    pub fn progress_percent(&self) -> f32 {
        if self.total_time == 0 {
            return 1.0;
        }
        1.0 - (self.current_time as f32 / self.total_time as f32)
    }

    /// Checks the invariants a restored state must satisfy.
    pub fn is_consistent(&self) -> bool {
        self.current_time <= self.total_time && self.session_number >= 1
    }
}

/// User-configurable settings for the pomodoro timer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Duration of a focus session in minutes.
    pub focus_mins: u32,
    /// Duration of a short break in minutes.
    pub short_break_mins: u32,
    /// Duration of a long break in minutes.
    pub long_break_mins: u32,
    /// A long break follows every N-th focus session.
    pub long_break_after: u32,
    /// Start breaks without user action when a focus session ends.
    pub auto_start_breaks: bool,
    /// Start focus sessions without user action when a break ends.
    pub auto_start_pomodoros: bool,
    /// Whether to show system notifications.
    pub notifications_enabled: bool,
    /// Whether to play sounds on timer completion.
    pub sound_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            focus_mins: DEFAULT_FOCUS_MINS,
            short_break_mins: DEFAULT_SHORT_BREAK_MINS,
            long_break_mins: DEFAULT_LONG_BREAK_MINS,
            long_break_after: DEFAULT_LONG_BREAK_AFTER,
            auto_start_breaks: false,
            auto_start_pomodoros: false,
            notifications_enabled: true,
            sound_enabled: true,
        }
    }
}

impl Settings {
    /// Duration in minutes for a session type. Zero falls back to the default.
    pub fn duration_mins(&self, session_type: SessionType) -> u32 {
        let (configured, fallback) = match session_type {
            SessionType::Focus => (self.focus_mins, DEFAULT_FOCUS_MINS),
            SessionType::ShortBreak => (self.short_break_mins, DEFAULT_SHORT_BREAK_MINS),
            SessionType::LongBreak => (self.long_break_mins, DEFAULT_LONG_BREAK_MINS),
        };
        if configured == 0 {
            fallback
        } else {
            configured
        }
    }

    pub fn duration_secs(&self, session_type: SessionType) -> u32 {
        self.duration_mins(session_type).saturating_mul(60)
    }

    /// Long break cadence, never zero.
    pub fn long_break_cadence(&self) -> u32 {
        if self.long_break_after == 0 {
            DEFAULT_LONG_BREAK_AFTER
        } else {
            self.long_break_after
        }
    }

    /// Picks the session that follows `finished`.
    ///
    /// `session_number` is the number of the focus session that just ended.
    pub fn next_session_type(&self, finished: SessionType, session_number: u32) -> SessionType {
        match finished {
            SessionType::Focus if session_number % self.long_break_cadence() == 0 => {
                SessionType::LongBreak
            }
            SessionType::Focus => SessionType::ShortBreak,
            SessionType::ShortBreak | SessionType::LongBreak => SessionType::Focus,
        }
    }

    /// Whether the session after `finished` starts on its own.
    pub fn auto_starts_after(&self, finished: SessionType) -> bool {
        if finished.is_break() {
            self.auto_start_pomodoros
        } else {
            self.auto_start_breaks
        }
    }
}

/// A session record about to be created in the session store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSessionRecord {
    pub task_id: Option<TaskId>,
    pub session_type: SessionType,
    pub duration_mins: u32,
}

/// A persisted log entry for one started timer interval.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub id: RecordId,
    pub task_id: Option<TaskId>,
    pub session_type: SessionType,
    pub duration_mins: u32,
    pub completed: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// An entry in the task list that focus sessions can be attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub project: String,
    pub estimated_pomodoros: u32,
    /// Focus sessions completed while this task was selected.
    pub completed_pomodoros: u32,
    pub completed: bool,
}

/// A task about to be added to the task list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub project: String,
    pub estimated_pomodoros: u32,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            project: DEFAULT_PROJECT.to_string(),
            estimated_pomodoros: 1,
        }
    }
}

/// Completed focus work for one day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyStats {
    pub date: NaiveDate,
    pub completed_pomodoros: u32,
    pub total_focus_minutes: u32,
}

impl DailyStats {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            completed_pomodoros: 0,
            total_focus_minutes: 0,
        }
    }
}

/// Count and length of completed focus sessions over some period.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct FocusSummary {
    pub sessions: u32,
    pub minutes: u32,
}

impl FocusSummary {
    /// Average session length in whole minutes, 0 when nothing was done.
    pub fn average_mins(&self) -> u32 {
        if self.sessions == 0 {
            return 0;
        }
        (self.minutes as f64 / self.sessions as f64).round() as u32
    }
}

/// Tasks and pomodoros grouped by project.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ProjectStats {
    pub project: String,
    pub tasks: u32,
    pub completed_pomodoros: u32,
}

/// Everything the stats views show.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Analytics {
    pub today: DailyStats,
    /// The calendar week containing `today`, starting on Sunday.
    pub week: FocusSummary,
    pub all_time: FocusSummary,
    pub tasks_completed: u32,
    pub tasks_total: u32,
    pub projects: Vec<ProjectStats>,
}

impl Analytics {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            today: DailyStats::new(date),
            week: FocusSummary::default(),
            all_time: FocusSummary::default(),
            tasks_completed: 0,
            tasks_total: 0,
            projects: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_timer_state() {
        let state = TimerState::default();
        assert!(!state.is_running);
        assert!(!state.is_paused);
        assert_eq!(state.current_time, 1500);
        assert_eq!(state.total_time, 1500);
        assert_eq!(state.session_type, SessionType::Focus);
        assert_eq!(state.session_number, 1);
        assert_eq!(state.current_task_id, None);
    }

    #[test]
    fn test_initial_state_follows_settings() {
        let settings = Settings {
            focus_mins: 50,
            ..Settings::default()
        };
        let state = TimerState::initial(&settings);
        assert_eq!(state.total_time, 3000);
        assert_eq!(state.current_time, 3000);
    }

    #[test]
    fn test_is_ticking() {
        let mut state = TimerState::default();
        assert!(!state.is_ticking());

        state.is_running = true;
        assert!(state.is_ticking());

        state.is_paused = true;
        assert!(!state.is_ticking());
    }

    #[test]
    fn test_progress_percent() {
        let mut state = TimerState::default();
        assert_eq!(state.progress_percent(), 0.0);

        state.current_time = 300;
        let progress = state.progress_percent();
        assert!((progress - 0.8).abs() < 0.01);
    }

    #[test]
    fn test_progress_percent_zero_total() {
        let state = TimerState {
            current_time: 0,
            total_time: 0,
            ..TimerState::default()
        };
        assert_eq!(state.progress_percent(), 1.0);
    }

    #[test]
    fn test_consistency_check() {
        assert!(TimerState::default().is_consistent());

        let overrun = TimerState {
            current_time: 1600,
            ..TimerState::default()
        };
        assert!(!overrun.is_consistent());

        let no_session = TimerState {
            session_number: 0,
            ..TimerState::default()
        };
        assert!(!no_session.is_consistent());
    }

    #[test]
    fn test_settings_default() {
        let settings = Settings::default();
        assert_eq!(settings.focus_mins, 25);
        assert_eq!(settings.short_break_mins, 5);
        assert_eq!(settings.long_break_mins, 15);
        assert_eq!(settings.long_break_after, 4);
        assert!(!settings.auto_start_breaks);
        assert!(!settings.auto_start_pomodoros);
        assert!(settings.sound_enabled);
        assert!(settings.notifications_enabled);
    }

    #[test]
    fn test_zero_durations_fall_back_to_defaults() {
        let settings = Settings {
            focus_mins: 0,
            short_break_mins: 0,
            long_break_mins: 0,
            long_break_after: 0,
            ..Settings::default()
        };
        assert_eq!(settings.duration_mins(SessionType::Focus), 25);
        assert_eq!(settings.duration_mins(SessionType::ShortBreak), 5);
        assert_eq!(settings.duration_mins(SessionType::LongBreak), 15);
        assert_eq!(settings.long_break_cadence(), 4);
    }

    #[test]
    fn test_next_session_type_cadence() {
        let settings = Settings::default();
        assert_eq!(
            settings.next_session_type(SessionType::Focus, 1),
            SessionType::ShortBreak
        );
        assert_eq!(
            settings.next_session_type(SessionType::Focus, 3),
            SessionType::ShortBreak
        );
        assert_eq!(
            settings.next_session_type(SessionType::Focus, 4),
            SessionType::LongBreak
        );
        assert_eq!(
            settings.next_session_type(SessionType::Focus, 8),
            SessionType::LongBreak
        );
        assert_eq!(
            settings.next_session_type(SessionType::ShortBreak, 4),
            SessionType::Focus
        );
        assert_eq!(
            settings.next_session_type(SessionType::LongBreak, 4),
            SessionType::Focus
        );
    }

    #[test]
    fn test_auto_start_policy() {
        let settings = Settings {
            auto_start_breaks: true,
            auto_start_pomodoros: false,
            ..Settings::default()
        };
        assert!(settings.auto_starts_after(SessionType::Focus));
        assert!(!settings.auto_starts_after(SessionType::ShortBreak));
        assert!(!settings.auto_starts_after(SessionType::LongBreak));
    }

    #[test]
    fn test_settings_partial_json_uses_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"focus_mins": 40}"#).unwrap();
        assert_eq!(settings.focus_mins, 40);
        assert_eq!(settings.short_break_mins, 5);
        assert!(settings.sound_enabled);
    }

    #[test]
    fn test_session_type_db_values() {
        for session_type in SessionType::ALL {
            let value = session_type.as_db_value();
            assert_eq!(SessionType::from_db_value(value), Some(session_type));
        }
        assert_eq!(SessionType::from_db_value("nap"), None);
    }

    #[test]
    fn test_timer_state_json_shape() {
        let json = serde_json::to_value(TimerState::default()).unwrap();
        assert_eq!(json["isRunning"], false);
        assert_eq!(json["currentTime"], 1500);
        assert_eq!(json["sessionType"], "focus");
        assert_eq!(json["sessionNumber"], 1);
    }

    #[test]
    fn test_focus_summary_average() {
        assert_eq!(FocusSummary::default().average_mins(), 0);
        let summary = FocusSummary {
            sessions: 3,
            minutes: 80,
        };
        assert_eq!(summary.average_mins(), 27);
    }

    #[test]
    fn test_new_task_defaults() {
        let task = NewTask::new("Write report");
        assert_eq!(task.project, "Personal");
        assert_eq!(task.estimated_pomodoros, 1);
    }

    #[test]
    fn test_daily_stats_new() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let stats = DailyStats::new(date);
        assert_eq!(stats.date, date);
        assert_eq!(stats.completed_pomodoros, 0);
        assert_eq!(stats.total_focus_minutes, 0);
    }
}
