//! Menu building and updating for the tray dropdown.

use crate::models::{
    Analytics, DailyStats, FocusSummary, ProjectStats, SessionType, Settings, Task, TaskId,
    TimerState,
};
use crate::timer::format_time;
use muda::accelerator::Accelerator;
use muda::{CheckMenuItem, Menu, MenuId, MenuItem, PredefinedMenuItem, Submenu};
use std::collections::HashMap;
use thiserror::Error;

// Menu item IDs as constants
pub const ID_STATUS: &str = "status";
pub const ID_PROGRESS: &str = "progress";
pub const ID_TASK: &str = "task";
pub const ID_STATS: &str = "stats";
pub const ID_WEEK: &str = "stats_week";
pub const ID_ALL_TIME: &str = "stats_all_time";
pub const ID_AVERAGE: &str = "stats_average";
pub const ID_TASKS_DONE: &str = "stats_tasks_done";
pub const ID_COMPLETE_TASK: &str = "complete_task";
pub const ID_START: &str = "start";
pub const ID_PAUSE: &str = "pause";
pub const ID_RESET: &str = "reset";
pub const ID_SKIP: &str = "skip";
pub const ID_NO_TASK: &str = "task_none";
pub const ID_SOUND_TOGGLE: &str = "sound_toggle";
pub const ID_NOTIF_TOGGLE: &str = "notif_toggle";
pub const ID_AUTO_BREAKS_TOGGLE: &str = "auto_breaks_toggle";
pub const ID_AUTO_POMODOROS_TOGGLE: &str = "auto_pomodoros_toggle";
pub const ID_QUIT: &str = "quit";

// Prefixes of generated IDs
pub const PREFIX_MODE: &str = "mode_";
pub const PREFIX_TASK: &str = "task_";
pub const PREFIX_FOCUS: &str = "focus_";
pub const PREFIX_SHORT: &str = "short_";
pub const PREFIX_LONG: &str = "long_";
pub const PREFIX_THRESH: &str = "thresh_";
pub const PREFIX_PROJECT: &str = "project_";

const FOCUS_CHOICES: [u32; 6] = [15, 20, 25, 30, 45, 60];
const SHORT_CHOICES: [u32; 4] = [3, 5, 10, 15];
const LONG_CHOICES: [u32; 4] = [10, 15, 20, 30];
const THRESH_CHOICES: [u32; 5] = [2, 3, 4, 5, 6];

#[derive(Error, Debug)]
pub enum MenuError {
    #[error("Menu error: {0}")]
    Muda(#[from] muda::Error),
}

/// Holds references to menu items that need dynamic updates.
pub struct MenuItems {
    pub status: MenuItem,
    pub progress: MenuItem,
    pub task: MenuItem,
    pub stats: MenuItem,
    pub stats_section: StatsSection,
    pub start: MenuItem,
    pub pause: MenuItem,
    pub reset: MenuItem,
    pub skip: MenuItem,
    pub mode_checks: HashMap<SessionType, CheckMenuItem>,
    pub task_section: TaskSection,
    pub focus_checks: HashMap<u32, CheckMenuItem>,
    pub short_checks: HashMap<u32, CheckMenuItem>,
    pub long_checks: HashMap<u32, CheckMenuItem>,
    pub thresh_checks: HashMap<u32, CheckMenuItem>,
    pub sound_toggle: CheckMenuItem,
    pub notif_toggle: CheckMenuItem,
    pub auto_breaks_toggle: CheckMenuItem,
    pub auto_pomodoros_toggle: CheckMenuItem,
}

/// Everything the menu displays.
pub struct MenuView<'a> {
    pub state: &'a TimerState,
    pub settings: &'a Settings,
    pub analytics: &'a Analytics,
    pub tasks: &'a [Task],
    pub task_title: Option<&'a str>,
}

fn info_item(id: &str, text: String) -> MenuItem {
    MenuItem::with_id(MenuId::new(id), text, false, None::<Accelerator>)
}

fn action_item(id: &str, text: &str, enabled: bool) -> MenuItem {
    MenuItem::with_id(MenuId::new(id), text, enabled, None::<Accelerator>)
}

fn check_item(id: String, text: String, checked: bool) -> CheckMenuItem {
    CheckMenuItem::with_id(MenuId::new(id), text, true, checked, None::<Accelerator>)
}

/// Builds the complete menu structure.
pub fn build_menu(view: &MenuView<'_>) -> Result<(Menu, MenuItems), MenuError> {
    let menu = Menu::new();
    let state = view.state;

    // Status display (disabled, info only)
    let status = info_item(ID_STATUS, format_status(state));
    let progress = info_item(ID_PROGRESS, format_progress(state));
    let task = info_item(ID_TASK, format_task(view.task_title));
    menu.append(&status)?;
    menu.append(&progress)?;
    menu.append(&task)?;

    menu.append(&PredefinedMenuItem::separator())?;

    // Stats
    let stats = info_item(ID_STATS, format_stats(&view.analytics.today));
    menu.append(&stats)?;
    let stats_section = StatsSection::new(view.analytics)?;
    menu.append(&stats_section.submenu)?;

    menu.append(&PredefinedMenuItem::separator())?;

    // Control buttons
    let start = action_item(ID_START, start_label(state), !state.is_ticking());
    let pause = action_item(ID_PAUSE, "⏸  Pause", state.is_ticking());
    let reset = action_item(ID_RESET, "⏹  Reset", true);
    let skip = action_item(ID_SKIP, "⏭  Skip", true);

    menu.append(&start)?;
    menu.append(&pause)?;
    menu.append(&reset)?;
    menu.append(&skip)?;

    menu.append(&PredefinedMenuItem::separator())?;

    // Mode submenu
    let mode_sub = Submenu::new("Mode", true);
    let mut mode_checks = HashMap::new();
    for session_type in SessionType::ALL {
        let item = check_item(
            format!("{}{}", PREFIX_MODE, session_type.as_db_value()),
            session_type.to_string(),
            session_type == state.session_type,
        );
        mode_sub.append(&item)?;
        mode_checks.insert(session_type, item);
    }
    menu.append(&mode_sub)?;

    // Task submenu
    let task_section = TaskSection::new(view.tasks, state.current_task_id)?;
    menu.append(&task_section.submenu)?;

    menu.append(&PredefinedMenuItem::separator())?;

    // Settings submenu
    let settings_menu = build_settings_submenu(view.settings)?;
    menu.append(&settings_menu.submenu)?;

    menu.append(&PredefinedMenuItem::separator())?;

    // Quit
    let quit = action_item(ID_QUIT, "Quit Focusbar", true);
    menu.append(&quit)?;

    let items = MenuItems {
        status,
        progress,
        task,
        stats,
        stats_section,
        start,
        pause,
        reset,
        skip,
        mode_checks,
        task_section,
        focus_checks: settings_menu.focus_checks,
        short_checks: settings_menu.short_checks,
        long_checks: settings_menu.long_checks,
        thresh_checks: settings_menu.thresh_checks,
        sound_toggle: settings_menu.sound_toggle,
        notif_toggle: settings_menu.notif_toggle,
        auto_breaks_toggle: settings_menu.auto_breaks_toggle,
        auto_pomodoros_toggle: settings_menu.auto_pomodoros_toggle,
    };

    Ok((menu, items))
}

/// The Task submenu. Rebuilt whenever the open task list changes.
pub struct TaskSection {
    pub submenu: Submenu,
    none: CheckMenuItem,
    complete: MenuItem,
    separators: Vec<PredefinedMenuItem>,
    entries: Vec<(TaskId, CheckMenuItem)>,
    shown: Vec<Task>,
}

impl TaskSection {
    fn new(tasks: &[Task], current: Option<TaskId>) -> Result<Self, MenuError> {
        let mut section = Self {
            submenu: Submenu::new("Task", true),
            none: check_item(ID_NO_TASK.to_string(), "No task".to_string(), false),
            complete: action_item(ID_COMPLETE_TASK, "✓  Complete Current Task", false),
            separators: Vec::new(),
            entries: Vec::new(),
            shown: Vec::new(),
        };
        section.populate(tasks)?;
        section.sync(current);
        Ok(section)
    }

    fn populate(&mut self, tasks: &[Task]) -> Result<(), MenuError> {
        self.submenu.append(&self.none)?;
        if !tasks.is_empty() {
            self.append_separator()?;
        }
        for t in tasks {
            let item = check_item(format!("{}{}", PREFIX_TASK, t.id), format_task_entry(t), false);
            self.submenu.append(&item)?;
            self.entries.push((t.id, item));
        }
        self.append_separator()?;
        self.submenu.append(&self.complete)?;
        self.shown = tasks.to_vec();
        Ok(())
    }

    fn append_separator(&mut self) -> Result<(), MenuError> {
        let separator = PredefinedMenuItem::separator();
        self.submenu.append(&separator)?;
        self.separators.push(separator);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), MenuError> {
        self.submenu.remove(&self.none)?;
        for (_, item) in self.entries.drain(..) {
            self.submenu.remove(&item)?;
        }
        for separator in self.separators.drain(..) {
            self.submenu.remove(&separator)?;
        }
        self.submenu.remove(&self.complete)?;
        Ok(())
    }

    fn sync(&self, current: Option<TaskId>) {
        self.none.set_checked(current.is_none());
        for (id, item) in &self.entries {
            item.set_checked(current == Some(*id));
        }
        self.complete.set_enabled(current.is_some());
    }

    /// Rebuilds the entries if the tasks changed, then syncs the checks.
    pub fn update(&mut self, tasks: &[Task], current: Option<TaskId>) -> Result<(), MenuError> {
        if self.shown != tasks {
            self.clear()?;
            self.populate(tasks)?;
        }
        self.sync(current);
        Ok(())
    }
}

/// The Stats submenu: week, all-time and per-project figures.
pub struct StatsSection {
    pub submenu: Submenu,
    week: MenuItem,
    all_time: MenuItem,
    average: MenuItem,
    tasks_done: MenuItem,
    projects: Vec<MenuItem>,
    shown_projects: Vec<ProjectStats>,
}

impl StatsSection {
    fn new(analytics: &Analytics) -> Result<Self, MenuError> {
        let mut section = Self {
            submenu: Submenu::new("📊  Stats", true),
            week: info_item(ID_WEEK, format_week(&analytics.week)),
            all_time: info_item(ID_ALL_TIME, format_all_time(&analytics.all_time)),
            average: info_item(ID_AVERAGE, format_average(&analytics.all_time)),
            tasks_done: info_item(ID_TASKS_DONE, format_tasks_done(analytics)),
            projects: Vec::new(),
            shown_projects: Vec::new(),
        };
        section.submenu.append(&section.week)?;
        section.submenu.append(&section.all_time)?;
        section.submenu.append(&section.average)?;
        section.submenu.append(&section.tasks_done)?;
        section.submenu.append(&PredefinedMenuItem::separator())?;
        section.set_projects(&analytics.projects)?;
        Ok(section)
    }

    fn set_projects(&mut self, projects: &[ProjectStats]) -> Result<(), MenuError> {
        for item in self.projects.drain(..) {
            self.submenu.remove(&item)?;
        }
        for project in projects {
            let item = info_item(
                &format!("{}{}", PREFIX_PROJECT, project.project),
                format_project(project),
            );
            self.submenu.append(&item)?;
            self.projects.push(item);
        }
        self.shown_projects = projects.to_vec();
        Ok(())
    }

    pub fn update(&mut self, analytics: &Analytics) -> Result<(), MenuError> {
        self.week.set_text(format_week(&analytics.week));
        self.all_time.set_text(format_all_time(&analytics.all_time));
        self.average.set_text(format_average(&analytics.all_time));
        self.tasks_done.set_text(format_tasks_done(analytics));
        if self.shown_projects != analytics.projects {
            self.set_projects(&analytics.projects)?;
        }
        Ok(())
    }
}

struct SettingsSubmenu {
    submenu: Submenu,
    focus_checks: HashMap<u32, CheckMenuItem>,
    short_checks: HashMap<u32, CheckMenuItem>,
    long_checks: HashMap<u32, CheckMenuItem>,
    thresh_checks: HashMap<u32, CheckMenuItem>,
    sound_toggle: CheckMenuItem,
    notif_toggle: CheckMenuItem,
    auto_breaks_toggle: CheckMenuItem,
    auto_pomodoros_toggle: CheckMenuItem,
}

/// Appends a submenu of checkable choices and returns the items by value.
fn choice_submenu(
    parent: &Submenu,
    title: &str,
    prefix: &str,
    unit: &str,
    choices: &[u32],
    current: u32,
) -> Result<HashMap<u32, CheckMenuItem>, MenuError> {
    let sub = Submenu::new(title, true);
    let mut checks = HashMap::new();
    for &value in choices {
        let item = check_item(
            format!("{}{}", prefix, value),
            format!("{} {}", value, unit),
            value == current,
        );
        sub.append(&item)?;
        checks.insert(value, item);
    }
    parent.append(&sub)?;
    Ok(checks)
}

fn build_settings_submenu(settings: &Settings) -> Result<SettingsSubmenu, MenuError> {
    let submenu = Submenu::new("⚙  Settings", true);

    let focus_checks = choice_submenu(
        &submenu,
        "Focus",
        PREFIX_FOCUS,
        "min",
        &FOCUS_CHOICES,
        settings.focus_mins,
    )?;
    let short_checks = choice_submenu(
        &submenu,
        "Short Break",
        PREFIX_SHORT,
        "min",
        &SHORT_CHOICES,
        settings.short_break_mins,
    )?;
    let long_checks = choice_submenu(
        &submenu,
        "Long Break",
        PREFIX_LONG,
        "min",
        &LONG_CHOICES,
        settings.long_break_mins,
    )?;
    let thresh_checks = choice_submenu(
        &submenu,
        "Long Break After",
        PREFIX_THRESH,
        "pomodoros",
        &THRESH_CHOICES,
        settings.long_break_after,
    )?;

    submenu.append(&PredefinedMenuItem::separator())?;

    let auto_breaks_toggle = check_item(
        ID_AUTO_BREAKS_TOGGLE.to_string(),
        "Auto-start Breaks".to_string(),
        settings.auto_start_breaks,
    );
    let auto_pomodoros_toggle = check_item(
        ID_AUTO_POMODOROS_TOGGLE.to_string(),
        "Auto-start Pomodoros".to_string(),
        settings.auto_start_pomodoros,
    );
    submenu.append(&auto_breaks_toggle)?;
    submenu.append(&auto_pomodoros_toggle)?;

    submenu.append(&PredefinedMenuItem::separator())?;

    // Toggle checkboxes
    let sound_toggle = check_item(
        ID_SOUND_TOGGLE.to_string(),
        "Sound Enabled".to_string(),
        settings.sound_enabled,
    );
    let notif_toggle = check_item(
        ID_NOTIF_TOGGLE.to_string(),
        "Notifications Enabled".to_string(),
        settings.notifications_enabled,
    );
    submenu.append(&sound_toggle)?;
    submenu.append(&notif_toggle)?;

    Ok(SettingsSubmenu {
        submenu,
        focus_checks,
        short_checks,
        long_checks,
        thresh_checks,
        sound_toggle,
        notif_toggle,
        auto_breaks_toggle,
        auto_pomodoros_toggle,
    })
}

fn sync_checks<K: Eq + std::hash::Hash>(checks: &HashMap<K, CheckMenuItem>, current: &K) {
    for (key, item) in checks {
        item.set_checked(key == current);
    }
}

/// Updates the menu items based on the current state and settings.
pub fn update_menu_items(items: &mut MenuItems, view: &MenuView<'_>) -> Result<(), MenuError> {
    let state = view.state;
    let settings = view.settings;

    // Update text items
    items.status.set_text(format_status(state));
    items.progress.set_text(format_progress(state));
    items.task.set_text(format_task(view.task_title));
    items.stats.set_text(format_stats(&view.analytics.today));
    items.stats_section.update(view.analytics)?;
    items
        .task_section
        .update(view.tasks, state.current_task_id)?;

    // Update controls
    items.start.set_text(start_label(state));
    items.start.set_enabled(!state.is_ticking());
    items.pause.set_enabled(state.is_ticking());

    sync_checks(&items.mode_checks, &state.session_type);
    sync_checks(&items.focus_checks, &settings.focus_mins);
    sync_checks(&items.short_checks, &settings.short_break_mins);
    sync_checks(&items.long_checks, &settings.long_break_mins);
    sync_checks(&items.thresh_checks, &settings.long_break_after);

    items.sound_toggle.set_checked(settings.sound_enabled);
    items.notif_toggle.set_checked(settings.notifications_enabled);
    items.auto_breaks_toggle.set_checked(settings.auto_start_breaks);
    items
        .auto_pomodoros_toggle
        .set_checked(settings.auto_start_pomodoros);
    Ok(())
}

fn start_label(state: &TimerState) -> &'static str {
    if state.is_paused {
        "▶  Resume"
    } else {
        "▶  Start"
    }
}

fn session_label(state: &TimerState) -> String {
    match state.session_type {
        SessionType::Focus => format!("Focus #{}", state.session_number),
        other => other.to_string(),
    }
}

/// Formats the status line for the menu.
pub fn format_status(state: &TimerState) -> String {
    let label = session_label(state);
    let time = format_time(state.current_time);
    if state.is_idle() {
        format!("Ready: {} - {}", label, time)
    } else if state.is_paused {
        format!("⏸  {} - {} (paused)", label, time)
    } else {
        format!("⏱  {} - {} remaining", label, time)
    }
}

/// Formats the progress bar for the menu.
pub fn format_progress(state: &TimerState) -> String {
    let pct = state.progress_percent().clamp(0.0, 1.0);
    let filled = (pct * 20.0).round() as usize;
    let empty = 20 - filled;
    format!(
        "{}{}  {}%",
        "█".repeat(filled),
        "░".repeat(empty),
        (pct * 100.0).round() as u32
    )
}

/// Formats the selected task line for the menu.
pub fn format_task(title: Option<&str>) -> String {
    match title {
        Some(title) => format!("Task: {}", title),
        None => "Task: —".to_string(),
    }
}

/// Formats a task submenu entry with its pomodoro progress.
pub fn format_task_entry(task: &Task) -> String {
    format!(
        "{}  ({}/{})",
        task.title, task.completed_pomodoros, task.estimated_pomodoros
    )
}

fn format_hours(minutes: u32) -> String {
    format!("{}h {}m", minutes / 60, minutes % 60)
}

pub fn format_week(week: &FocusSummary) -> String {
    format!(
        "This week: {} sessions ({} min)",
        week.sessions, week.minutes
    )
}

pub fn format_all_time(all_time: &FocusSummary) -> String {
    format!(
        "All time: {} sessions ({})",
        all_time.sessions,
        format_hours(all_time.minutes)
    )
}

pub fn format_average(all_time: &FocusSummary) -> String {
    format!("Average session: {} min", all_time.average_mins())
}

pub fn format_tasks_done(analytics: &Analytics) -> String {
    format!(
        "Tasks done: {} of {}",
        analytics.tasks_completed, analytics.tasks_total
    )
}

pub fn format_project(project: &ProjectStats) -> String {
    format!(
        "{}: {} tasks, {} 🍅",
        project.project, project.tasks, project.completed_pomodoros
    )
}

/// Formats the daily stats for the menu.
pub fn format_stats(stats: &DailyStats) -> String {
    let count = stats.completed_pomodoros;
    if count == 0 {
        return "Today: —  0 (0 min)".to_string();
    }

    let tomatoes = "🍅".repeat(count.min(10) as usize);
    let extra = if count > 10 {
        format!("+{}", count - 10)
    } else {
        String::new()
    };
    format!(
        "Today: {}{}  {} ({} min)",
        tomatoes, extra, count, stats.total_focus_minutes
    )
}
