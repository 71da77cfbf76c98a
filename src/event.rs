//! Menu event handling.

use crate::app::App;
use crate::menu::{
    ID_AUTO_BREAKS_TOGGLE, ID_AUTO_POMODOROS_TOGGLE, ID_COMPLETE_TASK, ID_NOTIF_TOGGLE, ID_NO_TASK,
    ID_PAUSE,
    ID_QUIT, ID_RESET, ID_SKIP, ID_SOUND_TOGGLE, ID_START, PREFIX_FOCUS, PREFIX_LONG, PREFIX_MODE,
    PREFIX_SHORT, PREFIX_TASK, PREFIX_THRESH,
};
use crate::models::{SessionType, TaskId};
use muda::MenuEvent;

/// Result of handling a menu event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventResult {
    /// Event handled, nothing to redraw.
    Continue,
    /// User requested quit.
    Quit,
    /// State or settings changed, menu needs update.
    StateChanged,
}

/// A user action decoded from a menu item ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuCommand {
    Start,
    Pause,
    Reset,
    Skip,
    SwitchMode(SessionType),
    SelectTask(Option<TaskId>),
    CompleteTask,
    SetFocusMins(u32),
    SetShortBreakMins(u32),
    SetLongBreakMins(u32),
    SetLongBreakAfter(u32),
    ToggleSound,
    ToggleNotifications,
    ToggleAutoStartBreaks,
    ToggleAutoStartPomodoros,
    Quit,
}

impl MenuCommand {
    /// Decodes a menu item ID. Info-only items decode to `None`.
    pub fn parse(id: &str) -> Option<Self> {
        let command = match id {
            ID_START => Self::Start,
            ID_PAUSE => Self::Pause,
            ID_RESET => Self::Reset,
            ID_SKIP => Self::Skip,
            ID_NO_TASK => Self::SelectTask(None),
            ID_COMPLETE_TASK => Self::CompleteTask,
            ID_SOUND_TOGGLE => Self::ToggleSound,
            ID_NOTIF_TOGGLE => Self::ToggleNotifications,
            ID_AUTO_BREAKS_TOGGLE => Self::ToggleAutoStartBreaks,
            ID_AUTO_POMODOROS_TOGGLE => Self::ToggleAutoStartPomodoros,
            ID_QUIT => Self::Quit,
            _ => return Self::parse_generated(id),
        };
        Some(command)
    }

    fn parse_generated(id: &str) -> Option<Self> {
        if let Some(mode) = id.strip_prefix(PREFIX_MODE) {
            return SessionType::from_db_value(mode).map(Self::SwitchMode);
        }
        if let Some(task) = id.strip_prefix(PREFIX_TASK) {
            return task.parse().ok().map(|id| Self::SelectTask(Some(id)));
        }

        let setters: [(&str, fn(u32) -> Self); 4] = [
            (PREFIX_FOCUS, Self::SetFocusMins),
            (PREFIX_SHORT, Self::SetShortBreakMins),
            (PREFIX_LONG, Self::SetLongBreakMins),
            (PREFIX_THRESH, Self::SetLongBreakAfter),
        ];
        setters.iter().find_map(|(prefix, make)| {
            let value = id.strip_prefix(prefix)?.parse::<u32>().ok()?;
            Some(make(value))
        })
    }
}

/// Handles a menu event and updates the app state accordingly.
pub fn handle_menu_event(app: &mut App, event: MenuEvent) -> EventResult {
    match MenuCommand::parse(event.id().as_ref()) {
        Some(command) => apply_command(app, command),
        None => EventResult::Continue,
    }
}

/// Applies a decoded command to the app.
pub fn apply_command(app: &mut App, command: MenuCommand) -> EventResult {
    match command {
        MenuCommand::Start => app.engine.start(),
        MenuCommand::Pause => app.engine.pause(),
        MenuCommand::Reset => app.engine.reset(),
        MenuCommand::Skip => {
            app.engine.skip();
        }
        MenuCommand::SwitchMode(session_type) => app.engine.switch_session_type(session_type),
        MenuCommand::SelectTask(task_id) => app.engine.set_current_task(task_id),
        MenuCommand::CompleteTask => app.complete_current_task(),
        MenuCommand::SetFocusMins(mins) => app.update_setting(|s| s.focus_mins = mins),
        MenuCommand::SetShortBreakMins(mins) => app.update_setting(|s| s.short_break_mins = mins),
        MenuCommand::SetLongBreakMins(mins) => app.update_setting(|s| s.long_break_mins = mins),
        MenuCommand::SetLongBreakAfter(count) => {
            app.update_setting(|s| s.long_break_after = count)
        }
        MenuCommand::ToggleSound => app.update_setting(|s| s.sound_enabled = !s.sound_enabled),
        MenuCommand::ToggleNotifications => {
            app.update_setting(|s| s.notifications_enabled = !s.notifications_enabled)
        }
        MenuCommand::ToggleAutoStartBreaks => {
            app.update_setting(|s| s.auto_start_breaks = !s.auto_start_breaks)
        }
        MenuCommand::ToggleAutoStartPomodoros => {
            app.update_setting(|s| s.auto_start_pomodoros = !s.auto_start_pomodoros)
        }
        MenuCommand::Quit => return EventResult::Quit,
    }
    EventResult::StateChanged
}
