//! Main application state: the timer engine plus the database the menu
//! reads settings, tasks and stats from.

use crate::audio::AudioPlayer;
use crate::engine::{Collaborators, EngineEvent, TimerEngine};
use crate::models::{Analytics, Settings, Task};
use crate::notifications::DesktopNotifier;
use crate::persistence::{Database, DatabaseError};
use crate::records;
use chrono::Local;
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

pub struct App {
    pub engine: TimerEngine,
    pub db: Database,
    pub tasks: Vec<Task>,
}

impl App {
    /// Creates the application with its collaborators.
    ///
    /// Each collaborator gets its own connection to the database file.
    /// Settings are loaded in the background; the engine runs on defaults
    /// until they arrive.
    pub fn new(audio: Option<AudioPlayer>, events: Sender<EngineEvent>) -> Result<Self, AppError> {
        let collaborators = Collaborators {
            notifier: Box::new(DesktopNotifier),
            sound: Box::new(audio),
            cache: Box::new(Database::new()?),
            store: Box::new(Database::new()?),
        };
        records::spawn_settings_fetch(Database::new()?, events.clone());

        Ok(Self::with_parts(Database::new()?, collaborators, events))
    }

    /// Creates an app from explicit parts (also used by tests).
    pub fn with_parts(
        db: Database,
        collaborators: Collaborators,
        events: Sender<EngineEvent>,
    ) -> Self {
        let tasks = db.open_tasks().unwrap_or_else(|e| {
            warn!("failed to load tasks: {}", e);
            Vec::new()
        });
        let engine = TimerEngine::new(collaborators, events);

        Self { engine, db, tasks }
    }

    /// Applies a background event. Returns true if the UI needs a refresh.
    pub fn handle_event(&mut self, event: EngineEvent) -> bool {
        self.engine.handle_event(event)
    }

    /// Updates a setting, saves it and hands it to the engine.
    pub fn update_setting<F>(&mut self, updater: F)
    where
        F: FnOnce(&mut Settings),
    {
        let mut settings = self.engine.settings().clone();
        updater(&mut settings);
        if let Err(e) = self.db.save_settings(&settings) {
            warn!("failed to save settings: {}", e);
        }
        self.engine.apply_settings(settings);
    }

    /// Returns the stats shown in the menu, empty on read errors.
    pub fn analytics(&self) -> Analytics {
        let today = Local::now().date_naive();
        self.db.analytics(today).unwrap_or_else(|e| {
            warn!("failed to load stats: {}", e);
            Analytics::empty(today)
        })
    }

    /// Re-reads the open tasks, which the command line may have changed.
    pub fn reload_tasks(&mut self) {
        match self.db.open_tasks() {
            Ok(tasks) => self.tasks = tasks,
            Err(e) => warn!("failed to reload tasks: {}", e),
        }
    }

    /// Marks the selected task done and clears the selection.
    pub fn complete_current_task(&mut self) {
        let Some(id) = self.engine.state().current_task_id else {
            return;
        };
        if let Err(e) = self.db.complete_task(id) {
            warn!(id, "failed to complete task: {}", e);
        }
        self.engine.set_current_task(None);
        self.reload_tasks();
    }

    /// Title of the task the timer is attributed to, if it is still open.
    pub fn current_task_title(&self) -> Option<&str> {
        let id = self.engine.state().current_task_id?;
        self.tasks
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.title.as_str())
    }
}
