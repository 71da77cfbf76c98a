//! Focusbar - A menubar Pomodoro timer.
//!
//! Cycles through focus sessions and short/long breaks, logs each session
//! to a local SQLite database and survives restarts mid-session. Tasks are
//! managed from the command line (`focusbar task ...`).

use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use clap::Parser;
use muda::MenuEvent;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tray_icon::{TrayIcon, TrayIconBuilder};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

mod app;
mod audio;
mod cli;
mod collaborators;
mod engine;
mod event;
mod menu;
mod models;
mod notifications;
mod persistence;
mod records;
mod timer;

use app::App;
use audio::AudioPlayer;
use cli::Cli;
use engine::EngineEvent;
use event::EventResult;
use menu::{MenuItems, MenuView};

/// How often the event loop wakes to drain engine and menu events.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Application handler for the winit event loop.
struct Focusbar {
    app: App,
    tray: Option<TrayIcon>,
    menu_items: Option<MenuItems>,
    engine_rx: Receiver<EngineEvent>,
}

impl Focusbar {
    fn new(app: App, tray: TrayIcon, menu_items: MenuItems, engine_rx: Receiver<EngineEvent>) -> Self {
        Self {
            app,
            tray: Some(tray),
            menu_items: Some(menu_items),
            engine_rx,
        }
    }

    fn refresh(&mut self) {
        self.app.reload_tasks();
        if let Some(ref mut items) = self.menu_items {
            let analytics = self.app.analytics();
            let view = menu_view(&self.app, &analytics);
            if let Err(e) = menu::update_menu_items(items, &view) {
                warn!("failed to update menu: {}", e);
            }
        }
        if let Some(ref tray) = self.tray {
            let title = timer::format_tray_title(self.app.engine.state());
            tray.set_title(Some(title));
        }
    }

    fn process_engine_events(&mut self) {
        let mut changed = false;
        while let Ok(event) = self.engine_rx.try_recv() {
            changed |= self.app.handle_event(event);
        }
        if changed {
            self.refresh();
        }
    }

    fn process_menu_events(&mut self, event_loop: &ActiveEventLoop) {
        while let Ok(event) = MenuEvent::receiver().try_recv() {
            match event::handle_menu_event(&mut self.app, event) {
                EventResult::Quit => {
                    event_loop.exit();
                    return;
                }
                EventResult::StateChanged => self.refresh(),
                EventResult::Continue => {}
            }
        }
    }
}

impl ApplicationHandler for Focusbar {
    fn resumed(&mut self, _event_loop: &ActiveEventLoop) {
        // Nothing to do on resume for a tray-only app
    }

    fn window_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        _event: WindowEvent,
    ) {
        // No window events for a tray-only app
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::WaitUntil(Instant::now() + POLL_INTERVAL));

        // Ticks, record results and settings from background threads
        self.process_engine_events();

        self.process_menu_events(event_loop);
    }
}

fn menu_view<'a>(app: &'a App, analytics: &'a models::Analytics) -> MenuView<'a> {
    MenuView {
        state: app.engine.state(),
        settings: app.engine.settings(),
        analytics,
        tasks: &app.tasks,
        task_title: app.current_task_title(),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("focusbar=info")),
        )
        .init();

    let cli = Cli::parse();
    if let Some(command) = cli.command {
        let db = persistence::Database::new()?;
        return cli::run(command, &db, &mut std::io::stdout());
    }

    info!("Starting focusbar v{}", env!("CARGO_PKG_VERSION"));

    // Create event loop (required for tray on macOS)
    let event_loop = EventLoop::new()?;

    // Audio is created on the main thread to avoid Send issues
    let audio = AudioPlayer::new()
        .map_err(|e| warn!("audio unavailable, completion cue disabled: {}", e))
        .ok();

    // Channel for ticks, record results and settings
    let (tx, rx) = mpsc::channel();
    let app = App::new(audio, tx)?;

    // Build menu
    let analytics = app.analytics();
    let (built_menu, menu_items) = menu::build_menu(&menu_view(&app, &analytics))?;

    // Create tray icon (no icon image, just use title text on macOS)
    let tray = TrayIconBuilder::new()
        .with_menu(Box::new(built_menu))
        .with_title(timer::format_tray_title(app.engine.state()))
        .with_tooltip("Focusbar - Pomodoro Timer")
        .build()?;

    let mut focusbar = Focusbar::new(app, tray, menu_items, rx);

    // Run event loop
    event_loop.run_app(&mut focusbar)?;

    info!("Focusbar stopped");
    Ok(())
}
