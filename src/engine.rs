//! The timer engine: session state machine, countdown clock and
//! completion side effects.
//!
//! ## State Transitions
//!
//! ```text
//! (focus | short_break | long_break) x (idle | running | paused)
//!
//! idle --start--> running --pause--> paused --start--> running
//! any  --reset/switch--> idle
//! running --countdown hits 0 / skip--> next session (idle or running)
//! ```
//!
//! All mutation happens on the thread that owns the engine. The ticker,
//! the record worker and the settings fetch only post `EngineEvent`s, which
//! the owner feeds back through [`TimerEngine::handle_event`].

use crate::collaborators::{DurableCache, NotificationSink, SessionStore, SoundSink};
use crate::models::{NewSessionRecord, RecordId, SessionType, Settings, TaskId, TimerState};
use crate::records::{RecordJob, RecordWorker};
use crate::timer::Ticker;
use std::collections::HashSet;
use std::sync::mpsc::Sender;
use tracing::{debug, info, warn};

pub const NOTIFICATION_TITLE: &str = "Pomodoro Session Complete";
pub const BREAK_OVER_MESSAGE: &str = "Break time is over! Ready to focus?";
pub const FOCUS_OVER_MESSAGE: &str = "Great work! Time for a break.";

/// Messages posted to the engine's owner by background threads.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// One second elapsed on the ticker with this generation.
    Tick { generation: u64 },
    /// The store created a record requested by transition `seq`.
    RecordCreated { seq: u64, id: RecordId },
    /// The store marked a record complete.
    RecordCompleted { id: RecordId },
    /// The store could not create the record requested by transition `seq`.
    RecordFailed { seq: u64 },
    /// Settings arrived from the settings source.
    SettingsLoaded(Settings),
}

/// Summary of a finished session, returned by `skip` and `tick`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub finished: SessionType,
    pub next: SessionType,
    pub auto_started: bool,
}

/// Effectful collaborators injected at construction.
pub struct Collaborators {
    pub notifier: Box<dyn NotificationSink>,
    pub sound: Box<dyn SoundSink>,
    pub cache: Box<dyn DurableCache>,
    pub store: Box<dyn SessionStore>,
}

/// What the engine knows about the current session's record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordSlot {
    Empty,
    /// Create requested by transition `seq`, id not back yet.
    Pending(u64),
    Attached(RecordId),
}

pub struct TimerEngine {
    state: TimerState,
    settings: Settings,
    notifier: Box<dyn NotificationSink>,
    sound: Box<dyn SoundSink>,
    cache: Box<dyn DurableCache>,
    records: RecordWorker,
    events: Sender<EngineEvent>,
    /// Bumped whenever the active session is replaced or abandoned.
    transition: u64,
    record: RecordSlot,
    /// Creates whose session already completed before the id arrived.
    complete_on_arrival: HashSet<u64>,
    ticker: Option<Ticker>,
    ticker_generation: u64,
}

impl TimerEngine {
    /// Creates an engine, restoring cached state when it is usable.
    pub fn new(collaborators: Collaborators, events: Sender<EngineEvent>) -> Self {
        let Collaborators {
            notifier,
            sound,
            cache,
            store,
        } = collaborators;

        let settings = Settings::default();
        let state = match cache.load() {
            Some(state) if state.is_consistent() => {
                info!(
                    session_type = %state.session_type,
                    session_number = state.session_number,
                    remaining = state.current_time,
                    "restored timer state"
                );
                state
            }
            Some(_) => {
                warn!("cached timer state is inconsistent, starting fresh");
                TimerState::initial(&settings)
            }
            None => TimerState::initial(&settings),
        };

        let records = RecordWorker::spawn(store, events.clone());

        let mut engine = Self {
            state,
            settings,
            notifier,
            sound,
            cache,
            records,
            events,
            transition: 0,
            record: RecordSlot::Empty,
            complete_on_arrival: HashSet::new(),
            ticker: None,
            ticker_generation: 0,
        };
        engine.sync_ticker();
        engine
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Returns true if a tick thread is currently scheduled.
    #[cfg(test)]
    pub fn is_ticking(&self) -> bool {
        self.ticker.is_some()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Starts the current session, or resumes it when paused.
    pub fn start(&mut self) {
        if !self.state.is_running {
            self.transition += 1;
            self.open_record(self.state.session_type, self.state.total_time / 60);
        }
        self.state.is_running = true;
        self.state.is_paused = false;
        self.commit();
    }

    pub fn pause(&mut self) {
        if !self.state.is_running {
            return;
        }
        self.state.is_paused = true;
        self.commit();
    }

    /// Stops the countdown and rewinds the current session.
    pub fn reset(&mut self) {
        self.restart_as(self.state.session_type);
    }

    /// Completes the current session immediately.
    pub fn skip(&mut self) -> Completion {
        self.complete()
    }

    pub fn set_current_task(&mut self, task_id: Option<TaskId>) {
        self.state.current_task_id = task_id;
        self.commit();
    }

    /// Stops the countdown and makes `session_type` the active session.
    pub fn switch_session_type(&mut self, session_type: SessionType) {
        self.restart_as(session_type);
    }

    /// Advances the countdown by one second.
    ///
    /// Returns the completion when this tick finished the session.
    pub fn tick(&mut self) -> Option<Completion> {
        if !self.state.is_ticking() {
            return None;
        }
        self.state.current_time = self.state.current_time.saturating_sub(1);
        if self.state.current_time == 0 {
            return Some(self.complete());
        }
        self.commit();
        None
    }

    /// Replaces the settings snapshot used for future duration lookups.
    ///
    /// A fresh idle session is resized to the new durations; anything
    /// started or partially elapsed keeps its length until the next
    /// transition.
    pub fn apply_settings(&mut self, settings: Settings) {
        self.settings = settings;
        if self.state.is_idle() && self.state.current_time == self.state.total_time {
            let total = self.settings.duration_secs(self.state.session_type);
            if total != self.state.total_time {
                self.state.current_time = total;
                self.state.total_time = total;
                self.commit();
            }
        }
    }

    /// Applies a background event. Returns true if the visible state changed.
    pub fn handle_event(&mut self, event: EngineEvent) -> bool {
        match event {
            EngineEvent::Tick { generation } => {
                let current = self.ticker.as_ref().map(Ticker::generation);
                if current != Some(generation) {
                    debug!(generation, "ignoring tick from cancelled ticker");
                    return false;
                }
                self.tick();
                true
            }
            EngineEvent::RecordCreated { seq, id } => {
                self.attach_record(seq, id);
                false
            }
            EngineEvent::RecordCompleted { id } => {
                debug!(id, "session record completed");
                // Stats derived from completed records have moved.
                true
            }
            EngineEvent::RecordFailed { seq } => {
                self.drop_record(seq);
                false
            }
            EngineEvent::SettingsLoaded(settings) => {
                info!("settings loaded");
                self.apply_settings(settings);
                true
            }
        }
    }

    // ── Internals ────────────────────────────────────────────────────

    fn restart_as(&mut self, session_type: SessionType) {
        let total = self.settings.duration_secs(session_type);
        self.transition += 1;
        self.record = RecordSlot::Empty;
        self.state.is_running = false;
        self.state.is_paused = false;
        self.state.session_type = session_type;
        self.state.current_time = total;
        self.state.total_time = total;
        self.commit();
    }

    fn complete(&mut self) -> Completion {
        let finished = self.state.session_type;
        let is_break = finished.is_break();
        info!(session_type = %finished, session_number = self.state.session_number, "session complete");

        if self.settings.sound_enabled {
            self.sound.play_completion_cue();
        }
        if self.settings.notifications_enabled {
            let body = if is_break {
                BREAK_OVER_MESSAGE
            } else {
                FOCUS_OVER_MESSAGE
            };
            self.notifier.show(NOTIFICATION_TITLE, body);
        }

        match std::mem::replace(&mut self.record, RecordSlot::Empty) {
            RecordSlot::Attached(id) => self.records.submit(RecordJob::Complete { id }),
            RecordSlot::Pending(seq) => {
                self.complete_on_arrival.insert(seq);
            }
            RecordSlot::Empty => {}
        }

        let next = self
            .settings
            .next_session_type(finished, self.state.session_number);
        let total = self.settings.duration_secs(next);
        let auto_started = self.settings.auto_starts_after(finished);

        self.transition += 1;
        // The next session gets a fresh ticker, if any.
        self.ticker = None;
        self.state = TimerState {
            is_running: auto_started,
            is_paused: false,
            current_time: total,
            total_time: total,
            session_type: next,
            session_number: if next == SessionType::Focus {
                self.state.session_number.saturating_add(1)
            } else {
                self.state.session_number
            },
            current_task_id: self.state.current_task_id,
        };
        self.commit();

        if auto_started {
            self.open_record(next, self.settings.duration_mins(next));
        }

        Completion {
            finished,
            next,
            auto_started,
        }
    }

    /// Requests a record for the session started by the current transition.
    fn open_record(&mut self, session_type: SessionType, duration_mins: u32) {
        let seq = self.transition;
        self.record = RecordSlot::Pending(seq);
        self.records.submit(RecordJob::Create {
            seq,
            record: NewSessionRecord {
                task_id: self.state.current_task_id,
                session_type,
                duration_mins,
            },
        });
    }

    fn attach_record(&mut self, seq: u64, id: RecordId) {
        if self.complete_on_arrival.remove(&seq) {
            debug!(seq, id, "record arrived after its session completed");
            self.records.submit(RecordJob::Complete { id });
        } else if self.record == RecordSlot::Pending(seq) {
            self.record = RecordSlot::Attached(id);
        } else {
            debug!(seq, id, "discarding record for abandoned session");
        }
    }

    /// Forgets a create that will never produce an id.
    fn drop_record(&mut self, seq: u64) {
        self.complete_on_arrival.remove(&seq);
        if self.record == RecordSlot::Pending(seq) {
            self.record = RecordSlot::Empty;
        }
    }

    /// Persists the state and brings the ticker in line with it.
    fn commit(&mut self) {
        if let Err(e) = self.cache.save(&self.state) {
            warn!("failed to cache timer state: {}", e);
        }
        self.sync_ticker();
    }

    fn sync_ticker(&mut self) {
        if !self.state.is_ticking() {
            self.ticker = None;
        } else if self.ticker.is_none() {
            self.ticker_generation += 1;
            self.ticker = Some(Ticker::spawn(self.ticker_generation, self.events.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::fakes::{
        CountingSound, MemoryCache, MemoryStore, RecordingNotifier, StoredRecord,
    };
    use std::sync::mpsc::{self, Receiver};
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(3);

    struct Harness {
        engine: TimerEngine,
        events: Receiver<EngineEvent>,
        cache: MemoryCache,
        notifier: RecordingNotifier,
        sound: CountingSound,
        store: MemoryStore,
    }

    impl Harness {
        fn new(settings: Settings) -> Self {
            Self::with_parts(settings, MemoryCache::default(), MemoryStore::default())
        }

        fn with_parts(settings: Settings, cache: MemoryCache, store: MemoryStore) -> Self {
            let notifier = RecordingNotifier::default();
            let sound = CountingSound::default();
            let (tx, events) = mpsc::channel();
            let mut engine = TimerEngine::new(
                Collaborators {
                    notifier: Box::new(notifier.clone()),
                    sound: Box::new(sound.clone()),
                    cache: Box::new(cache.clone()),
                    store: Box::new(store.clone()),
                },
                tx,
            );
            engine.apply_settings(settings);
            Self {
                engine,
                events,
                cache,
                notifier,
                sound,
                store,
            }
        }

        /// Feeds worker events back into the engine until `n` record
        /// events have been seen. Ticks are dropped so tests drive the clock.
        fn pump_records(&mut self, n: usize) {
            let mut seen = 0;
            while seen < n {
                let event = self.events.recv_timeout(WAIT).expect("record event");
                match event {
                    EngineEvent::Tick { .. } => continue,
                    other => {
                        seen += 1;
                        self.engine.handle_event(other);
                    }
                }
            }
        }

        fn records(&self) -> Vec<StoredRecord> {
            self.store.snapshot()
        }

        fn tick_until_complete(&mut self) -> Completion {
            let limit = self.engine.state().current_time + 1;
            for _ in 0..limit {
                if let Some(done) = self.engine.tick() {
                    return done;
                }
            }
            panic!("session did not complete");
        }
    }

    fn settings() -> Settings {
        Settings::default()
    }

    fn assert_invariant(state: &TimerState) {
        assert!(state.current_time <= state.total_time, "{:?}", state);
        assert!(state.session_number >= 1);
    }

    #[test]
    fn test_initial_state() {
        let h = Harness::new(settings());
        let state = h.engine.state();
        assert!(state.is_idle());
        assert_eq!(state.session_type, SessionType::Focus);
        assert_eq!(state.current_time, 1500);
        assert_eq!(state.total_time, 1500);
        assert_eq!(state.session_number, 1);
        assert!(!h.engine.is_ticking());
    }

    #[test]
    fn test_start_creates_one_record_and_ticks() {
        let mut h = Harness::new(settings());
        h.engine.set_current_task(Some(3));
        h.engine.start();

        assert!(h.engine.state().is_running);
        assert!(!h.engine.state().is_paused);
        assert!(h.engine.is_ticking());

        h.pump_records(1);
        let records = h.records();
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].record,
            NewSessionRecord {
                task_id: Some(3),
                session_type: SessionType::Focus,
                duration_mins: 25,
            }
        );
    }

    #[test]
    fn test_start_twice_is_idempotent() {
        let mut h = Harness::new(settings());
        h.engine.start();
        let after_first = h.engine.state().clone();
        h.engine.start();

        assert_eq!(h.engine.state(), &after_first);
        h.pump_records(1);
        // No second create comes back.
        let extra = h.events.recv_timeout(Duration::from_millis(200));
        assert!(extra.map_or(true, |e| matches!(e, EngineEvent::Tick { .. })));
        assert_eq!(h.records().len(), 1);
    }

    #[test]
    fn test_pause_keeps_time_and_stops_ticking() {
        let mut h = Harness::new(settings());
        h.engine.start();
        for _ in 0..10 {
            h.engine.tick();
        }
        h.engine.pause();

        let state = h.engine.state().clone();
        assert!(state.is_paused);
        assert_eq!(state.current_time, 1490);
        assert!(!h.engine.is_ticking());

        // Ticks while paused change nothing.
        assert_eq!(h.engine.tick(), None);
        assert_eq!(h.engine.state(), &state);
    }

    #[test]
    fn test_pause_when_idle_is_noop() {
        let mut h = Harness::new(settings());
        h.engine.pause();
        assert!(!h.engine.state().is_paused);
    }

    #[test]
    fn test_resume_does_not_create_record() {
        let mut h = Harness::new(settings());
        h.engine.start();
        h.pump_records(1);
        h.engine.pause();
        h.engine.start();

        assert!(h.engine.state().is_ticking());
        assert!(h.engine.is_ticking());
        assert_eq!(h.records().len(), 1);
    }

    #[test]
    fn test_reset_restores_current_type() {
        let mut h = Harness::new(settings());
        h.engine.switch_session_type(SessionType::ShortBreak);
        h.engine.start();
        for _ in 0..30 {
            h.engine.tick();
        }
        h.engine.reset();

        let state = h.engine.state();
        assert!(!state.is_running);
        assert!(!state.is_paused);
        assert_eq!(state.session_type, SessionType::ShortBreak);
        assert_eq!(state.session_number, 1);
        assert_eq!(state.current_time, 300);
        assert_eq!(state.total_time, 300);
        assert!(!h.engine.is_ticking());
    }

    #[test]
    fn test_reset_picks_up_settings_change() {
        let mut h = Harness::new(settings());
        h.engine.start();
        h.engine.tick();
        h.engine.apply_settings(Settings {
            focus_mins: 50,
            ..settings()
        });
        // Running session keeps its length.
        assert_eq!(h.engine.state().total_time, 1500);

        h.engine.reset();
        assert_eq!(h.engine.state().total_time, 3000);
        assert_eq!(h.engine.state().current_time, 3000);
    }

    #[test]
    fn test_settings_resize_fresh_idle_session() {
        let mut h = Harness::new(settings());
        h.engine.apply_settings(Settings {
            focus_mins: 40,
            ..settings()
        });
        assert_eq!(h.engine.state().current_time, 2400);
        assert_eq!(h.engine.state().total_time, 2400);
    }

    #[test]
    fn test_settings_loaded_event_applies_settings() {
        let mut h = Harness::new(settings());
        let changed = h.engine.handle_event(EngineEvent::SettingsLoaded(Settings {
            short_break_mins: 10,
            ..settings()
        }));
        assert!(changed);
        assert_eq!(h.engine.settings().short_break_mins, 10);
    }

    #[test]
    fn test_switch_session_type() {
        let mut h = Harness::new(settings());
        h.engine.start();
        h.engine.switch_session_type(SessionType::LongBreak);

        let state = h.engine.state();
        assert!(!state.is_running);
        assert_eq!(state.session_type, SessionType::LongBreak);
        assert_eq!(state.current_time, 900);
        assert_eq!(state.total_time, 900);
        assert_eq!(state.session_number, 1);
        assert!(!h.engine.is_ticking());

        h.engine.switch_session_type(SessionType::Focus);
        assert_eq!(h.engine.state().session_number, 1);
    }

    #[test]
    fn test_skip_from_idle_focus() {
        let mut h = Harness::new(settings());
        let done = h.engine.skip();

        assert_eq!(
            done,
            Completion {
                finished: SessionType::Focus,
                next: SessionType::ShortBreak,
                auto_started: false,
            }
        );
        let state = h.engine.state();
        assert_eq!(state.session_type, SessionType::ShortBreak);
        assert_eq!(state.current_time, 300);
        assert_eq!(state.total_time, 300);
        assert!(!state.is_running);
        assert_eq!(state.session_number, 1);
    }

    #[test]
    fn test_natural_break_completion_auto_starts_focus() {
        let mut h = Harness::new(Settings {
            auto_start_pomodoros: true,
            ..settings()
        });
        h.engine.switch_session_type(SessionType::ShortBreak);
        h.engine.start();
        h.pump_records(1);

        let done = h.tick_until_complete();
        assert_eq!(done.next, SessionType::Focus);
        assert!(done.auto_started);

        let state = h.engine.state();
        assert_eq!(state.session_type, SessionType::Focus);
        assert!(state.is_running);
        assert_eq!(state.session_number, 2);
        assert_eq!(state.current_time, 1500);
        assert!(h.engine.is_ticking());

        // Break record completed, new focus record created.
        h.pump_records(2);
        let records = h.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].record.session_type, SessionType::ShortBreak);
        assert!(records[0].completed);
        assert_eq!(records[1].record.session_type, SessionType::Focus);
        assert!(!records[1].completed);
    }

    #[test]
    fn test_skip_matches_natural_completion() {
        for session_type in SessionType::ALL {
            let config = Settings {
                auto_start_breaks: true,
                ..settings()
            };
            let mut skipped = Harness::new(config.clone());
            let mut natural = Harness::new(config);
            for h in [&mut skipped, &mut natural] {
                h.engine.switch_session_type(session_type);
                h.engine.start();
            }

            let a = skipped.engine.skip();
            let b = natural.tick_until_complete();

            assert_eq!(a, b);
            assert_eq!(skipped.engine.state(), natural.engine.state());
        }
    }

    #[test]
    fn test_long_break_cadence() {
        let mut h = Harness::new(settings());
        let mut sequence = vec![h.engine.state().session_type];
        for _ in 0..8 {
            h.engine.skip();
            sequence.push(h.engine.state().session_type);
            assert_invariant(h.engine.state());
        }

        use SessionType::*;
        assert_eq!(
            sequence,
            vec![
                Focus, ShortBreak, Focus, ShortBreak, Focus, ShortBreak, Focus, LongBreak, Focus
            ]
        );
        assert_eq!(h.engine.state().session_number, 5);
    }

    #[test]
    fn test_session_number_only_increments_entering_focus() {
        let mut h = Harness::new(settings());
        h.engine.skip(); // focus -> short break
        assert_eq!(h.engine.state().session_number, 1);
        h.engine.skip(); // short break -> focus
        assert_eq!(h.engine.state().session_number, 2);
        h.engine.switch_session_type(SessionType::LongBreak);
        h.engine.skip(); // long break -> focus
        assert_eq!(h.engine.state().session_number, 3);
    }

    #[test]
    fn test_completion_side_effects() {
        let mut h = Harness::new(settings());
        h.engine.skip();
        h.engine.skip();

        assert_eq!(h.sound.plays.get(), 2);
        let shown = h.notifier.shown.borrow();
        assert_eq!(
            *shown,
            vec![
                (NOTIFICATION_TITLE.to_string(), FOCUS_OVER_MESSAGE.to_string()),
                (NOTIFICATION_TITLE.to_string(), BREAK_OVER_MESSAGE.to_string()),
            ]
        );
    }

    #[test]
    fn test_completion_side_effects_respect_settings() {
        let mut h = Harness::new(Settings {
            sound_enabled: false,
            notifications_enabled: false,
            ..settings()
        });
        h.engine.skip();

        assert_eq!(h.sound.plays.get(), 0);
        assert!(h.notifier.shown.borrow().is_empty());
    }

    #[test]
    fn test_reset_discards_late_record() {
        let mut h = Harness::new(settings());
        h.engine.start();
        h.engine.reset();
        // The create resolves after the reset.
        h.pump_records(1);

        h.engine.start();
        h.pump_records(1);
        h.engine.skip();
        h.pump_records(1);

        let records = h.records();
        assert_eq!(records.len(), 2);
        assert!(!records[0].completed, "abandoned session must stay open");
        assert!(records[1].completed);
    }

    #[test]
    fn test_switch_discards_record() {
        let mut h = Harness::new(settings());
        h.engine.start();
        h.pump_records(1);
        h.engine.switch_session_type(SessionType::ShortBreak);
        h.engine.skip();

        // No completion is sent for the abandoned focus record.
        assert!(h
            .events
            .recv_timeout(Duration::from_millis(300))
            .map_or(true, |e| matches!(e, EngineEvent::Tick { .. })));
        assert!(!h.records()[0].completed);
    }

    #[test]
    fn test_record_arriving_after_completion_is_completed() {
        let mut h = Harness::new(settings());
        h.engine.start();
        // Complete before the worker's reply is handled.
        h.engine.skip();
        h.pump_records(1); // RecordCreated -> Complete job
        h.pump_records(1); // RecordCompleted

        let records = h.records();
        assert_eq!(records.len(), 1);
        assert!(records[0].completed);
    }

    #[test]
    fn test_store_failure_does_not_block_transitions() {
        let mut h = Harness::with_parts(settings(), MemoryCache::default(), MemoryStore::failing());
        h.engine.start();
        h.engine.skip();

        let state = h.engine.state();
        assert_eq!(state.session_type, SessionType::ShortBreak);
        assert!(h.records().is_empty());
    }

    #[test]
    fn test_failed_create_is_forgotten() {
        let mut h = Harness::with_parts(settings(), MemoryCache::default(), MemoryStore::failing());
        h.engine.start();
        h.engine.skip();
        assert_eq!(h.engine.complete_on_arrival.len(), 1);

        h.pump_records(1); // RecordFailed
        assert!(h.engine.complete_on_arrival.is_empty());
        assert_eq!(h.engine.record, RecordSlot::Empty);
    }

    #[test]
    fn test_failed_create_clears_pending_slot() {
        let mut h = Harness::with_parts(settings(), MemoryCache::default(), MemoryStore::failing());
        h.engine.start();
        h.pump_records(1);

        assert_eq!(h.engine.record, RecordSlot::Empty);
        assert!(h.engine.state().is_running);
    }

    #[test]
    fn test_record_completed_requests_redraw() {
        let mut h = Harness::new(settings());
        assert!(h.engine.handle_event(EngineEvent::RecordCompleted { id: 1 }));
        assert!(!h.engine.handle_event(EngineEvent::RecordCreated { seq: 99, id: 2 }));
    }

    #[test]
    fn test_stale_ticks_are_ignored() {
        let mut h = Harness::new(settings());
        h.engine.start();
        let stale = h.engine.ticker_generation;
        h.engine.pause();
        h.engine.start();

        let before = h.engine.state().clone();
        assert!(!h.engine.handle_event(EngineEvent::Tick { generation: stale }));
        assert_eq!(h.engine.state(), &before);

        let live = h.engine.ticker_generation;
        assert!(h.engine.handle_event(EngineEvent::Tick { generation: live }));
        assert_eq!(h.engine.state().current_time, before.current_time - 1);
    }

    #[test]
    fn test_state_is_cached_after_every_mutation() {
        let mut h = Harness::new(settings());
        h.engine.start();
        h.engine.tick();
        assert_eq!(h.cache.current().as_ref(), Some(h.engine.state()));

        let writes = h.cache.writes.get();
        h.engine.tick();
        assert_eq!(h.cache.writes.get(), writes + 1);

        h.engine.set_current_task(Some(12));
        assert_eq!(h.cache.current().unwrap().current_task_id, Some(12));
    }

    #[test]
    fn test_restores_cached_state() {
        let cached = TimerState {
            current_time: 420,
            total_time: 900,
            session_type: SessionType::LongBreak,
            session_number: 4,
            current_task_id: Some(2),
            ..TimerState::default()
        };
        let h = Harness::with_parts(
            settings(),
            MemoryCache::with_state(cached.clone()),
            MemoryStore::default(),
        );
        assert_eq!(h.engine.state(), &cached);
    }

    #[test]
    fn test_restored_running_state_resumes_ticking() {
        let cached = TimerState {
            is_running: true,
            current_time: 100,
            ..TimerState::default()
        };
        let h = Harness::with_parts(
            settings(),
            MemoryCache::with_state(cached),
            MemoryStore::default(),
        );
        assert!(h.engine.is_ticking());
    }

    #[test]
    fn test_inconsistent_cache_falls_back_to_defaults() {
        let cached = TimerState {
            current_time: 5000,
            total_time: 60,
            ..TimerState::default()
        };
        let h = Harness::with_parts(
            settings(),
            MemoryCache::with_state(cached),
            MemoryStore::default(),
        );
        assert_eq!(h.engine.state(), &TimerState::default());
    }

    #[test]
    fn test_zero_total_time_completes_on_next_tick() {
        let cached = TimerState {
            is_running: true,
            current_time: 0,
            total_time: 0,
            ..TimerState::default()
        };
        let mut h = Harness::with_parts(
            settings(),
            MemoryCache::with_state(cached),
            MemoryStore::default(),
        );

        let done = h.engine.tick().expect("completes");
        assert_eq!(done.next, SessionType::ShortBreak);
        assert_eq!(h.engine.state().current_time, 300);
        assert_invariant(h.engine.state());
    }

    #[test]
    fn test_session_number_saturates_on_restored_state() {
        let cached = TimerState {
            session_type: SessionType::ShortBreak,
            current_time: 300,
            total_time: 300,
            session_number: u32::MAX,
            ..TimerState::default()
        };
        let mut h = Harness::with_parts(
            settings(),
            MemoryCache::with_state(cached),
            MemoryStore::default(),
        );

        h.engine.skip();
        assert_eq!(h.engine.state().session_type, SessionType::Focus);
        assert_eq!(h.engine.state().session_number, u32::MAX);
        assert_invariant(h.engine.state());
    }

    #[test]
    fn test_zero_cadence_never_divides_by_zero() {
        let mut h = Harness::new(Settings {
            long_break_after: 0,
            ..settings()
        });
        for _ in 0..8 {
            h.engine.skip();
            assert_invariant(h.engine.state());
        }
        assert_eq!(h.engine.state().session_number, 5);
    }

    #[test]
    fn test_task_change_does_not_touch_open_record() {
        let mut h = Harness::new(settings());
        h.engine.set_current_task(Some(1));
        h.engine.start();
        h.pump_records(1);
        h.engine.set_current_task(Some(2));

        assert_eq!(h.records()[0].record.task_id, Some(1));
        assert_eq!(h.engine.state().current_task_id, Some(2));
        assert!(h.engine.state().is_running);
    }
}
