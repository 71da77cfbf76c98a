//! Capability traits the timer engine is wired with.
//!
//! Everything effectful the engine touches (cache, session records,
//! settings, sound and notifications) goes through one of these so tests
//! can substitute in-memory fakes.

use crate::models::{NewSessionRecord, RecordId, Settings, TimerState};
use crate::persistence::DatabaseError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Shows a desktop notification. Silently does nothing when unsupported.
pub trait NotificationSink {
    fn show(&self, title: &str, body: &str);
}

/// Plays the session completion cue. Silently does nothing when unsupported.
pub trait SoundSink {
    fn play_completion_cue(&self);
}

/// A missing audio device is a silent sink.
impl<S: SoundSink> SoundSink for Option<S> {
    fn play_completion_cue(&self) {
        if let Some(sink) = self {
            sink.play_completion_cue();
        }
    }
}

/// Local cache that lets the timer survive a restart.
pub trait DurableCache {
    fn save(&mut self, state: &TimerState) -> StoreResult<()>;

    /// Returns `None` when nothing is cached or the cached value is unreadable.
    fn load(&self) -> Option<TimerState>;
}

/// Log of started and completed sessions. Runs on the record worker thread.
pub trait SessionStore: Send {
    fn create(&mut self, record: &NewSessionRecord) -> StoreResult<RecordId>;
    fn complete(&mut self, id: RecordId) -> StoreResult<()>;
}

/// Where settings come from. Fetched off the UI thread.
pub trait SettingsSource: Send {
    fn fetch(&self) -> StoreResult<Settings>;
}


#[cfg(test)]
mod tests {
    use super::fakes::CountingSound;
    use super::*;

    #[test]
    fn test_missing_sound_device_is_silent() {
        let sink: Option<CountingSound> = None;
        sink.play_completion_cue();

        let present = Some(CountingSound::default());
        present.play_completion_cue();
        assert_eq!(present.as_ref().unwrap().plays.get(), 1);
    }
}
