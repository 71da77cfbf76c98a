//! One-second ticker and tray formatting for the countdown.

use crate::engine::EngineEvent;
use crate::models::{SessionType, TimerState};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Interval between countdown ticks.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// A running tick thread.
///
/// Posts `EngineEvent::Tick` once per second until dropped. Dropping the
/// handle cancels the thread and waits for it to exit, so at most one tick
/// source exists per handle and none outlives it.
pub struct Ticker {
    generation: u64,
    cancel: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    /// Spawns a ticker whose events carry `generation`.
    pub fn spawn(generation: u64, events: Sender<EngineEvent>) -> Self {
        let (cancel, cancelled) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            let mut next = Instant::now() + TICK_INTERVAL;
            loop {
                let wait = next.saturating_duration_since(Instant::now());
                match cancelled.recv_timeout(wait) {
                    Err(RecvTimeoutError::Timeout) => {
                        if events.send(EngineEvent::Tick { generation }).is_err() {
                            break;
                        }
                        next += TICK_INTERVAL;
                    }
                    // Cancel signal or handle dropped
                    _ => break,
                }
            }
        });

        Self {
            generation,
            cancel: Some(cancel),
            handle: Some(handle),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        drop(self.cancel.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!(generation = self.generation, "ticker thread panicked");
            }
        }
    }
}

/// Formats the tray title based on current timer state.
pub fn format_tray_title(state: &TimerState) -> String {
    if state.is_idle() {
        return "🍅".to_string();
    }
    let icon = if state.is_paused {
        "⏸"
    } else if state.session_type == SessionType::Focus {
        "🍅"
    } else {
        "☕"
    };
    format!("{} {}", icon, format_time(state.current_time))
}

/// Formats time in MM:SS format.
pub fn format_time(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
