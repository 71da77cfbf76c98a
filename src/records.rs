//! Background workers for session-record logging and settings loading.
//!
//! Store calls never run on the UI thread. Results come back to the engine
//! as `EngineEvent`s. Failures are logged; a failed create is reported so
//! the engine can forget it.

use crate::collaborators::{SessionStore, SettingsSource};
use crate::engine::EngineEvent;
use crate::models::{NewSessionRecord, RecordId};
use std::sync::mpsc::{self, Sender};
use std::thread;
use tracing::{debug, warn};

/// Work item for the record worker.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordJob {
    /// Create a record; `seq` is the engine transition that requested it.
    Create { seq: u64, record: NewSessionRecord },
    /// Mark a record complete.
    Complete { id: RecordId },
}

/// Handle to the thread that owns the session store.
///
/// Jobs are processed in submission order. The thread exits once this
/// handle is dropped and the queue is drained.
pub struct RecordWorker {
    jobs: Sender<RecordJob>,
}

impl RecordWorker {
    pub fn spawn(mut store: Box<dyn SessionStore>, events: Sender<EngineEvent>) -> Self {
        let (jobs, queue) = mpsc::channel::<RecordJob>();

        thread::spawn(move || {
            for job in queue {
                let event = match job {
                    RecordJob::Create { seq, record } => match store.create(&record) {
                        Ok(id) => EngineEvent::RecordCreated { seq, id },
                        Err(e) => {
                            warn!(
                                seq,
                                session_type = %record.session_type,
                                "failed to create session record: {}",
                                e
                            );
                            EngineEvent::RecordFailed { seq }
                        }
                    },
                    RecordJob::Complete { id } => match store.complete(id) {
                        Ok(()) => EngineEvent::RecordCompleted { id },
                        Err(e) => {
                            warn!(id, "failed to complete session record: {}", e);
                            continue;
                        }
                    },
                };
                if events.send(event).is_err() {
                    debug!("engine gone, stopping record worker");
                    break;
                }
            }
        });

        Self { jobs }
    }

    /// Queues a job. Never blocks.
    pub fn submit(&self, job: RecordJob) {
        if self.jobs.send(job).is_err() {
            warn!("record worker has stopped, dropping job");
        }
    }
}

/// Loads settings on a background thread and posts them to the engine.
pub fn spawn_settings_fetch<S>(source: S, events: Sender<EngineEvent>)
where
    S: SettingsSource + 'static,
{
    thread::spawn(move || match source.fetch() {
        Ok(settings) => {
            let _ = events.send(EngineEvent::SettingsLoaded(settings));
        }
        Err(e) => warn!("failed to load settings, keeping defaults: {}", e),
    });
}
