//! Job queue, workers, collectors, the full-synchronization sequence and its scheduler.

pub mod collectors;
pub mod error;
pub mod jobs;
pub mod queue;
pub mod scheduler;
pub mod sequencer;
pub mod worker;

pub use collectors::{CollectReport, SyncContext};
pub use error::{EnqueueError, SyncError};
pub use jobs::{JobId, JobRecord, JobType};
pub use queue::JobQueue;
pub use scheduler::Scheduler;

use std::sync::{Mutex, MutexGuard};

/// Lock a std mutex, recovering the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
