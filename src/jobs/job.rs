//! # Job abstraction.
//!
//! [`Job`] is the control surface every job kind exposes: lifecycle commands
//! plus access to its [`JobCore`]. Leaf jobs ([`ChildTask`](crate::ChildTask),
//! [`ObserverChildTask`](crate::ObserverChildTask)) and
//! [`JobController`](crate::JobController) all implement it, so a controller can
//! hold any of them as `Arc<dyn Job<T>>`.

use std::sync::Arc;

use crate::channels::Payload;
use crate::error::JobError;
use crate::subscribers::{Observe, Subscribe, Subscription};

use super::core::{JobCore, JobId};
use super::state::JobState;

/// Shared handle to any job.
pub type JobRef<T> = Arc<dyn Job<T>>;

/// # Controllable unit of work with replayable output.
///
/// Lifecycle commands are synchronous and never block: they request a
/// transition and return. Use [`JobCore::wait`] to await the outcome.
///
/// `stop()` must be idempotent; on a terminal job it does nothing.
pub trait Job<T: Payload>: Send + Sync + 'static {
    /// Returns the job's state and output log.
    fn core(&self) -> &JobCore<T>;

    /// Starts the work. Starting a job that is not `NotStarted` does nothing.
    fn start(&self);

    /// Requests cancellation; the job ends `Stopped` unless already terminal.
    fn stop(&self);

    /// Pauses the job.
    fn suspend(&self) -> Result<(), JobError> {
        Err(JobError::Unsupported {
            operation: "suspend",
        })
    }

    /// Continues a suspended job.
    fn resume(&self) -> Result<(), JobError> {
        Err(JobError::Unsupported {
            operation: "resume",
        })
    }

    /// Fails a job that will never run, releasing whatever it holds so none of
    /// its work outlives the failure.
    ///
    /// Controllers call this for queued children they drop from the schedule.
    fn skip(&self, error: JobError) {
        self.core().fail(error);
    }

    /// Releases the job; live subscribers receive [`JobError::Disposed`].
    fn dispose(&self);

    fn id(&self) -> JobId {
        self.core().id()
    }

    fn state(&self) -> JobState {
        self.core().state()
    }

    /// See [`JobCore::subscribe`].
    fn subscribe(&self, sub: Arc<dyn Subscribe<T>>) -> Subscription {
        self.core().subscribe(sub)
    }

    /// See [`JobCore::observe`].
    fn observe(&self, observer: Arc<dyn Observe<T>>) -> Subscription {
        self.core().observe(observer)
    }
}
