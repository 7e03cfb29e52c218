//! # Child source selection.
//!
//! [`ChildTaskSource`] names the two shapes a wrapped operation can have and
//! picks the matching job kind once, at construction:
//!
//! ```text
//! Pull(future)  ──► spawned now ──► ChildTask          (one optional value)
//! Push(stream)  ──► kept lazy   ──► ObserverChildTask  (zero or more values)
//! ```

use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use futures::stream::{BoxStream, Stream, StreamExt};

use crate::channels::Payload;
use crate::error::Fault;

use super::child_task::{ChildTask, Outcome};
use super::job::Job;
use super::observer_task::ObserverChildTask;

/// Operation to wrap as a child job.
pub enum ChildTaskSource<T> {
    /// Future yielding at most one value.
    Pull(BoxFuture<'static, Outcome<T>>),
    /// Stream of values, errors, and completion.
    Push(BoxStream<'static, Result<T, Fault>>),
}

impl<T: Payload> ChildTaskSource<T> {
    /// Future whose value becomes the job's only payload.
    pub fn pull<F, E>(future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<Fault>,
    {
        ChildTaskSource::Pull(
            future
                .map(|res| res.map(Some).map_err(Into::<Fault>::into))
                .boxed(),
        )
    }

    /// Future without a result value.
    pub fn pull_unit<F, E>(future: F) -> Self
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<Fault>,
    {
        ChildTaskSource::Pull(
            future
                .map(|res| res.map(|()| None).map_err(Into::<Fault>::into))
                .boxed(),
        )
    }

    /// Stream whose items become payloads.
    pub fn push<S, E>(stream: S) -> Self
    where
        S: Stream<Item = Result<T, E>> + Send + 'static,
        E: Into<Fault>,
    {
        ChildTaskSource::Push(stream.map(|item| item.map_err(Into::<Fault>::into)).boxed())
    }

    pub fn is_push(&self) -> bool {
        matches!(self, ChildTaskSource::Push(_))
    }

    /// Builds the job. A pull source starts running immediately (inside the
    /// current Tokio runtime); a push source waits for [`Job::start`].
    ///
    /// Stopping a pull job built here does not cancel its future; use
    /// [`ChildTask::spawn`] for cooperative cancellation.
    pub fn into_job(self, label: impl Into<Arc<str>>) -> Arc<dyn Job<T>> {
        match self {
            ChildTaskSource::Pull(future) => {
                Arc::new(ChildTask::from_outcome_handle(label, tokio::spawn(future)))
            }
            ChildTaskSource::Push(stream) => Arc::new(ObserverChildTask::new(label, stream)),
        }
    }
}

impl<T> std::fmt::Debug for ChildTaskSource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChildTaskSource::Pull(_) => f.write_str("ChildTaskSource::Pull"),
            ChildTaskSource::Push(_) => f.write_str("ChildTaskSource::Push"),
        }
    }
}
