//! # Pull-variant leaf job backed by a future.
//!
//! [`ChildTask`] wraps an asynchronous operation that yields at most one value.
//! The operation is either already running (a [`JoinHandle`]) or launched on
//! [`Job::start`] from a factory.
//!
//! ## Outcome mapping
//! ```text
//! Ok(value)                 ──► Payload(value) + Completed   (atomic)
//! Ok(())                    ──► Completed
//! Err(fault), one Stopped   ──► Stopped
//! Err(fault)                ──► Failed(fault.into_job_error())
//! JoinError::is_cancelled() ──► Stopped
//! JoinError::is_panic()     ──► Failed(Panicked)
//! ```
//!
//! ## Cancellation
//! `stop()` cancels the task's scope token when it has one. Handles passed to
//! [`ChildTask::from_handle`] have no scope unless one is supplied with
//! [`ChildTask::with_scope`]; the operation then keeps running and its late
//! outcome is ignored because the job is already `Stopped`.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::BoxFuture;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::channels::Payload;
use crate::error::{Fault, JobError};
use crate::subscribers::panic_message;

use super::core::JobCore;
use super::job::Job;

pub(crate) type Outcome<T> = Result<Option<T>, Fault>;
type Launcher<T> = Box<dyn FnOnce(CancellationToken) -> BoxFuture<'static, Outcome<T>> + Send>;

fn fault<E: Into<Fault>>(err: E) -> Fault {
    err.into()
}

/// Leaf job whose result comes from one future.
pub struct ChildTask<T> {
    core: JobCore<T>,
    scope: Option<CancellationToken>,
    launcher: Mutex<Option<Launcher<T>>>,
}

impl<T: Payload> ChildTask<T> {
    /// Wraps a running task that produces a value. The job is `Running` at once.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn from_handle<E>(label: impl Into<Arc<str>>, handle: JoinHandle<Result<T, E>>) -> Self
    where
        E: Into<Fault> + Send + 'static,
    {
        Self::attached(label, None, handle, |value| Some(value))
    }

    /// Wraps a running task without a result value.
    pub fn from_unit_handle<E>(
        label: impl Into<Arc<str>>,
        handle: JoinHandle<Result<(), E>>,
    ) -> Self
    where
        E: Into<Fault> + Send + 'static,
    {
        Self::attached(label, None, handle, |()| None)
    }

    /// Spawns `f` with a fresh cancellation scope and wraps it.
    ///
    /// # Example
    /// ```
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// use jobvisor::{ChildTask, Fault, Job, JobState};
    ///
    /// let task = ChildTask::spawn("answer", |_scope| async { Ok::<_, Fault>(42u32) });
    /// assert_eq!(task.core().wait().await, JobState::Completed);
    /// # }
    /// ```
    pub fn spawn<F, Fut, E>(label: impl Into<Arc<str>>, f: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<Fault> + Send + 'static,
    {
        let scope = CancellationToken::new();
        let handle = tokio::spawn(f(scope.clone()));
        Self::attached(label, Some(scope), handle, |value| Some(value))
    }

    /// Like [`ChildTask::spawn`] for operations without a result value.
    pub fn spawn_unit<F, Fut, E>(label: impl Into<Arc<str>>, f: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<Fault> + Send + 'static,
    {
        let scope = CancellationToken::new();
        let handle = tokio::spawn(f(scope.clone()));
        Self::attached(label, Some(scope), handle, |()| None)
    }

    /// Creates a `NotStarted` job that spawns `f` on [`Job::start`].
    pub fn deferred<F, Fut, E>(label: impl Into<Arc<str>>, f: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<Fault> + Send + 'static,
    {
        Self::pending(
            label,
            Box::new(move |scope| -> BoxFuture<'static, Outcome<T>> {
                Box::pin(async move { f(scope).await.map(Some).map_err(fault) })
            }),
        )
    }

    /// Like [`ChildTask::deferred`] for operations without a result value.
    pub fn deferred_unit<F, Fut, E>(label: impl Into<Arc<str>>, f: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<Fault> + Send + 'static,
    {
        Self::pending(
            label,
            Box::new(move |scope| -> BoxFuture<'static, Outcome<T>> {
                Box::pin(async move { f(scope).await.map(|()| None).map_err(fault) })
            }),
        )
    }

    /// Wraps a running task that already reports its outcome shape.
    pub(crate) fn from_outcome_handle(
        label: impl Into<Arc<str>>,
        handle: JoinHandle<Outcome<T>>,
    ) -> Self {
        Self::attached(label, None, handle, |value| value)
    }

    /// Supplies the cancellation scope that `stop()` cancels.
    ///
    /// For deferred tasks the same token is handed to the factory.
    pub fn with_scope(mut self, scope: CancellationToken) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Attaches a location label.
    pub fn with_location(mut self, location: impl Into<Arc<str>>) -> Self {
        self.core = self.core.with_location(location);
        self
    }

    /// Wraps the task into a shared job handle.
    pub fn into_ref(self) -> Arc<dyn Job<T>> {
        Arc::new(self)
    }

    fn attached<R, E>(
        label: impl Into<Arc<str>>,
        scope: Option<CancellationToken>,
        handle: JoinHandle<Result<R, E>>,
        value: fn(R) -> Option<T>,
    ) -> Self
    where
        R: Send + 'static,
        E: Into<Fault> + Send + 'static,
    {
        let core = JobCore::new(label);
        core.mark_running();
        let watched = core.clone();
        tokio::spawn(async move {
            let outcome = handle.await.map(|res| res.map(value).map_err(fault));
            settle(&watched, outcome);
        });
        Self {
            core,
            scope,
            launcher: Mutex::new(None),
        }
    }

    fn pending(label: impl Into<Arc<str>>, launcher: Launcher<T>) -> Self {
        Self {
            core: JobCore::new(label),
            scope: Some(CancellationToken::new()),
            launcher: Mutex::new(Some(launcher)),
        }
    }

    fn take_launcher(&self) -> Option<Launcher<T>> {
        self.launcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// Applies the operation's outcome to the job.
fn settle<T: Payload>(core: &JobCore<T>, outcome: Result<Outcome<T>, JoinError>) {
    match outcome {
        Ok(Ok(value)) => {
            core.complete_with(value);
        }
        Ok(Err(fault)) if fault.is_cancellation() => stop_now(core),
        Ok(Err(fault)) => {
            core.fail(fault.into_job_error());
        }
        Err(err) if err.is_cancelled() => stop_now(core),
        Err(err) => match err.try_into_panic() {
            Ok(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::warn!(job = %core.id(), command = core.command(), %message, "task panicked");
                core.fail(JobError::Panicked {
                    message: message.into(),
                });
            }
            Err(err) => {
                core.fail(JobError::failed(err));
            }
        },
    }
}

fn stop_now<T: Payload>(core: &JobCore<T>) {
    if core.begin_stop() {
        core.finish_stop();
    }
}

impl<T: Payload> Job<T> for ChildTask<T> {
    fn core(&self) -> &JobCore<T> {
        &self.core
    }

    fn start(&self) {
        let Some(launch) = self.take_launcher() else {
            return;
        };
        if !self.core.mark_running() {
            return;
        }
        let scope = self.scope.clone().unwrap_or_default();
        let handle = tokio::spawn(launch(scope));
        let watched = self.core.clone();
        tokio::spawn(async move {
            settle(&watched, handle.await);
        });
    }

    fn stop(&self) {
        drop(self.take_launcher());
        if !self.core.begin_stop() {
            return;
        }
        if let Some(scope) = &self.scope {
            scope.cancel();
        }
        self.core.finish_stop();
    }

    fn skip(&self, error: JobError) {
        drop(self.take_launcher());
        self.core.fail(error);
        if let Some(scope) = &self.scope {
            scope.cancel();
        }
    }

    fn dispose(&self) {
        drop(self.take_launcher());
        if let Some(scope) = &self.scope {
            scope.cancel();
        }
        self.core.dispose();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::channels::ChannelValue;
    use crate::jobs::JobState;
    use crate::subscribers::Terminal;

    #[derive(Debug, thiserror::Error)]
    #[error("io broke")]
    struct IoBroke;

    fn payloads(task: &ChildTask<u32>) -> Vec<u32> {
        task.core()
            .snapshot()
            .into_iter()
            .filter_map(|r| match r.value {
                ChannelValue::Payload(v) => Some(v),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn value_result_appends_payload_then_completes() {
        let handle = tokio::spawn(async { Ok::<_, IoBroke>(7u32) });
        let task = ChildTask::from_handle("seven", handle);
        assert_eq!(task.core().wait().await, JobState::Completed);
        assert_eq!(payloads(&task), vec![7]);
    }

    #[tokio::test]
    async fn unit_result_completes_without_payload() {
        let handle = tokio::spawn(async { Ok::<_, IoBroke>(()) });
        let task: ChildTask<u32> = ChildTask::from_unit_handle("void", handle);
        assert_eq!(task.core().wait().await, JobState::Completed);
        assert!(task.core().snapshot().is_empty());
    }

    #[tokio::test]
    async fn error_result_fails_with_its_message() {
        let handle = tokio::spawn(async { Err::<u32, _>(IoBroke) });
        let task = ChildTask::from_handle("broken", handle);
        assert_eq!(task.core().wait().await, JobState::Failed);
        assert_eq!(task.core().terminal_error(), Some(JobError::failed("io broke")));
    }

    #[tokio::test]
    async fn single_cause_aggregate_is_promoted() {
        let task: ChildTask<u32> = ChildTask::spawn("one", |_| async {
            Err(Fault::aggregate([Fault::message("only cause")]))
        });
        task.core().wait().await;
        assert_eq!(task.core().terminal_error(), Some(JobError::failed("only cause")));
    }

    #[tokio::test]
    async fn multi_cause_aggregate_keeps_every_message() {
        let task: ChildTask<u32> = ChildTask::spawn("many", |_| async {
            Err(Fault::aggregate([Fault::message("a"), Fault::message("b")]))
        });
        task.core().wait().await;
        let err = task.core().terminal_error().unwrap();
        assert_eq!(err.as_label(), "job_aggregate_failed");
        assert_eq!(err.to_string(), "a; b");
    }

    #[tokio::test]
    async fn cancellation_fault_means_stopped() {
        let task: ChildTask<u32> =
            ChildTask::spawn("cancelled", |_| async { Err(Fault::from(JobError::Stopped)) });
        assert_eq!(task.core().wait().await, JobState::Stopped);
        assert_eq!(task.core().terminal_error(), None);
    }

    #[tokio::test]
    async fn panic_is_reported_as_failure() {
        let task: ChildTask<u32> = ChildTask::spawn("panics", |_| async {
            if true {
                panic!("kaboom");
            }
            Ok::<_, Fault>(1)
        });
        assert_eq!(task.core().wait().await, JobState::Failed);
        assert_eq!(
            task.core().terminal_error(),
            Some(JobError::Panicked {
                message: "kaboom".into()
            })
        );
    }

    #[tokio::test]
    async fn aborted_handle_means_stopped() {
        let handle = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<u32, IoBroke>(1)
        });
        handle.abort();
        let task = ChildTask::from_handle("aborted", handle);
        assert_eq!(task.core().wait().await, JobState::Stopped);
    }

    #[tokio::test]
    async fn stop_cancels_the_scope() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let task: ChildTask<u32> = ChildTask::spawn("long", |scope| async move {
            scope.cancelled().await;
            let _ = tx.send(());
            Ok::<_, Fault>(1)
        });
        task.stop();
        assert_eq!(task.state(), JobState::Stopped);
        rx.await.unwrap();
        task.stop();
        assert_eq!(task.state(), JobState::Stopped);
        assert!(payloads(&task).is_empty());
    }

    #[tokio::test]
    async fn deferred_waits_for_start() {
        let task: ChildTask<u32> = ChildTask::deferred("later", |_| async { Ok::<_, Fault>(3) });
        tokio::task::yield_now().await;
        assert_eq!(task.state(), JobState::NotStarted);
        task.start();
        assert_eq!(task.core().wait().await, JobState::Completed);
        assert_eq!(payloads(&task), vec![3]);
    }

    #[tokio::test]
    async fn stop_before_start_never_launches() {
        let task: ChildTask<u32> = ChildTask::deferred("never", |_| async {
            if true {
                panic!("must not run");
            }
            Ok::<_, Fault>(0)
        });
        task.stop();
        task.start();
        assert_eq!(task.state(), JobState::Stopped);
    }

    #[tokio::test]
    async fn skip_fails_and_cancels_the_scope() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let task: ChildTask<u32> = ChildTask::spawn("queued", |scope| async move {
            scope.cancelled().await;
            let _ = tx.send(());
            Ok::<_, Fault>(1)
        });
        let skipped = JobError::Skipped {
            dependency: "parent".into(),
        };
        task.skip(skipped.clone());
        assert_eq!(task.state(), JobState::Failed);
        assert_eq!(task.core().terminal_error(), Some(skipped));
        tokio::time::timeout(Duration::from_secs(5), rx)
            .await
            .expect("scope was not cancelled")
            .unwrap();
        assert!(payloads(&task).is_empty());
    }

    #[tokio::test]
    async fn skipped_deferred_task_never_launches() {
        let task: ChildTask<u32> = ChildTask::deferred("never", |_| async {
            if true {
                panic!("must not run");
            }
            Ok::<_, Fault>(0)
        });
        task.skip(JobError::failed("dependency broke"));
        task.start();
        assert_eq!(task.state(), JobState::Failed);
    }

    #[tokio::test]
    async fn dispose_reports_disposed_to_live_subscribers() {
        let task: ChildTask<u32> = ChildTask::spawn("pending", |scope| async move {
            scope.cancelled().await;
            Ok::<_, Fault>(0)
        });
        let mut notes = task.core().notifications();
        task.dispose();
        assert_eq!(
            notes.terminal().await,
            Some(Terminal::Failed(JobError::Disposed))
        );
    }
}
