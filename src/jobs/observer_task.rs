//! # Push-variant leaf job backed by a stream.
//!
//! [`ObserverChildTask`] wraps a lazily started [`Stream`] of results. Nothing
//! is polled until [`Job::start`]; the stream is then driven by one spawned
//! task:
//!
//! ```text
//! start() ──► driver task
//!               loop (biased select)
//!                 cancel ─────────────► exit (stream dropped)
//!                 paused  ────────────► wait for resume
//!                 next() = Ok(v)  ────► Payload(v), stay Running
//!                 next() = Err(f) ────► Failed(f.into_job_error())
//!                 next() = None   ────► Completed
//! ```
//!
//! `stop()` cancels the driver, which drops the stream (the upstream
//! subscription ends with it). `suspend()` stops polling without dropping it.

use std::sync::{Arc, Mutex, PoisonError};

use futures::stream::{BoxStream, Stream, StreamExt};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::channels::Payload;
use crate::error::{Fault, JobError};

use super::core::JobCore;
use super::job::Job;

type Source<T> = BoxStream<'static, Result<T, Fault>>;

/// Leaf job whose values come from a stream.
pub struct ObserverChildTask<T> {
    core: JobCore<T>,
    source: Mutex<Option<Source<T>>>,
    cancel: CancellationToken,
    paused: Arc<watch::Sender<bool>>,
}

impl<T: Payload> ObserverChildTask<T> {
    /// Wraps `stream` without polling it.
    pub fn new<S, E>(label: impl Into<Arc<str>>, stream: S) -> Self
    where
        S: Stream<Item = Result<T, E>> + Send + 'static,
        E: Into<Fault>,
    {
        let (paused, _rx) = watch::channel(false);
        let paused = Arc::new(paused);
        Self {
            core: JobCore::new(label),
            source: Mutex::new(Some(stream.map(|item| item.map_err(Into::<Fault>::into)).boxed())),
            cancel: CancellationToken::new(),
            paused,
        }
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

    fn take_source(&self) -> Option<Source<T>> {
        self.source
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

async fn drive<T: Payload>(
    core: JobCore<T>,
    mut stream: Source<T>,
    cancel: CancellationToken,
    pause: Arc<watch::Sender<bool>>,
) {
    let mut paused = pause.subscribe();
    loop {
        if *paused.borrow_and_update() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                changed = paused.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    continue;
                }
            }
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            changed = paused.changed() => {
                if changed.is_err() {
                    return;
                }
            }
            item = stream.next() => match item {
                Some(Ok(value)) => {
                    core.write_payload(value);
                }
                Some(Err(fault)) if fault.is_cancellation() => {
                    if core.begin_stop() {
                        core.finish_stop();
                    }
                    return;
                }
                Some(Err(fault)) => {
                    core.fail(fault.into_job_error());
                    return;
                }
                None => {
                    finish(&core, &cancel, &mut paused).await;
                    return;
                }
            }
        }
    }
}

/// Completes the job once the stream has ended.
///
/// A suspend request can race the end of the stream; completion then waits
/// for `resume()` (or gives up on `stop()`).
async fn finish<T: Payload>(
    core: &JobCore<T>,
    cancel: &CancellationToken,
    paused: &mut watch::Receiver<bool>,
) {
    loop {
        if core.complete() || core.state().is_terminal() {
            return;
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            changed = paused.changed() => {
                if changed.is_err() {
                    return;
                }
            }
        }
    }
}

impl<T: Payload> Job<T> for ObserverChildTask<T> {
    fn core(&self) -> &JobCore<T> {
        &self.core
    }

    /// Starts polling. Must be called inside a Tokio runtime.
    fn start(&self) {
        let Some(stream) = self.take_source() else {
            return;
        };
        if !self.core.mark_running() {
            return;
        }
        tokio::spawn(drive(
            self.core.clone(),
            stream,
            self.cancel.clone(),
            Arc::clone(&self.paused),
        ));
    }

    fn stop(&self) {
        drop(self.take_source());
        if !self.core.begin_stop() {
            return;
        }
        self.cancel.cancel();
        self.core.finish_stop();
    }

    fn suspend(&self) -> Result<(), JobError> {
        if !self.core.begin_suspend() {
            return Err(JobError::rejected("suspend", self.core.state()));
        }
        self.paused.send_replace(true);
        self.core.finish_suspend();
        Ok(())
    }

    fn resume(&self) -> Result<(), JobError> {
        if !self.core.resume() {
            return Err(JobError::rejected("resume", self.core.state()));
        }
        self.paused.send_replace(false);
        Ok(())
    }

    fn skip(&self, error: JobError) {
        drop(self.take_source());
        self.core.fail(error);
        self.cancel.cancel();
    }

    fn dispose(&self) {
        drop(self.take_source());
        self.cancel.cancel();
        self.core.dispose();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use futures::channel::mpsc;
    use futures::stream;

    use super::*;
    use crate::channels::ChannelValue;
    use crate::jobs::JobState;

    fn payloads(task: &ObserverChildTask<u32>) -> Vec<u32> {
        task.core()
            .snapshot()
            .into_iter()
            .filter_map(|r| match r.value {
                ChannelValue::Payload(v) => Some(v),
                _ => None,
            })
            .collect()
    }

    async fn until(task: &ObserverChildTask<u32>, pred: impl Fn(&[u32]) -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !pred(&payloads(task)) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn stream_is_not_polled_before_start() {
        let polled = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&polled);
        let values = stream::iter([1u32, 2, 3]).map(move |v| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Fault>(v)
        });
        let task = ObserverChildTask::new("lazy", values);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(polled.load(Ordering::SeqCst), 0);
        assert_eq!(task.state(), JobState::NotStarted);

        task.start();
        task.start();
        assert_eq!(task.core().wait().await, JobState::Completed);
        assert_eq!(polled.load(Ordering::SeqCst), 3);
        assert_eq!(payloads(&task), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn stream_error_fails_the_job() {
        let items = stream::iter([Ok(1u32), Err(Fault::message("upstream gone")), Ok(2)]);
        let task = ObserverChildTask::new("flaky", items);
        task.start();
        assert_eq!(task.core().wait().await, JobState::Failed);
        assert_eq!(payloads(&task), vec![1]);
        assert_eq!(
            task.core().terminal_error(),
            Some(JobError::failed("upstream gone"))
        );
    }

    #[tokio::test]
    async fn stop_drops_the_stream() {
        let (tx, rx) = mpsc::unbounded::<Result<u32, Fault>>();
        let task = ObserverChildTask::new("live", rx);
        task.start();
        tx.unbounded_send(Ok(1)).unwrap();
        until(&task, |p| p == [1]).await;

        task.stop();
        task.stop();
        assert_eq!(task.state(), JobState::Stopped);
        tokio::time::timeout(Duration::from_secs(5), async {
            while !tx.is_closed() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn suspend_pauses_and_resume_continues() {
        let (tx, rx) = mpsc::unbounded::<Result<u32, Fault>>();
        let task = ObserverChildTask::new("pausable", rx);
        task.start();
        tx.unbounded_send(Ok(1)).unwrap();
        until(&task, |p| p == [1]).await;

        task.suspend().unwrap();
        assert_eq!(task.state(), JobState::Suspended);
        tx.unbounded_send(Ok(2)).unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(payloads(&task), vec![1]);

        task.resume().unwrap();
        assert_eq!(task.state(), JobState::Running);
        until(&task, |p| p == [1, 2]).await;

        drop(tx);
        assert_eq!(task.core().wait().await, JobState::Completed);
    }

    #[tokio::test]
    async fn suspend_and_resume_report_rejected_transitions() {
        let (tx, rx) = mpsc::unbounded::<Result<u32, Fault>>();
        let task = ObserverChildTask::new("picky", rx);
        assert!(matches!(
            task.suspend(),
            Err(JobError::Rejected { operation: "suspend", state: JobState::NotStarted })
        ));

        task.start();
        assert!(matches!(
            task.resume(),
            Err(JobError::Rejected { operation: "resume", state: JobState::Running })
        ));
        task.suspend().unwrap();
        assert!(task.suspend().is_err());
        task.resume().unwrap();

        drop(tx);
        assert_eq!(task.core().wait().await, JobState::Completed);
        assert_eq!(
            task.suspend().unwrap_err().as_label(),
            "job_rejected"
        );
    }

    #[tokio::test]
    async fn skip_drops_the_stream_without_polling() {
        let polled = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&polled);
        let values = stream::iter([1u32]).map(move |v| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Fault>(v)
        });
        let task = ObserverChildTask::new("skipped", values);
        task.skip(JobError::failed("dependency broke"));
        task.start();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(task.state(), JobState::Failed);
        assert_eq!(polled.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn skip_cancels_a_running_driver() {
        let (tx, rx) = mpsc::unbounded::<Result<u32, Fault>>();
        let task = ObserverChildTask::new("live", rx);
        task.start();
        task.skip(JobError::failed("dependency broke"));
        assert_eq!(task.state(), JobState::Failed);
        tokio::time::timeout(Duration::from_secs(5), async {
            while !tx.is_closed() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn stop_before_start_is_terminal() {
        let task = ObserverChildTask::new("unused", stream::iter([Ok::<u32, Fault>(1)]));
        task.stop();
        task.start();
        assert_eq!(task.state(), JobState::Stopped);
        assert!(payloads(&task).is_empty());
    }
}
