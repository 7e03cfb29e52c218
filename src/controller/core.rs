//! # JobController: a job made of child jobs.
//!
//! The controller owns an ordered list of children and runs them according to
//! its [`ExecutionMode`]. Its own [`JobCore`] carries the aggregated output and
//! the aggregated state.
//!
//! ## Architecture
//! ```text
//! add_child(job) ──► Books (queued += 1) ──► Command::Added ──┐
//! seal() / stop() / suspend() / resume() ──► Command::* ──────┤
//!                                                             ▼
//! child ──► ChildWatcher (subscriber) ──► Output / Finished ──► mailbox (mpsc, unbounded)
//!                                                             │
//!                                                             ▼
//!                                                  supervisor task (one per controller)
//!                                                    ├─► forward child records to own log
//!                                                    ├─► update ChildCounts
//!                                                    ├─► start / skip / stop children
//!                                                    └─► Running | AwaitingMoreWork | terminal
//! ```
//!
//! ## Rules
//! - Only the supervisor task transitions the controller's core, so policy
//!   decisions and state changes never race.
//! - The supervisor never holds the bookkeeping lock while calling into a child
//!   or into the controller core; watchers only post to the mailbox.
//! - Counters change only after the child's terminal transition was recorded.
//! - The controller becomes terminal only once sealed and every child is terminal.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::channels::{ChannelRecord, ChannelValue, Payload};
use crate::error::JobError;
use crate::jobs::{ChildTaskSource, Job, JobCore, JobId, JobState};
use crate::subscribers::{Subscribe, Subscription, Terminal};

use super::{
    builder::ControllerBuilder, config::ControllerConfig, counts::ChildCounts,
    error::ControllerError, mode::ExecutionMode,
};

/// Messages processed by the supervisor task.
enum Command<T> {
    Start,
    Added(JobId),
    Sealed,
    Stop,
    Suspend,
    Resume,
    Skip(JobError),
    Output { child: JobId, value: ChannelValue<T> },
    Finished { child: JobId, terminal: Terminal },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Queued,
    Executing,
    Done,
}

struct ChildEntry<T: Payload> {
    id: JobId,
    job: Arc<dyn Job<T>>,
    phase: Phase,
    subscription: Option<Subscription>,
}

/// Controller bookkeeping, behind its own mutex.
struct Books<T: Payload> {
    children: Vec<ChildEntry<T>>,
    pending: VecDeque<JobId>,
    counts: ChildCounts,
    started: bool,
    sealed: bool,
    stopping: bool,
    suspended: bool,
    closed: bool,
}

impl<T: Payload> Books<T> {
    fn entry_mut(&mut self, id: JobId) -> Option<&mut ChildEntry<T>> {
        self.children.iter_mut().find(|c| c.id == id)
    }

    fn jobs_in(&self, pred: impl Fn(Phase) -> bool) -> Vec<Arc<dyn Job<T>>> {
        self.children
            .iter()
            .filter(|c| pred(c.phase))
            .map(|c| Arc::clone(&c.job))
            .collect()
    }

    /// Removes every pending child; the caller fails them.
    fn drain_pending(&mut self) -> Vec<Arc<dyn Job<T>>> {
        let ids: Vec<JobId> = self.pending.drain(..).collect();
        ids.into_iter()
            .filter_map(|id| self.entry_mut(id).map(|c| Arc::clone(&c.job)))
            .collect()
    }
}

/// Outcome of one policy evaluation.
enum Step {
    Busy,
    Idle,
    Finish(JobState),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Finished,
}

struct Shared<T: Payload> {
    core: JobCore<T>,
    label: Arc<str>,
    config: ControllerConfig,
    books: Mutex<Books<T>>,
    tx: mpsc::UnboundedSender<Command<T>>,
    mailbox: Mutex<mpsc::UnboundedReceiver<Command<T>>>,
    cancel: CancellationToken,
}

/// # Job that runs child jobs under an execution mode.
///
/// Children are added with [`add_child`](JobController::add_child) until the
/// controller is [sealed](JobController::seal). The controller is `Running`
/// while children are queued or executing, `AwaitingMoreWork` while idle and
/// unsealed, and terminal once sealed with every child terminal:
///
/// - stopped → `Stopped`
/// - `ConsecutiveUntilError` with a failed child → `Failed` (the first child
///   error is the designated error)
/// - otherwise → `Completed`, even if children failed in the other modes
///
/// Must be created inside a Tokio runtime.
///
/// # Example
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use jobvisor::{ChildTask, ExecutionMode, Fault, Job, JobController, JobState};
///
/// let ctl = JobController::new("deploy", ExecutionMode::ConsecutiveUntilError);
/// let build = ChildTask::deferred("build", |_| async { Ok::<_, Fault>(1u32) });
/// let ship = ChildTask::deferred("ship", |_| async { Ok::<_, Fault>(2u32) });
/// ctl.add_child(build.into_ref()).unwrap();
/// ctl.add_child(ship.into_ref()).unwrap();
/// ctl.seal();
///
/// assert_eq!(ctl.core().wait().await, JobState::Completed);
/// assert_eq!(ctl.counts().completed, 2);
/// # }
/// ```
pub struct JobController<T: Payload> {
    inner: Arc<Shared<T>>,
}

impl<T: Payload> JobController<T> {
    /// Creates a controller with the given mode and default settings.
    pub fn new(label: impl Into<Arc<str>>, mode: ExecutionMode) -> Self {
        Self::with_config(label, ControllerConfig::with_mode(mode))
    }

    /// Creates a controller with an explicit configuration.
    pub fn with_config(label: impl Into<Arc<str>>, config: ControllerConfig) -> Self {
        Self::create(label.into(), None, config)
    }

    /// Returns a builder for a controller.
    pub fn builder(label: impl Into<Arc<str>>) -> ControllerBuilder<T> {
        ControllerBuilder::new(label)
    }

    pub(super) fn create(
        label: Arc<str>,
        location: Option<Arc<str>>,
        config: ControllerConfig,
    ) -> Self {
        let mut core = JobCore::with_capacity(Arc::clone(&label), config.buffer_capacity);
        if let Some(location) = location {
            core = core.with_location(location);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Shared {
            core,
            label,
            config,
            books: Mutex::new(Books {
                children: Vec::new(),
                pending: VecDeque::new(),
                counts: ChildCounts::default(),
                started: false,
                sealed: false,
                stopping: false,
                suspended: false,
                closed: false,
            }),
            tx,
            mailbox: Mutex::new(rx),
            cancel: CancellationToken::new(),
        });
        tokio::spawn(supervise(Arc::clone(&inner)));
        Self { inner }
    }

    /// Adds a child. The controller starts running if it was not yet.
    ///
    /// A child that is already terminal is counted at once.
    pub fn add_child(&self, child: Arc<dyn Job<T>>) -> Result<(), ControllerError> {
        let id = child.id();
        {
            let mut books = self.inner.books();
            if books.closed {
                return Err(ControllerError::Closed);
            }
            if books.sealed {
                return Err(ControllerError::Sealed);
            }
            if books.entry_mut(id).is_some() {
                return Err(ControllerError::Duplicate);
            }
            books.children.push(ChildEntry {
                id,
                job: Arc::clone(&child),
                phase: Phase::Queued,
                subscription: None,
            });
            books.pending.push_back(id);
            books.counts.queued += 1;
        }
        self.inner.post(Command::Added(id));

        let watcher = ChildWatcher {
            child: id,
            tx: self.inner.tx.clone(),
            forward: self.inner.config.forward_child_output,
        };
        let subscription = child.subscribe(Arc::new(watcher));
        let leftover = {
            let mut books = self.inner.books();
            match books.entry_mut(id) {
                Some(entry) if entry.phase != Phase::Done => {
                    entry.subscription = Some(subscription);
                    None
                }
                _ => Some(subscription),
            }
        };
        drop(leftover);
        Ok(())
    }

    /// Wraps `source` into a child job and adds it.
    pub fn add_source(
        &self,
        label: impl Into<Arc<str>>,
        source: ChildTaskSource<T>,
    ) -> Result<(), ControllerError> {
        self.add_child(source.into_job(label))
    }

    /// Declares that no more children will be added.
    pub fn seal(&self) {
        {
            let mut books = self.inner.books();
            if books.sealed {
                return;
            }
            books.sealed = true;
        }
        self.inner.post(Command::Sealed);
    }

    pub fn is_sealed(&self) -> bool {
        self.inner.books().sealed
    }

    pub fn mode(&self) -> ExecutionMode {
        self.inner.config.mode
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    /// Snapshot of the child counters.
    pub fn counts(&self) -> ChildCounts {
        self.inner.books().counts
    }

    /// Children in the order they were added.
    pub fn children(&self) -> Vec<Arc<dyn Job<T>>> {
        self.inner.books().jobs_in(|_| true)
    }
}

impl<T: Payload> Job<T> for JobController<T> {
    fn core(&self) -> &JobCore<T> {
        &self.inner.core
    }

    fn start(&self) {
        self.inner.post(Command::Start);
    }

    /// Seals the controller and stops every child; queued children end
    /// `Stopped` without running.
    fn stop(&self) {
        {
            let mut books = self.inner.books();
            if books.closed || books.stopping {
                return;
            }
            books.stopping = true;
            books.sealed = true;
        }
        self.inner.post(Command::Stop);
    }

    /// Holds back queued children and asks executing ones to suspend.
    ///
    /// Only a `Running` or `AwaitingMoreWork` controller can be suspended.
    fn suspend(&self) -> Result<(), JobError> {
        let state = self.inner.core.state();
        {
            let mut books = self.inner.books();
            let accepted = !books.closed
                && !books.stopping
                && !books.suspended
                && matches!(state, JobState::Running | JobState::AwaitingMoreWork);
            if !accepted {
                return Err(JobError::rejected("suspend", state));
            }
            books.suspended = true;
        }
        self.inner.post(Command::Suspend);
        Ok(())
    }

    fn resume(&self) -> Result<(), JobError> {
        {
            let mut books = self.inner.books();
            if books.closed || !books.suspended {
                drop(books);
                return Err(JobError::rejected("resume", self.inner.core.state()));
            }
            books.suspended = false;
        }
        self.inner.post(Command::Resume);
        Ok(())
    }

    /// Fails the controller with `error` and stops every child it holds.
    fn skip(&self, error: JobError) {
        {
            let mut books = self.inner.books();
            if books.closed || books.stopping {
                return;
            }
            books.sealed = true;
        }
        self.inner.post(Command::Skip(error));
    }

    fn dispose(&self) {
        self.inner.dispose();
    }
}

/// Dropping the last handle disposes an unfinished controller: its children
/// are disposed and live subscribers receive [`JobError::Disposed`]. A
/// finished controller keeps its log for clones of its core.
impl<T: Payload> Drop for JobController<T> {
    fn drop(&mut self) {
        if self.inner.core.state().is_terminal() {
            self.inner.cancel.cancel();
        } else {
            self.inner.dispose();
        }
    }
}

impl<T: Payload> Shared<T> {
    fn books(&self) -> MutexGuard<'_, Books<T>> {
        self.books.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mailbox(&self) -> MutexGuard<'_, mpsc::UnboundedReceiver<Command<T>>> {
        self.mailbox.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispose(&self) {
        self.cancel.cancel();
        let (children, subscriptions) = {
            let mut books = self.books();
            books.closed = true;
            books.sealed = true;
            let subscriptions: Vec<Subscription> = books
                .children
                .iter_mut()
                .filter_map(|c| c.subscription.take())
                .collect();
            (books.jobs_in(|_| true), subscriptions)
        };
        drop(subscriptions);
        self.flush_output();
        for child in children {
            child.dispose();
        }
        if self.core.dispose() {
            tracing::debug!(controller = %self.core.id(), label = &*self.label, "controller disposed");
        }
    }

    /// Appends child records still waiting in the mailbox.
    fn flush_output(&self) {
        let pending: Vec<ChannelValue<T>> = {
            let mut mailbox = self.mailbox();
            std::iter::from_fn(|| mailbox.try_recv().ok())
                .filter_map(|command| match command {
                    Command::Output { value, .. } => Some(value),
                    _ => None,
                })
                .collect()
        };
        for value in pending {
            self.core.write(value);
        }
    }

    fn post(&self, command: Command<T>) {
        // Fails only after the supervisor exited; the controller is then terminal.
        let _ = self.tx.send(command);
    }

    fn handle(&self, command: Command<T>) -> Flow {
        match command {
            Command::Start => {
                self.books().started = true;
            }
            Command::Added(child) => {
                tracing::debug!(controller = %self.core.id(), %child, "child added");
                self.books().started = true;
            }
            Command::Sealed => {
                tracing::debug!(controller = %self.core.id(), "controller sealed");
            }
            Command::Stop => self.on_stop(),
            Command::Suspend => {
                self.on_suspend();
                return Flow::Continue;
            }
            Command::Resume => self.on_resume(),
            Command::Skip(error) => return self.on_skip(error),
            Command::Output { child, value } => {
                if self.core.write(value).is_none() {
                    tracing::trace!(controller = %self.core.id(), %child, "forwarded record dropped");
                }
                return Flow::Continue;
            }
            Command::Finished { child, terminal } => self.on_child_finished(child, terminal),
        }
        self.advance()
    }

    fn on_stop(&self) {
        let children = {
            let mut books = self.books();
            books.started = true;
            books.jobs_in(|phase| phase != Phase::Done)
        };
        self.core.begin_stop();
        tracing::info!(
            controller = %self.core.id(),
            label = &*self.label,
            children = children.len(),
            "stopping controller"
        );
        for child in children {
            child.stop();
        }
    }

    fn on_skip(&self, error: JobError) -> Flow {
        let (children, subscriptions) = {
            let mut books = self.books();
            if books.closed {
                return Flow::Finished;
            }
            if books.stopping {
                return Flow::Continue;
            }
            books.closed = true;
            books.sealed = true;
            books.pending.clear();
            let subscriptions: Vec<Subscription> = books
                .children
                .iter_mut()
                .filter_map(|c| c.subscription.take())
                .collect();
            (books.jobs_in(|phase| phase != Phase::Done), subscriptions)
        };
        drop(subscriptions);
        tracing::info!(
            controller = %self.core.id(),
            label = &*self.label,
            error = %error,
            children = children.len(),
            "controller skipped"
        );
        for child in children {
            child.stop();
        }
        self.core.fail(error);
        Flow::Finished
    }

    fn on_suspend(&self) {
        let executing = {
            let books = self.books();
            if books.closed || books.stopping || !books.suspended {
                return;
            }
            books.jobs_in(|phase| phase == Phase::Executing)
        };
        if !self.core.begin_suspend() {
            return;
        }
        for child in executing {
            if let Err(err) = child.suspend() {
                tracing::debug!(child = %child.id(), error = %err, "child keeps running");
            }
        }
        self.core.finish_suspend();
    }

    fn on_resume(&self) {
        let executing = {
            let books = self.books();
            if books.closed || books.suspended {
                return;
            }
            books.jobs_in(|phase| phase == Phase::Executing)
        };
        if !self.core.resume() {
            return;
        }
        for child in executing {
            if let Err(err) = child.resume() {
                tracing::debug!(child = %child.id(), error = %err, "child not resumed");
            }
        }
    }

    fn on_child_finished(&self, child: JobId, terminal: Terminal) {
        let subscription = {
            let mut books = self.books();
            let Some(phase) = books.entry_mut(child).map(|c| c.phase) else {
                return;
            };
            match phase {
                Phase::Done => return,
                Phase::Queued => {
                    books.pending.retain(|id| *id != child);
                    books.counts.queued -= 1;
                }
                Phase::Executing => books.counts.executing -= 1,
            }
            match &terminal {
                Terminal::Completed => books.counts.completed += 1,
                Terminal::Stopped => books.counts.stopped += 1,
                Terminal::Failed(_) => books.counts.failed += 1,
            }
            books.entry_mut(child).and_then(|entry| {
                entry.phase = Phase::Done;
                entry.subscription.take()
            })
        };
        drop(subscription);

        match &terminal {
            Terminal::Failed(err) => {
                tracing::warn!(
                    controller = %self.core.id(),
                    %child,
                    error = %err,
                    label = err.as_label(),
                    "child failed"
                );
                if !self.config.forward_child_output {
                    self.core.write_error(err.clone());
                }
            }
            _ => tracing::debug!(
                controller = %self.core.id(),
                %child,
                outcome = %terminal.state(),
                "child finished"
            ),
        }
    }

    /// Re-evaluates the policy: skips, starts, and the controller's own state.
    fn advance(&self) -> Flow {
        let limit = self.config.concurrency_limit();
        let (starts, skipped, step) = {
            let mut books = self.books();
            if books.closed {
                return Flow::Finished;
            }
            if !books.started || (books.suspended && !books.stopping) {
                return Flow::Continue;
            }

            let skipped = if !books.stopping
                && self.config.mode == ExecutionMode::ConsecutiveUntilError
                && books.counts.failed > 0
            {
                books.drain_pending()
            } else {
                Vec::new()
            };

            let mut starts = Vec::new();
            while !books.stopping && limit.is_none_or(|n| books.counts.executing < n) {
                let Some(id) = books.pending.pop_front() else {
                    break;
                };
                let Some(entry) = books.entry_mut(id) else {
                    continue;
                };
                entry.phase = Phase::Executing;
                starts.push(Arc::clone(&entry.job));
                books.counts.queued -= 1;
                books.counts.executing += 1;
            }

            let step = if !books.counts.is_idle() {
                Step::Busy
            } else if !books.sealed {
                Step::Idle
            } else {
                books.closed = true;
                Step::Finish(self.outcome(&books))
            };
            (starts, skipped, step)
        };

        for child in skipped {
            tracing::debug!(controller = %self.core.id(), child = %child.id(), "skipping child");
            child.skip(JobError::Skipped {
                dependency: Arc::clone(&self.label),
            });
        }

        match step {
            Step::Busy => {
                self.ensure_running();
                for child in starts {
                    child.start();
                }
                Flow::Continue
            }
            Step::Idle => {
                self.ensure_running();
                self.core.idle();
                Flow::Continue
            }
            Step::Finish(state) => {
                self.finish(state);
                Flow::Finished
            }
        }
    }

    fn outcome(&self, books: &Books<T>) -> JobState {
        if books.stopping {
            JobState::Stopped
        } else if self.config.mode == ExecutionMode::ConsecutiveUntilError && books.counts.failed > 0
        {
            JobState::Failed
        } else {
            JobState::Completed
        }
    }

    fn ensure_running(&self) {
        if matches!(
            self.core.state(),
            JobState::NotStarted | JobState::AwaitingMoreWork
        ) {
            self.core.mark_running();
        }
    }

    fn finish(&self, state: JobState) {
        match state {
            JobState::Stopped => {
                self.core.begin_stop();
                self.core.finish_stop();
            }
            JobState::Failed => {
                self.ensure_running();
                self.core.fail_with_first_error(JobError::failed(format!(
                    "a child of '{}' failed",
                    self.label
                )));
            }
            _ => {
                self.ensure_running();
                self.core.complete();
            }
        }
        let counts = self.books().counts;
        tracing::info!(
            controller = %self.core.id(),
            label = &*self.label,
            outcome = %state,
            completed = counts.completed,
            failed = counts.failed,
            stopped = counts.stopped,
            "controller finished"
        );
    }
}

/// Supervisor loop: one per controller, exits on terminal state or disposal.
async fn supervise<T: Payload>(shared: Arc<Shared<T>>) {
    tracing::debug!(
        controller = %shared.core.id(),
        label = &*shared.label,
        mode = shared.config.mode.as_label(),
        "supervisor started"
    );
    loop {
        tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => break,
            command = std::future::poll_fn(|cx| shared.mailbox().poll_recv(cx)) => {
                let Some(command) = command else { break };
                if shared.handle(command) == Flow::Finished {
                    break;
                }
            }
        }
    }
    tracing::debug!(controller = %shared.core.id(), "supervisor exited");
}

/// Subscriber attached to every child; posts to the controller's mailbox.
struct ChildWatcher<T> {
    child: JobId,
    tx: mpsc::UnboundedSender<Command<T>>,
    forward: bool,
}

impl<T: Payload> Subscribe<T> for ChildWatcher<T> {
    fn on_record(&self, record: &ChannelRecord<T>) {
        if self.forward {
            let _ = self.tx.send(Command::Output {
                child: self.child,
                value: record.value.clone(),
            });
        }
    }

    fn on_terminal(&self, terminal: &Terminal) {
        let _ = self.tx.send(Command::Finished {
            child: self.child,
            terminal: terminal.clone(),
        });
    }

    fn name(&self) -> &'static str {
        "controller-watcher"
    }
}
