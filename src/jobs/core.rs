//! # JobCore: state machine, output log, and subscribers of one job.
//!
//! Every job kind embeds a [`JobCore`]. It owns the only lock of the job; the
//! state, the [`ChannelBuffer`], the live subscribers, and the designated
//! terminal error all live behind it.
//!
//! ## Architecture
//! ```text
//! producer ── write_*() ──┐
//!                         ▼
//!                  ┌─────────────── Mutex<Inner> ───────────────┐
//! transitions ───► │ state ─► ChannelBuffer ─► SubscriberSet     │ ──► Subscribe callbacks
//!                  │ terminal_error, first_error, disposed       │
//!                  └─────────────────────────────────────────────┘
//!                         │
//!                         └─► watch::Sender<JobState> ──► wait().await (ends on dispose too)
//! ```
//!
//! ## Rules
//! - Terminal states are final; later transitions return `false`, later writes `None`.
//! - Entering a terminal state notifies every live subscriber once and drops it.
//! - The designated terminal error is the first `Error` record ever appended.
//! - `dispose()` is idempotent and notifies live subscribers with
//!   [`JobError::Disposed`] exactly once.
//! - Subscriber callbacks run under the lock: never call into the same job (or
//!   drop its [`Subscription`]) from a callback.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use crate::channels::{
    Attach, ChannelBuffer, ChannelRecord, ChannelValue, InformationRecord, Payload, ProgressRecord,
};
use crate::error::JobError;
use crate::subscribers::{
    Forwarder, Narrow, Notifications, Observe, Subscribe, Subscription, Terminal, deliver_terminal,
};

use super::state::JobState;

/// Global counter for job ids.
static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl JobId {
    fn next() -> Self {
        JobId(NEXT_JOB_ID.fetch_add(1, AtomicOrdering::Relaxed))
    }

    /// Returns the raw id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct Inner<T> {
    state: JobState,
    buffer: ChannelBuffer<T>,
    first_error: Option<JobError>,
    terminal_error: Option<JobError>,
    disposed: bool,
    read_cursor: u64,
}

impl<T: 'static> Inner<T> {
    fn accepts_output(&self) -> bool {
        !self.disposed && !self.state.is_terminal()
    }

    fn append(&mut self, value: ChannelValue<T>) -> u64 {
        if let ChannelValue::Error(err) = &value {
            if self.first_error.is_none() {
                self.first_error = Some(err.clone());
            }
        }
        self.buffer.append(value).sequence
    }
}

struct Shared<T> {
    inner: Mutex<Inner<T>>,
    state_tx: watch::Sender<JobState>,
    disposed_tx: watch::Sender<bool>,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// State, output log, and subscribers of one job.
///
/// Cloning a `JobCore` yields another handle to the same job.
pub struct JobCore<T> {
    id: JobId,
    command: Arc<str>,
    location: Option<Arc<str>>,
    shared: Arc<Shared<T>>,
}

impl<T> Clone for JobCore<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            command: Arc::clone(&self.command),
            location: self.location.clone(),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for JobCore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobCore")
            .field("id", &self.id)
            .field("command", &self.command)
            .field("location", &self.location)
            .field("state", &*self.shared.state_tx.borrow())
            .finish()
    }
}

impl<T: Payload> JobCore<T> {
    /// Creates a `NotStarted` job labelled with its command text.
    pub fn new(command: impl Into<Arc<str>>) -> Self {
        Self::with_capacity(command, 0)
    }

    /// Like [`JobCore::new`], reserving room for `capacity` records.
    pub fn with_capacity(command: impl Into<Arc<str>>, capacity: usize) -> Self {
        let (state_tx, _rx) = watch::channel(JobState::NotStarted);
        let (disposed_tx, _rx) = watch::channel(false);
        Self {
            id: JobId::next(),
            command: command.into(),
            location: None,
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: JobState::NotStarted,
                    buffer: ChannelBuffer::with_capacity(capacity),
                    first_error: None,
                    terminal_error: None,
                    disposed: false,
                    read_cursor: 0,
                }),
                state_tx,
                disposed_tx,
            }),
        }
    }

    /// Attaches a location label (where the job runs).
    pub fn with_location(mut self, location: impl Into<Arc<str>>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    /// Command text the job was created for.
    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Current state.
    pub fn state(&self) -> JobState {
        self.shared.lock().state
    }

    /// The designated terminal error, once the job has failed.
    pub fn terminal_error(&self) -> Option<JobError> {
        self.shared.lock().terminal_error.clone()
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.lock().disposed
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.shared.lock().buffer.subscriber_count()
    }

    // ---------------------------
    // Output
    // ---------------------------

    /// Appends a record; returns its sequence, or `None` once the job no longer
    /// accepts output (terminal or disposed).
    pub fn write(&self, value: ChannelValue<T>) -> Option<u64> {
        let mut inner = self.shared.lock();
        if !inner.accepts_output() {
            tracing::trace!(job = %self.id, kind = value.kind().as_label(), "write rejected");
            return None;
        }
        Some(inner.append(value))
    }

    pub fn write_payload(&self, value: T) -> Option<u64> {
        self.write(ChannelValue::Payload(value))
    }

    /// Appends a non-terminal error; the job keeps its state.
    pub fn write_error(&self, error: JobError) -> Option<u64> {
        self.write(ChannelValue::Error(error))
    }

    pub fn write_warning(&self, message: impl Into<Arc<str>>) -> Option<u64> {
        self.write(ChannelValue::Warning(message.into()))
    }

    pub fn write_verbose(&self, message: impl Into<Arc<str>>) -> Option<u64> {
        self.write(ChannelValue::Verbose(message.into()))
    }

    pub fn write_debug(&self, message: impl Into<Arc<str>>) -> Option<u64> {
        self.write(ChannelValue::Debug(message.into()))
    }

    pub fn write_progress(&self, progress: ProgressRecord) -> Option<u64> {
        self.write(ChannelValue::Progress(progress))
    }

    pub fn write_information(&self, info: InformationRecord) -> Option<u64> {
        self.write(ChannelValue::Information(info))
    }

    /// Copy of every buffered record, in sequence order.
    pub fn snapshot(&self) -> Vec<ChannelRecord<T>> {
        self.shared.lock().buffer.snapshot().to_vec()
    }

    /// True if records were appended since the last [`drain`](JobCore::drain).
    pub fn has_more_data(&self) -> bool {
        let inner = self.shared.lock();
        inner.buffer.last_sequence() > inner.read_cursor
    }

    /// Returns the records appended since the previous call.
    ///
    /// The host's read cursor is independent of replay: drained records remain
    /// available to later subscribers.
    pub fn drain(&self) -> Vec<ChannelRecord<T>> {
        let mut inner = self.shared.lock();
        let records = inner.buffer.records_after(inner.read_cursor).to_vec();
        if let Some(last) = records.last() {
            inner.read_cursor = last.sequence;
        }
        records
    }

    // ---------------------------
    // Transitions
    // ---------------------------

    /// Applies `next` if legal. Must be called with the lock held.
    fn transition(&self, inner: &mut Inner<T>, next: JobState) -> bool {
        let prev = inner.state;
        if !prev.can_transition_to(next) {
            tracing::trace!(job = %self.id, from = %prev, to = %next, "transition rejected");
            return false;
        }
        inner.state = next;
        self.shared.state_tx.send_replace(next);
        tracing::debug!(
            job = %self.id,
            command = &*self.command,
            from = %prev,
            to = %next,
            "job state changed"
        );
        if let Some(terminal) = Terminal::from_state(next, inner.terminal_error.as_ref()) {
            inner.buffer.finish(&terminal);
        }
        true
    }

    fn transition_to(&self, next: JobState) -> bool {
        let mut inner = self.shared.lock();
        self.transition(&mut inner, next)
    }

    /// `NotStarted | AwaitingMoreWork | host state → Running`.
    pub fn mark_running(&self) -> bool {
        self.transition_to(JobState::Running)
    }

    /// Controller only: `Running → AwaitingMoreWork`.
    pub fn idle(&self) -> bool {
        self.transition_to(JobState::AwaitingMoreWork)
    }

    /// Enters `Stopping`; returns false if the job is already stopping or terminal.
    pub fn begin_stop(&self) -> bool {
        self.transition_to(JobState::Stopping)
    }

    /// `Stopping → Stopped`.
    pub fn finish_stop(&self) -> bool {
        self.transition_to(JobState::Stopped)
    }

    /// Enters `Completed`.
    pub fn complete(&self) -> bool {
        self.transition_to(JobState::Completed)
    }

    /// Appends `payload` (if any) and enters `Completed`, atomically.
    ///
    /// Nothing is appended if the job can no longer complete.
    pub fn complete_with(&self, payload: Option<T>) -> bool {
        let mut inner = self.shared.lock();
        if !inner.state.can_transition_to(JobState::Completed) {
            return false;
        }
        if let Some(value) = payload {
            if !inner.disposed {
                inner.append(ChannelValue::Payload(value));
            }
        }
        self.transition(&mut inner, JobState::Completed)
    }

    /// Appends `error` and enters `Failed`.
    ///
    /// The designated terminal error is the first error ever appended, which is
    /// `error` unless a non-terminal error was written earlier.
    pub fn fail(&self, error: JobError) -> bool {
        let mut inner = self.shared.lock();
        if !inner.state.can_transition_to(JobState::Failed) {
            return false;
        }
        if inner.disposed {
            inner.first_error.get_or_insert(error);
        } else {
            inner.append(ChannelValue::Error(error));
        }
        inner.terminal_error = inner.first_error.clone();
        self.transition(&mut inner, JobState::Failed)
    }

    /// Enters `Failed` designating the first error already in the log.
    ///
    /// `fallback` is appended only when no error was ever written.
    pub fn fail_with_first_error(&self, fallback: JobError) -> bool {
        let mut inner = self.shared.lock();
        if !inner.state.can_transition_to(JobState::Failed) {
            return false;
        }
        if inner.first_error.is_none() {
            if inner.disposed {
                inner.first_error = Some(fallback);
            } else {
                inner.append(ChannelValue::Error(fallback));
            }
        }
        inner.terminal_error = inner.first_error.clone();
        self.transition(&mut inner, JobState::Failed)
    }

    /// `Running | AwaitingMoreWork → Suspending`.
    pub fn begin_suspend(&self) -> bool {
        self.transition_to(JobState::Suspending)
    }

    /// `Suspending → Suspended`.
    pub fn finish_suspend(&self) -> bool {
        self.transition_to(JobState::Suspended)
    }

    /// `Suspended → Running`.
    pub fn resume(&self) -> bool {
        let mut inner = self.shared.lock();
        if inner.state != JobState::Suspended {
            return false;
        }
        self.transition(&mut inner, JobState::Running)
    }

    /// Enters a host-specific halted state (`Blocked`, `Disconnected`, `AtBreakpoint`).
    pub fn enter_host_state(&self, state: JobState) -> bool {
        if !state.is_host_state() {
            return false;
        }
        self.transition_to(state)
    }

    // ---------------------------
    // Subscribers
    // ---------------------------

    /// Registers a rich subscriber: replay, then terminal or live forwarding.
    pub fn subscribe(&self, sub: Arc<dyn Subscribe<T>>) -> Subscription {
        let mut inner = self.shared.lock();
        if inner.disposed {
            deliver_terminal(sub.as_ref(), &Terminal::Failed(JobError::Disposed));
            return Subscription::noop();
        }
        let terminal = Terminal::from_state(inner.state, inner.terminal_error.as_ref());
        match inner.buffer.attach(sub, terminal.as_ref()) {
            Attach::Registered(id) => {
                let weak = Arc::downgrade(&self.shared);
                Subscription::new(move || {
                    if let Some(shared) = weak.upgrade() {
                        shared.lock().buffer.detach(id);
                    }
                })
            }
            Attach::Finished => Subscription::noop(),
        }
    }

    /// Registers a narrow observer (payloads, then completion or an error).
    pub fn observe(&self, observer: Arc<dyn Observe<T>>) -> Subscription {
        self.subscribe(Arc::new(Narrow::new(observer)))
    }

    /// Subscribes through a channel, for consumers that want to `await`.
    pub fn notifications(&self) -> Notifications<T> {
        let (forwarder, rx) = Forwarder::channel();
        let subscription = self.subscribe(Arc::new(forwarder));
        Notifications::new(rx, subscription)
    }

    /// Receiver tracking the job state.
    pub fn watch_state(&self) -> watch::Receiver<JobState> {
        self.shared.state_tx.subscribe()
    }

    /// Waits until the job is terminal and returns the terminal state.
    ///
    /// A job disposed before it finished never becomes terminal; the wait then
    /// ends with the state the job was left in.
    pub async fn wait(&self) -> JobState {
        let mut state = self.shared.state_tx.subscribe();
        let mut disposed = self.shared.disposed_tx.subscribe();
        tokio::select! {
            reached = state.wait_for(|s| s.is_terminal()) => match reached {
                Ok(state) => *state,
                Err(_) => self.state(),
            },
            _ = disposed.wait_for(|d| *d) => self.state(),
        }
    }

    // ---------------------------
    // Disposal
    // ---------------------------

    /// Notifies live subscribers with [`JobError::Disposed`] and frees the log.
    ///
    /// Returns false if the job was already disposed.
    pub fn dispose(&self) -> bool {
        let mut inner = self.shared.lock();
        if inner.disposed {
            return false;
        }
        inner.disposed = true;
        let pending = inner.buffer.subscriber_count();
        inner.buffer.finish(&Terminal::Failed(JobError::Disposed));
        inner.buffer.clear();
        tracing::debug!(job = %self.id, state = %inner.state, subscribers = pending, "job disposed");
        drop(inner);
        self.shared.disposed_tx.send_replace(true);
        true
    }
}
