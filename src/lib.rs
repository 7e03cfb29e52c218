//! # jobvisor
//!
//! **Jobvisor** represents long-running asynchronous operations as supervisable
//! jobs with a replayable, strictly ordered, multi-channel output log.
//!
//! It wraps existing async primitives (a running future, a lazily started
//! stream) into one [`Job`] abstraction, groups jobs under a [`JobController`]
//! with an [`ExecutionMode`], and lets any number of live or late subscribers
//! observe a job's output without gaps or duplicates.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!  ┌──────────────────┐  ┌──────────────────┐  ┌──────────────────┐
//!  │    ChildTask     │  │ ObserverChildTask│  │  JobController   │
//!  │ (future, pull)   │  │ (stream, push)   │  │ (child jobs)     │
//!  └────────┬─────────┘  └────────┬─────────┘  └────────┬─────────┘
//!           │ continuation task   │ driver task         │ supervisor task
//!           ▼                     ▼                     ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  JobCore (one per job, one mutex)                                 │
//! │  - JobState machine (terminal states are final)                   │
//! │  - ChannelBuffer (Payload, Error, Warning, Verbose, Debug,        │
//! │    Progress, Information; one sequence per job)                   │
//! │  - SubscriberSet (live subscribers)                               │
//! │  - designated terminal error, disposed flag, host read cursor     │
//! └───────┬───────────────────────┬──────────────────────┬────────────┘
//!         ▼                       ▼                      ▼
//!   Subscribe (rich)       Observe (narrow)        Notifications
//!   every channel +        payloads, then          async channel
//!   completed/stopped/     completed or error      (await next /
//!   failed                                          terminal)
//! ```
//!
//! ### Subscription
//! ```text
//! subscribe(sub) under the job lock:
//!   ├─► replay every buffered record in sequence order
//!   ├─► job terminal? ─► exactly one terminal notification, no registration
//!   ├─► job disposed? ─► Failed(Disposed), no replay
//!   └─► otherwise register ─► live records ─► one terminal notification
//! ```
//!
//! ### Controller
//! ```text
//! add_child ─► queued ─► (mode allows?) ─► executing ─► completed | failed | stopped
//!
//! Concurrent             start everything (optionally capped)
//! Consecutive            one at a time, in order
//! ConsecutiveUntilError  one at a time; first failure skips the rest, parent Failed
//!
//! sealed && nothing queued or executing ─► Stopped | Failed | Completed
//! ```
//!
//! ## Features
//! | Area              | Description                                                 | Key types / traits                              |
//! |-------------------|-------------------------------------------------------------|-------------------------------------------------|
//! | **Jobs**          | Lifecycle, state machine, output writers, host polling.     | [`Job`], [`JobCore`], [`JobState`]              |
//! | **Leaf jobs**     | Wrap a running future or a lazy stream.                     | [`ChildTask`], [`ObserverChildTask`], [`ChildTaskSource`] |
//! | **Controllers**   | Run child jobs under an execution mode.                     | [`JobController`], [`ExecutionMode`]            |
//! | **Output**        | Tagged, ordered records with structured diagnostics.        | [`ChannelRecord`], [`ChannelValue`], [`ChannelBuffer`] |
//! | **Subscribers**   | Rich and narrow observation, async notifications.           | [`Subscribe`], [`Observe`], [`Notifications`]   |
//! | **Errors**        | Typed job errors and wrapped-operation faults.              | [`JobError`], [`Fault`], [`ControllerError`]    |
//! | **Configuration** | Controller settings and builder.                            | [`ControllerConfig`], [`ControllerBuilder`]     |
//!
//! ## Optional features
//! - `logging`: exports [`LogWriter`], a subscriber that emits `tracing` events.
//!
//! ## Example
//! ```rust
//! use futures::stream;
//! use jobvisor::{
//!     ChildTask, ExecutionMode, Fault, Job, JobController, JobState, ObserverChildTask,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let ctl = JobController::new("sync", ExecutionMode::Concurrent);
//!
//!     let fetch = ChildTask::spawn("fetch", |_scope| async { Ok::<_, Fault>(1u32) });
//!     let feed = ObserverChildTask::new("feed", stream::iter([Ok::<_, Fault>(2u32), Ok(3)]));
//!     ctl.add_child(fetch.into_ref()).unwrap();
//!     ctl.add_child(feed.into_ref()).unwrap();
//!     ctl.seal();
//!
//!     assert_eq!(ctl.core().wait().await, JobState::Completed);
//!
//!     // A late subscriber still sees every forwarded record.
//!     let (records, terminal) = ctl.core().notifications().collect().await;
//!     assert_eq!(records.len(), 3);
//!     assert!(terminal.is_some());
//! }
//! ```
mod channels;
mod controller;
mod error;
mod jobs;
mod subscribers;

// ---- Public re-exports ----

pub use channels::{
    ChannelBuffer, ChannelKind, ChannelRecord, ChannelValue, InformationRecord, Payload,
    ProgressRecord,
};
pub use controller::{
    ChildCounts, ControllerBuilder, ControllerConfig, ControllerError, ExecutionMode,
    JobController,
};
pub use error::{Fault, JobError};
pub use jobs::{
    ChildTask, ChildTaskSource, Job, JobCore, JobId, JobRef, JobState, ObserverChildTask,
};
pub use subscribers::{Narrow, Notification, Notifications, Observe, Subscribe, Subscription, Terminal};

// Optional: expose a tracing-backed record writer.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
