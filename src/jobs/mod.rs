//! # Jobs: state machine, leaf job kinds, and the shared job surface.
//!
//! ## Contents
//! - [`JobState`] lifecycle states and the transition table
//! - [`JobCore`] per-job state, output log, and subscribers behind one lock
//! - [`Job`] control surface shared by every job kind
//! - [`ChildTask`] pull variant (future handle)
//! - [`ObserverChildTask`] push variant (stream)
//! - [`ChildTaskSource`] picks the variant for an operation
//!
//! ## Example
//! ```
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! use jobvisor::{ChildTask, Fault, Job, JobState};
//!
//! let job = ChildTask::spawn("fetch", |_scope| async { Ok::<_, Fault>("body".to_string()) });
//! let mut notes = job.core().notifications();
//! assert_eq!(job.core().wait().await, JobState::Completed);
//! assert!(notes.terminal().await.is_some());
//! # }
//! ```

mod child_task;
mod core;
mod job;
mod observer_task;
mod source;
mod state;

pub use child_task::ChildTask;
pub use self::core::{JobCore, JobId};
pub use job::{Job, JobRef};
pub use observer_task::ObserverChildTask;
pub use source::ChildTaskSource;
pub use state::JobState;
