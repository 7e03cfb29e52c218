//! # Rich subscriber trait.
//!
//! Provides [`Subscribe`] the full-capability extension point: one callback per
//! channel kind plus distinct completion, cancellation, and failure signals.
//!
//! ## Delivery
//! ```text
//! JobCore::subscribe(sub)
//!   ├─► replay buffered records ──► sub.on_record()  (sequence order)
//!   ├─► job terminal?  ──► sub.on_terminal()  (exactly once) ──► no-op Subscription
//!   └─► otherwise registered ──► live records ──► sub.on_record()
//!                                terminal     ──► sub.on_terminal()
//! ```
//!
//! ## Rules
//! - Callbacks run **synchronously under the job lock**; they must be short and
//!   must not call back into the same job (the lock is not re-entrant).
//! - Records arrive exactly once, in sequence order, with no gap between replay
//!   and live delivery.
//! - At most one terminal notification is ever delivered.
//! - A panicking callback is caught; the subscriber is dropped and the job is
//!   unaffected.

use crate::channels::{ChannelRecord, ChannelValue, InformationRecord, ProgressRecord};
use crate::error::JobError;
use crate::jobs::JobState;

/// Final notification delivered to a subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminal {
    /// The job completed.
    Completed,
    /// The job was stopped (cancellation).
    Stopped,
    /// The job failed with its designated terminal error, or was disposed
    /// ([`JobError::Disposed`]).
    Failed(JobError),
}

impl Terminal {
    /// Maps a terminal [`JobState`] to its notification.
    ///
    /// Returns `None` for non-terminal states. `error` is the job's designated
    /// terminal error and is only used for `Failed`.
    pub fn from_state(state: JobState, error: Option<&JobError>) -> Option<Self> {
        match state {
            JobState::Completed => Some(Terminal::Completed),
            JobState::Stopped => Some(Terminal::Stopped),
            JobState::Failed => Some(Terminal::Failed(
                error
                    .cloned()
                    .unwrap_or_else(|| JobError::failed("job failed")),
            )),
            _ => None,
        }
    }

    /// Returns the job state this notification stands for.
    ///
    /// A disposal notification maps to `Failed`.
    pub fn state(&self) -> JobState {
        match self {
            Terminal::Completed => JobState::Completed,
            Terminal::Stopped => JobState::Stopped,
            Terminal::Failed(_) => JobState::Failed,
        }
    }
}

/// Full-capability job subscriber.
///
/// Implement the per-kind callbacks you care about; everything defaults to a
/// no-op. Override [`on_record`](Subscribe::on_record) or
/// [`on_terminal`](Subscribe::on_terminal) to receive records untranslated.
///
/// # Example
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use jobvisor::{JobError, Subscribe};
///
/// #[derive(Default)]
/// struct Counter {
///     values: AtomicUsize,
/// }
///
/// impl Subscribe<String> for Counter {
///     fn on_payload(&self, _value: &String) {
///         self.values.fetch_add(1, Ordering::Relaxed);
///     }
///
///     fn on_failed(&self, error: &JobError) {
///         eprintln!("job failed: {error}");
///     }
///
///     fn name(&self) -> &'static str { "counter" }
/// }
/// ```
pub trait Subscribe<T>: Send + Sync + 'static {
    /// Receives one record; the default dispatches on its kind.
    fn on_record(&self, record: &ChannelRecord<T>) {
        match &record.value {
            ChannelValue::Payload(value) => self.on_payload(value),
            ChannelValue::Error(error) => self.on_error(error),
            ChannelValue::Warning(message) => self.on_warning(message),
            ChannelValue::Verbose(message) => self.on_verbose(message),
            ChannelValue::Debug(message) => self.on_debug(message),
            ChannelValue::Progress(progress) => self.on_progress(progress),
            ChannelValue::Information(info) => self.on_information(info),
        }
    }

    /// Output value.
    fn on_payload(&self, _value: &T) {}

    /// Error record. Non-terminal unless followed by [`on_failed`](Subscribe::on_failed).
    fn on_error(&self, _error: &JobError) {}

    fn on_warning(&self, _message: &str) {}

    fn on_verbose(&self, _message: &str) {}

    fn on_debug(&self, _message: &str) {}

    fn on_progress(&self, _progress: &ProgressRecord) {}

    fn on_information(&self, _info: &InformationRecord) {}

    /// Receives the final notification; the default dispatches on its shape.
    fn on_terminal(&self, terminal: &Terminal) {
        match terminal {
            Terminal::Completed => self.on_completed(),
            Terminal::Stopped => self.on_stopped(),
            Terminal::Failed(error) => self.on_failed(error),
        }
    }

    /// The job completed.
    fn on_completed(&self) {}

    /// The job was stopped.
    fn on_stopped(&self) {}

    /// The job failed (or was disposed while subscribed).
    fn on_failed(&self, _error: &JobError) {}

    /// Returns the subscriber name used in logs.
    ///
    /// The default uses `type_name::<Self>()`, which can be verbose - override it when possible.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_maps_only_terminal_states() {
        assert_eq!(Terminal::from_state(JobState::Running, None), None);
        assert_eq!(
            Terminal::from_state(JobState::Completed, None),
            Some(Terminal::Completed)
        );
        assert_eq!(
            Terminal::from_state(JobState::Stopped, None),
            Some(Terminal::Stopped)
        );
        let err = JobError::failed("boom");
        assert_eq!(
            Terminal::from_state(JobState::Failed, Some(&err)),
            Some(Terminal::Failed(err))
        );
    }

    #[test]
    fn failed_without_designated_error_still_carries_one() {
        let terminal = Terminal::from_state(JobState::Failed, None);
        assert!(matches!(terminal, Some(Terminal::Failed(JobError::Failed { .. }))));
    }
}
