//! Error types used by jobs, their subscribers, and the wrapped sources.
//!
//! This module defines:
//!
//! - [`JobError`]: every failure a job can report, terminal or not.
//! - [`Fault`]: the failure handed to the engine by a wrapped operation
//!   (a future result or a stream item) before it is turned into a [`JobError`].
//!
//! [`JobError`] provides [`as_label`](JobError::as_label) for logs/metrics,
//! mirroring the runtime's other error enums.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::jobs::JobState;

/// # Errors reported by jobs.
///
/// Values of this type travel through channel buffers (as `Error` records) and
/// to subscribers (as terminal failures), so they are cheap to clone.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    /// The wrapped operation failed.
    #[error("{message}")]
    Failed {
        /// Human-readable failure message.
        message: Arc<str>,
    },

    /// The job was stopped before it could finish (cancellation-shaped).
    #[error("job was stopped")]
    Stopped,

    /// The job was disposed while the subscriber was still attached.
    #[error("job was disposed")]
    Disposed,

    /// The job never ran because an earlier job of the same controller failed.
    #[error("skipped because a dependency failed: {dependency}")]
    Skipped {
        /// Label of the controller whose policy skipped this job.
        dependency: Arc<str>,
    },

    /// Several independent causes failed together.
    #[error("{}", join_messages(causes))]
    Aggregate {
        /// Every cause, in the order they were reported.
        causes: Vec<JobError>,
    },

    /// The wrapped operation panicked.
    #[error("task panicked: {message}")]
    Panicked {
        /// Panic payload rendered as text.
        message: Arc<str>,
    },

    /// The job's current state does not allow the requested operation.
    #[error("cannot {operation} a job that is {state}")]
    Rejected {
        /// Name of the rejected operation.
        operation: &'static str,
        /// State the job was in.
        state: JobState,
    },

    /// The job kind does not support the requested operation.
    #[error("operation not supported: {operation}")]
    Unsupported {
        /// Name of the rejected operation.
        operation: &'static str,
    },
}

fn join_messages(causes: &[JobError]) -> String {
    causes
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl JobError {
    /// Builds a [`JobError::Failed`] from any displayable message.
    pub fn failed(message: impl fmt::Display) -> Self {
        JobError::Failed {
            message: message.to_string().into(),
        }
    }

    pub(crate) fn rejected(operation: &'static str, state: JobState) -> Self {
        JobError::Rejected { operation, state }
    }

    /// Collapses a list of causes into one error.
    ///
    /// Nested aggregates are flattened first. Exactly one cause is promoted and
    /// returned as is; more than one stays an [`JobError::Aggregate`]. An empty
    /// list yields a generic failure so that no caller ends up without an error.
    ///
    /// # Example
    /// ```
    /// use jobvisor::JobError;
    ///
    /// let single = JobError::from_causes(vec![JobError::failed("disk full")]);
    /// assert_eq!(single, JobError::failed("disk full"));
    ///
    /// let many = JobError::from_causes(vec![JobError::failed("a"), JobError::failed("b")]);
    /// assert_eq!(many.to_string(), "a; b");
    /// ```
    pub fn from_causes(causes: Vec<JobError>) -> Self {
        let mut flat = Vec::with_capacity(causes.len());
        for cause in causes {
            match cause {
                JobError::Aggregate { causes } => flat.extend(causes),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => JobError::failed("operation failed without a reported cause"),
            1 => flat.remove(0),
            _ => JobError::Aggregate { causes: flat },
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use jobvisor::JobError;
    ///
    /// assert_eq!(JobError::Stopped.as_label(), "job_stopped");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            JobError::Failed { .. } => "job_failed",
            JobError::Stopped => "job_stopped",
            JobError::Disposed => "job_disposed",
            JobError::Skipped { .. } => "job_skipped",
            JobError::Aggregate { .. } => "job_aggregate_failed",
            JobError::Panicked { .. } => "job_panicked",
            JobError::Rejected { .. } => "job_rejected",
            JobError::Unsupported { .. } => "job_unsupported",
        }
    }

    /// True for the cancellation-shaped error.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, JobError::Stopped)
    }
}

/// # Failure reported by a wrapped operation.
///
/// Any [`std::error::Error`] converts into a `Fault` with `?`, so futures and
/// streams handed to the engine can use their own error types. A fault may carry
/// several causes ([`Fault::aggregate`]); [`Fault::into_job_error`] promotes a
/// single cause and keeps the rest as a composite.
///
/// Like `anyhow::Error`, `Fault` deliberately does not implement
/// `std::error::Error` itself.
#[derive(Debug, Clone)]
pub struct Fault {
    causes: Vec<JobError>,
}

impl Fault {
    /// Builds a fault from a plain message.
    pub fn message(message: impl fmt::Display) -> Self {
        Self {
            causes: vec![JobError::failed(message)],
        }
    }

    /// Builds a fault with several causes.
    pub fn aggregate<I, E>(causes: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Fault>,
    {
        Self {
            causes: causes
                .into_iter()
                .flat_map(|cause| cause.into().causes)
                .collect(),
        }
    }

    /// Returns the individual causes.
    pub fn causes(&self) -> &[JobError] {
        &self.causes
    }

    /// True when the only cause is a cancellation.
    pub fn is_cancellation(&self) -> bool {
        matches!(self.causes.as_slice(), [cause] if cause.is_cancellation())
    }

    /// Turns the fault into the job's terminal error.
    pub fn into_job_error(self) -> JobError {
        JobError::from_causes(self.causes)
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&join_messages(&self.causes))
    }
}

impl<E> From<E> for Fault
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: E) -> Self {
        let dyn_err: &(dyn std::error::Error + 'static) = &err;
        match dyn_err.downcast_ref::<JobError>() {
            Some(job_err) => Self {
                causes: vec![job_err.clone()],
            },
            None => Self::message(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("connection refused")]
    struct Refused;

    #[test]
    fn single_cause_is_promoted() {
        let fault = Fault::from(Refused);
        assert_eq!(fault.into_job_error(), JobError::failed("connection refused"));
    }

    #[test]
    fn several_causes_stay_composite() {
        let fault = Fault::aggregate([Fault::message("a"), Fault::message("b"), Fault::message("c")]);
        let err = fault.into_job_error();
        assert_eq!(err.as_label(), "job_aggregate_failed");
        assert_eq!(err.to_string(), "a; b; c");
    }

    #[test]
    fn nested_aggregates_are_flattened() {
        let inner = JobError::from_causes(vec![JobError::failed("x"), JobError::failed("y")]);
        let outer = JobError::from_causes(vec![inner, JobError::failed("z")]);
        match outer {
            JobError::Aggregate { causes } => assert_eq!(causes.len(), 3),
            other => panic!("expected aggregate, got {other:?}"),
        }
    }

    #[test]
    fn job_error_keeps_its_variant_through_fault() {
        let fault = Fault::from(JobError::Stopped);
        assert!(fault.is_cancellation());
        assert_eq!(fault.into_job_error(), JobError::Stopped);
    }

    #[test]
    fn rejection_names_operation_and_state() {
        let err = JobError::rejected("resume", JobState::Completed);
        assert_eq!(err.as_label(), "job_rejected");
        assert_eq!(err.to_string(), "cannot resume a job that is completed");
    }

    #[test]
    fn empty_aggregate_still_reports_a_failure() {
        let err = Fault::aggregate(Vec::<Fault>::new()).into_job_error();
        assert_eq!(err.as_label(), "job_failed");
    }
}
