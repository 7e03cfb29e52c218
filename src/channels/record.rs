//! # Channel records: the tagged output of a job.
//!
//! Every piece of output a job produces is a [`ChannelRecord`]: a
//! [`ChannelValue`] stamped with a per-job sequence number and a wall-clock time.
//!
//! ## Channels
//! ```text
//! Payload      user-visible results            (affects control flow)
//! Error        non-terminal or terminal errors (affects control flow)
//! Warning      ┐
//! Verbose      │
//! Debug        ├ diagnostic streams, rendered by the host
//! Progress     │
//! Information  ┘
//! ```
//!
//! ## Ordering
//! Sequences are not partitioned per channel: all seven kinds share one
//! timeline per job, so `sequence` alone restores the emission order.

use std::sync::Arc;
use std::time::SystemTime;

use crate::error::JobError;

/// Bound shared by every payload type flowing through a job.
///
/// Implemented automatically for any `Clone + Send + Sync + 'static` type.
pub trait Payload: Clone + Send + Sync + 'static {}

impl<T> Payload for T where T: Clone + Send + Sync + 'static {}

/// Closed set of output channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// Output values.
    Payload,
    /// Errors (non-terminal records and the designated terminal error).
    Error,
    /// Warnings.
    Warning,
    /// Verbose diagnostics.
    Verbose,
    /// Debug diagnostics.
    Debug,
    /// Progress updates.
    Progress,
    /// Structured informational messages.
    Information,
}

impl ChannelKind {
    /// All kinds, in declaration order.
    pub const ALL: [ChannelKind; 7] = [
        ChannelKind::Payload,
        ChannelKind::Error,
        ChannelKind::Warning,
        ChannelKind::Verbose,
        ChannelKind::Debug,
        ChannelKind::Progress,
        ChannelKind::Information,
    ];

    /// Returns a short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ChannelKind::Payload => "payload",
            ChannelKind::Error => "error",
            ChannelKind::Warning => "warning",
            ChannelKind::Verbose => "verbose",
            ChannelKind::Debug => "debug",
            ChannelKind::Progress => "progress",
            ChannelKind::Information => "information",
        }
    }

    /// True for the channels whose records affect control flow.
    pub fn is_control(&self) -> bool {
        matches!(self, ChannelKind::Payload | ChannelKind::Error)
    }
}

/// Progress report for a long-running activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressRecord {
    /// Name of the activity being reported.
    pub activity: Arc<str>,
    /// Current status line.
    pub status: Arc<str>,
    /// Completion percentage, clamped to `0..=100`.
    pub percent_complete: Option<u8>,
    /// True once the activity is finished.
    pub completed: bool,
}

impl ProgressRecord {
    /// Creates an in-flight progress record without a percentage.
    pub fn new(activity: impl Into<Arc<str>>, status: impl Into<Arc<str>>) -> Self {
        Self {
            activity: activity.into(),
            status: status.into(),
            percent_complete: None,
            completed: false,
        }
    }

    /// Attaches a completion percentage (values above 100 are clamped).
    pub fn with_percent(mut self, percent: u8) -> Self {
        self.percent_complete = Some(percent.min(100));
        self
    }

    /// Marks the activity as finished.
    pub fn finished(mut self) -> Self {
        self.completed = true;
        self
    }
}

/// Structured informational message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InformationRecord {
    /// Message text.
    pub message: Arc<str>,
    /// Optional origin of the message.
    pub source: Option<Arc<str>>,
    /// Free-form tags for filtering.
    pub tags: Vec<Arc<str>>,
}

impl InformationRecord {
    /// Creates an untagged message.
    pub fn new(message: impl Into<Arc<str>>) -> Self {
        Self {
            message: message.into(),
            source: None,
            tags: Vec::new(),
        }
    }

    /// Attaches the message origin.
    pub fn with_source(mut self, source: impl Into<Arc<str>>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Adds one tag.
    pub fn with_tag(mut self, tag: impl Into<Arc<str>>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

/// Value carried by a record, one variant per [`ChannelKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelValue<T> {
    Payload(T),
    Error(JobError),
    Warning(Arc<str>),
    Verbose(Arc<str>),
    Debug(Arc<str>),
    Progress(ProgressRecord),
    Information(InformationRecord),
}

impl<T> ChannelValue<T> {
    /// Returns the channel this value belongs to.
    pub fn kind(&self) -> ChannelKind {
        match self {
            ChannelValue::Payload(_) => ChannelKind::Payload,
            ChannelValue::Error(_) => ChannelKind::Error,
            ChannelValue::Warning(_) => ChannelKind::Warning,
            ChannelValue::Verbose(_) => ChannelKind::Verbose,
            ChannelValue::Debug(_) => ChannelKind::Debug,
            ChannelValue::Progress(_) => ChannelKind::Progress,
            ChannelValue::Information(_) => ChannelKind::Information,
        }
    }

    /// Returns the payload, if this is a `Payload` value.
    pub fn as_payload(&self) -> Option<&T> {
        match self {
            ChannelValue::Payload(value) => Some(value),
            _ => None,
        }
    }
}

/// One entry of a job's output log.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelRecord<T> {
    /// Position in the job's timeline (strictly increasing across all kinds).
    pub sequence: u64,
    /// Wall-clock time of the append.
    pub at: SystemTime,
    /// Tagged value.
    pub value: ChannelValue<T>,
}

impl<T> ChannelRecord<T> {
    /// Returns the channel of this record.
    #[inline]
    pub fn kind(&self) -> ChannelKind {
        self.value.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_values() {
        let values: Vec<ChannelValue<u32>> = vec![
            ChannelValue::Payload(1),
            ChannelValue::Error(JobError::failed("x")),
            ChannelValue::Warning("w".into()),
            ChannelValue::Verbose("v".into()),
            ChannelValue::Debug("d".into()),
            ChannelValue::Progress(ProgressRecord::new("copy", "1/2")),
            ChannelValue::Information(InformationRecord::new("hi")),
        ];
        let kinds: Vec<_> = values.iter().map(ChannelValue::kind).collect();
        assert_eq!(kinds, ChannelKind::ALL.to_vec());
    }

    #[test]
    fn only_payload_and_error_are_control_channels() {
        let control: Vec<_> = ChannelKind::ALL.iter().filter(|k| k.is_control()).collect();
        assert_eq!(control, vec![&ChannelKind::Payload, &ChannelKind::Error]);
    }

    #[test]
    fn progress_percent_is_clamped() {
        let p = ProgressRecord::new("sync", "almost").with_percent(250);
        assert_eq!(p.percent_complete, Some(100));
    }
}
