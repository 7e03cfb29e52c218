//! # LogWriter: tracing-backed record printer
//!
//! A minimal subscriber that turns a job's records into `tracing` events.
//! Use it for tests or demos.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO  jobvisor: payload job="backup" seq=1 value="etc.tar"
//! WARN  jobvisor: warning job="backup" seq=2 message="slow disk"
//! DEBUG jobvisor: progress job="backup" seq=3 activity="copy" percent=Some(40)
//! WARN  jobvisor: error job="backup" seq=4 label="job_failed" error="disk full"
//! INFO  jobvisor: job finished job="backup" state=Failed
//! ```

use std::fmt::Debug;
use std::sync::Arc;

use crate::channels::{ChannelRecord, ChannelValue, Payload};
use crate::subscribers::{Subscribe, Terminal};

/// Record writer subscriber.
pub struct LogWriter {
    job: Arc<str>,
}

impl LogWriter {
    /// Construct a new [`LogWriter`] tagging events with `job`.
    #[must_use]
    pub fn new(job: impl Into<Arc<str>>) -> Self {
        Self { job: job.into() }
    }
}

impl<T: Payload + Debug> Subscribe<T> for LogWriter {
    fn on_record(&self, r: &ChannelRecord<T>) {
        let job = &*self.job;
        let seq = r.sequence;
        match &r.value {
            ChannelValue::Payload(value) => {
                tracing::info!(job, seq, value = ?value, "payload");
            }
            ChannelValue::Error(error) => {
                tracing::warn!(job, seq, label = error.as_label(), %error, "error");
            }
            ChannelValue::Warning(message) => {
                tracing::warn!(job, seq, message = &**message, "warning");
            }
            ChannelValue::Verbose(message) => {
                tracing::debug!(job, seq, message = &**message, "verbose");
            }
            ChannelValue::Debug(message) => {
                tracing::trace!(job, seq, message = &**message, "debug");
            }
            ChannelValue::Progress(p) => {
                tracing::debug!(
                    job,
                    seq,
                    activity = &*p.activity,
                    status = &*p.status,
                    percent = ?p.percent_complete,
                    "progress"
                );
            }
            ChannelValue::Information(info) => {
                tracing::info!(job, seq, message = &*info.message, tags = ?info.tags, "information");
            }
        }
    }

    fn on_terminal(&self, terminal: &Terminal) {
        let job = &*self.job;
        match terminal {
            Terminal::Failed(error) => {
                tracing::warn!(job, state = ?terminal.state(), %error, "job finished");
            }
            _ => tracing::info!(job, state = ?terminal.state(), "job finished"),
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
