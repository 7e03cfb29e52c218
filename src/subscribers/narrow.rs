//! # Narrow observers.
//!
//! [`Observe`] is the payload-only view of a job: values, then either a
//! completion or an error. [`Narrow`] adapts an observer onto the rich
//! [`Subscribe`] path, so buffer replay and live forwarding exist only once.
//!
//! ## Mapping
//! ```text
//! Payload record       ──► on_next(value)
//! other records        ──► (ignored)
//! Completed            ──► on_completed()
//! Stopped              ──► on_error(JobError::Stopped)
//! Failed(err)          ──► on_error(err)
//! ```
//!
//! A narrow observer sees cancellation as an error; the job itself still keeps
//! `Stopped` and `Failed` apart.

use std::sync::Arc;

use crate::channels::{ChannelRecord, ChannelValue, Payload};
use crate::error::JobError;

use super::{Subscribe, Terminal};

/// Payload-only job observer.
pub trait Observe<T>: Send + Sync + 'static {
    /// Next output value.
    fn on_next(&self, value: &T);

    /// Terminal error (failure, cancellation, or disposal).
    fn on_error(&self, error: &JobError);

    /// The job completed.
    fn on_completed(&self);
}

/// Adapter exposing an [`Observe`] implementation as a [`Subscribe`].
pub struct Narrow<T> {
    observer: Arc<dyn Observe<T>>,
}

impl<T> Narrow<T> {
    /// Wraps a narrow observer.
    pub fn new(observer: Arc<dyn Observe<T>>) -> Self {
        Self { observer }
    }
}

impl<T: Payload> Subscribe<T> for Narrow<T> {
    fn on_record(&self, record: &ChannelRecord<T>) {
        if let ChannelValue::Payload(value) = &record.value {
            self.observer.on_next(value);
        }
    }

    fn on_terminal(&self, terminal: &Terminal) {
        match terminal {
            Terminal::Completed => self.observer.on_completed(),
            Terminal::Stopped => self.observer.on_error(&JobError::Stopped),
            Terminal::Failed(error) => self.observer.on_error(error),
        }
    }

    fn name(&self) -> &'static str {
        "narrow"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::SystemTime;

    use super::*;

    #[derive(Default)]
    struct Log(Mutex<Vec<String>>);

    impl Observe<i32> for Log {
        fn on_next(&self, value: &i32) {
            self.0.lock().unwrap().push(format!("next {value}"));
        }
        fn on_error(&self, error: &JobError) {
            self.0.lock().unwrap().push(format!("error {}", error.as_label()));
        }
        fn on_completed(&self) {
            self.0.lock().unwrap().push("completed".into());
        }
    }

    fn record(sequence: u64, value: ChannelValue<i32>) -> ChannelRecord<i32> {
        ChannelRecord {
            sequence,
            at: SystemTime::now(),
            value,
        }
    }

    #[test]
    fn only_payloads_reach_the_observer() {
        let log = Arc::new(Log::default());
        let narrow = Narrow::new(log.clone() as Arc<dyn Observe<i32>>);

        narrow.on_record(&record(1, ChannelValue::Payload(7)));
        narrow.on_record(&record(2, ChannelValue::Warning("careful".into())));
        narrow.on_record(&record(3, ChannelValue::Error(JobError::failed("soft"))));
        narrow.on_terminal(&Terminal::Completed);

        assert_eq!(*log.0.lock().unwrap(), vec!["next 7", "completed"]);
    }

    #[test]
    fn cancellation_is_reported_as_an_error() {
        let log = Arc::new(Log::default());
        let narrow = Narrow::new(log.clone() as Arc<dyn Observe<i32>>);
        narrow.on_terminal(&Terminal::Stopped);
        assert_eq!(*log.0.lock().unwrap(), vec!["error job_stopped"]);
    }
}
