//! # ChannelBuffer: replayable, totally ordered output log.
//!
//! [`ChannelBuffer`] stores every record a job emits and forwards each new
//! record to the job's live subscribers.
//!
//! ## Architecture
//! ```text
//! append(value)
//!    ├─► sequence = next_seq++        (one counter for all seven kinds)
//!    ├─► records.push(record)
//!    └─► subscribers.deliver(&record)
//!
//! attach(sub, terminal)
//!    ├─► replay records[..] to sub    (sequence order)
//!    ├─► terminal? ──► sub.on_terminal(), not registered
//!    └─► otherwise subscribers.insert(sub)
//! ```
//!
//! ## Rules
//! - The owner calls every method under **one** lock, so replay and
//!   registration are indivisible: no record can fall between them.
//! - Sequences start at 1 and strictly increase.
//! - Records are never reordered or removed, except by [`ChannelBuffer::clear`]
//!   on disposal.

use std::sync::Arc;
use std::time::SystemTime;

use crate::subscribers::{
    SubscriberId, SubscriberSet, Subscribe, Terminal, deliver_record, deliver_terminal,
};

use super::record::{ChannelRecord, ChannelValue};

/// Append-only log of one job's records plus its live subscribers.
pub struct ChannelBuffer<T> {
    records: Vec<ChannelRecord<T>>,
    next_seq: u64,
    subscribers: SubscriberSet<T>,
}

/// Result of [`ChannelBuffer::attach`].
pub(crate) enum Attach {
    /// Subscriber registered for live forwarding.
    Registered(SubscriberId),
    /// Replay (and terminal, if any) delivered; nothing registered.
    Finished,
}

impl<T: 'static> ChannelBuffer<T> {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty buffer with room for `capacity` records.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
            next_seq: 1,
            subscribers: SubscriberSet::new(),
        }
    }

    /// Appends a value, assigns its sequence, and forwards it to live subscribers.
    pub fn append(&mut self, value: ChannelValue<T>) -> &ChannelRecord<T> {
        let record = ChannelRecord {
            sequence: self.next_seq,
            at: SystemTime::now(),
            value,
        };
        self.next_seq += 1;
        self.subscribers.deliver(&record);
        self.records.push(record);
        &self.records[self.records.len() - 1]
    }

    /// Returns every record in sequence order.
    pub fn snapshot(&self) -> &[ChannelRecord<T>] {
        &self.records
    }

    /// Returns the records with a sequence strictly greater than `after`.
    pub fn records_after(&self, after: u64) -> &[ChannelRecord<T>] {
        let start = self.records.partition_point(|r| r.sequence <= after);
        &self.records[start..]
    }

    /// Sequence of the newest record (0 when empty).
    pub fn last_sequence(&self) -> u64 {
        self.records.last().map_or(0, |r| r.sequence)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Replays the log to `sub`, then delivers `terminal` or registers `sub`.
    ///
    /// A subscriber that panics during replay is not registered.
    pub(crate) fn attach(&mut self, sub: Arc<dyn Subscribe<T>>, terminal: Option<&Terminal>) -> Attach {
        for record in &self.records {
            if !deliver_record(sub.as_ref(), record) {
                return Attach::Finished;
            }
        }
        match terminal {
            Some(t) => {
                deliver_terminal(sub.as_ref(), t);
                Attach::Finished
            }
            None => Attach::Registered(self.subscribers.insert(sub)),
        }
    }

    /// Unregisters a live subscriber.
    pub(crate) fn detach(&mut self, id: SubscriberId) -> bool {
        self.subscribers.remove(id)
    }

    /// Delivers the terminal notification to every live subscriber and drops them.
    pub(crate) fn finish(&mut self, terminal: &Terminal) {
        self.subscribers.finish(terminal);
    }

    /// Frees every stored record. Sequence numbering is not reset.
    pub(crate) fn clear(&mut self) {
        self.records = Vec::new();
    }
}

impl<T: 'static> Default for ChannelBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::channels::ChannelKind;
    use crate::error::JobError;

    #[derive(Default)]
    struct Seen {
        kinds: Mutex<Vec<(u64, ChannelKind)>>,
        terminal: Mutex<Vec<Terminal>>,
    }

    impl Subscribe<&'static str> for Seen {
        fn on_record(&self, record: &ChannelRecord<&'static str>) {
            self.kinds.lock().unwrap().push((record.sequence, record.kind()));
        }
        fn on_terminal(&self, terminal: &Terminal) {
            self.terminal.lock().unwrap().push(terminal.clone());
        }
    }

    #[test]
    fn sequences_are_global_across_kinds() {
        let mut buf = ChannelBuffer::new();
        buf.append(ChannelValue::Payload("a"));
        buf.append(ChannelValue::Warning("w".into()));
        buf.append(ChannelValue::Error(JobError::failed("e")));
        buf.append(ChannelValue::Payload("b"));

        let seqs: Vec<u64> = buf.snapshot().iter().map(|r| r.sequence).collect();
        assert_eq!(seqs, vec![1, 2, 3, 4]);
        assert_eq!(buf.last_sequence(), 4);
    }

    #[test]
    fn attach_replays_then_forwards_live() {
        let mut buf = ChannelBuffer::new();
        buf.append(ChannelValue::Payload("a"));
        buf.append(ChannelValue::Verbose("v".into()));

        let seen = Arc::new(Seen::default());
        assert!(matches!(buf.attach(seen.clone(), None), Attach::Registered(_)));
        buf.append(ChannelValue::Payload("b"));

        let kinds = seen.kinds.lock().unwrap().clone();
        assert_eq!(
            kinds,
            vec![
                (1, ChannelKind::Payload),
                (2, ChannelKind::Verbose),
                (3, ChannelKind::Payload)
            ]
        );
    }

    #[test]
    fn attach_to_finished_log_delivers_terminal_once() {
        let mut buf = ChannelBuffer::new();
        buf.append(ChannelValue::Payload("only"));

        let seen = Arc::new(Seen::default());
        let res = buf.attach(seen.clone(), Some(&Terminal::Completed));
        assert!(matches!(res, Attach::Finished));
        assert_eq!(buf.subscriber_count(), 0);
        assert_eq!(seen.kinds.lock().unwrap().len(), 1);
        assert_eq!(*seen.terminal.lock().unwrap(), vec![Terminal::Completed]);
    }

    #[test]
    fn records_after_returns_suffix() {
        let mut buf = ChannelBuffer::new();
        for v in ["a", "b", "c"] {
            buf.append(ChannelValue::Payload(v));
        }
        let tail: Vec<_> = buf.records_after(1).iter().map(|r| r.sequence).collect();
        assert_eq!(tail, vec![2, 3]);
        assert!(buf.records_after(3).is_empty());
        assert_eq!(buf.records_after(0).len(), 3);
    }

    #[test]
    fn clear_keeps_numbering() {
        let mut buf = ChannelBuffer::new();
        buf.append(ChannelValue::Payload("a"));
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.append(ChannelValue::Payload("b")).sequence, 2);
    }
}
