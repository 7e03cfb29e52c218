//! # SubscriberSet: synchronous fan-out with panic isolation.
//!
//! [`SubscriberSet`] holds the live subscribers of one job and delivers each
//! record to all of them, in registration order, while the caller holds the
//! job lock.
//!
//! ## Diagram
//! ```text
//! deliver(&record)
//!     ├──► sub1.on_record()
//!     ├──► sub2.on_record()  ── panic ──► caught, logged, sub2 removed
//!     └──► subN.on_record()
//!
//! finish(&terminal)
//!     └──► every sub.on_terminal(), then the set is emptied
//! ```
//!
//! ## Rules
//! - **Per-subscriber order** equals the job's sequence order.
//! - **Isolation**: a panicking subscriber is dropped, the others keep receiving.
//! - **Exactly once**: `finish` drains the set, so no subscriber can see two
//!   terminal notifications.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use crate::channels::ChannelRecord;

use super::{Subscribe, Terminal};

/// Identifier of a registered subscriber inside one job.
pub(crate) type SubscriberId = u64;

struct Entry<T> {
    id: SubscriberId,
    sub: Arc<dyn Subscribe<T>>,
}

/// Live subscribers of one job.
pub(crate) struct SubscriberSet<T> {
    next_id: SubscriberId,
    entries: Vec<Entry<T>>,
}

impl<T: 'static> SubscriberSet<T> {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }

    /// Registers a subscriber and returns its id.
    pub(crate) fn insert(&mut self, sub: Arc<dyn Subscribe<T>>) -> SubscriberId {
        self.next_id += 1;
        let id = self.next_id;
        self.entries.push(Entry { id, sub });
        id
    }

    /// Removes a subscriber; returns false if it was already gone.
    pub(crate) fn remove(&mut self, id: SubscriberId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        before != self.entries.len()
    }

    /// Delivers one record to every subscriber.
    pub(crate) fn deliver(&mut self, record: &ChannelRecord<T>) {
        self.entries
            .retain(|entry| deliver_record(entry.sub.as_ref(), record));
    }

    /// Delivers the terminal notification to every subscriber and empties the set.
    pub(crate) fn finish(&mut self, terminal: &Terminal) {
        for entry in self.entries.drain(..) {
            deliver_terminal(entry.sub.as_ref(), terminal);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Calls `on_record`, returning false if the subscriber panicked.
pub(crate) fn deliver_record<T: 'static>(sub: &dyn Subscribe<T>, record: &ChannelRecord<T>) -> bool {
    match catch_unwind(AssertUnwindSafe(|| sub.on_record(record))) {
        Ok(()) => true,
        Err(panic) => {
            tracing::warn!(
                subscriber = sub.name(),
                sequence = record.sequence,
                info = %panic_message(panic.as_ref()),
                "subscriber panicked; dropping it"
            );
            false
        }
    }
}

/// Calls `on_terminal`, logging a panic instead of propagating it.
pub(crate) fn deliver_terminal<T: 'static>(sub: &dyn Subscribe<T>, terminal: &Terminal) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(|| sub.on_terminal(terminal))) {
        tracing::warn!(
            subscriber = sub.name(),
            info = %panic_message(panic.as_ref()),
            "subscriber panicked on terminal notification"
        );
    }
}

/// Renders a panic payload as text.
pub(crate) fn panic_message(any: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = any.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = any.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::SystemTime;

    use super::*;
    use crate::channels::ChannelValue;

    #[derive(Default)]
    struct Seen(Mutex<Vec<u64>>);

    impl Subscribe<u8> for Seen {
        fn on_record(&self, record: &ChannelRecord<u8>) {
            self.0.lock().unwrap().push(record.sequence);
        }
    }

    struct Boom;

    impl Subscribe<u8> for Boom {
        fn on_payload(&self, _value: &u8) {
            panic!("boom");
        }
    }

    fn payload(sequence: u64) -> ChannelRecord<u8> {
        ChannelRecord {
            sequence,
            at: SystemTime::now(),
            value: ChannelValue::Payload(0),
        }
    }

    #[test]
    fn panicking_subscriber_is_dropped_others_continue() {
        let seen = Arc::new(Seen::default());
        let mut set = SubscriberSet::new();
        set.insert(Arc::new(Boom));
        set.insert(seen.clone());

        set.deliver(&payload(1));
        set.deliver(&payload(2));

        assert_eq!(set.len(), 1);
        assert_eq!(*seen.0.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn finish_empties_the_set() {
        let mut set: SubscriberSet<u8> = SubscriberSet::new();
        let id = set.insert(Arc::new(Seen::default()));
        set.finish(&Terminal::Completed);
        assert!(set.is_empty());
        assert!(!set.remove(id));
    }

    #[test]
    fn panic_message_handles_common_payloads() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42_u32), "unknown panic");
    }
}
