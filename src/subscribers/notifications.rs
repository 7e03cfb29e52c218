//! # Channel-backed subscriber for async consumers.
//!
//! Callbacks run under the job lock, which is the wrong place to await.
//! [`Notifications`] registers a forwarding subscriber that pushes every record
//! and the terminal notification into an unbounded tokio channel, so a consumer
//! can `await` them at its own pace.
//!
//! ```text
//! JobCore ── on_record / on_terminal ──► Forwarder ── send ──► [unbounded mpsc] ──► Notifications::next().await
//! ```
//!
//! The channel closes after the terminal notification: the job drops its
//! subscribers when it becomes terminal, which drops the sender.

use tokio::sync::mpsc;

use crate::channels::{ChannelRecord, Payload};

use super::{Subscribe, Subscription, Terminal};

/// One item delivered through [`Notifications`].
#[derive(Debug, Clone, PartialEq)]
pub enum Notification<T> {
    /// A buffered or live record.
    Record(ChannelRecord<T>),
    /// The final notification; nothing follows it.
    Terminal(Terminal),
}

/// Subscriber that forwards into an mpsc channel.
pub(crate) struct Forwarder<T> {
    tx: mpsc::UnboundedSender<Notification<T>>,
}

impl<T> Forwarder<T> {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<Notification<T>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl<T: Payload> Subscribe<T> for Forwarder<T> {
    fn on_record(&self, record: &ChannelRecord<T>) {
        let _ = self.tx.send(Notification::Record(record.clone()));
    }

    fn on_terminal(&self, terminal: &Terminal) {
        let _ = self.tx.send(Notification::Terminal(terminal.clone()));
    }

    fn name(&self) -> &'static str {
        "notifications"
    }
}

/// Async stream of a job's notifications.
///
/// Holds the subscription: dropping this value unregisters the forwarder.
pub struct Notifications<T> {
    rx: mpsc::UnboundedReceiver<Notification<T>>,
    _subscription: Subscription,
}

impl<T> Notifications<T> {
    pub(crate) fn new(
        rx: mpsc::UnboundedReceiver<Notification<T>>,
        subscription: Subscription,
    ) -> Self {
        Self {
            rx,
            _subscription: subscription,
        }
    }

    /// Waits for the next notification; `None` once the stream is exhausted.
    pub async fn next(&mut self) -> Option<Notification<T>> {
        self.rx.recv().await
    }

    /// Returns an already queued notification without waiting.
    pub fn try_next(&mut self) -> Option<Notification<T>> {
        self.rx.try_recv().ok()
    }

    /// Skips records until the terminal notification arrives.
    pub async fn terminal(&mut self) -> Option<Terminal> {
        while let Some(n) = self.rx.recv().await {
            if let Notification::Terminal(t) = n {
                return Some(t);
            }
        }
        None
    }

    /// Collects every record up to the terminal notification.
    pub async fn collect(mut self) -> (Vec<ChannelRecord<T>>, Option<Terminal>) {
        let mut records = Vec::new();
        while let Some(n) = self.rx.recv().await {
            match n {
                Notification::Record(r) => records.push(r),
                Notification::Terminal(t) => return (records, Some(t)),
            }
        }
        (records, None)
    }
}
