//! # Subscription handle.
//!
//! Returned by every subscribe call. Dropping it (or calling
//! [`Subscription::unsubscribe`]) removes the subscriber from the job under the
//! job lock. Subscriptions to jobs that were already terminal are no-ops.

/// Registration handle; dropping it unregisters the subscriber.
#[must_use = "dropping a Subscription unregisters the subscriber"]
pub struct Subscription {
    detach: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub(crate) fn new(detach: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            detach: Some(Box::new(detach)),
        }
    }

    /// Handle for a subscriber that was never registered (terminal or disposed job).
    pub(crate) fn noop() -> Self {
        Self { detach: None }
    }

    /// True if this handle still has a registration to remove.
    pub fn is_active(&self) -> bool {
        self.detach.is_some()
    }

    /// Removes the subscriber now.
    pub fn unsubscribe(mut self) {
        self.run_detach();
    }

    fn run_detach(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_detach();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
