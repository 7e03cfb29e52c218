/// Per-outcome child counters of a controller.
///
/// Every child is in exactly one bucket, so [`ChildCounts::total`] always
/// equals the number of children added.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChildCounts {
    /// Added, not started yet.
    pub queued: usize,
    /// Started, not terminal yet.
    pub executing: usize,
    pub completed: usize,
    /// Failed, skipped, or disposed.
    pub failed: usize,
    pub stopped: usize,
}

impl ChildCounts {
    #[inline]
    pub fn total(&self) -> usize {
        self.queued + self.executing + self.finished()
    }

    /// Children that reached a terminal state.
    #[inline]
    pub fn finished(&self) -> usize {
        self.completed + self.failed + self.stopped
    }

    /// True when nothing is queued or executing.
    #[inline]
    pub fn is_idle(&self) -> bool {
        self.queued == 0 && self.executing == 0
    }
}
