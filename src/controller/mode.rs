//! # Child execution mode
//!
//! A [`JobController`](crate::JobController) runs its children according to one
//! mode, fixed at construction.
//!
//! ## Variants
//! - `Concurrent`: start every child as soon as it is added.
//! - `Consecutive`: run children one at a time, in submission order.
//! - `ConsecutiveUntilError`: like `Consecutive`, but the first failure skips
//!   every child that has not started yet.
//!
//! ## Invariants
//! - Children are started strictly in submission order.
//! - In the consecutive modes at most one child executes at a time.

/// Policy deciding when a queued child may start.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ExecutionMode {
    /// Start children immediately.
    ///
    /// Use when:
    /// - Children are independent
    /// - One failure must not affect the others
    /// - Example: fan-out of remote commands to many hosts
    #[default]
    Concurrent,

    /// Start the next child once the previous one is terminal.
    ///
    /// Use when:
    /// - Order matters
    /// - Later children do not depend on earlier ones succeeding
    Consecutive,

    /// Like [`ExecutionMode::Consecutive`], stopping at the first failure.
    ///
    /// Use when:
    /// - Each child depends on the previous one
    /// - Example: build, then test, then deploy
    ConsecutiveUntilError,
}

impl ExecutionMode {
    /// True for the modes that run one child at a time.
    #[inline]
    pub fn is_consecutive(self) -> bool {
        !matches!(self, ExecutionMode::Concurrent)
    }

    /// Returns a short stable label for logs.
    pub fn as_label(self) -> &'static str {
        match self {
            ExecutionMode::Concurrent => "concurrent",
            ExecutionMode::Consecutive => "consecutive",
            ExecutionMode::ConsecutiveUntilError => "consecutive_until_error",
        }
    }
}
