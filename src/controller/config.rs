//! # Controller configuration.
//!
//! ## Sentinel values
//! - `max_concurrent = 0` → unlimited (only meaningful in `Concurrent` mode)
//! - `buffer_capacity = 0` → the output log grows on demand

use super::mode::ExecutionMode;

/// Configuration for a [`JobController`](crate::JobController).
#[derive(Clone, Debug)]
pub struct ControllerConfig {
    /// How children are started.
    pub mode: ExecutionMode,

    /// Re-append every child record to the controller's own log.
    ///
    /// When `false`, only child terminal failures are appended (as `Error`
    /// records), so the controller still explains why it failed.
    pub forward_child_output: bool,

    /// Maximum number of children executing at once in `Concurrent` mode.
    ///
    /// - `0` = unlimited
    /// - `n > 0` = at most `n` children execute; the rest wait in order
    pub max_concurrent: usize,

    /// Records to reserve in the controller's output log.
    pub buffer_capacity: usize,
}

impl ControllerConfig {
    /// Config with the given mode and defaults for everything else.
    pub fn with_mode(mode: ExecutionMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Returns the concurrency limit as an `Option`.
    ///
    /// Consecutive modes always yield `Some(1)`.
    #[inline]
    pub fn concurrency_limit(&self) -> Option<usize> {
        if self.mode.is_consecutive() {
            Some(1)
        } else if self.max_concurrent == 0 {
            None
        } else {
            Some(self.max_concurrent)
        }
    }
}

impl Default for ControllerConfig {
    /// Default configuration:
    ///
    /// - `mode = Concurrent`
    /// - `forward_child_output = true`
    /// - `max_concurrent = 0` (unlimited)
    /// - `buffer_capacity = 64`
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            forward_child_output: true,
            max_concurrent: 0,
            buffer_capacity: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consecutive_modes_run_one_child() {
        let mut cfg = ControllerConfig::with_mode(ExecutionMode::ConsecutiveUntilError);
        cfg.max_concurrent = 8;
        assert_eq!(cfg.concurrency_limit(), Some(1));
    }

    #[test]
    fn zero_means_unlimited() {
        let cfg = ControllerConfig::default();
        assert_eq!(cfg.concurrency_limit(), None);
        let cfg = ControllerConfig {
            max_concurrent: 2,
            ..ControllerConfig::default()
        };
        assert_eq!(cfg.concurrency_limit(), Some(2));
    }
}
