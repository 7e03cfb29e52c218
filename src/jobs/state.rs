//! # Job lifecycle states.
//!
//! ## Transition table
//! ```text
//! NotStarted ──► Running ──► Completed | Failed
//!     │            │ ▲
//!     │            │ └──────────── Suspended ◄── Suspending ◄─┐
//!     │            ├──────────────────────────────────────────┘
//!     │            ├──► Stopping ──► Stopped
//!     │            └──► AwaitingMoreWork (controllers) ──► Running | Stopping | Suspending | Completed | Failed
//!     ├──► Stopping  (stop before start)
//!     └──► Failed    (skipped before start)
//!
//! Blocked | Disconnected | AtBreakpoint: entered only by the host, inert here.
//! ```
//!
//! ## Rules
//! - `Completed`, `Failed`, `Stopped` are terminal: no transition ever leaves them.
//! - Halted states (terminal + host states + `Suspended`) stop output but only
//!   terminal states end the job.

use std::fmt;

/// Lifecycle state shared by leaf jobs and controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    /// Created, not yet started.
    NotStarted,
    /// Executing.
    Running,
    /// Controller only: accepting more children, nothing executing.
    AwaitingMoreWork,
    /// Stop requested, cleanup in progress.
    Stopping,
    /// Stopped (terminal).
    Stopped,
    /// Suspend requested.
    Suspending,
    /// Explicitly suspended.
    Suspended,
    /// Finished successfully (terminal).
    Completed,
    /// Finished with a terminal error (terminal).
    Failed,
    /// Host-specific: blocked on input.
    Blocked,
    /// Host-specific: lost its remote connection.
    Disconnected,
    /// Host-specific: paused in a debugger.
    AtBreakpoint,
}

impl JobState {
    /// True for `Completed`, `Failed`, and `Stopped`.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed | JobState::Stopped)
    }

    /// True for terminal states and states that halt output without ending the job.
    #[inline]
    pub fn is_halted(self) -> bool {
        self.is_terminal() || self.is_host_state() || self == JobState::Suspended
    }

    /// True for states only the host may enter.
    #[inline]
    pub fn is_host_state(self) -> bool {
        matches!(
            self,
            JobState::Blocked | JobState::Disconnected | JobState::AtBreakpoint
        )
    }

    /// Returns true if `self → next` is a legal transition.
    pub fn can_transition_to(self, next: JobState) -> bool {
        use JobState::*;

        if self.is_terminal() || self == next {
            return false;
        }
        match (self, next) {
            (NotStarted, Running | Stopping | Failed) => true,
            (Running, Stopping | Suspending | Completed | Failed | AwaitingMoreWork) => true,
            (AwaitingMoreWork, Running | Stopping | Suspending | Completed | Failed) => true,
            (Stopping, Stopped) => true,
            (Suspending, Suspended | Stopping | Failed) => true,
            (Suspended, Running | Stopping | Failed) => true,
            (Running, Blocked | Disconnected | AtBreakpoint) => true,
            (Blocked | Disconnected | AtBreakpoint, Running | Stopping | Failed) => true,
            _ => false,
        }
    }

    /// Returns a short stable label for logs.
    pub fn as_label(self) -> &'static str {
        match self {
            JobState::NotStarted => "not_started",
            JobState::Running => "running",
            JobState::AwaitingMoreWork => "awaiting_more_work",
            JobState::Stopping => "stopping",
            JobState::Stopped => "stopped",
            JobState::Suspending => "suspending",
            JobState::Suspended => "suspended",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Blocked => "blocked",
            JobState::Disconnected => "disconnected",
            JobState::AtBreakpoint => "at_breakpoint",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

#[cfg(test)]
mod tests {
    use super::JobState::*;
    use super::*;

    const ALL: [JobState; 12] = [
        NotStarted,
        Running,
        AwaitingMoreWork,
        Stopping,
        Stopped,
        Suspending,
        Suspended,
        Completed,
        Failed,
        Blocked,
        Disconnected,
        AtBreakpoint,
    ];

    #[test]
    fn terminal_states_never_transition() {
        for from in [Completed, Failed, Stopped] {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to} must be rejected");
            }
        }
    }

    #[test]
    fn stop_path_goes_through_stopping() {
        assert!(Running.can_transition_to(Stopping));
        assert!(Stopping.can_transition_to(Stopped));
        assert!(!Running.can_transition_to(Stopped));
    }

    #[test]
    fn suspend_and_resume() {
        assert!(Running.can_transition_to(Suspending));
        assert!(Suspending.can_transition_to(Suspended));
        assert!(Suspended.can_transition_to(Running));
        assert!(!NotStarted.can_transition_to(Suspending));
    }

    #[test]
    fn awaiting_more_work_is_not_suspended() {
        assert!(Running.can_transition_to(AwaitingMoreWork));
        assert!(AwaitingMoreWork.can_transition_to(Running));
        assert!(!AwaitingMoreWork.is_halted());
        assert!(Suspended.is_halted());
    }

    #[test]
    fn host_states_are_halted_but_not_terminal() {
        for s in [Blocked, Disconnected, AtBreakpoint] {
            assert!(s.is_halted());
            assert!(!s.is_terminal());
            assert!(!NotStarted.can_transition_to(s));
        }
    }
}
