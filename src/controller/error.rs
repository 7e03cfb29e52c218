use thiserror::Error;

/// Error returned by [`JobController::add_child`](crate::JobController::add_child).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerError {
    /// The controller was sealed (or stopped); it accepts no more children.
    #[error("controller is sealed")]
    Sealed,

    /// The job was already added to this controller.
    #[error("job is already a child of this controller")]
    Duplicate,

    /// The controller is terminal or disposed.
    #[error("controller is closed")]
    Closed,
}

impl ControllerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ControllerError::Sealed => "controller_sealed",
            ControllerError::Duplicate => "controller_duplicate_child",
            ControllerError::Closed => "controller_closed",
        }
    }
}
