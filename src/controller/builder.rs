use std::marker::PhantomData;
use std::sync::Arc;

use crate::channels::Payload;

use super::{config::ControllerConfig, core::JobController, mode::ExecutionMode};

/// Builder for constructing a [`JobController`] with optional settings.
pub struct ControllerBuilder<T> {
    label: Arc<str>,
    location: Option<Arc<str>>,
    config: ControllerConfig,
    _payload: PhantomData<fn() -> T>,
}

impl<T: Payload> ControllerBuilder<T> {
    /// Creates a builder with the default configuration.
    pub fn new(label: impl Into<Arc<str>>) -> Self {
        Self {
            label: label.into(),
            location: None,
            config: ControllerConfig::default(),
            _payload: PhantomData,
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the execution mode.
    pub fn mode(mut self, mode: ExecutionMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Sets the location label of the controller job.
    pub fn location(mut self, location: impl Into<Arc<str>>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Enables or disables re-appending child records to the controller's log.
    pub fn forward_child_output(mut self, forward: bool) -> Self {
        self.config.forward_child_output = forward;
        self
    }

    /// Caps executing children in `Concurrent` mode (`0` = unlimited).
    pub fn max_concurrent(mut self, limit: usize) -> Self {
        self.config.max_concurrent = limit;
        self
    }

    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.buffer_capacity = capacity;
        self
    }

    /// Builds the controller and spawns its supervisor.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn build(self) -> JobController<T> {
        JobController::create(self.label, self.location, self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::Job;

    #[tokio::test]
    async fn builder_applies_every_setting() {
        let ctl: JobController<u8> = JobController::builder("pipeline")
            .mode(ExecutionMode::ConsecutiveUntilError)
            .location("host-a")
            .forward_child_output(false)
            .buffer_capacity(8)
            .build();

        assert_eq!(ctl.mode(), ExecutionMode::ConsecutiveUntilError);
        assert_eq!(ctl.label(), "pipeline");
        assert_eq!(ctl.core().location(), Some("host-a"));
        assert!(!ctl.config().forward_child_output);
        assert_eq!(ctl.config().buffer_capacity, 8);
    }
}
