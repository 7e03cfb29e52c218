//! # Job controller (parent job).
//!
//! A [`JobController`] is a [`Job`](crate::Job) composed of child jobs. It
//! starts them according to an [`ExecutionMode`], forwards their output into its
//! own log, counts their outcomes, and derives its own terminal state.
//!
//! ## Contents
//! - [`JobController`] the controller and its supervisor task
//! - [`ExecutionMode`] concurrent or consecutive execution
//! - [`ControllerConfig`], [`ControllerBuilder`] configuration
//! - [`ChildCounts`] per-outcome counters
//! - [`ControllerError`] rejected `add_child` calls

mod builder;
mod config;
mod core;
mod counts;
mod error;
mod mode;

pub use self::core::JobController;
pub use builder::ControllerBuilder;
pub use config::ControllerConfig;
pub use counts::ChildCounts;
pub use error::ControllerError;
pub use mode::ExecutionMode;
