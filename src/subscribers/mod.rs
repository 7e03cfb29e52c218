//! # Job subscribers.
//!
//! This module provides the two subscriber capability shapes and the plumbing
//! around them.
//!
//! ## Architecture
//! ```text
//! JobCore ──► ChannelBuffer ──► SubscriberSet ──► Subscribe::on_record / on_terminal
//!                                   │
//!                                   ├──► Narrow<T>      ──► Observe::on_next / on_error / on_completed
//!                                   ├──► Forwarder<T>   ──► Notifications<T> (async)
//!                                   └──► LogWriter      ──► tracing (feature "logging")
//! ```
//!
//! ## Subscriber shapes
//! - **Rich** ([`Subscribe`]): all seven channels plus distinct completion,
//!   cancellation, and failure signals.
//! - **Narrow** ([`Observe`]): payload values, then completion or an error.
//!   Implemented as an adapter over the rich path.

#[cfg(feature = "logging")]
mod log;
mod narrow;
mod notifications;
mod set;
mod subscriber;
mod subscription;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use narrow::{Narrow, Observe};
pub use notifications::{Notification, Notifications};
pub use subscriber::{Subscribe, Terminal};
pub use subscription::Subscription;

pub(crate) use notifications::Forwarder;
pub(crate) use set::{SubscriberId, SubscriberSet, deliver_record, deliver_terminal, panic_message};
