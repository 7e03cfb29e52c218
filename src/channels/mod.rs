//! Job output: record types and the replayable buffer.
//!
//! ## Contents
//! - [`ChannelKind`], [`ChannelValue`], [`ChannelRecord`] the tagged record model
//! - [`ProgressRecord`], [`InformationRecord`] structured diagnostic values
//! - [`ChannelBuffer`] the ordered log with replay-then-live subscription

mod buffer;
mod record;

pub(crate) use buffer::Attach;
pub use buffer::ChannelBuffer;
pub use record::{
    ChannelKind, ChannelRecord, ChannelValue, InformationRecord, Payload, ProgressRecord,
};
