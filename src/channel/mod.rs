//! Framed message channels.
//!
//! A [`Channel`] carries serde-encoded values over a connected socket pair,
//! one length-prefixed frame per message. It can be [split] into a
//! [`WritableChannel`] and a [`ReadableChannel`] that own their ends
//! independently, and any number of receive ends can be waited on at once
//! with [`select`].
//!
//! [split]: Channel::split

mod channel;
mod frame;
mod readable;
mod select;
mod writable;

pub use self::channel::Channel;
pub use self::readable::ReadableChannel;
pub use self::select::Select;
pub use self::select::select;
pub use self::writable::WritableChannel;
