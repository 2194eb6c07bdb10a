//! Stream multiplexing for a SPDY session.
//!
//! A [`Stream`] pairs a [`StreamReader`], fed by the session through an
//! [`Inbound`] handle, with a [`StreamWriter`] that turns sends into
//! SYN_STREAM, SYN_REPLY, HEADERS and DATA frames for the [`Session`].
//! [`Stream::run`] hands the stream to its [`Handler`] on a task of its own.

mod builder;
mod error;
pub mod frame;
mod peer;
pub mod queue;
mod session;
mod streams;

pub use crate::proto::spdy::builder::Builder;
pub use crate::proto::spdy::error::{Error, UserError};
pub use crate::proto::spdy::frame::StreamId;
pub use crate::proto::spdy::peer::Peer;
pub use crate::proto::spdy::queue::{MessageQueue, RecvError, SendError};
pub use crate::proto::spdy::session::{Handler, Session};
pub use crate::proto::spdy::streams::{
    Dispatched, Inbound, Message, Stream, StreamReader, StreamTask, StreamWriter, Streams,
};
