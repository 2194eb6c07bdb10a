//! Typed SPDY frames.
//!
//! The byte layout of these frames belongs to the wire codec; this module
//! only models what a stream produces and consumes.

use bytes::Bytes;
use std::fmt;

mod control;
mod data;
mod stream_id;
mod util;

pub use control::{ControlFlags, Headers, SynReply, SynStream};
pub use data::Data;
pub use stream_id::{StreamId, StreamIdOverflow};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Kind {
    SynStream,
    SynReply,
    Headers,
    Data,
}

#[derive(Eq, PartialEq)]
pub enum Frame<T = Bytes> {
    SynStream(SynStream),
    SynReply(SynReply),
    Headers(Headers),
    Data(Data<T>),
}

impl<T> Frame<T> {
    pub fn stream_id(&self) -> StreamId {
        use self::Frame::*;

        match *self {
            SynStream(ref frame) => frame.stream_id(),
            SynReply(ref frame) => frame.stream_id(),
            Headers(ref frame) => frame.stream_id(),
            Data(ref frame) => frame.stream_id(),
        }
    }

    pub fn kind(&self) -> Kind {
        use self::Frame::*;

        match *self {
            SynStream(_) => Kind::SynStream,
            SynReply(_) => Kind::SynReply,
            Headers(_) => Kind::Headers,
            Data(_) => Kind::Data,
        }
    }

    pub fn is_fin(&self) -> bool {
        use self::Frame::*;

        match *self {
            SynStream(ref frame) => frame.is_fin(),
            SynReply(ref frame) => frame.is_fin(),
            Headers(ref frame) => frame.is_fin(),
            Data(ref frame) => frame.is_fin(),
        }
    }

    pub fn map<F, U>(self, f: F) -> Frame<U>
    where
        F: FnOnce(T) -> U,
    {
        use self::Frame::*;

        match self {
            SynStream(frame) => frame.into(),
            SynReply(frame) => frame.into(),
            Headers(frame) => frame.into(),
            Data(frame) => frame.map(f).into(),
        }
    }
}

impl<T> fmt::Debug for Frame<T> {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        use self::Frame::*;

        match *self {
            SynStream(ref frame) => fmt::Debug::fmt(frame, fmt),
            SynReply(ref frame) => fmt::Debug::fmt(frame, fmt),
            Headers(ref frame) => fmt::Debug::fmt(frame, fmt),
            Data(ref frame) => fmt::Debug::fmt(frame, fmt),
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str(match *self {
            Kind::SynStream => "SYN_STREAM",
            Kind::SynReply => "SYN_REPLY",
            Kind::Headers => "HEADERS",
            Kind::Data => "DATA",
        })
    }
}
