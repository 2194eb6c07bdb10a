//! Stream multiplexing over a single framed session, in the style of SPDY.
//!
//! Each logical stream gets an ordered inbound message pipeline fed by the
//! session and an outbound writer that picks the right control frame for
//! where the stream is in its life.

#![forbid(unsafe_code)]

pub mod common;
pub mod proto;
