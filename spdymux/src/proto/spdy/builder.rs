use std::sync::Arc;

use crate::proto::spdy::frame::StreamId;
use crate::proto::spdy::peer::Peer;
use crate::proto::spdy::session::{Handler, Session};
use crate::proto::spdy::streams::{Stream, Streams};

/// Configures how streams are created.
///
/// ```
/// # use spdymux::proto::spdy::{Builder, Peer};
/// let mut builder = Builder::new();
/// builder.peer(Peer::Client).inbound_capacity(64);
/// ```
#[derive(Clone, Debug)]
pub struct Builder {
    config: Config,
}

#[derive(Clone, Debug)]
pub(crate) struct Config {
    pub inbound_capacity: Option<usize>,
    pub max_line_length: usize,
    pub peer: Peer,
}

impl Builder {
    pub fn new() -> Builder {
        Builder {
            config: Config::default(),
        }
    }

    /// Bounds each stream's inbound queue.
    ///
    /// Pushing onto a full queue fails with `QueueFull`, or parks the pusher
    /// when it uses `Inbound::push_wait`. Queues are unbounded by default.
    pub fn inbound_capacity(&mut self, capacity: usize) -> &mut Self {
        assert!(capacity > 0, "inbound capacity must be non-zero");
        self.config.inbound_capacity = Some(capacity);
        self
    }

    /// Longest line `StreamWriter::send_lines` accepts.
    pub fn max_line_length(&mut self, max: usize) -> &mut Self {
        self.config.max_line_length = max;
        self
    }

    /// Which end of the session this side is; decides which stream ids are
    /// locally initiated in a [`Streams`] table.
    pub fn peer(&mut self, peer: Peer) -> &mut Self {
        self.config.peer = peer;
        self
    }

    pub fn build_stream<S: Session>(
        &self,
        session: Arc<S>,
        id: StreamId,
        handler: Arc<dyn Handler<S>>,
        is_local: bool,
    ) -> Stream<S> {
        Stream::with_config(session, id, handler, is_local, &self.config)
    }

    pub fn build_streams<S: Session>(
        &self,
        session: Arc<S>,
        handler: Arc<dyn Handler<S>>,
    ) -> Streams<S> {
        Streams::new(session, handler, self.config.clone())
    }
}

impl Default for Builder {
    fn default() -> Builder {
        Builder::new()
    }
}

impl Default for Config {
    fn default() -> Config {
        Config {
            inbound_capacity: None,
            max_line_length: usize::MAX,
            peer: Peer::default(),
        }
    }
}
