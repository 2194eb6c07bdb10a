use cynthia::platform::channel;
use futures_util::future::{self, AbortHandle, Aborted, FutureExt};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing_futures::Instrument;

use super::{Inbound, StreamReader, StreamWriter};
use crate::proto::spdy::builder::Config;
use crate::proto::spdy::error::{Error, UserError};
use crate::proto::spdy::frame::StreamId;
use crate::proto::spdy::queue::MessageQueue;
use crate::proto::spdy::session::{Handler, Session};

/// A logical stream: its id, both halves, and the handler that serves it.
///
/// Neither the id nor the locally-initiated flag change after construction.
pub struct Stream<S> {
    id: StreamId,
    is_local: bool,
    reader: StreamReader,
    writer: StreamWriter<S>,
    handler: Arc<dyn Handler<S>>,
}

/// Handle to a running stream handler.
///
/// Dropping the handle does not stop the handler. Once the handler returns,
/// its inbound queue is closed and further pushes fail.
pub struct StreamTask {
    id: StreamId,
    inbound: Inbound,
    abort: AbortHandle,
    done: channel::Receiver<Result<(), Error>>,
}

impl<S: Session> Stream<S> {
    pub fn new(
        session: Arc<S>,
        id: StreamId,
        handler: Arc<dyn Handler<S>>,
        is_local: bool,
    ) -> Self {
        Stream::with_config(session, id, handler, is_local, &Config::default())
    }

    pub(crate) fn with_config(
        session: Arc<S>,
        id: StreamId,
        handler: Arc<dyn Handler<S>>,
        is_local: bool,
        config: &Config,
    ) -> Self {
        assert!(!id.is_zero());

        let reader = StreamReader::new(id, MessageQueue::with_capacity(config.inbound_capacity));
        let mut writer = StreamWriter::new(id, is_local, session);
        writer.set_max_line_length(config.max_line_length);

        Stream {
            id,
            is_local,
            reader,
            writer,
            handler,
        }
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    /// Whether this side allocated the stream id.
    pub fn is_local(&self) -> bool {
        self.is_local
    }

    pub fn reader(&self) -> &StreamReader {
        &self.reader
    }

    pub fn reader_mut(&mut self) -> &mut StreamReader {
        &mut self.reader
    }

    pub fn writer(&self) -> &StreamWriter<S> {
        &self.writer
    }

    pub fn writer_mut(&mut self) -> &mut StreamWriter<S> {
        &mut self.writer
    }

    /// Borrows both halves at once, e.g. to read and write from separate
    /// futures.
    pub fn split(&mut self) -> (&mut StreamReader, &mut StreamWriter<S>) {
        (&mut self.reader, &mut self.writer)
    }

    /// Spawns the handler on its own task and returns immediately.
    pub fn run(self) -> StreamTask {
        let id = self.id;
        let inbound = self.reader.inbound();
        let span = tracing::debug_span!("stream", id = %id, local = self.is_local);

        let handler = self.handler.clone();
        let (serve, abort) = future::abortable(handler.serve(self));
        let (done_tx, done_rx) = channel::bounded(1);
        let closer = inbound.clone();

        tracing::trace!(stream.id = %id, "run");

        let task = async move {
            let res = match AssertUnwindSafe(serve).catch_unwind().await {
                Ok(Ok(res)) => res,
                Ok(Err(Aborted)) => Err(UserError::Canceled.into()),
                Err(_) => Err(UserError::Panicked.into()),
            };

            closer.close();

            match res {
                Ok(()) => tracing::trace!("handler done"),
                Err(ref e) => tracing::debug!(error = %e, "handler failed"),
            }

            // Nobody may be waiting for the result.
            let _ = done_tx.send(res).await;
        };

        cynthia::runtime::spawn(task.instrument(span)).detach();

        StreamTask {
            id,
            inbound,
            abort,
            done: done_rx,
        }
    }
}

impl StreamTask {
    pub fn id(&self) -> StreamId {
        self.id
    }

    /// The push side of the stream's reader.
    pub fn inbound(&self) -> &Inbound {
        &self.inbound
    }

    /// Stops the handler at its next suspension point and closes its
    /// inbound queue.
    pub fn cancel(&self) {
        tracing::debug!(stream.id = %self.id, "cancel");
        self.abort.abort();
        self.inbound.close();
    }

    /// Waits for the handler to finish and returns its result.
    ///
    /// A canceled handler yields [`UserError::Canceled`], one that panicked
    /// [`UserError::Panicked`].
    pub async fn join(self) -> Result<(), Error> {
        match self.done.recv().await {
            Ok(res) => res,
            Err(_) => Err(UserError::Canceled.into()),
        }
    }

    pub(crate) fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }
}

impl<S> fmt::Debug for Stream<S> {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("Stream")
            .field("id", &self.id)
            .field("is_local", &self.is_local)
            .field("reader", &self.reader)
            .field("writer", &self.writer)
            .finish()
    }
}

impl fmt::Debug for StreamTask {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("StreamTask").field("id", &self.id).finish()
    }
}
