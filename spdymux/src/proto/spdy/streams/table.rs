use bytes::Bytes;
use fnv::FnvHashMap;
use futures_util::future::AbortHandle;
use http::HeaderMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{Inbound, Message, Stream, StreamTask};
use crate::proto::spdy::builder::Config;
use crate::proto::spdy::error::{Error, UserError};
use crate::proto::spdy::frame::{Frame, StreamId};
use crate::proto::spdy::session::{Handler, Session};

/// Routes inbound frames to the streams of one session.
///
/// A SYN_STREAM from the peer creates a stream and starts its handler. Other
/// frames are pushed to the stream they name. A frame carrying FIN is the
/// last one the stream's reader gets; its queue is closed after it.
pub struct Streams<S> {
    session: Arc<S>,
    handler: Arc<dyn Handler<S>>,
    config: Config,
    entries: Mutex<FnvHashMap<StreamId, Entry>>,
}

struct Entry {
    inbound: Inbound,
    abort: AbortHandle,
}

/// What [`Streams::recv_frame`] did with a frame.
#[derive(Debug)]
pub enum Dispatched {
    /// The peer opened a stream; its handler is running.
    Accepted(StreamTask),
    Delivered,
    /// No open stream has the frame's id; the frame was dropped.
    Unknown,
}

impl<S: Session> Streams<S> {
    pub(crate) fn new(session: Arc<S>, handler: Arc<dyn Handler<S>>, config: Config) -> Self {
        Streams {
            session,
            handler,
            config,
            entries: Mutex::new(FnvHashMap::default()),
        }
    }

    /// Opens a stream from this side and starts its handler, which opens the
    /// stream on the wire with its first send.
    pub fn open(&self, id: StreamId) -> Result<StreamTask, Error> {
        if id.is_zero() || !self.config.peer.is_local_init(id) {
            return Err(UserError::InvalidStreamId.into());
        }

        let mut entries = self.lock();
        if entries.contains_key(&id) {
            return Err(UserError::StreamExists.into());
        }

        let task = self.new_stream(id, true).run();
        entries.insert(id, Entry::new(&task));

        tracing::debug!(stream.id = %id, "open");
        Ok(task)
    }

    pub fn recv_frame(&self, frame: Frame) -> Result<Dispatched, Error> {
        let id = frame.stream_id();
        let end_stream = frame.is_fin();

        match frame {
            Frame::SynStream(frame) => {
                if id.is_zero() || self.config.peer.is_local_init(id) {
                    tracing::debug!(stream.id = %id, "SYN_STREAM with a local stream id");
                    return Err(UserError::InvalidStreamId.into());
                }

                let mut entries = self.lock();
                if entries.contains_key(&id) {
                    return Err(UserError::StreamExists.into());
                }

                let stream = self.new_stream(id, false);
                let msg = Message::new(Bytes::new(), Some(frame.into_fields()));
                let inbound = stream.reader().inbound();
                inbound.push_message(msg.with_end_stream(end_stream))?;

                if end_stream {
                    inbound.close();
                }

                let task = stream.run();
                if !end_stream {
                    entries.insert(id, Entry::new(&task));
                }

                tracing::debug!(stream.id = %id, "accept");
                Ok(Dispatched::Accepted(task))
            }
            Frame::SynReply(frame) => {
                self.deliver(id, Bytes::new(), Some(frame.into_fields()), end_stream)
            }
            Frame::Headers(frame) => {
                self.deliver(id, Bytes::new(), Some(frame.into_fields()), end_stream)
            }
            Frame::Data(frame) => self.deliver(id, frame.into_payload(), None, end_stream),
        }
    }

    fn deliver(
        &self,
        id: StreamId,
        payload: Bytes,
        headers: Option<HeaderMap>,
        end_stream: bool,
    ) -> Result<Dispatched, Error> {
        let inbound = {
            let mut entries = self.lock();
            if end_stream {
                entries.remove(&id).map(|entry| entry.inbound)
            } else {
                entries.get(&id).map(|entry| entry.inbound.clone())
            }
        };

        let inbound = match inbound {
            Some(inbound) => inbound,
            None => {
                tracing::debug!(stream.id = %id, "recv frame for unknown stream");
                return Ok(Dispatched::Unknown);
            }
        };

        let msg = Message::new(payload, headers).with_end_stream(end_stream);
        let res = inbound.push_message(msg);
        if end_stream {
            inbound.close();
        }

        if let Err(ref e) = res {
            if e.user_error() == Some(UserError::QueueClosed) {
                // The handler is gone; nobody reads this stream any more.
                tracing::debug!(stream.id = %id, "recv frame for finished stream");
                self.lock().remove(&id);
            }
        }
        res?;

        Ok(Dispatched::Delivered)
    }

    /// Forgets a stream and closes its inbound queue. Its handler keeps
    /// running.
    pub fn remove(&self, id: StreamId) -> bool {
        match self.lock().remove(&id) {
            Some(entry) => {
                entry.inbound.close();
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: StreamId) -> bool {
        self.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Cancels every registered handler, e.g. when the session goes away.
    pub fn cancel_all(&self) {
        let entries: Vec<_> = self.lock().drain().collect();

        tracing::debug!(streams = entries.len(), "cancel all");

        for (_, entry) in entries {
            entry.abort.abort();
            entry.inbound.close();
        }
    }

    fn new_stream(&self, id: StreamId, is_local: bool) -> Stream<S> {
        Stream::with_config(
            self.session.clone(),
            id,
            self.handler.clone(),
            is_local,
            &self.config,
        )
    }

    fn lock(&self) -> MutexGuard<'_, FnvHashMap<StreamId, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Entry {
    fn new(task: &StreamTask) -> Entry {
        Entry {
            inbound: task.inbound().clone(),
            abort: task.abort_handle(),
        }
    }
}

impl<S> fmt::Debug for Streams<S> {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        let len = self
            .entries
            .lock()
            .map(|entries| entries.len())
            .unwrap_or_default();

        fmt.debug_struct("Streams")
            .field("peer", &self.config.peer)
            .field("len", &len)
            .finish()
    }
}
