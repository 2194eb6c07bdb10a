use bytes::Bytes;
use http::HeaderMap;
use std::fmt;

use crate::proto::spdy::error::Error;
use crate::proto::spdy::frame::StreamId;
use crate::proto::spdy::queue::MessageQueue;

/// One inbound delivery: a payload and the headers that arrived with it.
#[derive(Clone, Eq, PartialEq)]
pub struct Message {
    payload: Bytes,
    headers: Option<HeaderMap>,
    end_stream: bool,
}

impl Message {
    pub fn new(payload: Bytes, headers: Option<HeaderMap>) -> Self {
        Message {
            payload,
            headers,
            end_stream: false,
        }
    }

    /// Marks the last message the peer sends on this stream.
    pub fn with_end_stream(mut self, end_stream: bool) -> Self {
        self.end_stream = end_stream;
        self
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn headers(&self) -> Option<&HeaderMap> {
        self.headers.as_ref()
    }

    pub fn is_end_stream(&self) -> bool {
        self.end_stream
    }

    pub fn into_parts(self) -> (Bytes, Option<HeaderMap>) {
        (self.payload, self.headers)
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("Message")
            .field("payload", &self.payload.len())
            .field("headers", &self.headers.as_ref().map(HeaderMap::len))
            .field("end_stream", &self.end_stream)
            .finish()
    }
}

/// Session-side handle used to feed a stream's reader.
///
/// Cloning it is cheap; every clone pushes onto the same queue.
#[derive(Clone, Debug)]
pub struct Inbound {
    id: StreamId,
    queue: MessageQueue<Message>,
}

impl Inbound {
    pub fn stream_id(&self) -> StreamId {
        self.id
    }

    /// Queues a payload and its headers without waiting.
    pub fn push(&self, payload: Bytes, headers: Option<HeaderMap>) -> Result<(), Error> {
        self.push_message(Message::new(payload, headers))
    }

    pub fn push_message(&self, msg: Message) -> Result<(), Error> {
        tracing::trace!(stream.id = %self.id, ?msg, "push");
        self.queue.send(msg).map_err(Into::into)
    }

    /// Queues a message, waiting for room if the stream's queue is bounded.
    pub async fn push_wait(&self, msg: Message) -> Result<(), Error> {
        self.queue.send_wait(msg).await.map_err(Into::into)
    }

    /// No more messages will be pushed. The reader drains what is buffered
    /// and then gets [`UserError::QueueClosed`](crate::proto::spdy::UserError).
    pub fn close(&self) {
        self.queue.close();
    }

    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }
}

/// The inbound half of a stream.
#[derive(Debug)]
pub struct StreamReader {
    inbound: Inbound,
    last_headers: Option<HeaderMap>,
}

impl StreamReader {
    pub(crate) fn new(id: StreamId, queue: MessageQueue<Message>) -> Self {
        StreamReader {
            inbound: Inbound { id, queue },
            last_headers: None,
        }
    }

    pub fn stream_id(&self) -> StreamId {
        self.inbound.id
    }

    /// A handle the session keeps to push into this reader after the stream
    /// has been handed to its handler.
    pub fn inbound(&self) -> Inbound {
        self.inbound.clone()
    }

    pub fn push(&self, payload: Bytes, headers: Option<HeaderMap>) -> Result<(), Error> {
        self.inbound.push(payload, headers)
    }

    /// Waits for the next message, in the order messages were pushed.
    pub async fn receive(&mut self) -> Result<Message, Error> {
        let msg = self.inbound.queue.recv().await?;
        self.last_headers = msg.headers.clone();
        Ok(msg)
    }

    /// Takes the next message if one is already buffered.
    pub fn try_receive(&mut self) -> Result<Option<Message>, Error> {
        let msg = self.inbound.queue.try_recv()?;
        if let Some(ref msg) = msg {
            self.last_headers = msg.headers.clone();
        }
        Ok(msg)
    }

    /// Headers of the most recently received message.
    ///
    /// `None` until a message has been received, or if the latest one carried
    /// no headers. Each [`Message`] also carries its own headers.
    pub fn headers(&self) -> Option<&HeaderMap> {
        self.last_headers.as_ref()
    }
}
