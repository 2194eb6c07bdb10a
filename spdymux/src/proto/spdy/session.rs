use futures_util::future::BoxFuture;
use std::future::Future;
use std::io;
use std::sync::Arc;

use crate::proto::spdy::error::Error;
use crate::proto::spdy::frame::Frame;
use crate::proto::spdy::streams::Stream;

/// The connection a set of streams is multiplexed over.
///
/// Streams call [`Session::write_frame`] from their own tasks, so an
/// implementation must serialize concurrent writes itself. Routing inbound
/// frames to the right stream is also the session's job, either by hand
/// through [`Inbound`](crate::proto::spdy::Inbound) handles or with a
/// [`Streams`](crate::proto::spdy::Streams) table.
pub trait Session: Send + Sync + 'static {
    /// Writes one complete frame. An error means the frame was not sent.
    fn write_frame(&self, frame: Frame) -> io::Result<()>;
}

impl<T: Session> Session for Arc<T> {
    fn write_frame(&self, frame: Frame) -> io::Result<()> {
        (**self).write_frame(frame)
    }
}

/// Application logic run once per stream.
pub trait Handler<S>: Send + Sync + 'static {
    fn serve(&self, stream: Stream<S>) -> BoxFuture<'static, Result<(), Error>>;
}

impl<S, F, Fut> Handler<S> for F
where
    F: Fn(Stream<S>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Error>> + Send + 'static,
{
    fn serve(&self, stream: Stream<S>) -> BoxFuture<'static, Result<(), Error>> {
        Box::pin(self(stream))
    }
}
