use bytes::{BufMut, BytesMut};
use cynthia::future::swap::{self, AsyncRead};
use futures_core::ready;
use futures_core::stream::Stream;
use pin_project_lite::pin_project;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::common::codec::Decoder;

const INITIAL_CAPACITY: usize = 8 * 1024;
const READ_CHUNK: usize = 4 * 1024;

pin_project! {
    /// A [`Stream`] of frames decoded from an [`AsyncRead`].
    pub struct FramedRead<T, D> {
        #[pin]
        inner: T,
        codec: D,
        buffer: BytesMut,
        eof: bool,
        is_readable: bool,
    }
}

impl<T, D> FramedRead<T, D>
where
    T: AsyncRead,
    D: Decoder,
{
    pub fn new(inner: T, decoder: D) -> FramedRead<T, D> {
        FramedRead::with_capacity(inner, decoder, INITIAL_CAPACITY)
    }

    pub fn with_capacity(inner: T, decoder: D, capacity: usize) -> FramedRead<T, D> {
        FramedRead {
            inner,
            codec: decoder,
            buffer: BytesMut::with_capacity(capacity),
            eof: false,
            is_readable: false,
        }
    }
}

impl<T, D> FramedRead<T, D> {
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    pub fn decoder(&self) -> &D {
        &self.codec
    }

    pub fn read_buffer(&self) -> &BytesMut {
        &self.buffer
    }
}

impl<T, D> Stream for FramedRead<T, D>
where
    T: AsyncRead,
    D: Decoder,
{
    type Item = Result<D::Item, D::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if *this.is_readable {
                if *this.eof {
                    return Poll::Ready(this.codec.decode_eof(this.buffer).transpose());
                }

                if let Some(frame) = this.codec.decode(this.buffer).transpose() {
                    return Poll::Ready(Some(frame));
                }

                *this.is_readable = false;
            }

            let n = match ready!(poll_read_buf(this.inner.as_mut(), cx, this.buffer)) {
                Ok(n) => n,
                Err(e) => return Poll::Ready(Some(Err(e.into()))),
            };

            if n == 0 {
                *this.eof = true;
            }

            *this.is_readable = true;
        }
    }
}

fn poll_read_buf<T: AsyncRead>(
    io: Pin<&mut T>,
    cx: &mut Context<'_>,
    buf: &mut BytesMut,
) -> Poll<swap::Result<usize>> {
    let mut chunk = [0u8; READ_CHUNK];

    let n = ready!(io.poll_read(cx, &mut chunk))?;
    buf.put_slice(&chunk[..n]);

    Poll::Ready(Ok(n))
}

impl<T, D> fmt::Debug for FramedRead<T, D>
where
    T: fmt::Debug,
    D: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FramedRead")
            .field("inner", &self.inner)
            .field("decoder", &self.codec)
            .field("eof", &self.eof)
            .field("is_readable", &self.is_readable)
            .field("buffer", &self.buffer)
            .finish()
    }
}
