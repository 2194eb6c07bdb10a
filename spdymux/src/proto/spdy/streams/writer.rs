use bytes::Bytes;
use cynthia::future::swap::AsyncRead;
use futures_util::stream::StreamExt;
use http::HeaderMap;
use std::fmt;
use std::sync::Arc;

use crate::common::codec::{FramedRead, LinesCodec};
use crate::proto::spdy::error::Error;
use crate::proto::spdy::frame::{self, Frame, StreamId};
use crate::proto::spdy::session::Session;

/// The outbound half of a stream.
///
/// The first control frame opens the stream: SYN_STREAM when this side
/// allocated the id, SYN_REPLY when the peer did. Later control frames are
/// HEADERS. Every control frame carries the full set of headers
/// accumulated so far.
pub struct StreamWriter<S> {
    id: StreamId,
    is_local: bool,
    session: Arc<S>,
    headers: HeaderMap,
    frames_sent: u32,
    state: State,
    max_line_length: usize,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum State {
    Unopened,
    Opened,
    // FIN was sent. Further frames are not refused here; that is up to the
    // session and the peer.
    Closed,
}

impl<S: Session> StreamWriter<S> {
    pub(crate) fn new(id: StreamId, is_local: bool, session: Arc<S>) -> Self {
        StreamWriter {
            id,
            is_local,
            session,
            headers: HeaderMap::new(),
            frames_sent: 0,
            state: State::Unopened,
            max_line_length: usize::MAX,
        }
    }

    pub(crate) fn set_max_line_length(&mut self, max: usize) {
        self.max_line_length = max;
    }

    pub fn stream_id(&self) -> StreamId {
        self.id
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Headers sent with the next control frame.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Frames successfully handed to the session so far.
    pub fn frames_sent(&self) -> u32 {
        self.frames_sent
    }

    pub fn is_opened(&self) -> bool {
        self.state != State::Unopened
    }

    /// Whether a frame with the FIN flag has been sent.
    pub fn is_end_stream(&self) -> bool {
        self.state == State::Closed
    }

    /// Sends the accumulated headers in a control frame. With `end_stream`
    /// the frame carries FIN.
    pub fn send_headers(&mut self, end_stream: bool) -> Result<(), Error> {
        let fields = self.headers.clone();

        let frame: Frame = if self.state == State::Unopened {
            if self.is_local {
                let mut frame = frame::SynStream::new(self.id, fields);
                frame.set_fin(end_stream);
                frame.into()
            } else {
                let mut frame = frame::SynReply::new(self.id, fields);
                frame.set_fin(end_stream);
                frame.into()
            }
        } else {
            let mut frame = frame::Headers::new(self.id, fields);
            frame.set_fin(end_stream);
            frame.into()
        };

        self.write_frame(frame)
    }

    /// Sends `payload` as a DATA frame, opening the stream first if nothing
    /// has been sent yet.
    pub fn send<B: Into<Bytes>>(&mut self, payload: B) -> Result<(), Error> {
        if self.state == State::Unopened {
            tracing::debug!(stream.id = %self.id, "sending headers before data");
            self.send_headers(false)?;
        }

        self.write_frame(frame::Data::new(self.id, payload.into()).into())
    }

    /// Sends every line of `source` as its own DATA frame.
    ///
    /// Line terminators are not sent. Reaching the end of `source` finishes
    /// successfully; a read error or a failed send stops at that line.
    pub async fn send_lines<R>(&mut self, source: R) -> Result<(), Error>
    where
        R: AsyncRead + Unpin,
    {
        let codec = LinesCodec::new_with_max_length(self.max_line_length);
        let mut lines = FramedRead::new(source, codec);

        tracing::trace!(stream.id = %self.id, "sending lines");

        while let Some(line) = lines.next().await {
            self.send(line?)?;
        }

        tracing::trace!(stream.id = %self.id, "end of line source");
        Ok(())
    }

    fn write_frame(&mut self, frame: Frame) -> Result<(), Error> {
        let is_fin = frame.is_fin();
        tracing::debug!(?frame, "send");

        if let Err(e) = self.session.write_frame(frame) {
            tracing::debug!(stream.id = %self.id, error = %e, "write_frame failed");
            return Err(Error::from_transport(e));
        }

        self.frames_sent = self.frames_sent.saturating_add(1);
        self.state = match self.state {
            _ if is_fin => State::Closed,
            State::Unopened => State::Opened,
            state => state,
        };

        Ok(())
    }
}

impl<S> fmt::Debug for StreamWriter<S> {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("StreamWriter")
            .field("id", &self.id)
            .field("is_local", &self.is_local)
            .field("frames_sent", &self.frames_sent)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::spdy::frame::Kind;
    use http::header::HeaderValue;
    use std::io;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        frames: Mutex<Vec<Frame>>,
        fail: Mutex<bool>,
    }

    impl Session for Recorder {
        fn write_frame(&self, frame: Frame) -> io::Result<()> {
            if *self.fail.lock().unwrap() {
                return Err(io::ErrorKind::BrokenPipe.into());
            }
            self.frames.lock().unwrap().push(frame);
            Ok(())
        }
    }

    impl Recorder {
        fn kinds(&self) -> Vec<(Kind, bool)> {
            self.frames
                .lock()
                .unwrap()
                .iter()
                .map(|f| (f.kind(), f.is_fin()))
                .collect()
        }
    }

    fn new_writer(is_local: bool) -> (Arc<Recorder>, StreamWriter<Recorder>) {
        let session = Arc::new(Recorder::default());
        let writer = StreamWriter::new(StreamId::from(1), is_local, session.clone());
        (session, writer)
    }

    #[test]
    fn first_frame_opens_by_initiator() {
        let (session, mut writer) = new_writer(true);
        writer.send_headers(false).unwrap();
        writer.send_headers(false).unwrap();
        assert_eq!(
            session.kinds(),
            [(Kind::SynStream, false), (Kind::Headers, false)]
        );

        let (session, mut writer) = new_writer(false);
        writer.send_headers(false).unwrap();
        writer.send_headers(true).unwrap();
        assert_eq!(
            session.kinds(),
            [(Kind::SynReply, false), (Kind::Headers, true)]
        );
        assert!(writer.is_end_stream());
    }

    #[test]
    fn fin_on_opening_frame() {
        let (session, mut writer) = new_writer(true);
        writer.send_headers(true).unwrap();
        assert_eq!(session.kinds(), [(Kind::SynStream, true)]);
        assert!(writer.is_end_stream());
    }

    #[test]
    fn control_frames_carry_accumulated_headers() {
        let (session, mut writer) = new_writer(false);
        writer
            .headers_mut()
            .insert("status", HeaderValue::from_static("200"));
        writer.send_headers(false).unwrap();

        match session.frames.lock().unwrap()[0] {
            Frame::SynReply(ref frame) => assert_eq!(frame.fields()["status"], "200"),
            ref other => panic!("unexpected {:?}", other),
        };
    }

    #[test]
    fn send_opens_the_stream_first() {
        let (session, mut writer) = new_writer(true);
        writer.send("hello").unwrap();

        assert_eq!(
            session.kinds(),
            [(Kind::SynStream, false), (Kind::Data, false)]
        );
        assert_eq!(writer.frames_sent(), 2);

        writer.send("again").unwrap();
        assert_eq!(writer.frames_sent(), 3);
        assert_eq!(session.kinds().len(), 3);
    }

    #[test]
    fn transport_failure_leaves_counter() {
        let (session, mut writer) = new_writer(true);
        *session.fail.lock().unwrap() = true;

        let err = writer.send_headers(false).unwrap_err();
        assert!(err.is_transport());
        assert_eq!(err.into_io().unwrap().kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(writer.frames_sent(), 0);
        assert!(!writer.is_opened());

        *session.fail.lock().unwrap() = false;
        writer.send_headers(false).unwrap();
        assert_eq!(session.kinds(), [(Kind::SynStream, false)]);
    }

    #[test]
    fn saturated_counter_does_not_reopen() {
        let (session, mut writer) = new_writer(true);
        writer.send_headers(false).unwrap();
        writer.frames_sent = u32::MAX;

        writer.send("x").unwrap();
        writer.send_headers(false).unwrap();

        assert_eq!(writer.frames_sent(), u32::MAX);
        assert_eq!(
            session.kinds(),
            [
                (Kind::SynStream, false),
                (Kind::Data, false),
                (Kind::Headers, false)
            ]
        );
    }

    #[test]
    fn failed_auto_open_sends_no_data() {
        let (session, mut writer) = new_writer(false);
        *session.fail.lock().unwrap() = true;

        assert!(writer.send("x").unwrap_err().is_transport());
        assert!(session.kinds().is_empty());
        assert_eq!(writer.frames_sent(), 0);
    }
}
