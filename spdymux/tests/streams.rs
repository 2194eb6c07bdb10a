mod support;

use bytes::Bytes;
use http::header::HeaderValue;
use http::HeaderMap;
use spdymux::proto::spdy::frame::{self, Frame, Kind};
use spdymux::proto::spdy::{
    Builder, Dispatched, Error, Handler, Peer, Stream, StreamId, Streams, UserError,
};
use std::sync::Arc;

use support::Recorder;

async fn echo(mut stream: Stream<Recorder>) -> Result<(), Error> {
    let (reader, writer) = stream.split();

    loop {
        let msg = reader.receive().await?;
        if !msg.payload().is_empty() {
            writer.send(msg.payload().clone())?;
        }
        if msg.is_end_stream() {
            return writer.send_headers(true);
        }
    }
}

async fn expect_headers(mut stream: Stream<Recorder>) -> Result<(), Error> {
    let reader = stream.reader_mut();

    let reply = reader.receive().await?;
    assert!(reply.payload().is_empty());
    assert!(!reply.is_end_stream());
    assert_eq!(reply.headers().unwrap()["status"], "200");
    assert_eq!(reader.headers().unwrap()["status"], "200");

    let update = reader.receive().await?;
    assert!(update.payload().is_empty());
    assert!(update.is_end_stream());
    assert_eq!(reader.headers().unwrap()["x-trailer"], "done");

    let err = reader.receive().await.unwrap_err();
    assert_eq!(err.user_error(), Some(UserError::QueueClosed));
    Ok(())
}

async fn finish_at_once(_: Stream<Recorder>) -> Result<(), Error> {
    Ok(())
}

fn table(peer: Peer) -> (Arc<Recorder>, Streams<Recorder>) {
    table_with(peer, Arc::new(echo))
}

fn table_with(
    peer: Peer,
    handler: Arc<dyn Handler<Recorder>>,
) -> (Arc<Recorder>, Streams<Recorder>) {
    let session = Arc::new(Recorder::default());
    let streams = Builder::new()
        .peer(peer)
        .build_streams(session.clone(), handler);
    (session, streams)
}

fn syn_stream(id: u32, fin: bool) -> Frame {
    let mut fields = HeaderMap::new();
    fields.insert("path", HeaderValue::from_static("/echo"));
    let mut frame = frame::SynStream::new(StreamId::from(id), fields);
    frame.set_fin(fin);
    frame.into()
}

fn data(id: u32, payload: &'static str, fin: bool) -> Frame {
    let mut frame = frame::Data::new(StreamId::from(id), Bytes::from(payload));
    frame.set_fin(fin);
    frame.into()
}

#[test]
fn accepts_and_routes_peer_stream() {
    let (session, streams) = table(Peer::Server);

    cynthia::runtime::block_on(async {
        let task = match streams.recv_frame(syn_stream(1, false)).unwrap() {
            Dispatched::Accepted(task) => task,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(task.id(), 1);
        assert!(streams.contains(StreamId::from(1)));

        let res = streams.recv_frame(data(1, "ping", false)).unwrap();
        assert!(matches!(res, Dispatched::Delivered));

        let res = streams.recv_frame(data(1, "", true)).unwrap();
        assert!(matches!(res, Dispatched::Delivered));
        assert!(streams.is_empty());

        task.join().await.unwrap();
    });

    assert_eq!(
        session.kinds(),
        [
            (Kind::SynReply, false),
            (Kind::Data, false),
            (Kind::Headers, true)
        ]
    );
    assert_eq!(session.payloads(), [b"ping".to_vec()]);

    let res = streams.recv_frame(data(1, "late", false)).unwrap();
    assert!(matches!(res, Dispatched::Unknown));
}

#[test]
fn syn_stream_with_fin_is_not_registered() {
    let (session, streams) = table(Peer::Server);

    cynthia::runtime::block_on(async {
        let task = match streams.recv_frame(syn_stream(3, true)).unwrap() {
            Dispatched::Accepted(task) => task,
            other => panic!("unexpected {:?}", other),
        };
        assert!(streams.is_empty());
        assert!(task.inbound().is_closed());
        task.join().await.unwrap();
    });

    assert_eq!(session.kinds(), [(Kind::SynReply, true)]);
}

#[test]
fn rejects_syn_stream_with_local_id() {
    let (_, streams) = table(Peer::Server);

    let err = streams.recv_frame(syn_stream(2, false)).unwrap_err();
    assert_eq!(err.user_error(), Some(UserError::InvalidStreamId));

    let (_, streams) = table(Peer::Client);
    let err = streams.recv_frame(syn_stream(1, false)).unwrap_err();
    assert_eq!(err.user_error(), Some(UserError::InvalidStreamId));
}

#[test]
fn rejects_duplicate_syn_stream() {
    let (_, streams) = table(Peer::Server);

    streams.recv_frame(syn_stream(5, false)).unwrap();
    let err = streams.recv_frame(syn_stream(5, false)).unwrap_err();
    assert_eq!(err.user_error(), Some(UserError::StreamExists));
    assert_eq!(streams.len(), 1);

    streams.cancel_all();
}

#[test]
fn open_checks_stream_id() {
    let (_, streams) = table(Peer::Client);

    let err = streams.open(StreamId::from(2)).unwrap_err();
    assert_eq!(err.user_error(), Some(UserError::InvalidStreamId));

    let err = streams.open(StreamId::zero()).unwrap_err();
    assert_eq!(err.user_error(), Some(UserError::InvalidStreamId));

    let task = streams.open(StreamId::from(1)).unwrap();
    assert!(streams.contains(task.id()));

    let err = streams.open(StreamId::from(1)).unwrap_err();
    assert_eq!(err.user_error(), Some(UserError::StreamExists));

    streams.cancel_all();
}

#[test]
fn locally_opened_stream_sends_syn_stream() {
    let (session, streams) = table(Peer::Client);

    cynthia::runtime::block_on(async {
        let task = streams.open(StreamId::from(1)).unwrap();
        task.inbound().push(Bytes::from("hello"), None).unwrap();

        let res = streams.recv_frame(data(1, "", true)).unwrap();
        assert!(matches!(res, Dispatched::Delivered));

        task.join().await.unwrap();
    });

    assert_eq!(
        session.kinds(),
        [
            (Kind::SynStream, false),
            (Kind::Data, false),
            (Kind::Headers, true)
        ]
    );
}

#[test]
fn control_frames_arrive_as_headers_only_messages() {
    let (_, streams) = table_with(Peer::Client, Arc::new(expect_headers));

    cynthia::runtime::block_on(async {
        let task = streams.open(StreamId::from(1)).unwrap();

        let mut fields = HeaderMap::new();
        fields.insert("status", HeaderValue::from_static("200"));
        let reply = frame::SynReply::new(StreamId::from(1), fields);
        let res = streams.recv_frame(reply.into()).unwrap();
        assert!(matches!(res, Dispatched::Delivered));
        assert!(streams.contains(StreamId::from(1)));

        let mut fields = HeaderMap::new();
        fields.insert("x-trailer", HeaderValue::from_static("done"));
        let mut update = frame::Headers::new(StreamId::from(1), fields);
        update.set_fin(true);
        let res = streams.recv_frame(update.into()).unwrap();
        assert!(matches!(res, Dispatched::Delivered));

        assert!(streams.is_empty());
        assert!(task.inbound().is_closed());
        task.join().await.unwrap();
    });
}

#[test]
fn frames_after_handler_returns_are_refused() {
    let (_, streams) = table_with(Peer::Server, Arc::new(finish_at_once));

    cynthia::runtime::block_on(async {
        let task = match streams.recv_frame(syn_stream(1, false)).unwrap() {
            Dispatched::Accepted(task) => task,
            other => panic!("unexpected {:?}", other),
        };
        task.join().await.unwrap();
    });
    assert_eq!(streams.len(), 1);

    let err = streams.recv_frame(data(1, "x", false)).unwrap_err();
    assert_eq!(err.user_error(), Some(UserError::QueueClosed));
    assert!(streams.is_empty());

    let res = streams.recv_frame(data(1, "y", false)).unwrap();
    assert!(matches!(res, Dispatched::Unknown));
}

#[test]
fn remove_closes_inbound() {
    let (_, streams) = table(Peer::Server);

    cynthia::runtime::block_on(async {
        let task = match streams.recv_frame(syn_stream(7, false)).unwrap() {
            Dispatched::Accepted(task) => task,
            other => panic!("unexpected {:?}", other),
        };

        assert!(streams.remove(task.id()));
        assert!(!streams.remove(task.id()));

        let err = task.join().await.unwrap_err();
        assert_eq!(err.user_error(), Some(UserError::QueueClosed));
    });
}

#[test]
fn cancel_all_stops_every_handler() {
    let (session, streams) = table(Peer::Server);

    cynthia::runtime::block_on(async {
        let mut tasks = Vec::new();
        for id in &[1, 3, 5] {
            match streams.recv_frame(syn_stream(*id, false)).unwrap() {
                Dispatched::Accepted(task) => tasks.push(task),
                other => panic!("unexpected {:?}", other),
            }
        }
        assert_eq!(streams.len(), 3);

        streams.cancel_all();
        assert!(streams.is_empty());

        for task in tasks {
            let err = task.join().await.unwrap_err();
            assert!(err.is_canceled() || err.user_error() == Some(UserError::QueueClosed));
        }
    });

    assert!(session.kinds().is_empty());
}
