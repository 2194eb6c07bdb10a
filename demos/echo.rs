use anyhow::{anyhow, Result};
use cynthia::future::swap::Cursor;
use http::header::HeaderValue;
use once_cell::sync::OnceCell;
use std::io;
use std::sync::Arc;

use spdymux::proto::spdy::frame::Frame;
use spdymux::proto::spdy::{
    Builder, Dispatched, Error, Handler, Peer, Session, Stream, StreamId, Streams,
};

const TEXT: &[u8] = b"the first line\nthe second line\nthe last line\n";

/// Hands every frame straight to the other end's stream table.
struct Loopback {
    remote: OnceCell<Arc<Streams<Loopback>>>,
}

impl Session for Loopback {
    fn write_frame(&self, frame: Frame) -> io::Result<()> {
        let remote = self
            .remote
            .get()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "no remote"))?;

        match remote.recv_frame(frame) {
            // The accepted handler keeps running on its own.
            Ok(Dispatched::Accepted(_)) | Ok(Dispatched::Delivered) => Ok(()),
            Ok(Dispatched::Unknown) => Ok(()),
            Err(e) => Err(io::Error::new(io::ErrorKind::Other, e.to_string())),
        }
    }
}

async fn echo(mut stream: Stream<Loopback>) -> Result<(), Error> {
    let (reader, writer) = stream.split();
    writer.headers_mut().insert("status", HeaderValue::from_static("200"));

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

async fn client(mut stream: Stream<Loopback>) -> Result<(), Error> {
    let (reader, writer) = stream.split();
    writer.headers_mut().insert("path", HeaderValue::from_static("/echo"));

    writer.send_lines(Cursor::new(TEXT)).await?;
    writer.send_headers(true)?;

    loop {
        let msg = reader.receive().await?;
        if let Some(headers) = msg.headers() {
            println!("GOT HEADERS = {:?}", headers);
        }
        if !msg.payload().is_empty() {
            println!("GOT LINE = {:?}", msg.payload());
        }
        if msg.is_end_stream() {
            return Ok(());
        }
    }
}

fn connect() -> Result<Arc<Streams<Loopback>>> {
    let client_session = Arc::new(Loopback {
        remote: OnceCell::new(),
    });
    let server_session = Arc::new(Loopback {
        remote: OnceCell::new(),
    });

    let client_handler: Arc<dyn Handler<Loopback>> = Arc::new(client);
    let server_handler: Arc<dyn Handler<Loopback>> = Arc::new(echo);

    let client_streams = Arc::new(
        Builder::new()
            .peer(Peer::Client)
            .build_streams(client_session.clone(), client_handler),
    );
    let server_streams = Arc::new(
        Builder::new()
            .peer(Peer::Server)
            .inbound_capacity(64)
            .build_streams(server_session.clone(), server_handler),
    );

    client_session
        .remote
        .set(server_streams)
        .map_err(|_| anyhow!("client already connected"))?;
    server_session
        .remote
        .set(client_streams.clone())
        .map_err(|_| anyhow!("server already connected"))?;

    Ok(client_streams)
}

fn main() -> Result<()> {
    cynthia::runtime::block_on(async {
        let streams = connect()?;

        let task = streams.open(StreamId::from(1))?;
        task.join().await?;

        println!("DONE, {} open streams", streams.len());
        Ok(())
    })
}
