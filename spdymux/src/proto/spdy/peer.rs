use crate::proto::spdy::frame::StreamId;

/// Which end of the session this side is.
///
/// Clients allocate odd stream ids, servers even ones, so the parity of an
/// id tells whether a stream was initiated locally.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Peer {
    Client,
    Server,
}

impl Peer {
    pub fn is_server(&self) -> bool {
        *self == Peer::Server
    }

    pub fn is_local_init(&self, id: StreamId) -> bool {
        assert!(!id.is_zero());
        self.is_server() == id.is_server_initiated()
    }

    /// The first id this side allocates.
    pub fn first_local_id(&self) -> StreamId {
        match *self {
            Peer::Client => StreamId::from(1),
            Peer::Server => StreamId::from(2),
        }
    }
}

impl Default for Peer {
    fn default() -> Self {
        Peer::Server
    }
}
