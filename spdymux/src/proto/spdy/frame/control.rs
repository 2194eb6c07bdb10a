use http::HeaderMap;
use std::fmt;

use crate::proto::spdy::error::{Error, UserError};
use crate::proto::spdy::frame::{util, Frame, Kind, StreamId};

#[derive(Copy, Clone, Eq, PartialEq)]
pub struct ControlFlags(u8);

const FIN: u8 = 0x1;
const UNIDIRECTIONAL: u8 = 0x2;
const ALL: u8 = FIN | UNIDIRECTIONAL;

// Each control frame that opens or updates a stream carries the same
// triple: stream id, flags and a header block.
macro_rules! header_frame {
    ($(#[$doc:meta])* $name:ident, $kind:ident) => {
        $(#[$doc])*
        #[derive(Eq, PartialEq)]
        pub struct $name {
            stream_id: StreamId,
            flags: ControlFlags,
            fields: HeaderMap,
        }

        impl $name {
            pub fn new(stream_id: StreamId, fields: HeaderMap) -> Self {
                assert!(!stream_id.is_zero());

                $name {
                    stream_id,
                    flags: ControlFlags::default(),
                    fields,
                }
            }

            /// Rebuilds a frame handed over by the wire decoder.
            ///
            /// Stream id zero belongs to the session and is rejected.
            pub fn load(stream_id: StreamId, flags: u8, fields: HeaderMap) -> Result<Self, Error> {
                if stream_id.is_zero() {
                    return Err(UserError::InvalidStreamId.into());
                }

                Ok($name {
                    stream_id,
                    flags: ControlFlags::load(flags),
                    fields,
                })
            }

            pub fn stream_id(&self) -> StreamId {
                self.stream_id
            }

            pub fn kind(&self) -> Kind {
                Kind::$kind
            }

            pub fn flags(&self) -> ControlFlags {
                self.flags
            }

            pub fn is_fin(&self) -> bool {
                self.flags.is_fin()
            }

            pub fn set_fin(&mut self, val: bool) {
                if val {
                    self.flags.set_fin();
                } else {
                    self.flags.unset_fin();
                }
            }

            pub fn fields(&self) -> &HeaderMap {
                &self.fields
            }

            pub fn into_fields(self) -> HeaderMap {
                self.fields
            }
        }

        impl<T> From<$name> for Frame<T> {
            fn from(src: $name) -> Self {
                Frame::$kind(src)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
                let mut f = fmt.debug_struct(stringify!($name));
                f.field("stream_id", &self.stream_id);
                if !self.flags.is_empty() {
                    f.field("flags", &self.flags);
                }
                f.field("fields", &self.fields.len());
                f.finish()
            }
        }
    };
}

header_frame! {
    /// SYN_STREAM: opens a stream from the side that allocated its id.
    SynStream, SynStream
}

header_frame! {
    /// SYN_REPLY: the first frame the accepting side sends on a stream.
    SynReply, SynReply
}

header_frame! {
    /// HEADERS: additional headers on an already opened stream.
    Headers, Headers
}

impl SynStream {
    pub fn is_unidirectional(&self) -> bool {
        self.flags.is_unidirectional()
    }
}

impl ControlFlags {
    pub fn load(bits: u8) -> ControlFlags {
        ControlFlags(bits & ALL)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn is_fin(&self) -> bool {
        self.0 & FIN == FIN
    }

    pub fn set_fin(&mut self) {
        self.0 |= FIN
    }

    pub fn unset_fin(&mut self) {
        self.0 &= !FIN
    }

    pub fn is_unidirectional(&self) -> bool {
        self.0 & UNIDIRECTIONAL == UNIDIRECTIONAL
    }
}

impl Default for ControlFlags {
    fn default() -> Self {
        ControlFlags(0)
    }
}

impl From<ControlFlags> for u8 {
    fn from(src: ControlFlags) -> u8 {
        src.0
    }
}

impl fmt::Debug for ControlFlags {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        util::fmt_flags(fmt, self.0, &[(FIN, "FIN"), (UNIDIRECTIONAL, "UNIDIRECTIONAL")])
    }
}
