use bytes::Bytes;
use std::fmt;

use crate::proto::spdy::error::{Error, UserError};
use crate::proto::spdy::frame::{util, Frame, Kind, StreamId};

/// A DATA frame: an opaque chunk of stream payload.
#[derive(Eq, PartialEq)]
pub struct Data<T = Bytes> {
    stream_id: StreamId,
    data: T,
    flags: DataFlags,
}

#[derive(Copy, Clone, Eq, PartialEq)]
struct DataFlags(u8);

const FIN: u8 = 0x1;
const ALL: u8 = FIN;

impl<T> Data<T> {
    pub fn new(stream_id: StreamId, payload: T) -> Self {
        assert!(!stream_id.is_zero());

        Data {
            stream_id,
            data: payload,
            flags: DataFlags::default(),
        }
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn kind(&self) -> Kind {
        Kind::Data
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

    pub fn flags(&self) -> u8 {
        self.flags.into()
    }

    pub fn payload(&self) -> &T {
        &self.data
    }

    pub fn payload_mut(&mut self) -> &mut T {
        &mut self.data
    }

    pub fn into_payload(self) -> T {
        self.data
    }

    pub fn map<F, U>(self, f: F) -> Data<U>
    where
        F: FnOnce(T) -> U,
    {
        Data {
            stream_id: self.stream_id,
            data: f(self.data),
            flags: self.flags,
        }
    }
}

impl Data<Bytes> {
    /// Rebuilds a frame handed over by the wire decoder.
    pub fn load(stream_id: StreamId, flags: u8, payload: Bytes) -> Result<Self, Error> {
        if stream_id.is_zero() {
            return Err(UserError::InvalidStreamId.into());
        }

        Ok(Data {
            stream_id,
            data: payload,
            flags: DataFlags::load(flags),
        })
    }
}

impl<T> From<Data<T>> for Frame<T> {
    fn from(src: Data<T>) -> Self {
        Frame::Data(src)
    }
}

impl<T> fmt::Debug for Data<T> {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        let mut f = fmt.debug_struct("Data");
        f.field("stream_id", &self.stream_id);
        if !self.flags.is_empty() {
            f.field("flags", &self.flags);
        }
        f.finish()
    }
}

impl DataFlags {
    fn load(bits: u8) -> DataFlags {
        DataFlags(bits & ALL)
    }

    fn is_empty(&self) -> bool {
        self.0 == 0
    }

    fn is_fin(&self) -> bool {
        self.0 & FIN == FIN
    }

    fn set_fin(&mut self) {
        self.0 |= FIN
    }

    fn unset_fin(&mut self) {
        self.0 &= !FIN
    }
}

impl Default for DataFlags {
    fn default() -> Self {
        DataFlags(0)
    }
}

impl From<DataFlags> for u8 {
    fn from(src: DataFlags) -> u8 {
        src.0
    }
}

impl fmt::Debug for DataFlags {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        util::fmt_flags(fmt, self.0, &[(FIN, "FIN")])
    }
}
