mod decoder;
pub use decoder::Decoder;

mod framed_read;
pub use framed_read::FramedRead;

mod lines_codec;
pub use self::lines_codec::{LinesCodec, LinesCodecError};
