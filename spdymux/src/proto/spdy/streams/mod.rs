mod reader;
mod stream;
mod table;
mod writer;

pub use reader::{Inbound, Message, StreamReader};
pub use stream::{Stream, StreamTask};
pub use table::{Dispatched, Streams};
pub use writer::StreamWriter;
