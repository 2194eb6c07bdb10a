use std::{error, fmt, io};

use crate::common::codec::LinesCodecError;
use crate::proto::spdy::queue::{RecvError, SendError};

/// Errors returned by stream operations.
///
/// Transport failures reported by the [`Session`](crate::proto::spdy::Session)
/// are carried unchanged and can be taken back out with [`Error::into_io`].
#[derive(Debug)]
pub struct Error {
    kind: Kind,
}

#[derive(Debug)]
enum Kind {
    User(UserError),
    Transport(io::Error),
    Io(io::Error),
}

/// Misuse of a stream, or a stream that is no longer usable.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum UserError {
    #[error("message queue can only be watched by one task at a time")]
    ConcurrentAccess,
    #[error("message queue closed")]
    QueueClosed,
    #[error("message queue full")]
    QueueFull,
    #[error("stream handler canceled")]
    Canceled,
    #[error("stream handler panicked")]
    Panicked,
    #[error("line exceeds the maximum length")]
    LineTooLong,
    #[error("invalid stream ID")]
    InvalidStreamId,
    #[error("stream already exists")]
    StreamExists,
}

impl Error {
    pub fn user_error(&self) -> Option<UserError> {
        match self.kind {
            Kind::User(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_concurrent_access(&self) -> bool {
        self.user_error() == Some(UserError::ConcurrentAccess)
    }

    pub fn is_canceled(&self) -> bool {
        self.user_error() == Some(UserError::Canceled)
    }

    /// Returns true if the session failed to write a frame.
    pub fn is_transport(&self) -> bool {
        match self.kind {
            Kind::Transport(_) => true,
            _ => false,
        }
    }

    /// Returns true if reading an outbound source failed.
    pub fn is_io(&self) -> bool {
        match self.kind {
            Kind::Io(_) => true,
            _ => false,
        }
    }

    pub fn get_io(&self) -> Option<&io::Error> {
        match self.kind {
            Kind::Transport(ref e) | Kind::Io(ref e) => Some(e),
            _ => None,
        }
    }

    pub fn into_io(self) -> Option<io::Error> {
        match self.kind {
            Kind::Transport(e) | Kind::Io(e) => Some(e),
            _ => None,
        }
    }

    pub(crate) fn from_transport(err: io::Error) -> Self {
        Error {
            kind: Kind::Transport(err),
        }
    }

    pub(crate) fn from_io(err: io::Error) -> Self {
        Error { kind: Kind::Io(err) }
    }
}

impl From<UserError> for Error {
    fn from(src: UserError) -> Error {
        Error {
            kind: Kind::User(src),
        }
    }
}

impl From<RecvError> for Error {
    fn from(src: RecvError) -> Error {
        match src {
            RecvError::ConcurrentAccess => UserError::ConcurrentAccess.into(),
            RecvError::Closed => UserError::QueueClosed.into(),
        }
    }
}

impl<T> From<SendError<T>> for Error {
    fn from(src: SendError<T>) -> Error {
        match src {
            SendError::Full(_) => UserError::QueueFull.into(),
            SendError::Closed(_) => UserError::QueueClosed.into(),
        }
    }
}

impl From<LinesCodecError> for Error {
    fn from(src: LinesCodecError) -> Error {
        match src {
            LinesCodecError::MaxLineLengthExceeded => UserError::LineTooLong.into(),
            LinesCodecError::Io(e) => Error::from_io(e),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        use self::Kind::*;

        match self.kind {
            User(ref e) => write!(fmt, "user error: {}", e),
            Transport(ref e) => write!(fmt, "transport error: {}", e),
            Io(ref e) => fmt::Display::fmt(e, fmt),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self.kind {
            Kind::User(ref e) => Some(e),
            Kind::Transport(ref e) | Kind::Io(ref e) => Some(e),
        }
    }
}
