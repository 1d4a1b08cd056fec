//! Error types shared by the message builder, the session and the mailer.

use std::io::{Error as IoError};
use std::path::{PathBuf};
use crate::response::{Response};
use thiserror::{Error as ThisError};

/// Everything that can go wrong while composing or delivering mail.
#[derive(ThisError, Debug)]
pub enum Error {
    /// The relay address is not of the form `host:port`.
    #[error("invalid relay address '{0}', expected host:port")]
    Address(String),

    /// The TCP connection or the TLS handshake failed.
    #[error("failed to connect to relay: {0}")]
    Connect(#[source] IoError),

    /// The relay lacks an extension the session depends on.
    #[error("relay does not support {0}")]
    UnsupportedServer(String),

    /// The relay rejected the credentials.
    #[error("authentication rejected: {0}")]
    Auth(Response),

    /// The relay sent something the client did not expect.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// `MAIL FROM` or `RCPT TO` was rejected for the given address.
    #[error("relay rejected envelope address <{address}>: {response}")]
    Envelope {
        address: String,
        response: Response,
    },

    /// Not a single recipient of the message was accepted.
    #[error("no recipients were accepted")]
    NoRecipients,

    /// The relay refused `DATA` or the message content.
    #[error("relay rejected message data: {0}")]
    Data(Response),

    /// An attachment could not be read.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: IoError,
    },

    /// The session was closed by `quit`, `close`, a deadline or a transport error.
    #[error("session is closed")]
    ClosedSession,

    /// A transaction command was issued in the wrong state.
    #[error("{0} issued out of sequence")]
    OutOfSequence(&'static str),

    /// An externally imposed deadline expired.
    #[error("operation timed out")]
    Timeout,

    /// The connection failed after the session was established.
    #[error("transport error: {0}")]
    Transport(#[from] IoError),
}

/// Convenience alias for `Result<T, Error>`.
pub type Result<T> = ::std::result::Result<T, Error>;

impl Error {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io<P: Into<PathBuf>>(path: P, source: IoError) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the session can no longer be used after this error.
    pub fn is_fatal(&self) -> bool {
        match *self {
            Error::Connect(_) | Error::UnsupportedServer(_) | Error::Auth(_) |
            Error::ClosedSession | Error::Timeout | Error::Transport(_) => true,
            _ => false,
        }
    }
}
