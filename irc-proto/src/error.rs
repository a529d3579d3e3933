//! Errors raised while framing and parsing IRC lines.

use thiserror::Error;

/// A `Result` type for IRC `ProtocolErrors`.
pub type Result<T, E = ProtocolError> = ::std::result::Result<T, E>;

/// An IRC protocol error.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The socket failed, or a line could not be transcoded.
    #[error("an io error occurred")]
    Io(#[source] std::io::Error),

    /// No character encoding is known under this label.
    #[error("unknown encoding: {}", label)]
    UnknownEncoding {
        /// The label that was looked up.
        label: String,
    },

    /// Error for invalid messages.
    #[error("invalid message: {}", string)]
    InvalidMessage {
        /// The string that failed to parse.
        string: String,
        /// The detailed message parsing error.
        #[source]
        cause: MessageParseError,
    },
}

impl From<std::io::Error> for ProtocolError {
    fn from(e: std::io::Error) -> ProtocolError {
        ProtocolError::Io(e)
    }
}

/// Errors that occur when parsing messages.
#[derive(Debug, Error, PartialEq)]
pub enum MessageParseError {
    /// The message was empty.
    #[error("empty message")]
    EmptyMessage,

    /// The command was invalid (i.e. missing).
    #[error("invalid command")]
    InvalidCommand,

    /// The subcommand used was invalid.
    #[error("invalid {} subcommand: {}", cmd, sub)]
    InvalidSubcommand {
        /// The command whose invalid subcommand was referenced.
        cmd: &'static str,
        /// The invalid subcommand.
        sub: String,
    },
}
