//! Crate-wide error type.
//!
//! Every fallible path in the client -- configuration, socket connect, wire
//! parsing, protocol violations -- funnels into [`ClientError`] so `main` has
//! a single place that turns a failure into a diagnostic line and an exit
//! code.

use std::fmt;

use crate::wire::parser::ParseError;

pub type Result<T> = std::result::Result<T, ClientError>;

/// Reserved exit code for any non-success termination.
pub const INTERNAL_FAILURE_CODE: i32 = 255;

#[derive(Debug)]
pub enum ClientError {
    /// An OS-level I/O failure (socket connect, read, write).
    Io(std::io::Error),
    /// The server sent bytes that do not form a legal wire message.
    Parse(ParseError),
    /// The server's message stream violated the termination protocol.
    Protocol(ProtocolError),
    /// The socket path could not be resolved from the environment or CLI.
    Config(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    MultipleExitCodes,
    CommunicationTerminated,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MultipleExitCodes => write!(f, "multiple exit codes set"),
            Self::CommunicationTerminated => write!(f, "communication terminated"),
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "{e}"),
            Self::Parse(kind) => write!(f, "{kind}"),
            Self::Protocol(e) => write!(f, "{e}"),
            Self::Config(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<ProtocolError> for ClientError {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

impl From<ParseError> for ClientError {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}
