//! The wire grammar: a strict, streaming subset of bencoding.
//!
//! [`parser`] turns server bytes into [`Event`]s without ever materialising
//! the message as a tree. [`encoder`] does the (much smaller) inverse job for
//! the client's own stdin.

pub mod encoder;
pub mod parser;

/// Maximum length accepted for a single bencoded byte string, inbound or
/// outbound. Not part of the wire grammar itself, just a sanity cap so a
/// hostile or buggy server can't make the client allocate unbounded memory
/// for a single string body.
pub const MAX_STRING_LEN: i64 = 64 * 1024 * 1024;

/// Which local descriptor a streamed chunk of bytes is destined for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// A semantic event emitted by the incremental parser as bytes arrive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A slice of a `stdout` or `stderr` string value, in arrival order.
    /// Emitted streamingly -- the parser never buffers a full string body.
    Chunk(Stream, Vec<u8>),
    /// The integer value of an `exitcode` pair.
    ExitCode(i64),
    /// The closing `e` of the top-level list.
    EndOfMessage,
}
