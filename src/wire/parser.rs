//! Incremental, push-driven parser for the inbound (server -> client) wire
//! format.
//!
//! The grammar is a strict subset of bencoding: integers (`i<digits>e`),
//! byte strings (`<len>:<bytes>`), and lists (`l...e`). Dictionaries are not
//! accepted at any depth. The only legal top-level shape is one list whose
//! body is a flat alternation of (key, value) pairs.
//!
//! [`Parser::feed`] accepts bytes in arbitrarily small pieces -- including
//! one byte at a time -- and pushes [`Event`]s as soon as they're known, so a
//! large `stdout`/`stderr` body is never buffered in full before being
//! forwarded.

use std::fmt;

use super::{Event, Stream, MAX_STRING_LEN};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    IntegerTooLong,
    StringTooLong,
    UnexpectedInteger,
    UnexpectedString,
    UnexpectedDictionary,
    UnexpectedList,
    UnexpectedEnd,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IntegerTooLong => write!(f, "integer too long"),
            Self::StringTooLong => write!(f, "string too long"),
            Self::UnexpectedInteger => write!(f, "unexpected integer"),
            Self::UnexpectedString => write!(f, "unexpected string"),
            Self::UnexpectedDictionary => write!(f, "unexpected dictionary"),
            Self::UnexpectedList => write!(f, "unexpected list"),
            Self::UnexpectedEnd => write!(f, "unexpected end"),
        }
    }
}

/// `unknown key` is carried separately from [`ParseErrorKind`] because it
/// needs to own the offending key's bytes for the diagnostic message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownKey(pub Vec<u8>);

impl fmt::Display for UnknownKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown key: {}", String::from_utf8_lossy(&self.0))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    Kind(ParseErrorKind),
    UnknownKey(UnknownKey),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kind(k) => write!(f, "{k}"),
            Self::UnknownKey(k) => write!(f, "{k}"),
        }
    }
}

impl From<ParseErrorKind> for ParseError {
    fn from(k: ParseErrorKind) -> Self {
        Self::Kind(k)
    }
}

/// What value type a recognised key expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Stdout,
    Stderr,
    ExitCode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    /// Before the single top-level list opener has been seen. An opener is
    /// consumed if present; a digit (the start of a key) is accepted without
    /// one, so a server that elides the outer `l` is still understood.
    AwaitingTopList,
    /// Inside the list, expecting either the closing `e` or the next key.
    ExpectKey,
    /// Reading the ASCII-decimal length prefix of a key byte string.
    KeyLength { accum: i64 },
    /// Reading the bytes of a key byte string.
    KeyBody { remaining: i64, buf: Vec<u8> },
    /// A key has just been resolved; next byte determines the value's type.
    ExpectValue { of: ValueKind },
    /// Reading the ASCII-decimal length prefix of a `stdout`/`stderr` value.
    ValueLength { accum: i64, of: ValueKind },
    /// Streaming the bytes of a `stdout`/`stderr` value body.
    ValueBody { remaining: i64, of: ValueKind },
    /// Reading the digits of an `exitcode` integer value.
    IntegerBody {
        accum: i64,
        negative: bool,
        started: bool,
    },
    /// The top-level list has closed.
    Finished,
    /// A fatal error has already been reported; further input is ignored.
    Failed,
}

/// Streaming state machine over the inbound wire grammar.
///
/// Memory use is bounded: at most one in-flight key (small) is buffered, and
/// string *values* are never buffered at all -- their bytes are forwarded as
/// [`Event::Chunk`]s as they arrive.
#[derive(Debug)]
pub struct Parser {
    state: State,
}

impl Parser {
    pub fn new() -> Self {
        Self {
            state: State::AwaitingTopList,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, State::Finished)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state, State::Failed)
    }

    pub fn is_terminal(&self) -> bool {
        self.is_finished() || self.is_failed()
    }

    /// Feed a chunk of server bytes, appending any resulting events to
    /// `events`. Returns the first parse error encountered, if any; once an
    /// error is returned the parser is in `Failed` and will not accept
    /// further input.
    pub fn feed(&mut self, chunk: &[u8], events: &mut Vec<Event>) -> Result<(), ParseError> {
        let mut i = 0;
        while i < chunk.len() {
            if self.is_terminal() {
                // Any byte arriving after Finished is trailing garbage.
                self.state = State::Failed;
                return Err(ParseErrorKind::UnexpectedList.into());
            }
            match self.step(chunk, i, events) {
                Ok(consumed) => i += consumed,
                Err(e) => {
                    self.state = State::Failed;
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Processes input starting at `chunk[i]`, returning how many bytes were
    /// consumed (zero is legal: it means the state changed and the same byte
    /// must be reprocessed, used only for the implicit top-list case).
    fn step(&mut self, chunk: &[u8], i: usize, events: &mut Vec<Event>) -> Result<usize, ParseError> {
        let b = chunk[i];
        match &mut self.state {
            State::AwaitingTopList => match b {
                b'l' => {
                    self.state = State::ExpectKey;
                    Ok(1)
                }
                b'0'..=b'9' => {
                    // No explicit opener; treat the stream as already inside
                    // the (implicit) top-level list and replay this digit.
                    self.state = State::ExpectKey;
                    Ok(0)
                }
                b'e' => Err(ParseErrorKind::UnexpectedEnd.into()),
                b'd' => Err(ParseErrorKind::UnexpectedDictionary.into()),
                b'i' => Err(ParseErrorKind::UnexpectedInteger.into()),
                _ => Err(ParseErrorKind::UnexpectedList.into()),
            },

            State::ExpectKey => match b {
                b'e' => {
                    events.push(Event::EndOfMessage);
                    self.state = State::Finished;
                    Ok(1)
                }
                b'0'..=b'9' => {
                    self.state = State::KeyLength {
                        accum: i64::from(b - b'0'),
                    };
                    Ok(1)
                }
                b'i' => Err(ParseErrorKind::UnexpectedInteger.into()),
                b'l' => Err(ParseErrorKind::UnexpectedList.into()),
                b'd' => Err(ParseErrorKind::UnexpectedDictionary.into()),
                _ => Err(ParseErrorKind::UnexpectedList.into()),
            },

            State::KeyLength { accum } => match b {
                b'0'..=b'9' => {
                    *accum = grow_len(*accum, b)?;
                    Ok(1)
                }
                b':' => {
                    let remaining = *accum;
                    self.state = State::KeyBody {
                        remaining,
                        buf: Vec::with_capacity(remaining as usize),
                    };
                    Ok(1)
                }
                _ => Err(ParseErrorKind::UnexpectedList.into()),
            },

            State::KeyBody { remaining, buf } => {
                // Consume as many key bytes as are available in one go.
                let available = chunk.len() - i;
                let take = available.min(*remaining as usize);
                buf.extend_from_slice(&chunk[i..i + take]);
                *remaining -= take as i64;
                if *remaining == 0 {
                    let key = std::mem::take(buf);
                    self.state = match key.as_slice() {
                        b"stdout" => State::ExpectValue { of: ValueKind::Stdout },
                        b"stderr" => State::ExpectValue { of: ValueKind::Stderr },
                        b"exitcode" => State::ExpectValue { of: ValueKind::ExitCode },
                        _ => return Err(ParseError::UnknownKey(UnknownKey(key))),
                    };
                }
                Ok(take)
            }

            State::ExpectValue { of } => {
                let of = *of;
                match (of, b) {
                    (ValueKind::ExitCode, b'i') => {
                        self.state = State::IntegerBody {
                            accum: 0,
                            negative: false,
                            started: false,
                        };
                        Ok(1)
                    }
                    (ValueKind::ExitCode, b'0'..=b'9') => Err(ParseErrorKind::UnexpectedString.into()),
                    (ValueKind::Stdout | ValueKind::Stderr, b'0'..=b'9') => {
                        self.state = State::ValueLength {
                            accum: i64::from(b - b'0'),
                            of,
                        };
                        Ok(1)
                    }
                    (_, b'i') => Err(ParseErrorKind::UnexpectedInteger.into()),
                    (_, b'l') => Err(ParseErrorKind::UnexpectedList.into()),
                    (_, b'd') => Err(ParseErrorKind::UnexpectedDictionary.into()),
                    _ => Err(ParseErrorKind::UnexpectedList.into()),
                }
            }

            State::ValueLength { accum, of } => {
                let of = *of;
                match b {
                    b'0'..=b'9' => {
                        *accum = grow_len(*accum, b)?;
                        Ok(1)
                    }
                    b':' => {
                        let remaining = *accum;
                        if remaining == 0 {
                            events.push(Event::Chunk(stream_of(of), Vec::new()));
                            self.state = State::ExpectKey;
                        } else {
                            self.state = State::ValueBody { remaining, of };
                        }
                        Ok(1)
                    }
                    _ => Err(ParseErrorKind::UnexpectedList.into()),
                }
            }

            State::ValueBody { remaining, of } => {
                // Forward as much of the current chunk as belongs to this
                // string body in a single event, rather than byte by byte.
                let of = *of;
                let available = chunk.len() - i;
                let take = available.min(*remaining as usize);
                events.push(Event::Chunk(stream_of(of), chunk[i..i + take].to_vec()));
                *remaining -= take as i64;
                if *remaining == 0 {
                    self.state = State::ExpectKey;
                }
                Ok(take)
            }

            State::IntegerBody {
                accum,
                negative,
                started,
            } => match b {
                b'-' if !*started => {
                    *negative = true;
                    *started = true;
                    Ok(1)
                }
                b'0'..=b'9' => {
                    *started = true;
                    let digit = i64::from(b - b'0');
                    *accum = accum
                        .checked_mul(10)
                        .and_then(|v| v.checked_add(digit))
                        .ok_or(ParseErrorKind::IntegerTooLong)?;
                    Ok(1)
                }
                b'e' => {
                    let value = if *negative { -*accum } else { *accum };
                    events.push(Event::ExitCode(value));
                    self.state = State::ExpectKey;
                    Ok(1)
                }
                _ => Err(ParseErrorKind::UnexpectedList.into()),
            },

            State::Finished | State::Failed => {
                unreachable!("terminal states are filtered in feed()")
            }
        }
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

fn stream_of(of: ValueKind) -> Stream {
    match of {
        ValueKind::Stdout => Stream::Stdout,
        ValueKind::Stderr => Stream::Stderr,
        ValueKind::ExitCode => unreachable!("exitcode never carries a string body"),
    }
}

fn grow_len(accum: i64, digit_byte: u8) -> Result<i64, ParseError> {
    let digit = i64::from(digit_byte - b'0');
    let next = accum
        .checked_mul(10)
        .and_then(|v| v.checked_add(digit))
        .ok_or(ParseErrorKind::StringTooLong)?;
    if next > MAX_STRING_LEN {
        return Err(ParseErrorKind::StringTooLong.into());
    }
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_all(input: &[u8]) -> Result<Vec<Event>, ParseError> {
        let mut parser = Parser::new();
        let mut events = Vec::new();
        parser.feed(input, &mut events)?;
        Ok(events)
    }

    fn parse_byte_by_byte(input: &[u8]) -> Result<Vec<Event>, ParseError> {
        let mut parser = Parser::new();
        let mut events = Vec::new();
        for &b in input {
            parser.feed(&[b], &mut events)?;
        }
        Ok(events)
    }

    #[test]
    fn exit_code_zero() {
        let events = parse_all(b"l8:exitcodei0ee").unwrap();
        assert_eq!(events, vec![Event::ExitCode(0), Event::EndOfMessage]);
    }

    #[test]
    fn exit_code_negative_is_rejected_by_caller_not_parser() {
        // The grammar allows a leading '-'; whether a negative code is a
        // legal process exit status is the termination controller's job.
        let events = parse_all(b"l8:exitcodei-1ee").unwrap();
        assert_eq!(events, vec![Event::ExitCode(-1), Event::EndOfMessage]);
    }

    #[test]
    fn stdout_and_exit_code() {
        let events = parse_all(b"l6:stdout11:some output8:exitcodei0ee").unwrap();
        assert_eq!(
            events,
            vec![
                Event::Chunk(Stream::Stdout, b"some output".to_vec()),
                Event::ExitCode(0),
                Event::EndOfMessage,
            ]
        );
    }

    #[test]
    fn boundary_invariance_byte_by_byte() {
        let whole = parse_all(b"l6:stdout11:some output8:exitcodei0ee").unwrap();
        let piecemeal = parse_byte_by_byte(b"l6:stdout11:some output8:exitcodei0ee").unwrap();
        // Byte-by-byte delivery fragments a single string body into many
        // one-byte Chunk events; coalesce before comparing against the
        // whole-buffer parse, which streams in larger pieces.
        assert_eq!(coalesce(whole), coalesce(piecemeal));
    }

    fn coalesce(events: Vec<Event>) -> Vec<Event> {
        let mut out: Vec<Event> = Vec::new();
        for ev in events {
            match (out.last_mut(), &ev) {
                (Some(Event::Chunk(s1, buf)), Event::Chunk(s2, more)) if s1 == s2 => {
                    buf.extend_from_slice(more);
                }
                _ => out.push(ev),
            }
        }
        out
    }

    #[test]
    fn zero_length_stdout_is_a_no_op_chunk() {
        let events = parse_all(b"l6:stdout0:8:exitcodei0ee").unwrap();
        assert_eq!(
            events,
            vec![
                Event::Chunk(Stream::Stdout, Vec::new()),
                Event::ExitCode(0),
                Event::EndOfMessage,
            ]
        );
    }

    #[test]
    fn duplicate_exit_code_parses_fine_parser_level() {
        // The parser has no opinion on "exactly one exit code"; that's the
        // termination controller's contract (see term.rs).
        let events = parse_all(b"l8:exitcodei0e8:exitcodei1ee").unwrap();
        assert_eq!(
            events,
            vec![
                Event::ExitCode(0),
                Event::ExitCode(1),
                Event::EndOfMessage,
            ]
        );
    }

    #[test]
    fn integer_too_long() {
        let mut input = b"l8:exitcodei".to_vec();
        input.extend(std::iter::repeat(b'9').take(50));
        input.extend(b"ee");
        let err = parse_all(&input).unwrap_err();
        assert_eq!(err, ParseError::Kind(ParseErrorKind::IntegerTooLong));
    }

    #[test]
    fn string_length_too_long() {
        let mut input = b"l6:stdout".to_vec();
        input.extend(std::iter::repeat(b'9').take(40));
        input.extend(b":string8:exitcodei0ee");
        let err = parse_all(&input).unwrap_err();
        assert_eq!(err, ParseError::Kind(ParseErrorKind::StringTooLong));
    }

    #[test]
    fn type_error_integer_for_string() {
        let err = parse_all(b"l6:stdouti0e8:exitcodei0ee").unwrap_err();
        assert_eq!(err, ParseError::Kind(ParseErrorKind::UnexpectedInteger));
    }

    #[test]
    fn unknown_key_without_outer_list() {
        let err = parse_all(b"10:invalidkey11:some_string8:exitcodei0ee").unwrap_err();
        match err {
            ParseError::UnknownKey(UnknownKey(name)) => assert_eq!(name, b"invalidkey"),
            other => panic!("expected UnknownKey, got {other:?}"),
        }
    }

    #[test]
    fn dictionary_rejected() {
        let err = parse_all(b"d8:exitcodei0ee").unwrap_err();
        assert_eq!(err, ParseError::Kind(ParseErrorKind::UnexpectedDictionary));
    }

    #[test]
    fn nested_list_rejected() {
        let err = parse_all(b"lle8:exitcodei0ee").unwrap_err();
        assert_eq!(err, ParseError::Kind(ParseErrorKind::UnexpectedList));
    }

    #[test]
    fn premature_end_before_top_list() {
        let err = parse_all(b"e").unwrap_err();
        assert_eq!(err, ParseError::Kind(ParseErrorKind::UnexpectedEnd));
    }

    #[test]
    fn missing_exit_code_is_not_the_parsers_job() {
        // `l6:stdout8:exitcodee`: the stdout value's own length prefix is
        // `8`, so its body consumes the literal bytes "exitcode"; the final
        // `e` then closes the top-level list with no `exitcode` pair ever
        // having been seen. The parser accepts this fine -- it's the
        // termination controller (term.rs) that must reject a run with no
        // exit code set.
        let events = parse_all(b"l6:stdout8:exitcodee").unwrap();
        assert_eq!(
            events,
            vec![
                Event::Chunk(Stream::Stdout, b"exitcode".to_vec()),
                Event::EndOfMessage,
            ]
        );
    }
}
