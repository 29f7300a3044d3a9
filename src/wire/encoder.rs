//! Frames local stdin reads into the outbound wire form.
//!
//! The only pair the client ever emits is the key `stdin` with a byte string
//! value: `5:stdin<N>:<chunk bytes>`. On local EOF it appends the single
//! sentinel byte `e` that closes the client's outbound list.

const STDIN_KEY: &[u8] = b"5:stdin";
const SENTINEL: u8 = b'e';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    EofSeen,
    SentinelFlushed,
}

/// Encodes stdin chunks into frames appended to an outbound byte sink.
#[derive(Debug)]
pub struct StdinEncoder {
    state: State,
}

impl StdinEncoder {
    pub fn new() -> Self {
        Self { state: State::Open }
    }

    /// Encodes one non-empty chunk read from local stdin, appending the
    /// resulting frame to `out`. A zero-length chunk is a caller bug (EOF is
    /// signalled separately via [`Self::close`]) and is a no-op here.
    pub fn encode_chunk(&mut self, chunk: &[u8], out: &mut Vec<u8>) {
        if chunk.is_empty() {
            return;
        }
        out.extend_from_slice(STDIN_KEY);
        out.extend_from_slice(chunk.len().to_string().as_bytes());
        out.push(b':');
        out.extend_from_slice(chunk);
    }

    /// Signals local stdin EOF, appending the sentinel exactly once.
    pub fn close(&mut self, out: &mut Vec<u8>) {
        if self.state == State::Open {
            out.push(SENTINEL);
            self.state = State::EofSeen;
        }
    }

    /// Called once the sentinel byte has actually been written to the
    /// socket, so a second `close()` (there shouldn't be one) stays inert.
    pub fn note_sentinel_flushed(&mut self) {
        if self.state == State::EofSeen {
            self.state = State::SentinelFlushed;
        }
    }
}

impl Default for StdinEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_chunk_frame() {
        let mut enc = StdinEncoder::new();
        let mut out = Vec::new();
        enc.encode_chunk(b"some input", &mut out);
        assert_eq!(out, b"5:stdin10:some input");
    }

    #[test]
    fn eof_appends_sentinel_once() {
        let mut enc = StdinEncoder::new();
        let mut out = Vec::new();
        enc.encode_chunk(b"some input", &mut out);
        enc.close(&mut out);
        enc.close(&mut out);
        assert_eq!(out, b"5:stdin10:some inpute");
    }

    #[test]
    fn empty_chunk_is_not_framed() {
        let mut enc = StdinEncoder::new();
        let mut out = Vec::new();
        enc.encode_chunk(b"", &mut out);
        assert!(out.is_empty());
    }
}
