//! A bounded, exclusively-owned byte buffer for one output sink.
//!
//! Each of the three local write sinks (socket-out, stdout, stderr) gets one
//! of these. It is a plain growable queue with a high-water mark; exceeding
//! the mark is a signal for the multiplexer to stop advancing the producer
//! feeding it (backpressure), not a hard capacity limit -- a single large
//! `stdout` chunk must still fit.

use std::collections::VecDeque;

/// Soft fill threshold above which the multiplexer pauses the upstream
/// producer writing into a given buffer.
pub const HIGH_WATER_MARK: usize = 256 * 1024;

/// Size of each read from the socket or local stdin.
pub const READ_CHUNK_SIZE: usize = 16 * 1024;

#[derive(Debug, Default)]
pub struct PendingWrite {
    bytes: VecDeque<u8>,
}

impl PendingWrite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, data: &[u8]) {
        self.bytes.extend(data.iter().copied());
    }

    pub fn push_owned(&mut self, data: Vec<u8>) {
        self.bytes.extend(data);
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_over_high_water(&self) -> bool {
        self.bytes.len() > HIGH_WATER_MARK
    }

    /// A contiguous slice of the front of the queue, suitable for a single
    /// non-blocking write attempt. May be shorter than the full backlog if
    /// the queue has wrapped internally; callers loop via `consume`.
    pub fn front_slice(&self) -> &[u8] {
        self.bytes.as_slices().0
    }

    pub fn consume(&mut self, n: usize) {
        self.bytes.drain(..n);
    }
}
