//! Termination controller: enforces the "exactly one exit code" rule and
//! synthesises the final process exit status.

use crate::error::ProtocolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitCodeCell {
    Unset,
    Set(i32),
}

/// Tracks the `exitcode` / `EndOfMessage` protocol and produces the exit
/// status the process should terminate with.
#[derive(Debug)]
pub struct Termination {
    cell: ExitCodeCell,
    end_of_message: bool,
}

impl Termination {
    pub fn new() -> Self {
        Self {
            cell: ExitCodeCell::Unset,
            end_of_message: false,
        }
    }

    /// Records a server-sent `exitcode`. The second call on a given run is a
    /// protocol violation.
    pub fn set_exit_code(&mut self, code: i64) -> Result<(), ProtocolError> {
        if matches!(self.cell, ExitCodeCell::Set(_)) {
            return Err(ProtocolError::MultipleExitCodes);
        }
        // POSIX exit statuses are 8 bits wide; user-supplied codes are
        // reduced modulo 256, matching the platform's own truncation.
        let clamped = code.rem_euclid(256) as i32;
        self.cell = ExitCodeCell::Set(clamped);
        Ok(())
    }

    /// Records that the server's top-level list has closed.
    pub fn note_end_of_message(&mut self) {
        self.end_of_message = true;
    }

    pub fn end_of_message_seen(&self) -> bool {
        self.end_of_message
    }

    /// Consumes the controller once all local write buffers have drained,
    /// producing the exit code the process should use, or the fatal error
    /// that should map to the reserved internal-failure exit code.
    pub fn finish(self) -> Result<i32, ProtocolError> {
        if !self.end_of_message {
            return Err(ProtocolError::CommunicationTerminated);
        }
        match self.cell {
            ExitCodeCell::Set(code) => Ok(code),
            ExitCodeCell::Unset => Err(ProtocolError::CommunicationTerminated),
        }
    }
}

impl Default for Termination {
    fn default() -> Self {
        Self::new()
    }
}
