//! The I/O multiplexer: a single-threaded, readiness-based event loop that
//! shuttles bytes between the socket and the three local stdio descriptors
//! without blocking or deadlocking.
//!
//! There is exactly one task here. `tokio::select!` plays the role of the
//! platform readiness multiplexor (poll/epoll/kqueue): each iteration picks
//! whichever one of socket-read, stdin-read, socket-write, stdout-write, or
//! stderr-write is ready first, services it, and loops. No descriptor is
//! ever touched by more than one in-flight operation, so the ordering
//! guarantees in the design notes fall out for free.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::buffer::{PendingWrite, HIGH_WATER_MARK, READ_CHUNK_SIZE};
use crate::error::{ClientError, ProtocolError};
use crate::term::Termination;
use crate::wire::encoder::StdinEncoder;
use crate::wire::parser::Parser;
use crate::wire::{Event, Stream};

/// Runs the duplex shim to completion, returning the exit code the process
/// should terminate with, or the fatal error that should map to 255.
///
/// Generic over the four descriptors so tests can swap in in-memory pipes
/// for the socket and stdio streams without spawning a real process.
pub async fn run<Sock, In, Out, Err>(
    socket: Sock,
    mut stdin: In,
    mut stdout: Out,
    mut stderr: Err,
) -> Result<i32, ClientError>
where
    Sock: AsyncRead + AsyncWrite + Unpin,
    In: AsyncRead + Unpin,
    Out: AsyncWrite + Unpin,
    Err: AsyncWrite + Unpin,
{
    let (mut socket_r, mut socket_w) = tokio::io::split(socket);

    let mut parser = Parser::new();
    let mut encoder = StdinEncoder::new();
    let mut term = Termination::new();

    let mut socket_out = PendingWrite::new();
    let mut stdout_buf = PendingWrite::new();
    let mut stderr_buf = PendingWrite::new();

    let mut socket_readable = true;
    let mut stdin_readable = true;
    let mut socket_write_shutdown = false;

    let mut socket_chunk = vec![0u8; READ_CHUNK_SIZE];
    let mut stdin_chunk = vec![0u8; READ_CHUNK_SIZE];

    // Run the event loop in its own block so that any fatal `?` below still
    // falls through to the drain-and-flush step: bytes the server already
    // sent into stdout_buf/stderr_buf must reach the real descriptors even
    // when a later event on the same connection turns out to be fatal.
    let loop_result: Result<(), ClientError> = async {
        loop {
            if term.end_of_message_seen()
                && socket_out.is_empty()
                && stdout_buf.is_empty()
                && stderr_buf.is_empty()
            {
                return Ok(());
            }

            let parser_paused = stdout_buf.is_over_high_water() || stderr_buf.is_over_high_water();

            tokio::select! {
                biased;

                result = socket_r.read(&mut socket_chunk),
                    if socket_readable && !parser.is_terminal() && !parser_paused =>
                {
                    let n = result?;
                    if n == 0 {
                        socket_readable = false;
                        if !parser.is_finished() {
                            tracing::error!("socket closed before end of message");
                            return Err(ProtocolError::CommunicationTerminated.into());
                        }
                        continue;
                    }
                    let mut events = Vec::new();
                    parser.feed(&socket_chunk[..n], &mut events)?;
                    for event in events {
                        match event {
                            Event::Chunk(Stream::Stdout, bytes) => stdout_buf.push_owned(bytes),
                            Event::Chunk(Stream::Stderr, bytes) => stderr_buf.push_owned(bytes),
                            Event::ExitCode(code) => {
                                tracing::debug!(code, "exit code received");
                                term.set_exit_code(code)?;
                            }
                            Event::EndOfMessage => {
                                tracing::debug!("end of message received");
                                socket_readable = false;
                                term.note_end_of_message();
                            }
                        }
                    }
                }

                result = stdin.read(&mut stdin_chunk),
                    if stdin_readable && socket_out.len() < HIGH_WATER_MARK =>
                {
                    let n = result?;
                    let mut framed = Vec::new();
                    if n == 0 {
                        tracing::debug!("local stdin reached eof");
                        stdin_readable = false;
                        encoder.close(&mut framed);
                    } else {
                        encoder.encode_chunk(&stdin_chunk[..n], &mut framed);
                    }
                    socket_out.push_owned(framed);
                }

                result = socket_w.write(socket_out.front_slice()), if !socket_out.is_empty() => {
                    let n = result?;
                    socket_out.consume(n);
                    if socket_out.is_empty() && !stdin_readable && !socket_write_shutdown {
                        encoder.note_sentinel_flushed();
                        let _ = socket_w.shutdown().await;
                        socket_write_shutdown = true;
                    }
                }

                result = stdout.write(stdout_buf.front_slice()), if !stdout_buf.is_empty() => {
                    let n = result?;
                    stdout_buf.consume(n);
                }

                result = stderr.write(stderr_buf.front_slice()), if !stderr_buf.is_empty() => {
                    let n = result?;
                    stderr_buf.consume(n);
                }
            }
        }
    }
    .await;

    drain_best_effort(&mut stdout_buf, &mut stdout).await;
    drain_best_effort(&mut stderr_buf, &mut stderr).await;
    let _ = stdout.flush().await;
    let _ = stderr.flush().await;

    loop_result?;
    Ok(term.finish()?)
}

/// Writes out whatever is left in `buf` on a best-effort basis. Used on the
/// way out of the event loop so bytes already buffered for a local sink are
/// not lost just because the connection ended in a fatal error; a write
/// failure here is not itself reported, since the loop's own error (if any)
/// already explains the exit.
async fn drain_best_effort<W: AsyncWrite + Unpin>(buf: &mut PendingWrite, sink: &mut W) {
    while !buf.is_empty() {
        match sink.write(buf.front_slice()).await {
            Ok(0) => break,
            Ok(n) => buf.consume(n),
            Err(_) => break,
        }
    }
}
