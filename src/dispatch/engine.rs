//! The dispatch engine draining the command queue into the transport.

use std::io;

use log::{debug, error, trace, warn};

use super::queue::CommandQueue;
use super::states::*;
use crate::error::{Error, Result};
use crate::transport::Transport;

const NEWLINE: u8 = b'\n';

// =============================================================================
// Public Interface
// =============================================================================

/// Drains the [`CommandQueue`] into a [`Transport`], one write at a time.
///
/// The engine is purely reactive: it writes when a buffer is submitted while
/// nothing is in flight, and when the board acknowledges a line. Every call
/// returns as soon as the engine has to wait for the board.
///
/// The transport is passed to each call instead of being owned, so that the
/// owner of the link can close and replace it while keeping the engine.
#[derive(Debug, Default)]
pub struct DispatchEngine {
    queue: CommandQueue,
    /// The buffer currently being streamed, with the already written prefix
    /// removed. Never holds an empty buffer.
    pending: Option<Vec<u8>>,
    state: DispatchState,
    /// Bytes of the current special block still to be written, closing
    /// delimiter included. Only meaningful while streaming a block.
    block_remaining: usize,
    stats: DispatchStats,
}

impl DispatchEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Number of submitted buffers not yet started.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Whether a partially written buffer is in flight.
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Bytes of the in-flight buffer not written yet, synthetic block
    /// delimiters included.
    pub fn pending_len(&self) -> usize {
        self.pending.as_ref().map_or(0, Vec::len)
    }

    /// `true` when there is nothing left to write and nothing to wait for.
    pub fn is_drained(&self) -> bool {
        self.state == DispatchState::Idle && self.pending.is_none() && self.queue.is_empty()
    }

    /// Queue `buffer` for dispatch. If nothing is waiting for an
    /// acknowledgment, dispatch starts right away; otherwise the buffer waits
    /// its turn. Empty buffers are ignored.
    pub fn submit<T: Transport + ?Sized>(
        &mut self,
        buffer: Vec<u8>,
        transport: &mut T,
    ) -> Result<()> {
        if buffer.is_empty() {
            debug!("ignoring empty command");
            return Ok(());
        }
        self.queue.submit(buffer);
        if self.state == DispatchState::AwaitingAck {
            trace!("command queued, {} waiting", self.queue.len());
            return Ok(());
        }
        self.pump(transport)
    }

    /// The board acknowledged the last line. Continue with the next line of the
    /// pending buffer, or the next queued buffer, or go idle.
    ///
    /// Ignored unless a line is waiting for its acknowledgment.
    pub fn on_acknowledgment<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<()> {
        if self.state != DispatchState::AwaitingAck {
            trace!("ignoring acknowledgment while {}", self.state);
            return Ok(());
        }
        self.stats.acknowledgments += 1;
        self.state = DispatchState::Idle;
        self.pump(transport)
    }

    /// Restart dispatch after a failed write. Does nothing while a line is
    /// waiting for its acknowledgment.
    pub fn resume<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<()> {
        if self.state == DispatchState::AwaitingAck {
            return Ok(());
        }
        self.pump(transport)
    }

    /// Force the engine back to `Idle`, dropping the pending buffer and the
    /// queue. Used when the channel is closed.
    pub fn reset(&mut self) {
        let dropped = self.queue.clear() + usize::from(self.pending.take().is_some());
        if dropped > 0 {
            warn!("dropping {} undelivered command(s)", dropped);
        }
        self.state = DispatchState::Idle;
        self.block_remaining = 0;
    }

    // -------------------------------------------------------------------------
    // Private stuff
    // -------------------------------------------------------------------------

    /// Keep writing until the engine has to wait for an acknowledgment or runs
    /// out of data. Special-block chunks go out back-to-back.
    fn pump<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<()> {
        loop {
            if self.state == DispatchState::AwaitingAck {
                return Ok(());
            }
            if self.pending.is_none() {
                match self.queue.pop_front() {
                    Some(next) => self.pending = Some(next),
                    None => {
                        if self.state != DispatchState::Idle {
                            debug!("{} -> idle", self.state);
                        }
                        self.state = DispatchState::Idle;
                        return Ok(());
                    }
                }
            }
            self.dispatch_next(transport)?;
        }
    }

    /// Perform exactly one write from the pending buffer.
    fn dispatch_next<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<()> {
        let mut buffer = match self.pending.take() {
            Some(buffer) => buffer,
            None => return Ok(()),
        };
        let result = self.write_from(&mut buffer, transport);
        if buffer.is_empty() {
            self.stats.buffers_completed += 1;
        } else {
            self.pending = Some(buffer);
        }
        result
    }

    fn write_from<T: Transport + ?Sized>(
        &mut self,
        buffer: &mut Vec<u8>,
        transport: &mut T,
    ) -> Result<()> {
        if !matches!(self.state, DispatchState::StreamingSpecialBlock { .. }) {
            self.enter_block_if_opened(buffer);
        }

        if let DispatchState::StreamingSpecialBlock { delimiter } = self.state {
            let len = self.block_remaining.min(MAX_CHUNK);
            let mut sent = 0;
            let result = self.write_chunk(transport, &buffer[..len], &mut sent);
            // On failure only what reached the wire is consumed, the rest goes
            // out on resume. The rest of a stalled chunk is dropped.
            let consumed = if result.is_ok() { len } else { sent };
            buffer.drain(..consumed);
            self.block_remaining -= consumed;
            result?;
            self.stats.chunks_sent += 1;
            if self.block_remaining == 0 {
                debug!("block `{}` closed", char::from(delimiter));
                self.state = DispatchState::Idle;
            }
            return Ok(());
        }

        // At least one byte goes out, even when the newline is the first byte.
        let (line_len, consumed) = match buffer.iter().position(|&b| b == NEWLINE) {
            Some(index) => (index.max(1), index + 1),
            None => (buffer.len(), buffer.len()),
        };
        let mut line = Vec::with_capacity(line_len + 1);
        line.extend_from_slice(&buffer[..line_len]);
        line.push(NEWLINE);

        let mut sent = 0;
        if let Err(err) = self.write_chunk(transport, &line, &mut sent) {
            // The board got the first `sent` bytes of the line, resume with
            // the rest of it.
            buffer.drain(..sent.min(consumed));
            self.state = DispatchState::Idle;
            return Err(err);
        }
        buffer.drain(..consumed);
        self.stats.lines_sent += 1;
        self.state = DispatchState::AwaitingAck;
        Ok(())
    }

    /// Switch to block streaming if `buffer` starts with a sentinel. The close
    /// is the next occurrence of the sentinel after the opening byte; a buffer
    /// that was never closed by its producer gets a synthetic delimiter so the
    /// block always terminates.
    fn enter_block_if_opened(&mut self, buffer: &mut Vec<u8>) {
        let delimiter = match buffer.first() {
            Some(&first) if is_sentinel(first) => first,
            _ => return,
        };
        let close = match buffer[1..].iter().position(|&b| b == delimiter) {
            Some(offset) => offset + 1,
            None => {
                debug!(
                    "block `{}` is not closed, appending the delimiter",
                    char::from(delimiter)
                );
                buffer.push(delimiter);
                buffer.len() - 1
            }
        };
        self.block_remaining = close + 1;
        self.state = DispatchState::StreamingSpecialBlock { delimiter };
        debug!(
            "block `{}` opened, {} bytes",
            char::from(delimiter),
            self.block_remaining
        );
    }

    /// Write `bytes` to the transport, retrying the remainder as long as the
    /// transport makes progress. `sent` counts the bytes that went out, also
    /// when an error is returned.
    ///
    /// A transport error is always returned to the caller. A transport that
    /// stalls after taking part of the chunk gets the rest of it dropped; one
    /// that takes nothing at all is a failure.
    fn write_chunk<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        bytes: &[u8],
        sent: &mut usize,
    ) -> Result<()> {
        *sent = 0;
        let result = loop {
            if *sent == bytes.len() {
                break Ok(());
            }
            match transport.write(&bytes[*sent..]) {
                Ok(0) if *sent == 0 => {
                    break Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "transport accepted no bytes",
                    ))
                }
                Ok(0) => break Ok(()),
                Ok(count) => *sent += count.min(bytes.len() - *sent),
                Err(ref err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => break Err(err),
            }
        };
        self.stats.bytes_written += *sent as u64;
        if let Err(err) = result {
            error!(
                "write to {} failed after {} of {} bytes: {}",
                transport.name(),
                sent,
                bytes.len(),
                err
            );
            return Err(Error::TransportWrite(err));
        }
        if *sent < bytes.len() {
            self.stats.partial_writes += 1;
            warn!(
                "{}",
                Error::PartialWrite {
                    written: *sent,
                    requested: bytes.len(),
                }
            );
        }
        trace!("{} bytes written to {}", sent, transport.name());
        Ok(())
    }
}
