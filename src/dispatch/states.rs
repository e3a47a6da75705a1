//! States of the dispatch engine and the constants of the outbound wire
//! format.
//!
//! Refer to the [`dispatch`](crate::dispatch) module for an overview of the
//! states and their transitions.

use std::fmt;

/// Leading bytes that open a raw streaming block on outbound buffers. The
/// block ends at the next occurrence of the same byte.
///
/// This only applies to what the host sends. The `$` marking inbound status
/// frames is handled by [`protocol`](crate::protocol) and has nothing to do
/// with this set.
pub const SENTINELS: [u8; 3] = [b'#', b'%', b'$'];

/// Size of the board's receive buffer. No special-block chunk is ever larger.
pub const MAX_CHUNK: usize = 64;

/// Whether `byte` opens a special block when it leads an outbound buffer.
pub fn is_sentinel(byte: u8) -> bool {
    SENTINELS.contains(&byte)
}

/// The state of the [`DispatchEngine`](super::DispatchEngine).
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum DispatchState {
    /// Nothing is in flight; the next submission is written immediately.
    Idle,
    /// A command line was written and the board has not acknowledged it yet.
    AwaitingAck,
    /// A special block is being streamed. The delimiter is fixed when the block
    /// is entered and cleared once the closing delimiter has been written.
    StreamingSpecialBlock { delimiter: u8 },
}

impl Default for DispatchState {
    fn default() -> Self {
        DispatchState::Idle
    }
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchState::Idle => write!(f, "idle"),
            DispatchState::AwaitingAck => write!(f, "awaiting ack"),
            DispatchState::StreamingSpecialBlock { delimiter } => {
                write!(f, "streaming block `{}`", char::from(*delimiter))
            }
        }
    }
}

/// Counters kept by the engine, for progress reporting.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub struct DispatchStats {
    /// Acknowledgment-gated lines written.
    pub lines_sent: u64,
    /// Special-block chunks written.
    pub chunks_sent: u64,
    /// Total bytes accepted by the transport, newlines included.
    pub bytes_written: u64,
    /// Acknowledgments that released a line.
    pub acknowledgments: u64,
    /// Writes whose remainder was dropped because the transport stalled.
    pub partial_writes: u64,
    /// Submitted buffers written out entirely.
    pub buffers_completed: u64,
}

#[test]
fn sentinels() {
    assert!(is_sentinel(b'#'));
    assert!(is_sentinel(b'%'));
    assert!(is_sentinel(b'$'));
    assert!(!is_sentinel(b'G'));
    assert!(!is_sentinel(b'\n'));
}

#[test]
fn display() {
    assert_eq!(DispatchState::Idle.to_string(), "idle");
    assert_eq!(
        DispatchState::StreamingSpecialBlock { delimiter: b'%' }.to_string(),
        "streaming block `%`"
    );
}
