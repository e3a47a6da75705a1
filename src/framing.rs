//! Reassembly of line frames from the raw byte feed of the transport.
//!
//! The board writes `\n` terminated lines, but the transport hands them over in
//! whatever pieces the OS delivered: half a line, three lines and a bit, or
//! nothing at all. The [`Reassembler`] keeps the unterminated tail between
//! calls and only yields complete lines, with the newline stripped.
//!
//! **Example**
//! ```
//! use boardlink::framing::Reassembler;
//!
//! let mut reassembler = Reassembler::new();
//! assert_eq!(reassembler.feed(b"$ativa").count(), 0);
//! let frames: Vec<Vec<u8>> = reassembler.feed(b":3\nok\n").collect();
//! assert_eq!(frames, vec![b"$ativa:3".to_vec(), b"ok".to_vec()]);
//! ```

use log::trace;

const NEWLINE: u8 = b'\n';

// =============================================================================
// Public Interface
// =============================================================================

/// Turns an unbounded, fragmented byte stream into line frames.
///
/// One instance lives for the lifetime of one opened channel. The carry-over
/// buffer must be discarded with [`reset`](Reassembler::reset) whenever the
/// channel is closed or reopened, otherwise a partial line from the previous
/// session would be glued to the first line of the next one.
#[derive(Debug, Default)]
pub struct Reassembler {
    carry: Vec<u8>,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `bytes` to the carry-over buffer and return an iterator over the
    /// frames that are now complete.
    ///
    /// Frames are extracted lazily as the iterator is advanced. Frames that the
    /// caller does not pull stay buffered and are returned by the next call.
    pub fn feed(&mut self, bytes: &[u8]) -> Frames<'_> {
        if !bytes.is_empty() {
            self.carry.extend_from_slice(bytes);
            trace!(
                "fed {} bytes, {} bytes buffered",
                bytes.len(),
                self.carry.len()
            );
        }
        Frames {
            carry: &mut self.carry,
        }
    }

    /// Number of bytes of the current unterminated line.
    pub fn pending(&self) -> usize {
        self.carry.len()
    }

    /// Forget any partial line.
    pub fn reset(&mut self) {
        if !self.carry.is_empty() {
            trace!("discarding {} buffered bytes", self.carry.len());
        }
        self.carry.clear();
    }
}

/// Lazy iterator over the complete frames of a [`Reassembler`], returned by
/// [`Reassembler::feed`].
#[derive(Debug)]
pub struct Frames<'a> {
    carry: &'a mut Vec<u8>,
}

impl Iterator for Frames<'_> {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Vec<u8>> {
        let end = self.carry.iter().position(|&b| b == NEWLINE)?;
        let mut frame: Vec<u8> = self.carry.drain(..=end).collect();
        frame.pop();
        Some(frame)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
