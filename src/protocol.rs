//! Classification of the lines received from the board.
//!
//! The board speaks a small line-oriented ASCII protocol:
//!
//! * `$<name>:<value>` is a status frame updating the value of a status key,
//! * the literal line `ok` acknowledges the last command line sent,
//! * anything else is opaque log text meant for the operator.
//!
//! Malformed status frames (no `:` or an empty value) are dropped here and
//! never reach the callers.

use log::trace;

const STATUS_MARKER: u8 = b'$';
const STATUS_SEPARATOR: u8 = b':';
const ACKNOWLEDGMENT: &[u8] = b"ok";

// =============================================================================
// Public Interface
// =============================================================================

/// A classified line received from the board.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Message {
    /// A status key changed its value.
    StatusUpdate { name: String, value: String },
    /// The board finished executing the last command line.
    Acknowledgment,
    /// Text to be shown as is.
    LogLine(Vec<u8>),
}

/// Classify one frame. Returns `None` when the frame is a malformed status
/// frame, which is silently discarded.
///
/// **Example**
/// ```
/// use boardlink::protocol::{classify, Message};
///
/// assert_eq!(classify(b"ok"), Some(Message::Acknowledgment));
/// assert_eq!(classify(b"$empty:"), None);
/// ```
pub fn classify(frame: &[u8]) -> Option<Message> {
    match frame.split_first() {
        None => Some(Message::LogLine(Vec::new())),
        Some((&STATUS_MARKER, rest)) => parse_status(rest),
        Some(_) if frame == ACKNOWLEDGMENT => Some(Message::Acknowledgment),
        Some(_) => Some(Message::LogLine(frame.to_vec())),
    }
}

// =============================================================================
// Private stuff
// =============================================================================

fn parse_status(body: &[u8]) -> Option<Message> {
    let separator = match body.iter().position(|&b| b == STATUS_SEPARATOR) {
        Some(index) if index + 1 < body.len() => index,
        _ => {
            trace!("dropping malformed status frame ${}", latin1(body));
            return None;
        }
    };
    Some(Message::StatusUpdate {
        name: latin1(&body[..separator]),
        value: latin1(&body[separator + 1..]),
    })
}

/// The board emits 8-bit text; map every byte to the code point of the same
/// value so that nothing is ever rejected.
fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
