//! Errors surfaced by `boardlink` to its callers.
//!
//! Only transport related failures escape the library. Malformed frames
//! received from the board are dropped by the classifier and never show up
//! here.

use std::io;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Port enumeration found nothing connected to the host.
    #[error("no serial device connected")]
    NoDevice,

    /// Devices are connected but none of them has the requested USB vendor id.
    #[error("no connected device with vendor id {vendor_id}")]
    NoMatchingDevice { vendor_id: u16 },

    /// The transport could not be opened (after retries, for serial ports).
    #[error("failed to open `{path}`: {source}")]
    TransportOpen {
        path: String,
        #[source]
        source: io::Error,
    },

    /// The transport refused a write. The bytes stay pending in the engine.
    #[error("write to the board failed: {0}")]
    TransportWrite(#[source] io::Error),

    /// The transport stopped accepting bytes in the middle of a chunk and the
    /// remainder was dropped.
    #[error("only {written} of {requested} bytes were written, the rest was dropped")]
    PartialWrite { written: usize, requested: usize },

    /// An operation needed an attached transport but the link is closed.
    #[error("the link is not open")]
    NotOpen,

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<serialport::Error> for Error {
    fn from(err: serialport::Error) -> Self {
        Error::Io(err.into())
    }
}
