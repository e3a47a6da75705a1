//! Boardlink bridges a host and an embedded controller board (CNC-style) over
//! a byte-oriented duplex channel: a local serial device or a byte pipe bridged
//! by the OS.
//!
//! The board speaks a line-oriented ASCII protocol. Everything it sends is one
//! of:
//!
//! * a status frame `$<name>:<value>`, updating one status key,
//! * the literal line `ok`, acknowledging the last command line,
//! * anything else, which is log text for the operator.
//!
//! The host sends two kinds of payload through the same queue:
//!
//! * G-code lines, newline terminated and written one at a time, each waiting
//!   for the board's `ok` before the next one goes out,
//! * special blocks opened by `#`, `%` or `$` and closed by the same byte,
//!   streamed raw in chunks that fit the board's 64 byte receive buffer,
//!   without waiting for acknowledgments.
//!
//! The work is split in small pieces, leaves first:
//!
//! * [`framing`] rebuilds lines from the fragmented byte stream,
//! * [`protocol`] classifies each line,
//! * [`dispatch`] holds the command queue and the flow-control state machine,
//! * [`transport`] abstracts the byte channel and finds the board,
//! * [`sinks`] receives status updates and log lines,
//! * [`Link`] owns one of each and routes events between them, on a single
//!   thread.
//!
//! There is no global state: the front end builds one [`Link`] and feeds it
//! [`LinkEvent`]s.

#[macro_use]
mod macros;

pub mod dispatch;
mod error;
pub mod framing;
mod link;
pub mod protocol;
mod settings;
pub mod sinks;
pub mod transport;

pub use dispatch::{DispatchEngine, DispatchState};
pub use error::{Error, Result};
pub use link::{Flow, Link, LinkEvent};
pub use settings::{
    DataBits, FlowControl, Parity, Settings, SettingsBuilder, StopBits, TransportKind,
    DEFAULT_VENDOR_ID,
};
pub use sinks::{LogSink, StatusBoard, StatusSink};
pub use transport::Transport;
