//! The link with the board: the one place owning the whole session state.
//!
//! A [`Link`] is built once at startup and owns the transport, the
//! [`Reassembler`], the [`DispatchEngine`] and the two sinks. It is driven from
//! a single thread, either by calling its methods directly or by feeding it
//! [`LinkEvent`]s from a channel with [`Link::run`]. Anything happening on
//! other threads (transport readers, user input, signal handlers) must go
//! through that channel:
//!
//! ```text
//!   reader thread --Received--.
//!   input thread  --Submit----+--> mpsc --> Link::run --> Reassembler -> classify
//!   Ctrl+C        --Shutdown--'                 |              |
//!                                               |     status / log / ack
//!                                               v              v
//!                                        DispatchEngine <------'
//!                                               |
//!                                               v
//!                                          Transport::write
//! ```
//!
//! **Example**
//! ```no_run
//! use std::sync::mpsc;
//! use boardlink::{transport, Link, SettingsBuilder, StatusBoard};
//!
//! let settings = SettingsBuilder::new().finalize();
//! let (tx, rx) = mpsc::channel();
//! let mut link = Link::new(StatusBoard::new(), Vec::<Vec<u8>>::new());
//! link.attach(transport::open(&settings, tx.clone()).unwrap());
//! tx.send(boardlink::LinkEvent::Submit(b"G28\n".to_vec())).unwrap();
//! let status = link.run(&rx, |_| {});
//! ```

use std::sync::mpsc::Receiver;

use hexplay::HexViewBuilder;
use log::{debug, error, info, log_enabled, trace, warn, Level::Trace};

use crate::dispatch::DispatchEngine;
use crate::error::{Error, Result};
use crate::framing::Reassembler;
use crate::protocol::{classify, Message};
use crate::sinks::{LogSink, StatusSink};
use crate::transport::Transport;

// =============================================================================
// Public Interface
// =============================================================================

/// Everything that can happen to a link, delivered in order to the thread that
/// owns it.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum LinkEvent {
    /// A chunk of bytes arrived from the board.
    Received(Vec<u8>),
    /// A buffer to queue for dispatch.
    Submit(Vec<u8>),
    /// Bytes to write right away, outside of the queue and of flow control.
    SendRaw(Vec<u8>),
    /// The transport went away.
    Disconnected,
    /// The user asked to stop.
    Shutdown,
}

/// What [`Link::handle`] wants the event loop to do next.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Flow {
    Continue,
    /// The link is closed; `with_error` is set when the transport was lost
    /// rather than shut down on request.
    Stop { with_error: bool },
}

/// The session with one board.
pub struct Link {
    transport: Option<Box<dyn Transport>>,
    reassembler: Reassembler,
    engine: DispatchEngine,
    status: Box<dyn StatusSink>,
    log: Box<dyn LogSink>,
}

impl Link {
    pub fn new(status: impl StatusSink + 'static, log: impl LogSink + 'static) -> Self {
        Link {
            transport: None,
            reassembler: Reassembler::new(),
            engine: DispatchEngine::new(),
            status: Box::new(status),
            log: Box::new(log),
        }
    }

    /// Start a session over an opened transport. A transport already attached
    /// is closed first; the engine and the reassembler start from scratch.
    pub fn attach(&mut self, transport: Box<dyn Transport>) {
        if self.transport.is_some() {
            if let Err(err) = self.close() {
                warn!("error closing the previous transport: {}", err);
            }
        }
        info!("link open on {}", transport.name());
        self.reassembler.reset();
        self.engine.reset();
        self.transport = Some(transport);
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    pub fn engine(&self) -> &DispatchEngine {
        &self.engine
    }

    /// Queue `buffer` for dispatch; it is written right away if nothing waits
    /// for an acknowledgment.
    pub fn submit(&mut self, buffer: Vec<u8>) -> Result<()> {
        let transport = self.transport.as_mut().ok_or(Error::NotOpen)?;
        self.engine.submit(buffer, &mut **transport)
    }

    /// Restart dispatch after a write failure.
    pub fn resume(&mut self) -> Result<()> {
        let transport = self.transport.as_mut().ok_or(Error::NotOpen)?;
        self.engine.resume(&mut **transport)
    }

    /// Write `bytes` directly, bypassing the queue. Used for one-shot requests
    /// such as asking the board for its default recipe. Returns the number of
    /// bytes written.
    pub fn send_raw(&mut self, bytes: &[u8]) -> Result<usize> {
        let transport = self.transport.as_mut().ok_or(Error::NotOpen)?;
        match transport.write(bytes) {
            Ok(written) => {
                if written < bytes.len() {
                    warn!(
                        "{}",
                        Error::PartialWrite {
                            written,
                            requested: bytes.len(),
                        }
                    );
                } else {
                    debug!("sent {} raw bytes", written);
                }
                Ok(written)
            }
            Err(err) => {
                error!("raw write to {} failed: {}", transport.name(), err);
                Err(Error::TransportWrite(err))
            }
        }
    }

    /// Process bytes received from the board: reassemble lines, classify them
    /// and route them to the sinks and the engine.
    ///
    /// All complete lines are processed even if a write triggered by an
    /// acknowledgment fails; the first such error is returned at the end.
    pub fn on_readable(&mut self, bytes: &[u8]) -> Result<()> {
        let Link {
            transport,
            reassembler,
            engine,
            status,
            log,
        } = self;
        let transport = match transport.as_mut() {
            Some(transport) => transport,
            None => {
                trace!("dropping {} bytes received while closed", bytes.len());
                return Ok(());
            }
        };

        if log_enabled!(Trace) {
            let view = HexViewBuilder::new(bytes)
                .address_offset(0)
                .row_width(16)
                .finish();
            trace!("received from {}:\n{}", transport.name(), view);
        }

        let mut first_error = None;
        for frame in reassembler.feed(bytes) {
            match classify(&frame) {
                Some(Message::StatusUpdate { name, value }) => status.update(&name, &value),
                Some(Message::Acknowledgment) => {
                    if let Err(err) = engine.on_acknowledgment(&mut **transport) {
                        first_error.get_or_insert(err);
                    }
                }
                Some(Message::LogLine(text)) => log.append(&text),
                None => {}
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Close the transport and bring the engine back to `Idle`, dropping
    /// whatever was not delivered yet.
    pub fn close(&mut self) -> Result<()> {
        let result = match self.transport.take() {
            Some(mut transport) => {
                info!("link on {} closed", transport.name());
                transport.close().map_err(Error::from)
            }
            None => Ok(()),
        };
        self.engine.reset();
        self.reassembler.reset();
        result
    }

    /// The link stops whether or not the transport closed cleanly.
    fn close_for_stop(&mut self) {
        if let Err(err) = self.close() {
            warn!("error closing the link: {}", err);
        }
    }

    /// Apply one event. `Disconnected` and `Shutdown` always stop the link,
    /// an error closing the transport is only logged.
    pub fn handle(&mut self, event: LinkEvent) -> Result<Flow> {
        match event {
            LinkEvent::Received(bytes) => self.on_readable(&bytes).map(|_| Flow::Continue),
            LinkEvent::Submit(buffer) => self.submit(buffer).map(|_| Flow::Continue),
            LinkEvent::SendRaw(bytes) => self.send_raw(&bytes).map(|_| Flow::Continue),
            LinkEvent::Disconnected => {
                self.close_for_stop();
                Ok(Flow::Stop { with_error: true })
            }
            LinkEvent::Shutdown => {
                self.close_for_stop();
                Ok(Flow::Stop { with_error: false })
            }
        }
    }

    /// The link event loop runs until the transport goes away or a `Shutdown`
    /// event arrives. Errors are logged and do not stop the loop. Returns an
    /// exit status: **`0`** after a requested shutdown, otherwise **`1`**.
    ///
    /// `after_each` is called after every event, to let the caller report
    /// progress.
    pub fn run(&mut self, events: &Receiver<LinkEvent>, mut after_each: impl FnMut(&Link)) -> i8 {
        loop {
            let event = match events.recv() {
                Ok(event) => event,
                Err(_) => {
                    info!("all event sources are gone");
                    let _ = self.close();
                    return 1;
                }
            };
            match self.handle(event) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop { with_error }) => return if with_error { 1 } else { 0 },
                Err(err) => error!("{}", err),
            }
            after_each(self);
        }
    }
}
