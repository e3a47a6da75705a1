//! The byte channel between the host and the board.
//!
//! The core only ever talks to the [`Transport`] trait. Two implementations
//! exist and the one to use is picked by [`open`] from the settings:
//!
//! * [`SerialTransport`]: a local serial device (USB CDC, UART adapter...),
//! * [`PipeTransport`]: a byte pipe bridged by the OS, reached over TCP (for
//!   instance a `ser2net` bridge in front of the board).
//!
//! Both deliver received bytes the same way: a reader thread forwards every
//! chunk as a [`LinkEvent::Received`] over the link's event channel, which
//! moves the data onto the single thread owning the link state. When the
//! channel goes away, the reader sends [`LinkEvent::Disconnected`] and stops.

use std::{
    io::{self, Read},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::Sender,
        Arc,
    },
    thread::{self, JoinHandle},
};

use log::{debug, info, trace};

use crate::error::Result;
use crate::link::LinkEvent;
use crate::settings::{Settings, TransportKind};

mod pipe;
mod ports;
mod serial;

pub use pipe::PipeTransport;
pub use ports::{available_ports, find_port, select_port};
pub use serial::SerialTransport;

// =============================================================================
// Public Interface
// =============================================================================

/// A raw, already opened byte channel to the board.
pub trait Transport {
    /// Human readable name of the channel, for messages.
    fn name(&self) -> String;

    /// Write some of `bytes`, returning how many were accepted.
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize>;

    /// Stop the delivery of received data and release the channel. Closing an
    /// already closed transport does nothing.
    fn close(&mut self) -> io::Result<()>;
}

/// Open the transport described by `settings`. Received bytes are delivered
/// as [`LinkEvent`]s on `events`.
pub fn open(settings: &Settings, events: Sender<LinkEvent>) -> Result<Box<dyn Transport>> {
    match &settings.transport {
        TransportKind::Serial => {
            let path = find_port(settings)?;
            Ok(Box::new(SerialTransport::open(&path, settings, events)?))
        }
        TransportKind::Pipe(address) => Ok(Box::new(PipeTransport::connect(address, events)?)),
    }
}

// =============================================================================
// Crate-Public Interface
// =============================================================================

/// Size of the buffer used by reader threads for each read.
const READ_CHUNK: usize = 4096;

/// The receiving half shared by the transports: a thread that reads whatever
/// is available and forwards it as events until `stop` is raised, the peer
/// goes away or the link stops listening.
///
/// `reader` must have a read timeout set, so that `stop` gets checked
/// regularly.
pub(crate) fn spawn_reader<R>(
    name: String,
    mut reader: R,
    stop: Arc<AtomicBool>,
    events: Sender<LinkEvent>,
) -> io::Result<JoinHandle<()>>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name(format!("reader {}", name))
        .spawn(move || {
            let mut buf = vec![0; READ_CHUNK];
            while !stop.load(Ordering::Relaxed) {
                match reader.read(&mut buf) {
                    Ok(0) => {
                        info!("{} closed by the peer", name);
                        let _ = events.send(LinkEvent::Disconnected);
                        break;
                    }
                    Ok(count) => {
                        trace!("{} bytes read from {}", count, name);
                        if events.send(LinkEvent::Received(buf[..count].to_vec())).is_err() {
                            debug!("nobody is listening to {} anymore", name);
                            break;
                        }
                    }
                    Err(ref err)
                        if matches!(
                            err.kind(),
                            io::ErrorKind::TimedOut
                                | io::ErrorKind::WouldBlock
                                | io::ErrorKind::Interrupted
                        ) => {}
                    Err(err) => {
                        if !stop.load(Ordering::Relaxed) {
                            info!("error reading from {}: {}", name, err);
                            let _ = events.send(LinkEvent::Disconnected);
                        }
                        break;
                    }
                }
            }
            debug!("reader for {} stopped", name);
        })
}

/// Raise the stop flag of a reader thread and wait for it to finish.
pub(crate) fn stop_reader(stop: &AtomicBool, reader: &mut Option<JoinHandle<()>>) {
    stop.store(true, Ordering::Relaxed);
    if let Some(handle) = reader.take() {
        if handle.join().is_err() {
            info!("reader thread panicked");
        }
    }
}
