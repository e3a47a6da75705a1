//! Transport over a byte pipe bridged by the OS, reached through TCP.

use std::{
    io::{self, Write},
    net::{Shutdown, TcpStream},
    sync::{atomic::AtomicBool, mpsc::Sender, Arc},
    thread::JoinHandle,
    time::Duration,
};

use log::info;

use super::{spawn_reader, stop_reader, Transport};
use crate::error::{Error, Result};
use crate::link::LinkEvent;

const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// A TCP connection to a serial bridge. The line parameters (baud rate,
/// framing) are configured on the bridge, not here.
#[derive(Debug)]
pub struct PipeTransport {
    stream: TcpStream,
    address: String,
    stop: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl PipeTransport {
    pub fn connect(address: &str, events: Sender<LinkEvent>) -> Result<Self> {
        let open_error = |source: io::Error| Error::TransportOpen {
            path: address.to_owned(),
            source,
        };
        let stream = TcpStream::connect(address).map_err(open_error)?;
        stream.set_nodelay(true).map_err(open_error)?;
        let reading_half = stream.try_clone().map_err(open_error)?;
        reading_half
            .set_read_timeout(Some(READ_TIMEOUT))
            .map_err(open_error)?;
        info!("Connected to bridge at {}", address);

        let stop = Arc::new(AtomicBool::new(false));
        let reader = spawn_reader(address.to_owned(), reading_half, stop.clone(), events)?;
        Ok(PipeTransport {
            stream,
            address: address.to_owned(),
            stop,
            reader: Some(reader),
        })
    }
}

impl Transport for PipeTransport {
    fn name(&self) -> String {
        self.address.clone()
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.stream.write(bytes)
    }

    fn close(&mut self) -> io::Result<()> {
        if self.reader.is_none() {
            return Ok(());
        }
        info!("closing {}", self.address);
        stop_reader(&self.stop, &mut self.reader);
        match self.stream.shutdown(Shutdown::Both) {
            Err(ref err) if err.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }
}

impl Drop for PipeTransport {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
