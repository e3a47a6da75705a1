//! Transport over a local serial device.

use std::{
    fmt, io,
    sync::{atomic::AtomicBool, mpsc::Sender, Arc},
    thread::JoinHandle,
    time::Duration,
};

use log::{debug, info, warn};
use serialport::SerialPort;

use super::{spawn_reader, stop_reader, Transport};
use crate::error::{Error, Result};
use crate::link::LinkEvent;
use crate::settings::Settings;

/// How long a read may block before the reader checks its stop flag.
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// A serial port configured from [`Settings`] with a reader thread attached.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    name: String,
    stop: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl SerialTransport {
    /// Open and configure the serial device at `path`, retrying a few times
    /// since devices often need a moment after being plugged in.
    pub fn open(path: &str, settings: &Settings, events: Sender<LinkEvent>) -> Result<Self> {
        let port = open_and_setup_port(path, settings).map_err(|err| Error::TransportOpen {
            path: path.to_owned(),
            source: err.into(),
        })?;
        let reading_half = port.try_clone()?;
        let stop = Arc::new(AtomicBool::new(false));
        let reader = spawn_reader(path.to_owned(), reading_half, stop.clone(), events)?;
        Ok(SerialTransport {
            port,
            name: path.to_owned(),
            stop,
            reader: Some(reader),
        })
    }
}

impl Transport for SerialTransport {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        io::Write::write(&mut self.port, bytes)
    }

    fn close(&mut self) -> io::Result<()> {
        if self.reader.is_some() {
            info!("closing {}", self.name);
        }
        stop_reader(&self.stop, &mut self.reader);
        Ok(())
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let port = &self.port;
        debug_fmt_serialport!(port, f).finish()
    }
}

// =============================================================================
// Private stuff
// =============================================================================

fn open_and_setup_port(
    path: &str,
    settings: &Settings,
) -> std::result::Result<Box<dyn SerialPort>, serialport::Error> {
    use retry::{delay, retry_with_index};

    let result = retry_with_index(
        delay::Fixed::from_millis(1000).take(4),
        |index| -> std::result::Result<Box<dyn SerialPort>, serialport::Error> {
            debug!("Trying to connect {}", index);
            serialport::new(path, settings.baud_rate)
                .data_bits(settings.data_bits)
                .stop_bits(settings.stop_bits)
                .parity(settings.parity)
                .flow_control(settings.flow_control)
                .timeout(READ_TIMEOUT)
                .open()
        },
    );
    match result {
        Ok(port) => {
            info!("Connected to {} at {} baud", path, settings.baud_rate);
            if let Ok(baud_rate) = port.baud_rate() {
                if baud_rate != settings.baud_rate {
                    warn!(
                        "{} runs at {} baud instead of {}",
                        path, baud_rate, settings.baud_rate
                    );
                }
            }
            debug!("data_bits    : {:?}", settings.data_bits);
            debug!("stop_bits    : {:?}", settings.stop_bits);
            debug!("parity       : {:?}", settings.parity);
            debug!("flow control : {:?}", settings.flow_control);
            Ok(port)
        }
        Err(retry::Error::Operation {
            error,
            total_delay,
            tries,
        }) => {
            info!(
                "Failed to open the port after {:?} and {} tries: {}",
                total_delay, tries, error,
            );
            Err(error)
        }
        Err(retry::Error::Internal(_)) => {
            info!("Internal retry error while opening port");
            Err(serialport::Error::new(
                serialport::ErrorKind::Unknown,
                "internal error while retrying to open the port",
            ))
        }
    }
}
