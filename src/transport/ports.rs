//! Finding the serial device of the board.
//!
//! An explicit path always wins. Otherwise the board is found by the USB vendor
//! id of its serial controller among the ports currently connected.

use console::Term;
use log::{debug, info};
use serialport::{SerialPortInfo, SerialPortType};

use crate::error::{Error, Result};
use crate::settings::Settings;

//==============================================================================
// Public Interface
//==============================================================================

/// Return the path of the serial device to open for `settings`.
pub fn find_port(settings: &Settings) -> Result<String> {
    if let Some(path) = &settings.path {
        return Ok(path.clone());
    }
    let ports = serialport::available_ports()?;
    let path = match_vendor(&ports, settings.vendor_id)?;
    info!("found board on {}", path);
    Ok(path)
}

/// Enumerates serial devices on the system, as `path: (manufacturer / product)`
/// for USB devices and as the bare path for the others.
pub fn available_ports() -> Vec<String> {
    match serialport::available_ports() {
        Ok(ports) => ports.iter().map(describe).collect(),
        Err(ref e) => {
            info!("error: {}", e);
            Vec::new()
        }
    }
}

/// Let the user pick one of the connected serial devices. Returns `None` when
/// nothing is connected or the selection was cancelled.
pub fn select_port() -> Option<String> {
    use dialoguer::{theme::ColorfulTheme, Select};

    let ports = available_ports();
    if ports.is_empty() {
        info!("no serial device to select from");
        return None;
    }

    let term = Term::buffered_stderr();
    let theme = ColorfulTheme::default();
    let mut select = Select::with_theme(&theme);
    select.with_prompt("Select the port of the board");
    for item in &ports {
        select.item(item);
    }

    match select.default(0).interact_on_opt(&term) {
        Ok(Some(index)) => ports
            .get(index)
            .and_then(|item| item.split(": (").next())
            .map(String::from),
        Ok(None) => {
            debug!("port selection cancelled");
            None
        }
        Err(ref e) => {
            info!("error: {}", e);
            None
        }
    }
}

//==============================================================================
// Private stuff
//==============================================================================

fn match_vendor(ports: &[SerialPortInfo], vendor_id: u16) -> Result<String> {
    if ports.is_empty() {
        return Err(Error::NoDevice);
    }
    ports
        .iter()
        .find(|p| matches!(&p.port_type, SerialPortType::UsbPort(info) if info.vid == vendor_id))
        .map(|p| p.port_name.clone())
        .ok_or(Error::NoMatchingDevice { vendor_id })
}

fn describe(port: &SerialPortInfo) -> String {
    match &port.port_type {
        SerialPortType::UsbPort(info) => format!(
            "{}: ({} / {})",
            port.port_name,
            info.manufacturer.as_ref().map_or("", String::as_str),
            info.product.as_ref().map_or("", String::as_str)
        ),
        _ => port.port_name.clone(),
    }
}
