//! Settings related to the link with the controller board: which transport to
//! use, how to find the device and how to configure the serial line.
//!
//! Use the [builder](https://doc.rust-lang.org/1.0.0/style/ownership/builders.html)
//! pattern to set the configurable values.

pub use serialport::{DataBits, FlowControl, Parity, StopBits};

/// USB vendor id of the controller boards we talk to (STMicroelectronics).
pub const DEFAULT_VENDOR_ID: u16 = 1155;

// =============================================================================
// Public Interface
// =============================================================================

/// The kind of byte channel connecting the host and the board.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum TransportKind {
    /// A local serial device, found by path or by USB vendor id.
    Serial,
    /// A byte pipe bridged by the OS, reached through a TCP address (e.g. a
    /// `ser2net` bridge in front of the board).
    Pipe(String),
}

/// Groups all settings of the link with the board and acts as a
/// [builder](https://doc.rust-lang.org/1.0.0/style/ownership/builders.html)
/// for the settings.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Settings {
    /// The transport to open.
    pub transport: TransportKind,
    /// The port name, usually the device path. When not set, the first USB
    /// device matching `vendor_id` is used.
    pub path: Option<String>,
    /// USB vendor id used to find the board when no path was given.
    pub vendor_id: u16,
    /// The baud rate in symbols-per-second.
    pub baud_rate: u32,
    /// Number of bits used to represent a character sent on the line.
    pub data_bits: DataBits,
    /// The type of signalling to use for controlling data transfer.
    pub flow_control: FlowControl,
    /// The type of parity to use for error checking.
    pub parity: Parity,
    /// Number of bits to use to signal the end of a character.
    pub stop_bits: StopBits,

    /// Status keys the front end wants to hear about. Updates for any other
    /// key are ignored.
    pub watched_keys: Vec<String>,

    /// Restrict creation of `Settings` instances unless through the
    /// `SettingsBuilder`.
    #[doc(hidden)]
    _private_use_builder: (),
}

/// The builder for the `Settings` values.
///
/// All values are optional and have default values that will be used if not
/// explicitly set. The defaults match the board firmware: 115200 baud, 8 data
/// bits, no parity.
///
/// **Example**
///
/// ```
/// use boardlink::SettingsBuilder;
///
/// let settings = SettingsBuilder::new().path("/dev/ttyACM0").finalize();
/// assert_eq!(settings.baud_rate, 115_200);
/// ```
pub struct SettingsBuilder {
    settings: Settings,
}
impl Default for SettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
impl SettingsBuilder {
    /// Start building the settings using default values and no path for the
    /// port.
    pub fn new() -> Self {
        SettingsBuilder {
            settings: Settings {
                transport: TransportKind::Serial,
                path: None,
                vendor_id: DEFAULT_VENDOR_ID,
                baud_rate: 115_200,
                data_bits: DataBits::Eight,
                flow_control: FlowControl::None,
                parity: Parity::None,
                stop_bits: StopBits::One,
                watched_keys: Vec::new(),
                _private_use_builder: (),
            },
        }
    }

    /// Reach the board through a TCP serial bridge instead of a local device
    pub fn pipe<'a>(mut self, address: impl Into<std::borrow::Cow<'a, str>>) -> Self {
        self.settings.transport = TransportKind::Pipe(address.into().into_owned());
        self
    }

    /// Set the path to the serial port
    pub fn path<'a>(mut self, path: impl Into<std::borrow::Cow<'a, str>>) -> Self {
        self.settings.path = Some(path.into().into_owned());
        self
    }

    /// Set the USB vendor id used to find the board
    pub fn vendor_id(mut self, vendor_id: u16) -> Self {
        self.settings.vendor_id = vendor_id;
        self
    }

    /// Set the baud rate in symbols-per-second
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.settings.baud_rate = baud_rate;
        self
    }

    /// Set the number of bits used to represent a character sent on the line
    pub fn data_bits(mut self, data_bits: DataBits) -> Self {
        self.settings.data_bits = data_bits;
        self
    }

    /// Set the type of signalling to use for controlling data transfer
    pub fn flow_control(mut self, flow_control: FlowControl) -> Self {
        self.settings.flow_control = flow_control;
        self
    }

    /// Set the type of parity to use for error checking
    pub fn parity(mut self, parity: Parity) -> Self {
        self.settings.parity = parity;
        self
    }

    /// Set the number of bits to use to signal the end of a character
    pub fn stop_bits(mut self, stop_bits: StopBits) -> Self {
        self.settings.stop_bits = stop_bits;
        self
    }

    /// Add a status key to watch. Adding the same key twice has no effect.
    pub fn watch<'a>(mut self, key: impl Into<std::borrow::Cow<'a, str>>) -> Self {
        let key = key.into().into_owned();
        if !self.settings.watched_keys.contains(&key) {
            self.settings.watched_keys.push(key);
        }
        self
    }

    pub fn finalize(self) -> Settings {
        self.settings
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[test]
fn all_default() {
    let settings = SettingsBuilder::new().finalize();
    assert_eq!(
        settings,
        Settings {
            transport: TransportKind::Serial,
            path: None,
            vendor_id: 1155,
            baud_rate: 115_200,
            data_bits: DataBits::Eight,
            flow_control: FlowControl::None,
            parity: Parity::None,
            stop_bits: StopBits::One,
            watched_keys: vec![],
            _private_use_builder: (),
        }
    )
}

#[test]
fn path() {
    let settings = SettingsBuilder::new().path("/dev/ttyACM0").finalize();
    assert_eq!(settings.path.unwrap(), "/dev/ttyACM0");
}

#[test]
fn pipe() {
    let settings = SettingsBuilder::new().pipe("10.0.0.7:2000").finalize();
    assert_eq!(
        settings.transport,
        TransportKind::Pipe("10.0.0.7:2000".to_string())
    );
    assert_eq!(settings.path, None);
}

#[test]
fn vendor_id() {
    let settings = SettingsBuilder::new().vendor_id(0x2341).finalize();
    assert_eq!(settings.vendor_id, 0x2341);
}

#[test]
fn baud_rate() {
    let baud_rate = 230_400;
    let settings = SettingsBuilder::new().baud_rate(baud_rate).finalize();
    assert_eq!(settings.baud_rate, baud_rate);
}

#[test]
fn parity_and_stop_bits() {
    let settings = SettingsBuilder::new()
        .parity(Parity::Even)
        .stop_bits(StopBits::Two)
        .data_bits(DataBits::Seven)
        .flow_control(FlowControl::Hardware)
        .finalize();
    assert_eq!(settings.parity, Parity::Even);
    assert_eq!(settings.stop_bits, StopBits::Two);
    assert_eq!(settings.data_bits, DataBits::Seven);
    assert_eq!(settings.flow_control, FlowControl::Hardware);
}

#[test]
fn watched_keys_are_unique() {
    let settings = SettingsBuilder::new()
        .watch("ativa")
        .watch("temp")
        .watch("ativa")
        .finalize();
    assert_eq!(settings.watched_keys, vec!["ativa", "temp"]);
}
