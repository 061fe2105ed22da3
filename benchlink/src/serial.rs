//! Shortcuts to open an [`Instrument`] on a serial port using the [`serialport`] crate.

use std::time::Duration;

use serialport::{SerialPort, SerialPortBuilder};

use crate::{DEFAULT_TIMEOUT, Instrument, InstrumentError};

/// Blocking serial port interfaces.
///
/// The returned [`Instrument`] uses the read timeout that is configured on the serial port as
/// the response timeout.
#[derive(Debug)]
pub struct SerialInterface {}

impl SerialInterface {
    /// Open a serial port with the given baud rate, 8N1 and a timeout of three seconds.
    ///
    /// # Arguments
    /// * `port` - The name of the serial port, e.g., `"/dev/ttyUSB0"` or `"COM3"`.
    /// * `baud_rate` - The baud rate of the port.
    pub fn simple(
        port: &str,
        baud_rate: u32,
    ) -> Result<Instrument<Box<dyn SerialPort>>, InstrumentError> {
        Self::full(serialport::new(port, baud_rate).timeout(DEFAULT_TIMEOUT))
    }

    /// Open a serial port from a fully configured [`SerialPortBuilder`].
    pub fn full(spb: SerialPortBuilder) -> Result<Instrument<Box<dyn SerialPort>>, InstrumentError> {
        let port = spb.open()?;
        let timeout: Duration = port.timeout();
        Ok(Instrument::new(port, timeout))
    }
}
