//! BenchLink: blocking command/response transports for lab bench instruments
//!
//! Bench instruments such as oscilloscopes, power supplies, or ammeters are usually controlled
//! with short textual commands that are terminated by a fixed string (most often `"\n"`). A
//! command is either fire-and-forget (`sendcmd`) or a query that waits for exactly one response
//! line (`query`). This crate provides the [`InstrumentInterface`] trait that describes such a
//! channel, and a few implementations of it:
//!
//! - [`Instrument`]: a generic interface around anything that implements [`std::io::Read`] and
//!   [`std::io::Write`].
//! - [`SerialInterface`]: shortcuts to open an [`Instrument`] on a serial port using the
//!   [`serialport`] crate (feature `serial`, enabled by default).
//! - [`TcpIpInterface`]: shortcuts to open an [`Instrument`] on a raw TCP/IP socket.
//! - [`LoopbackInterface`]: a scripted instrument simulator to test drivers without hardware.
//!
//! Instruments can also be addressed with VISA-like resource strings, see [`open_resource`] and
//! [`list_resources`].
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use benchlink::{InstrumentInterface, open_resource};
//!
//! let mut inst = open_resource("TCPIP::192.168.1.10::5025::SOCKET", Duration::from_secs(3)).unwrap();
//! println!("{}", inst.query("*IDN?").unwrap());
//! ```
//!
//! # License
//!
//! Licensed under either of
//!
//! - Apache License, Version 2.0 ([LICENSE-APACHE](http://www.apache.org/licenses/LICENSE-2.0))
//! - MIT license ([LICENSE-MIT](http://opensource.org/licenses/MIT))
//!
//! at your option.

#![warn(missing_docs)]

mod instrument;
mod loopback;
mod resource;
#[cfg(feature = "serial")]
mod serial;
mod tcp_ip;

pub use instrument::Instrument;
pub use loopback::LoopbackInterface;
pub use resource::{Resource, list_resources, open_resource};
#[cfg(feature = "serial")]
pub use serial::SerialInterface;
pub use tcp_ip::TcpIpInterface;

use std::time::{Duration, Instant};

use log::{trace, warn};
use thiserror::Error;

/// Default timeout used by interfaces that do not carry their own.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// The error enum for all transports.
///
/// Drivers built on top of this crate usually wrap this error into their own error type, such
/// that a failing command can be reported together with the command that was sent.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InstrumentError {
    /// The called command is not supported by this interface.
    #[error("This command is not supported by this interface.")]
    InterfaceCommandNotSupported,
    /// The resource string could not be understood. Contains the offending resource string.
    #[error("Invalid resource identifier: {0}")]
    InvalidResource(String),
    /// No resource was given and none could be discovered on this machine.
    #[error("No instrument resource could be found.")]
    NoResourceFound,
    /// Error when reading from/writing to an interface. See [`std::io::Error`] for more details.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[cfg(feature = "serial")]
    /// Serial port errors can occur when opening a serial interface. See the [`serialport::Error`]
    /// documentation for more information.
    #[error(transparent)]
    Serialport(#[from] serialport::Error),
    /// Timeout occurred while waiting for a response from the instrument.
    #[error(
        "Timeout occured while waiting for a response from the instrument. Timeout was set to {0:?}."
    )]
    Timeout(Duration),
    /// Timeout occurred while waiting for a response to a query. The error contains the query
    /// that was sent and the timeout that was exceeded.
    #[error(
        "Timeout occured while waiting for a response to query: {query}. Timeout was set to {timeout:?}."
    )]
    TimeoutQuery {
        /// The query that timed out.
        query: String,
        /// The timeout that was set.
        timeout: Duration,
    },
}

/// A half-duplex request/response channel to an instrument.
///
/// Implementors only need to provide raw byte reads and writes. Everything else, i.e., appending
/// the terminator, reading a response line and mapping timeouts, is provided by default methods
/// that can be overwritten if an interface can do better.
pub trait InstrumentInterface {
    /// Read exactly `buf.len()` bytes from the instrument.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), InstrumentError>;

    /// Write all bytes to the instrument and flush the interface.
    fn write_raw(&mut self, data: &[u8]) -> Result<(), InstrumentError>;

    /// Get the terminator that ends every command and response.
    fn get_terminator(&self) -> &str {
        "\n"
    }

    /// Set the terminator of an interface from a `&str`.
    fn set_terminator(&mut self, _terminator: &str) {}

    /// Get the read timeout for a single response.
    fn get_timeout(&self) -> Duration {
        DEFAULT_TIMEOUT
    }

    /// Set the read timeout for a single response. Interfaces without a configurable timeout
    /// ignore this call.
    fn set_timeout(&mut self, _timeout: Duration) {}

    /// Write a string to the instrument as is, without appending the terminator.
    fn write(&mut self, data: &str) -> Result<(), InstrumentError> {
        self.write_raw(data.as_bytes())
    }

    /// Send a command to the instrument.
    ///
    /// The terminator is appended to the command before it is written.
    fn sendcmd(&mut self, cmd: &str) -> Result<(), InstrumentError> {
        let data = format!("{cmd}{}", self.get_terminator());
        trace!("-> {cmd}");
        self.write(&data)
    }

    /// Read from the instrument until the terminator is found and return the trimmed response.
    ///
    /// The timeout is an idle timeout: it restarts whenever a byte arrives, such that long
    /// responses that keep streaming are read completely. Bytes that are not valid UTF-8 are
    /// skipped with a warning. If no byte arrives within the timeout before the terminator was
    /// found, [`InstrumentError::Timeout`] is returned. A single blocking read is bounded by the
    /// read timeout of the underlying port.
    fn read_until_terminator(&mut self) -> Result<String, InstrumentError> {
        let timeout = self.get_timeout();
        let terminator = self.get_terminator().as_bytes().to_vec();
        let mut response: Vec<u8> = Vec::new();
        let mut single_buf = [0u8];

        let mut last_byte = Instant::now();
        loop {
            if last_byte.elapsed() >= timeout {
                return Err(InstrumentError::Timeout(timeout));
            }
            self.read_exact(&mut single_buf)?;
            last_byte = Instant::now();
            response.push(single_buf[0]);
            if response.ends_with(&terminator) {
                break;
            }
        }

        let response = match String::from_utf8(response) {
            Ok(resp) => resp,
            Err(err) => {
                warn!("Received invalid UTF-8 data, invalid bytes are dropped.");
                String::from_utf8_lossy(err.as_bytes()).replace('\u{FFFD}', "")
            }
        };
        let response = response.trim().to_string();
        trace!("<- {response}");
        Ok(response)
    }

    /// Query the instrument with a command and return the response as a String.
    ///
    /// A timeout while waiting for the response is reported as [`InstrumentError::TimeoutQuery`]
    /// that contains the query.
    fn query(&mut self, cmd: &str) -> Result<String, InstrumentError> {
        self.sendcmd(cmd)?;
        self.read_until_terminator().map_err(|err| match err {
            InstrumentError::Timeout(timeout) => InstrumentError::TimeoutQuery {
                query: cmd.to_string(),
                timeout,
            },
            other => other,
        })
    }

    /// Close the interface. After closing, the interface should not be used anymore.
    fn close(&mut self) -> Result<(), InstrumentError> {
        Ok(())
    }
}

impl<I: InstrumentInterface + ?Sized> InstrumentInterface for Box<I> {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), InstrumentError> {
        (**self).read_exact(buf)
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<(), InstrumentError> {
        (**self).write_raw(data)
    }

    fn get_terminator(&self) -> &str {
        (**self).get_terminator()
    }

    fn set_terminator(&mut self, terminator: &str) {
        (**self).set_terminator(terminator)
    }

    fn get_timeout(&self) -> Duration {
        (**self).get_timeout()
    }

    fn set_timeout(&mut self, timeout: Duration) {
        (**self).set_timeout(timeout)
    }

    fn write(&mut self, data: &str) -> Result<(), InstrumentError> {
        (**self).write(data)
    }

    fn sendcmd(&mut self, cmd: &str) -> Result<(), InstrumentError> {
        (**self).sendcmd(cmd)
    }

    fn read_until_terminator(&mut self) -> Result<String, InstrumentError> {
        (**self).read_until_terminator()
    }

    fn query(&mut self, cmd: &str) -> Result<String, InstrumentError> {
        (**self).query(cmd)
    }

    fn close(&mut self) -> Result<(), InstrumentError> {
        (**self).close()
    }
}
