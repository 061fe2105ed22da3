//! This module provides the generic implementation of the [`InstrumentInterface`] trait.
//!
//! It can be used with any type that implements [`std::io::Read`] and [`std::io::Write`], such as
//! [`std::net::TcpStream`] or a boxed [`serialport::SerialPort`].

use std::{
    io::{BufReader, Read, Write},
    time::Duration,
};

use crate::{InstrumentError, InstrumentInterface};

/// A general instrument interface that can be built with any port that implements
/// [`std::io::Read`] and [`std::io::Write`].
///
/// The terminator defaults to `"\n"`, which is what SCPI-style instruments expect. Reads from the
/// port are buffered, so long responses are fetched in chunks and not with one call per byte.
///
/// # Example
///
/// ```no_run
/// use std::{net::TcpStream, time::Duration};
///
/// use benchlink::Instrument;
///
/// let stream = TcpStream::connect("192.168.10.1:5025").unwrap();
/// let inst = Instrument::new(stream, Duration::from_secs(3));
/// ```
#[derive(Debug)]
pub struct Instrument<P: Read + Write> {
    port: BufReader<P>,
    terminator: String,
    timeout: Duration,
}

impl<P: Read + Write> Instrument<P> {
    /// Create a new [`Instrument`] around the given port with the given response timeout.
    pub fn new(port: P, timeout: Duration) -> Self {
        Self {
            port: BufReader::new(port),
            terminator: "\n".to_string(),
            timeout,
        }
    }

    /// Consume the instrument and return the underlying port.
    ///
    /// Data that was already read from the port but not consumed yet is lost.
    pub fn into_inner(self) -> P {
        self.port.into_inner()
    }
}

impl<P: Read + Write> InstrumentInterface for Instrument<P> {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), InstrumentError> {
        self.port.read_exact(buf)?;
        Ok(())
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<(), InstrumentError> {
        let port = self.port.get_mut();
        port.write_all(data)?;
        port.flush()?;
        Ok(())
    }

    fn get_terminator(&self) -> &str {
        self.terminator.as_str()
    }

    fn set_terminator(&mut self, terminator: &str) {
        self.terminator = terminator.to_string();
    }

    fn get_timeout(&self) -> Duration {
        self.timeout
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    fn close(&mut self) -> Result<(), InstrumentError> {
        self.port.get_mut().flush()?;
        Ok(())
    }
}
