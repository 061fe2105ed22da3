//! Shortcuts to open an [`Instrument`] on a raw TCP/IP socket.

use std::{
    net::{TcpStream, ToSocketAddrs},
    time::Duration,
};

use crate::{Instrument, InstrumentError};

/// Blocking TCP/IP interfaces using [`std::net::TcpStream`].
#[derive(Debug)]
pub struct TcpIpInterface {}

impl TcpIpInterface {
    /// Connect to a socket address with the given timeout.
    ///
    /// The timeout is used for reading and writing on the stream as well as for the response
    /// timeout of the returned [`Instrument`], such that a query never blocks indefinitely.
    ///
    /// # Arguments
    /// * `sock_addr` - Socket address, e.g., `"192.168.1.10:5025"`.
    /// * `timeout` - Read/write timeout.
    pub fn try_new<A: ToSocketAddrs>(
        sock_addr: A,
        timeout: Duration,
    ) -> Result<Instrument<TcpStream>, InstrumentError> {
        let stream = TcpStream::connect(sock_addr)?;
        stream.set_write_timeout(Some(timeout))?;
        stream.set_read_timeout(Some(timeout))?;
        Ok(Instrument::new(stream, timeout))
    }
}
