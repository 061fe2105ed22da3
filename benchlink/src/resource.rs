//! VISA-like resource identifiers to address an instrument with a single string.
//!
//! Supported forms are:
//! - `ASRL<port>::INSTR`, e.g., `ASRL/dev/ttyUSB0::INSTR` or `ASRL3::INSTR` (which maps to
//!   `COM3`), optionally with a baud rate: `ASRL/dev/ttyUSB0::115200::INSTR`.
//! - `TCPIP[n]::<host>::<port>::SOCKET`, e.g., `TCPIP0::192.168.1.10::5025::SOCKET`.

use std::{fmt::Display, str::FromStr, time::Duration};

use log::debug;

use crate::{InstrumentError, InstrumentInterface, TcpIpInterface};

/// Baud rate used for serial resources that do not specify one.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// A parsed resource identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    /// A serial port with its baud rate.
    Serial {
        /// Port name, e.g., `/dev/ttyUSB0` or `COM3`.
        port: String,
        /// Baud rate.
        baud_rate: u32,
    },
    /// A raw TCP/IP socket.
    TcpIp {
        /// Host name or IP address.
        host: String,
        /// Port number.
        port: u16,
    },
}

impl FromStr for Resource {
    type Err = InstrumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InstrumentError::InvalidResource(s.to_string());
        let parts: Vec<&str> = s.trim().split("::").collect();
        let (first, rest) = parts.split_first().ok_or_else(invalid)?;

        if let Some(port) = first.strip_prefix("ASRL") {
            if port.is_empty() {
                return Err(invalid());
            }
            let port = match port.parse::<u32>() {
                Ok(num) => format!("COM{num}"),
                Err(_) => port.to_string(),
            };
            let baud_rate = match rest {
                ["INSTR"] | [] => DEFAULT_BAUD_RATE,
                [baud, "INSTR"] => baud.parse::<u32>().map_err(|_| invalid())?,
                _ => return Err(invalid()),
            };
            return Ok(Resource::Serial { port, baud_rate });
        }

        if let Some(board) = first.strip_prefix("TCPIP") {
            if !board.is_empty() && board.parse::<u32>().is_err() {
                return Err(invalid());
            }
            return match rest {
                [host, port, "SOCKET"] if !host.is_empty() => Ok(Resource::TcpIp {
                    host: host.to_string(),
                    port: port.parse::<u16>().map_err(|_| invalid())?,
                }),
                _ => Err(invalid()),
            };
        }

        Err(invalid())
    }
}

impl Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resource::Serial { port, baud_rate } => write!(f, "ASRL{port}::{baud_rate}::INSTR"),
            Resource::TcpIp { host, port } => write!(f, "TCPIP::{host}::{port}::SOCKET"),
        }
    }
}

impl Resource {
    /// Open the resource and return a boxed interface with the given response timeout.
    pub fn open(&self, timeout: Duration) -> Result<Box<dyn InstrumentInterface>, InstrumentError> {
        debug!("Opening resource {self}");
        match self {
            #[cfg(feature = "serial")]
            Resource::Serial { port, baud_rate } => {
                let spb = serialport::new(port, *baud_rate).timeout(timeout);
                Ok(Box::new(crate::SerialInterface::full(spb)?))
            }
            #[cfg(not(feature = "serial"))]
            Resource::Serial { .. } => Err(InstrumentError::InterfaceCommandNotSupported),
            Resource::TcpIp { host, port } => Ok(Box::new(TcpIpInterface::try_new(
                (host.as_str(), *port),
                timeout,
            )?)),
        }
    }
}

/// List the resources that can be discovered on this machine.
///
/// Only serial ports can be discovered, network instruments have to be addressed explicitly.
pub fn list_resources() -> Result<Vec<String>, InstrumentError> {
    #[cfg(feature = "serial")]
    {
        let ports = serialport::available_ports()?;
        Ok(ports
            .into_iter()
            .map(|p| format!("ASRL{}::INSTR", p.port_name))
            .collect())
    }
    #[cfg(not(feature = "serial"))]
    {
        Ok(Vec::new())
    }
}

/// Open an instrument from a resource identifier.
///
/// # Arguments
/// * `resource` - Resource identifier, see the module documentation for the supported forms.
/// * `timeout` - Response timeout of the returned interface.
pub fn open_resource(
    resource: &str,
    timeout: Duration,
) -> Result<Box<dyn InstrumentInterface>, InstrumentError> {
    resource.parse::<Resource>()?.open(timeout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;

    #[rstest]
    #[case("ASRL/dev/ttyUSB0::INSTR", "/dev/ttyUSB0", DEFAULT_BAUD_RATE)]
    #[case("ASRL3::INSTR", "COM3", DEFAULT_BAUD_RATE)]
    #[case("ASRL/dev/ttyACM1::115200::INSTR", "/dev/ttyACM1", 115200)]
    fn test_parse_serial(#[case] resource: &str, #[case] port: &str, #[case] baud_rate: u32) {
        let exp = Resource::Serial {
            port: port.to_string(),
            baud_rate,
        };
        assert_eq!(resource.parse::<Resource>().unwrap(), exp);
    }

    #[rstest]
    #[case("TCPIP::192.168.1.10::5025::SOCKET")]
    #[case("TCPIP0::192.168.1.10::5025::SOCKET")]
    fn test_parse_tcpip(#[case] resource: &str) {
        let exp = Resource::TcpIp {
            host: "192.168.1.10".to_string(),
            port: 5025,
        };
        assert_eq!(resource.parse::<Resource>().unwrap(), exp);
    }

    #[rstest]
    #[case("")]
    #[case("ASRL::INSTR")]
    #[case("ASRL/dev/ttyUSB0::fast::INSTR")]
    #[case("TCPIP::192.168.1.10::INSTR")]
    #[case("TCPIPx::host::5025::SOCKET")]
    #[case("TCPIP::host::99999::SOCKET")]
    #[case("USB0::0x2A8D::0x1797::MY1234::INSTR")]
    fn test_parse_invalid(#[case] resource: &str) {
        assert!(matches!(
            resource.parse::<Resource>(),
            Err(InstrumentError::InvalidResource(_))
        ));
    }

    #[rstest]
    fn test_display_round_trip() {
        let res = Resource::Serial {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 19200,
        };
        assert_eq!(res.to_string().parse::<Resource>().unwrap(), res);
    }
}
