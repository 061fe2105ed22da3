//! Error types of the oscilloscope driver.

use std::{path::PathBuf, time::Duration};

use benchlink::InstrumentError;
use thiserror::Error;

/// Errors raised when building a configuration.
///
/// A configuration error is always raised before any value is returned, i.e., there is never an
/// invalid [`crate::Channel`], [`crate::Trigger`], or [`crate::AcquisitionConfig`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The channel number is not one of the four channel slots.
    #[error("Channel number {0} is out of range. Allowed range is [1, 4]")]
    ChannelNumberOutOfRange(u8),
    /// The channel name does not fit the quoted on-screen label.
    #[error("Channel name '{0}' must be a non-empty string with at most 9 characters and no '\"'")]
    InvalidName(String),
    /// A value that must be strictly positive is not.
    #[error("{field} must be positive, got {value}")]
    NotPositive {
        /// The field that was checked.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },
    /// A value is `NaN` or infinite.
    #[error("{field} must be a finite number, got {value}")]
    NotFinite {
        /// The field that was checked.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },
    /// The offset exceeds four vertical divisions.
    #[error("Offset {offset} {unit} must be within +/- 4 x vertical scale ({limit} {unit})")]
    OffsetOutOfRange {
        /// The rejected offset, in the offset's unit.
        offset: f64,
        /// The allowed magnitude, in the offset's unit.
        limit: f64,
        /// The offset's unit symbol.
        unit: &'static str,
    },
    /// The probe attenuation ratio is outside of what the instrument supports.
    #[error("Probe ratio {0} is out of range. Allowed range is [0.1, 10000]")]
    ProbeRatioOutOfRange(f64),
    /// Two channels share a name, their waveforms could not be told apart.
    #[error("Channel name '{0}' is used more than once")]
    DuplicateName(String),
    /// An acquisition needs at least one channel.
    #[error("Channels list must not be empty")]
    NoChannels,
    /// A unit or enumeration symbol is not known.
    #[error("Unknown {kind}: '{symbol}'")]
    UnknownSymbol {
        /// What kind of symbol was parsed, e.g., "time unit".
        kind: &'static str,
        /// The rejected symbol.
        symbol: String,
    },
    /// A configuration file could not be read.
    #[error("Could not read configuration file {path}: {source}")]
    File {
        /// Path of the file.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
    /// A configuration file could not be parsed or holds an invalid configuration.
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

/// The error enum of the [`crate::KeysightDevice`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ScopeError {
    /// The configuration is invalid. See [`ConfigError`].
    #[error(transparent)]
    Configuration(#[from] ConfigError),
    /// The transport could not be opened or the instrument did not identify itself.
    #[error("Connection failed: {0}")]
    Connection(#[source] InstrumentError),
    /// An operation that needs a transport was called before `connect` or after `release`.
    #[error("Device is not connected")]
    NotConnected,
    /// A single command or query failed on the transport.
    #[error("Command '{command}' failed: {source}")]
    Command {
        /// The command that was sent.
        command: String,
        /// The transport error.
        source: InstrumentError,
    },
    /// Arming the instrument or waiting for the trigger failed.
    #[error("Acquisition failed: {0}")]
    Acquisition(String),
    /// The trigger did not occur before the configured poll timeout.
    #[error("No trigger detected within {0:?}")]
    AcquisitionTimeout(Duration),
    /// The operation was cancelled through a [`crate::CancelToken`].
    #[error("Operation was cancelled")]
    Cancelled,
    /// A waveform response could not be parsed. The channel's waveform is left empty.
    #[error("Waveform data for channel '{channel}' could not be parsed. Response was: {response}")]
    Parse {
        /// Name of the channel.
        channel: String,
        /// The raw response.
        response: String,
    },
}
