//! Unit tables for time, voltage, and frequency values and their SI multipliers.

use std::{fmt::Display, str::FromStr, time::Duration};

use measurements::{Frequency, Voltage};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Time units, used for the horizontal range.
#[allow(non_camel_case_types)] // unit symbols, `Ms` could be read as megaseconds
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeUnit {
    /// Seconds
    s,
    /// Milliseconds
    #[default]
    ms,
    /// Microseconds
    #[serde(alias = "µs")]
    us,
}

impl TimeUnit {
    /// Multiplier to convert a value in this unit to seconds.
    pub fn multiplier(&self) -> f64 {
        match self {
            TimeUnit::s => 1.0,
            TimeUnit::ms => 1e-3,
            TimeUnit::us => 1e-6,
        }
    }

    /// The unit symbol.
    pub fn symbol(&self) -> &'static str {
        match self {
            TimeUnit::s => "s",
            TimeUnit::ms => "ms",
            TimeUnit::us => "us",
        }
    }

    /// Convert a value in this unit to a [`Duration`].
    ///
    /// Negative or non-finite values saturate to zero.
    pub fn to_duration(&self, value: f64) -> Duration {
        Duration::try_from_secs_f64(value * self.multiplier()).unwrap_or(Duration::ZERO)
    }
}

impl FromStr for TimeUnit {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "s" => Ok(TimeUnit::s),
            "ms" => Ok(TimeUnit::ms),
            "us" | "µs" => Ok(TimeUnit::us),
            other => Err(ConfigError::UnknownSymbol {
                kind: "time unit",
                symbol: other.to_string(),
            }),
        }
    }
}

impl Display for TimeUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Voltage units, used for vertical scale, offset, and trigger threshold.
///
/// The symbol is also the suffix the instrument expects after a value, e.g., `2.0E1mV`.
#[allow(non_camel_case_types)] // could stand for Mega otherwise
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoltageUnit {
    /// Volt
    #[default]
    V,
    /// Millivolt
    mV,
}

impl VoltageUnit {
    /// Multiplier to convert a value in this unit to volts.
    pub fn multiplier(&self) -> f64 {
        match self {
            VoltageUnit::V => 1.0,
            VoltageUnit::mV => 1e-3,
        }
    }

    /// The unit symbol.
    pub fn symbol(&self) -> &'static str {
        match self {
            VoltageUnit::V => "V",
            VoltageUnit::mV => "mV",
        }
    }

    /// Convert a value in this unit to a [`Voltage`].
    pub fn to_voltage(&self, value: f64) -> Voltage {
        match self {
            VoltageUnit::V => Voltage::from_volts(value),
            VoltageUnit::mV => Voltage::from_millivolts(value),
        }
    }
}

impl FromStr for VoltageUnit {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "V" => Ok(VoltageUnit::V),
            "mV" => Ok(VoltageUnit::mV),
            other => Err(ConfigError::UnknownSymbol {
                kind: "voltage unit",
                symbol: other.to_string(),
            }),
        }
    }
}

impl Display for VoltageUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Frequency units, used for the requested sampling frequency.
#[allow(non_camel_case_types)] // `kHz` is the SI spelling
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrequencyUnit {
    /// Hertz
    #[default]
    Hz,
    /// Kilohertz
    kHz,
    /// Megahertz
    MHz,
}

impl FrequencyUnit {
    /// Multiplier to convert a value in this unit to hertz.
    pub fn multiplier(&self) -> f64 {
        match self {
            FrequencyUnit::Hz => 1.0,
            FrequencyUnit::kHz => 1e3,
            FrequencyUnit::MHz => 1e6,
        }
    }

    /// The unit symbol.
    pub fn symbol(&self) -> &'static str {
        match self {
            FrequencyUnit::Hz => "Hz",
            FrequencyUnit::kHz => "kHz",
            FrequencyUnit::MHz => "MHz",
        }
    }

    /// Convert a value in this unit to a [`Frequency`].
    pub fn to_frequency(&self, value: f64) -> Frequency {
        Frequency::from_hertz(value * self.multiplier())
    }
}

impl FromStr for FrequencyUnit {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Hz" => Ok(FrequencyUnit::Hz),
            "kHz" => Ok(FrequencyUnit::kHz),
            "MHz" => Ok(FrequencyUnit::MHz),
            other => Err(ConfigError::UnknownSymbol {
                kind: "frequency unit",
                symbol: other.to_string(),
            }),
        }
    }
}

impl Display for FrequencyUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}
