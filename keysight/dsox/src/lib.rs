//! A rust driver to capture single-shot waveforms with Keysight oscilloscopes.
//!
//! This driver configures up to four analog channels, the time base, and an edge trigger of an
//! InfiniiVision-type oscilloscope, waits for a single triggered capture, and reads the
//! waveforms back as ASCII data. Any transport that implements
//! [`benchlink::InstrumentInterface`] can be used.
//!
//! The configuration is built from validated value objects ([`Channel`], [`Trigger`], and
//! [`AcquisitionConfig`]) or read from a TOML file:
//!
//! ```toml
//! horizontal_range = 2
//! horizontal_unit = "ms"
//! frequency = 1
//! frequency_unit = "MHz"
//!
//! [trigger]
//! source = "channel3"
//! slope = "positive"
//! threshold = 2
//! threshold_unit = "V"
//!
//! [[channels]]
//! number = 3
//! name = "PWM_XIAO"
//! vertical_scale = 2
//! offset = 3
//! ```
//!
//! # Example
//!
//! ```no_run
//! use benchlink::InstrumentInterface;
//! use keysight_dsox::{
//!     AcquisitionConfig, Channel, FrequencyUnit, KeysightDevice, SlopeType, TimeUnit, Trigger,
//!     TriggerSource, VoltageUnit,
//! };
//!
//! let channel = Channel::new(2, "RECEIVER", 30.0, VoltageUnit::mV, 30.0, VoltageUnit::mV, 1.0)
//!     .unwrap();
//! let trigger = Trigger::new(TriggerSource::Channel2, SlopeType::Positive, 2.0, VoltageUnit::V)
//!     .unwrap();
//! let config =
//!     AcquisitionConfig::new(vec![channel], trigger, 2.0, TimeUnit::ms, 1.0, FrequencyUnit::MHz)
//!         .unwrap();
//!
//! let mut device: KeysightDevice<Box<dyn InstrumentInterface>> = KeysightDevice::new(config);
//! device.connect_resource(Some("ASRL/dev/ttyUSB0::INSTR")).unwrap();
//! device.setup().unwrap();
//! device.collect().unwrap();
//! println!("{:?}", device.waveform("RECEIVER"));
//! device.release();
//! ```

#![warn(missing_docs)]

mod acquisition;
mod config;
mod device;
mod error;
pub mod nr3;
mod units;

pub use acquisition::{
    AcquisitionState, CancelToken, DEFAULT_POLL_INTERVAL, PollSettings, RUN_BIT, parse_waveform,
};
pub use config::{
    ALLOWED_WAVEFORM_POINTS, AcquisitionConfig, Channel, MAX_CHANNELS, MAX_NAME_LEN,
    PROBE_RATIO_RANGE, PointsWarning, SlopeType, Trigger, TriggerSource, nearest_allowed_points,
};
pub use device::{DEVICE_TIMEOUT, KeysightDevice};
pub use error::{ConfigError, ScopeError};
pub use units::{FrequencyUnit, TimeUnit, VoltageUnit};
