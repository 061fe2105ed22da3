//! Validated configuration of channels, trigger, and timing for an acquisition.
//!
//! All values are checked when they are created. A [`Channel`], [`Trigger`], or
//! [`AcquisitionConfig`] that exists is therefore always valid and can be sent to the instrument
//! as is. Configurations can also be read from TOML files, which go through the same checks.

use std::{collections::HashSet, fmt::Display, path::Path, str::FromStr, time::Duration};

use log::warn;
use measurements::Frequency;
use serde::{Deserialize, Serialize};

use crate::{ConfigError, FrequencyUnit, TimeUnit, VoltageUnit};

/// Number of analog channel slots on the instrument.
pub const MAX_CHANNELS: u8 = 4;

/// Maximum number of characters the instrument shows in a channel label.
pub const MAX_NAME_LEN: usize = 9;

/// Relative tolerance within which a point count is taken as a whole number before rounding down.
const POINTS_TOLERANCE: f64 = 1e-9;

/// Allowed probe attenuation ratios (inclusive).
pub const PROBE_RATIO_RANGE: (f64, f64) = (0.1, 10000.0);

/// Number of waveform points the instrument can actually deliver.
///
/// The requested timing should map to one of these values. If it does not, the instrument uses a
/// different number of points and therefore a different sampling frequency.
pub const ALLOWED_WAVEFORM_POINTS: [u64; 14] = [
    100, 250, 500, 1000, 2000, 5000, 10000, 20000, 50000, 100000, 200000, 500000, 1000000,
    2000000,
];

/// Return the allowed number of waveform points closest to `desired`.
///
/// On a tie, the smaller value is returned.
pub fn nearest_allowed_points(desired: u64) -> u64 {
    ALLOWED_WAVEFORM_POINTS
        .iter()
        .copied()
        .min_by_key(|pts| pts.abs_diff(desired))
        .unwrap_or(ALLOWED_WAVEFORM_POINTS[0])
}

fn check_finite(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NotFinite { field, value })
    }
}

fn check_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    check_finite(field, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}

/// A measurement channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ChannelSpec")]
pub struct Channel {
    number: u8,
    name: String,
    vertical_scale: f64,
    vertical_unit: VoltageUnit,
    offset: f64,
    offset_unit: VoltageUnit,
    probe_ratio: f64,
}

impl Channel {
    /// Create a new, validated channel.
    ///
    /// # Arguments
    /// * `number` - Channel slot on the instrument, 1 to 4.
    /// * `name` - Label shown on the instrument, 1 to 9 characters.
    /// * `vertical_scale` - Scale per division, must be positive.
    /// * `vertical_unit` - Unit of the vertical scale.
    /// * `offset` - Vertical offset, its magnitude must not exceed four times the vertical scale.
    /// * `offset_unit` - Unit of the offset.
    /// * `probe_ratio` - Probe attenuation ratio, 0.1 to 10000.
    pub fn new(
        number: u8,
        name: impl Into<String>,
        vertical_scale: f64,
        vertical_unit: VoltageUnit,
        offset: f64,
        offset_unit: VoltageUnit,
        probe_ratio: f64,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        check_finite("Vertical scale", vertical_scale)?;
        check_finite("Offset", offset)?;
        check_finite("Probe ratio", probe_ratio)?;

        if !(1..=MAX_CHANNELS).contains(&number) {
            return Err(ConfigError::ChannelNumberOutOfRange(number));
        }
        // the name is sent as a quoted label
        let name_len = name.chars().count();
        if name_len == 0 || name_len > MAX_NAME_LEN || name.contains('"') {
            return Err(ConfigError::InvalidName(name));
        }
        check_positive("Vertical scale", vertical_scale)?;

        let limit = vertical_unit.to_voltage(4.0 * vertical_scale);
        if offset_unit.to_voltage(offset.abs()).as_volts() > limit.as_volts() {
            return Err(ConfigError::OffsetOutOfRange {
                offset,
                limit: limit.as_volts() / offset_unit.multiplier(),
                unit: offset_unit.symbol(),
            });
        }

        let (min, max) = PROBE_RATIO_RANGE;
        if !(min..=max).contains(&probe_ratio) {
            return Err(ConfigError::ProbeRatioOutOfRange(probe_ratio));
        }

        Ok(Channel {
            number,
            name,
            vertical_scale,
            vertical_unit,
            offset,
            offset_unit,
            probe_ratio,
        })
    }

    /// Create a channel with 1 V/div, no offset, and a 1:1 probe.
    pub fn with_defaults(number: u8, name: impl Into<String>) -> Result<Self, ConfigError> {
        Self::new(number, name, 1.0, VoltageUnit::V, 0.0, VoltageUnit::V, 1.0)
    }

    /// Channel slot on the instrument, 1 to 4.
    pub fn number(&self) -> u8 {
        self.number
    }

    /// Name of the channel, also used as its on-screen label.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Vertical scale per division.
    pub fn vertical_scale(&self) -> f64 {
        self.vertical_scale
    }

    /// Unit of the vertical scale.
    pub fn vertical_unit(&self) -> VoltageUnit {
        self.vertical_unit
    }

    /// Vertical offset.
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Unit of the vertical offset.
    pub fn offset_unit(&self) -> VoltageUnit {
        self.offset_unit
    }

    /// Probe attenuation ratio.
    pub fn probe_ratio(&self) -> f64 {
        self.probe_ratio
    }
}

fn default_one() -> f64 {
    1.0
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ChannelSpec {
    number: u8,
    name: String,
    #[serde(default = "default_one")]
    vertical_scale: f64,
    #[serde(default)]
    vertical_unit: VoltageUnit,
    #[serde(default)]
    offset: f64,
    #[serde(default)]
    offset_unit: VoltageUnit,
    #[serde(default = "default_one")]
    probe_ratio: f64,
}

impl TryFrom<ChannelSpec> for Channel {
    type Error = ConfigError;

    fn try_from(spec: ChannelSpec) -> Result<Self, Self::Error> {
        Channel::new(
            spec.number,
            spec.name,
            spec.vertical_scale,
            spec.vertical_unit,
            spec.offset,
            spec.offset_unit,
            spec.probe_ratio,
        )
    }
}

/// Source the trigger listens to.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerSource {
    /// Analog channel 1
    #[serde(alias = "CHANnel1")]
    Channel1,
    /// Analog channel 2
    #[serde(alias = "CHANnel2")]
    Channel2,
    /// Analog channel 3
    #[serde(alias = "CHANnel3")]
    Channel3,
    /// Analog channel 4
    #[serde(alias = "CHANnel4")]
    Channel4,
    /// External trigger input
    #[default]
    #[serde(alias = "EXTernal")]
    External,
}

impl TriggerSource {
    /// Get the trigger source for an analog channel number.
    pub fn channel(number: u8) -> Result<Self, ConfigError> {
        match number {
            1 => Ok(TriggerSource::Channel1),
            2 => Ok(TriggerSource::Channel2),
            3 => Ok(TriggerSource::Channel3),
            4 => Ok(TriggerSource::Channel4),
            _ => Err(ConfigError::ChannelNumberOutOfRange(number)),
        }
    }

    /// The mnemonic the instrument uses for this source.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            TriggerSource::Channel1 => "CHANnel1",
            TriggerSource::Channel2 => "CHANnel2",
            TriggerSource::Channel3 => "CHANnel3",
            TriggerSource::Channel4 => "CHANnel4",
            TriggerSource::External => "EXTernal",
        }
    }
}

impl FromStr for TriggerSource {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "channel1" | "chan1" => Ok(TriggerSource::Channel1),
            "channel2" | "chan2" => Ok(TriggerSource::Channel2),
            "channel3" | "chan3" => Ok(TriggerSource::Channel3),
            "channel4" | "chan4" => Ok(TriggerSource::Channel4),
            "external" | "ext" => Ok(TriggerSource::External),
            _ => Err(ConfigError::UnknownSymbol {
                kind: "trigger source",
                symbol: s.to_string(),
            }),
        }
    }
}

impl Display for TriggerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

/// Edge slope the trigger reacts to.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlopeType {
    /// Rising edge
    #[default]
    #[serde(alias = "POS")]
    Positive,
    /// Falling edge
    #[serde(alias = "NEG")]
    Negative,
    /// Rising or falling edge
    #[serde(alias = "EITH")]
    Either,
    /// Alternating between rising and falling edges
    #[serde(alias = "ALT")]
    Alternate,
}

impl SlopeType {
    /// The mnemonic the instrument uses for this slope.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            SlopeType::Positive => "POS",
            SlopeType::Negative => "NEG",
            SlopeType::Either => "EITH",
            SlopeType::Alternate => "ALT",
        }
    }
}

impl FromStr for SlopeType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "positive" | "pos" => Ok(SlopeType::Positive),
            "negative" | "neg" => Ok(SlopeType::Negative),
            "either" | "eith" => Ok(SlopeType::Either),
            "alternate" | "alt" => Ok(SlopeType::Alternate),
            _ => Err(ConfigError::UnknownSymbol {
                kind: "trigger slope",
                symbol: s.to_string(),
            }),
        }
    }
}

impl Display for SlopeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

/// Edge trigger configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TriggerSpec")]
pub struct Trigger {
    source: TriggerSource,
    slope: SlopeType,
    threshold: f64,
    threshold_unit: VoltageUnit,
}

impl Trigger {
    /// Create a new, validated trigger. The threshold must be positive.
    pub fn new(
        source: TriggerSource,
        slope: SlopeType,
        threshold: f64,
        threshold_unit: VoltageUnit,
    ) -> Result<Self, ConfigError> {
        check_positive("Threshold", threshold)?;
        Ok(Trigger {
            source,
            slope,
            threshold,
            threshold_unit,
        })
    }

    /// Trigger source.
    pub fn source(&self) -> TriggerSource {
        self.source
    }

    /// Trigger slope.
    pub fn slope(&self) -> SlopeType {
        self.slope
    }

    /// Trigger threshold.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Unit of the trigger threshold.
    pub fn threshold_unit(&self) -> VoltageUnit {
        self.threshold_unit
    }
}

/// External source, rising edge, 1 V.
impl Default for Trigger {
    fn default() -> Self {
        Trigger {
            source: TriggerSource::default(),
            slope: SlopeType::default(),
            threshold: 1.0,
            threshold_unit: VoltageUnit::default(),
        }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TriggerSpec {
    #[serde(default)]
    source: TriggerSource,
    #[serde(default)]
    slope: SlopeType,
    #[serde(default = "default_one")]
    threshold: f64,
    #[serde(default)]
    threshold_unit: VoltageUnit,
}

impl TryFrom<TriggerSpec> for Trigger {
    type Error = ConfigError;

    fn try_from(spec: TriggerSpec) -> Result<Self, Self::Error> {
        Trigger::new(spec.source, spec.slope, spec.threshold, spec.threshold_unit)
    }
}

/// Warning that the requested timing does not map to an allowed number of waveform points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointsWarning {
    /// Number of points that follows from the requested timing.
    pub desired: u64,
    /// The closest number of points the instrument can deliver.
    pub nearest: u64,
    /// The sampling frequency that `nearest` points imply.
    pub actual_frequency: Frequency,
}

impl Display for PointsWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Requested number of waveform points ({}) is not in allowed set. Number of points will be clamped to closest allowed value: {} points, {} Hz",
            self.desired,
            self.nearest,
            self.actual_frequency.as_hertz()
        )
    }
}

/// Top-level configuration of an acquisition.
///
/// The configuration cannot be changed once it is built. To acquire with different settings,
/// build a new configuration and hand it to the device.
///
/// # Example
///
/// ```
/// use keysight_dsox::{AcquisitionConfig, Channel, FrequencyUnit, TimeUnit, Trigger};
///
/// let channels = vec![Channel::with_defaults(1, "SIGNAL").unwrap()];
/// let config = AcquisitionConfig::new(
///     channels,
///     Trigger::default(),
///     2.0,
///     TimeUnit::ms,
///     1.0,
///     FrequencyUnit::MHz,
/// )
/// .unwrap();
/// assert_eq!(config.desired_points(), 20000);
/// assert!(config.points_warning().is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AcquisitionSpec")]
pub struct AcquisitionConfig {
    channels: Vec<Channel>,
    trigger: Trigger,
    horizontal_range: f64,
    horizontal_unit: TimeUnit,
    frequency: f64,
    frequency_unit: FrequencyUnit,
}

impl AcquisitionConfig {
    /// Create a new, validated acquisition configuration.
    ///
    /// If the timing does not result in an allowed number of waveform points, a warning is logged,
    /// but the configuration is still created unchanged. See [`Self::points_warning`].
    pub fn new(
        channels: Vec<Channel>,
        trigger: Trigger,
        horizontal_range: f64,
        horizontal_unit: TimeUnit,
        frequency: f64,
        frequency_unit: FrequencyUnit,
    ) -> Result<Self, ConfigError> {
        if channels.is_empty() {
            return Err(ConfigError::NoChannels);
        }
        // waveforms are stored by channel name
        {
            let mut names = HashSet::new();
            if let Some(dup) = channels.iter().find(|ch| !names.insert(ch.name())) {
                return Err(ConfigError::DuplicateName(dup.name().to_string()));
            }
        }
        check_positive("Horizontal range", horizontal_range)?;
        check_positive("Frequency", frequency)?;

        let config = AcquisitionConfig {
            channels,
            trigger,
            horizontal_range,
            horizontal_unit,
            frequency,
            frequency_unit,
        };
        if let Some(warning) = config.points_warning() {
            warn!("{warning}");
        }
        Ok(config)
    }

    /// Read a configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Read a configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::File {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// The channels, in the order they are configured and read out.
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// The trigger configuration.
    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    /// Horizontal range, i.e., the full capture window.
    pub fn horizontal_range(&self) -> f64 {
        self.horizontal_range
    }

    /// Unit of the horizontal range.
    pub fn horizontal_unit(&self) -> TimeUnit {
        self.horizontal_unit
    }

    /// Requested sampling frequency.
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Unit of the requested sampling frequency.
    pub fn frequency_unit(&self) -> FrequencyUnit {
        self.frequency_unit
    }

    /// Time base for the point count in seconds: 10 x horizontal range.
    fn points_window_secs(&self) -> f64 {
        10.0 * self.horizontal_range * self.horizontal_unit.multiplier()
    }

    /// Number of waveform points that follows from the requested timing.
    ///
    /// This is `floor(10 x horizontal range [s] x frequency [Hz])`. A product that is a whole
    /// number up to the rounding error of the unit multipliers counts as that whole number, such
    /// that 10 us at 10 MHz gives 1000 points and not 999.
    pub fn desired_points(&self) -> u64 {
        let freq_hz = self
            .frequency_unit
            .to_frequency(self.frequency)
            .as_hertz();
        let exact = self.points_window_secs() * freq_hz;
        let whole = exact.round();
        if (exact - whole).abs() <= POINTS_TOLERANCE * whole.max(1.0) {
            whole as u64
        } else {
            exact.floor() as u64
        }
    }

    /// Check the desired number of points against [`ALLOWED_WAVEFORM_POINTS`].
    ///
    /// Returns `None` if the timing maps to an allowed number of points.
    pub fn points_warning(&self) -> Option<PointsWarning> {
        let desired = self.desired_points();
        if ALLOWED_WAVEFORM_POINTS.contains(&desired) {
            return None;
        }
        let nearest = nearest_allowed_points(desired);
        Some(PointsWarning {
            desired,
            nearest,
            actual_frequency: Frequency::from_hertz(nearest as f64 / self.points_window_secs()),
        })
    }

    /// Duration of the capture in seconds, i.e., the horizontal range.
    pub fn sampling_duration(&self) -> f64 {
        self.horizontal_range * self.horizontal_unit.multiplier()
    }

    /// The capture window, i.e., the horizontal range, as a [`Duration`].
    pub fn capture_window(&self) -> Duration {
        self.horizontal_unit.to_duration(self.horizontal_range)
    }

    /// Time between two samples in seconds when `num_samples` were captured.
    ///
    /// Returns `None` if no samples were captured.
    pub fn time_increment(&self, num_samples: usize) -> Option<f64> {
        if num_samples == 0 {
            return None;
        }
        Some(self.sampling_duration() / num_samples as f64)
    }
}

fn default_horizontal_range() -> f64 {
    100.0
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct AcquisitionSpec {
    channels: Vec<Channel>,
    #[serde(default)]
    trigger: Trigger,
    #[serde(default = "default_horizontal_range")]
    horizontal_range: f64,
    #[serde(default)]
    horizontal_unit: TimeUnit,
    #[serde(default = "default_one")]
    frequency: f64,
    #[serde(default)]
    frequency_unit: FrequencyUnit,
}

impl TryFrom<AcquisitionSpec> for AcquisitionConfig {
    type Error = ConfigError;

    fn try_from(spec: AcquisitionSpec) -> Result<Self, Self::Error> {
        AcquisitionConfig::new(
            spec.channels,
            spec.trigger,
            spec.horizontal_range,
            spec.horizontal_unit,
            spec.frequency,
            spec.frequency_unit,
        )
    }
}
