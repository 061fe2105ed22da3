//! The device session: connection, configuration commands, acquisition, and release.

use std::{collections::HashMap, time::Duration};

use benchlink::{InstrumentError, InstrumentInterface, list_resources, open_resource};
use log::{debug, error, info, warn};

use crate::{
    AcquisitionConfig, AcquisitionState, CancelToken, PollSettings, ScopeError, TriggerSource,
    acquisition::{parse_condition, parse_waveform, wait_for_run_bit_clear},
    config::MAX_CHANNELS,
    nr3::{float_to_nr3, time_to_nr3},
};

/// Response timeout that is set on the transport when connecting.
pub const DEVICE_TIMEOUT: Duration = Duration::from_secs(15);

/// A rust driver for Keysight oscilloscopes (InfiniiVision command set).
///
/// The device owns its transport exclusively. It is created with a configuration, then connected,
/// set up, and used to collect as many captures as needed before it is released:
///
/// ```no_run
/// use benchlink::InstrumentInterface;
/// use keysight_dsox::{AcquisitionConfig, KeysightDevice};
///
/// let config = AcquisitionConfig::from_toml_file("bench.toml").unwrap();
/// let mut device: KeysightDevice<Box<dyn InstrumentInterface>> = KeysightDevice::new(config);
/// device.connect_resource(Some("TCPIP::192.168.1.10::5025::SOCKET")).unwrap();
/// device.setup().unwrap();
/// device.collect().unwrap();
/// for (name, samples) in device.waveforms() {
///     println!("{name}: {} samples", samples.len());
/// }
/// device.release();
/// ```
pub struct KeysightDevice<T: InstrumentInterface> {
    interface: Option<T>,
    config: AcquisitionConfig,
    identity: Option<String>,
    waveforms: HashMap<String, Vec<f64>>,
    state: AcquisitionState,
    poll: PollSettings,
    cancel: CancelToken,
    errors: Vec<ScopeError>,
}

impl<T: InstrumentInterface> KeysightDevice<T> {
    /// Create a new, not yet connected device with the given configuration.
    pub fn new(config: AcquisitionConfig) -> Self {
        KeysightDevice {
            interface: None,
            config,
            identity: None,
            waveforms: HashMap::new(),
            state: AcquisitionState::Idle,
            poll: PollSettings::default(),
            cancel: CancelToken::new(),
            errors: Vec::new(),
        }
    }

    /// Bind a transport to the device.
    ///
    /// The response timeout of the transport is set to [`DEVICE_TIMEOUT`] and the instrument is
    /// asked to identify itself. If that fails, the transport is closed and dropped and the device
    /// stays disconnected. A previously bound transport is released first.
    pub fn connect(&mut self, mut interface: T) -> Result<(), ScopeError> {
        if self.interface.is_some() {
            self.release();
        }
        interface.set_timeout(DEVICE_TIMEOUT);
        match interface.query("*IDN?") {
            Ok(idn) => {
                info!("Connected to \"{idn}\"");
                self.identity = Some(idn);
                self.interface = Some(interface);
                Ok(())
            }
            Err(err) => {
                error!("Connection failed: {err}");
                if let Err(close_err) = interface.close() {
                    error!("Closing the connection failed: {close_err}");
                }
                Err(ScopeError::Connection(err))
            }
        }
    }

    /// Whether a transport is bound.
    pub fn is_connected(&self) -> bool {
        self.interface.is_some()
    }

    /// Identification string the instrument reported when connecting.
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// The active configuration.
    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    /// Replace the active configuration.
    ///
    /// Call [`Self::setup`] afterwards to push the new configuration to the instrument.
    pub fn set_config(&mut self, config: AcquisitionConfig) {
        self.config = config;
    }

    /// Current state of the acquisition state machine.
    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    /// Settings used to poll for the trigger.
    pub fn poll_settings(&self) -> PollSettings {
        self.poll
    }

    /// Set how the trigger is polled, e.g., to add a timeout.
    pub fn set_poll_settings(&mut self, settings: PollSettings) {
        self.poll = settings;
    }

    /// Get a token that cancels a running setup or acquisition of this device.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Errors that were logged and skipped during the last setup or collect.
    pub fn errors(&self) -> &[ScopeError] {
        &self.errors
    }

    /// Push the configuration to the instrument.
    ///
    /// The instrument is reset first, then acquisition, time base, external trigger input,
    /// channels, and trigger are configured, in this order. Captured waveforms are cleared.
    ///
    /// Configuration is best effort: a command that fails is logged, recorded in
    /// [`Self::errors`], and the next command is sent. Cancelling through the [`CancelToken`]
    /// aborts the setup between two steps with [`ScopeError::Cancelled`].
    pub fn setup(&mut self) -> Result<(), ScopeError> {
        if self.interface.is_none() {
            return Err(ScopeError::NotConnected);
        }
        self.waveforms.clear();
        self.errors.clear();
        info!("Running setup");

        let steps: [fn(&mut Self); 6] = [
            Self::reset_device,
            Self::setup_acquisition,
            Self::setup_time_base,
            Self::setup_external_channel,
            Self::setup_channels,
            Self::setup_trigger,
        ];
        for step in steps {
            if let Err(err) = self.cancel.check() {
                warn!("Setup cancelled");
                return Err(err);
            }
            step(self);
        }

        info!("Device setup done");
        Ok(())
    }

    /// Capture a single-shot acquisition and read the waveforms of all channels.
    ///
    /// The instrument is armed, the trigger is awaited, and the data of every configured channel
    /// is read. A channel whose data cannot be read or parsed gets an empty waveform, the other
    /// channels are not affected. The previous capture is only replaced once all channels are
    /// read.
    ///
    /// Waiting for the trigger blocks until the instrument reports completion, the
    /// [`CancelToken`] is cancelled, or the timeout of the [`PollSettings`] (none by default)
    /// expires. In these cases and on any other failure while arming or polling, the error is
    /// logged and returned and the previous capture is kept.
    pub fn collect(&mut self) -> Result<(), ScopeError> {
        if self.interface.is_none() {
            return Err(ScopeError::NotConnected);
        }
        self.errors.clear();

        let result = self.acquire().and_then(|()| self.read_out());
        self.state = AcquisitionState::Idle;
        match result {
            Ok(waveforms) => {
                self.waveforms = waveforms;
                info!("Data retrieval done");
                Ok(())
            }
            Err(err) => {
                error!("Acquisition error: {err}");
                Err(err)
            }
        }
    }

    /// Close and drop the transport. Captured waveforms are kept.
    pub fn release(&mut self) {
        info!("Releasing device connection");
        if let Some(mut intf) = self.interface.take() {
            if let Err(err) = intf.close() {
                error!("Closing the connection failed: {err}");
            }
            info!("Device released");
        }
        self.state = AcquisitionState::Idle;
    }

    /// Captured waveforms by channel name.
    pub fn waveforms(&self) -> &HashMap<String, Vec<f64>> {
        &self.waveforms
    }

    /// Captured waveform of the channel with the given name.
    pub fn waveform(&self, name: &str) -> Option<&[f64]> {
        self.waveforms.get(name).map(Vec::as_slice)
    }

    /// Length of the shortest captured waveform, `None` if nothing was captured.
    pub fn min_waveform_len(&self) -> Option<usize> {
        self.waveforms.values().map(Vec::len).min()
    }

    /// Time between two samples in seconds, based on the shortest captured waveform.
    ///
    /// Returns `None` if nothing was captured or the shortest waveform is empty.
    pub fn time_increment(&self) -> Option<f64> {
        self.config.time_increment(self.min_waveform_len()?)
    }

    /// Send a command, log and record a failure, and carry on.
    fn write(&mut self, cmd: &str) {
        if let Err(err) = self.send(cmd) {
            error!("Write failed: {err}");
            self.errors.push(err);
        }
    }

    /// Send a command and return a failure.
    fn send(&mut self, cmd: &str) -> Result<(), ScopeError> {
        let intf = self.interface.as_mut().ok_or(ScopeError::NotConnected)?;
        intf.sendcmd(cmd).map_err(|source| command_error(cmd, source))?;
        debug!("Sent: \"{cmd}\"");
        Ok(())
    }

    /// Query the instrument and return the response or a failure.
    fn query(&mut self, cmd: &str) -> Result<String, ScopeError> {
        let intf = self.interface.as_mut().ok_or(ScopeError::NotConnected)?;
        let resp = intf.query(cmd).map_err(|source| command_error(cmd, source))?;
        debug!("Query: \"{cmd}\" -> {resp}");
        Ok(resp)
    }

    /// Bring the instrument into a known state with all channels switched off.
    fn reset_device(&mut self) {
        self.write("*RST");
        self.write("*CLS");
        self.write(":STOP");
        for ch in 1..=MAX_CHANNELS {
            self.write(&format!(":CHANnel{ch}:DISPlay OFF"));
        }
        debug!("Device reset complete.");
    }

    fn setup_acquisition(&mut self) {
        self.write(":ACQuire:TYPE NORMal");
        debug!("Acquisition setup done.");
    }

    /// The display has 10 horizontal divisions, the horizontal range covers all of them.
    fn setup_time_base(&mut self) {
        let scale = time_to_nr3(self.config.horizontal_range(), self.config.horizontal_unit());
        self.write(&format!(":TIMebase:SCALe {scale}"));
        self.write(":TIMebase:REFerence LEFT");
        self.write(":TIMebase:POSition 0");
        debug!("Time base setup done.");
    }

    fn setup_external_channel(&mut self) {
        let trig = self.config.trigger().clone();
        if trig.source() != TriggerSource::External {
            return;
        }
        self.write(":EXTernal:POSition 0");
        self.write(":EXTernal:PROBe X1");
        self.write(&format!(
            ":EXTernal:RANGe {}{}",
            float_to_nr3(trig.threshold()),
            trig.threshold_unit()
        ));
        debug!("External channel setup done.");
    }

    fn setup_channels(&mut self) {
        let channels = self.config.channels().to_vec();
        for ch in channels {
            let num = ch.number();
            self.write(&format!(":CHANnel{num}:COUPling DC"));
            self.write(&format!(":CHANnel{num}:UNITs VOLT"));
            self.write(&format!(
                ":CHANnel{num}:PROBe {}",
                float_to_nr3(ch.probe_ratio())
            ));
            self.write(&format!(
                ":CHANnel{num}:SCALe {}{}",
                float_to_nr3(ch.vertical_scale()),
                ch.vertical_unit()
            ));
            self.write(&format!(
                ":CHANnel{num}:OFFSet {}{}",
                float_to_nr3(ch.offset()),
                ch.offset_unit()
            ));
            self.write(&format!(":CHANnel{num}:DISPlay ON"));
            self.write(&format!(":CHANnel{num}:LABel \"{}\"", ch.name()));
            debug!("Channel{num} setup done.");
        }
        self.write(":DISPlay:LABel ON");
    }

    fn setup_trigger(&mut self) {
        let trig = self.config.trigger().clone();
        self.write(":TRIGger:MODE EDGE");
        self.write(&format!(":TRIGger:EDGE:SOURce {}", trig.source()));
        self.write(&format!(":TRIGger:EDGE:SLOPe {}", trig.slope()));
        self.write(&format!(
            ":TRIGger:EDGE:LEVel {}",
            float_to_nr3(trig.threshold())
        ));
        debug!("Trigger setup done.");
    }

    /// Arm a single-shot capture and wait until the instrument stops running.
    fn acquire(&mut self) -> Result<(), ScopeError> {
        self.cancel.check()?;
        self.state = AcquisitionState::Armed;
        self.arm().map_err(into_acquisition_error)?;

        self.state = AcquisitionState::WaitingForTrigger;
        info!(
            "Waiting for trigger ({:?} capture window)",
            self.config.capture_window()
        );
        let poll = self.poll;
        let cancel = self.cancel.clone();
        let waited = wait_for_run_bit_clear(&poll, &cancel, || {
            let resp = self.query(":OPERegister:CONDition?")?;
            parse_condition(&resp)
        });
        if let Err(err) = waited {
            if matches!(
                err,
                ScopeError::Cancelled | ScopeError::AcquisitionTimeout(_)
            ) {
                // leave the instrument stopped rather than armed
                self.write(":STOP");
            }
            return Err(into_acquisition_error(err));
        }

        self.state = AcquisitionState::Captured;
        info!("Trigger detected");
        Ok(())
    }

    fn arm(&mut self) -> Result<(), ScopeError> {
        self.send(":WAVeform:FORMat ASCII")?;
        self.send(":WAVeform:POINts:MODE MAXimum")?;
        let points = self.config.desired_points();
        self.send(&format!(":WAVeform:POINts {points}"))?;
        self.query("*OPC?")?;
        self.send(":SINGLE")
    }

    /// Read the waveforms of all configured channels.
    fn read_out(&mut self) -> Result<HashMap<String, Vec<f64>>, ScopeError> {
        self.state = AcquisitionState::ReadOut;
        let channels: Vec<(u8, String)> = self
            .config
            .channels()
            .iter()
            .map(|ch| (ch.number(), ch.name().to_string()))
            .collect();

        let mut waveforms = HashMap::with_capacity(channels.len());
        for (num, name) in channels {
            self.cancel.check()?;
            info!("Capturing data from Channel {num} (\"{name}\")");
            let values = match self.read_channel(num, &name) {
                Ok(values) => {
                    info!("{name}: {} points collected", values.len());
                    values
                }
                Err(err) => {
                    error!("Failed reading data for {name}: {err}");
                    self.errors.push(err);
                    Vec::new()
                }
            };
            waveforms.insert(name, values);
        }
        Ok(waveforms)
    }

    fn read_channel(&mut self, num: u8, name: &str) -> Result<Vec<f64>, ScopeError> {
        self.send(&format!(":WAVeform:SOURce CHANnel{num}"))?;
        let raw = self.query(":WAVeform:DATA?")?;
        parse_waveform(&raw).ok_or_else(|| ScopeError::Parse {
            channel: name.to_string(),
            response: raw,
        })
    }
}

impl KeysightDevice<Box<dyn InstrumentInterface>> {
    /// Open a transport from a resource identifier and connect to it.
    ///
    /// Without an address, the first resource that [`benchlink::list_resources`] finds is used.
    /// See [`benchlink::open_resource`] for the supported resource identifiers.
    pub fn connect_resource(&mut self, address: Option<&str>) -> Result<(), ScopeError> {
        info!("Connecting to target device...");
        let address = match address {
            Some(addr) => addr.to_string(),
            None => list_resources()
                .map_err(ScopeError::Connection)?
                .into_iter()
                .next()
                .ok_or(ScopeError::Connection(InstrumentError::NoResourceFound))?,
        };
        let interface = open_resource(&address, DEVICE_TIMEOUT).map_err(|err| {
            error!("Connection failed: {err}");
            ScopeError::Connection(err)
        })?;
        self.connect(interface)?;
        info!("Connected to \"{address}\"");
        Ok(())
    }
}

fn command_error(cmd: &str, source: InstrumentError) -> ScopeError {
    ScopeError::Command {
        command: cmd.to_string(),
        source,
    }
}

/// Keep cancellation and timeouts as they are, report everything else as an acquisition error.
fn into_acquisition_error(err: ScopeError) -> ScopeError {
    match err {
        ScopeError::Cancelled
        | ScopeError::AcquisitionTimeout(_)
        | ScopeError::Acquisition(_)
        | ScopeError::NotConnected => err,
        other => ScopeError::Acquisition(other.to_string()),
    }
}
