//! Tests for connecting to and configuring the oscilloscope.

mod sim;

use rstest::*;

use benchlink::LoopbackInterface;
use keysight_dsox::*;
use sim::{IDN, SimScope};

fn channels() -> Vec<Channel> {
    vec![
        Channel::new(2, "RECEIVER", 30.0, VoltageUnit::mV, 30.0, VoltageUnit::mV, 1.0).unwrap(),
        Channel::new(3, "PWM_XIAO", 2.0, VoltageUnit::V, 3.0, VoltageUnit::V, 10.0).unwrap(),
    ]
}

fn config_with(trigger: Trigger) -> AcquisitionConfig {
    AcquisitionConfig::new(
        channels(),
        trigger,
        2.0,
        TimeUnit::ms,
        1.0,
        FrequencyUnit::MHz,
    )
    .unwrap()
}

#[fixture]
fn channel_config() -> AcquisitionConfig {
    config_with(
        Trigger::new(TriggerSource::Channel3, SlopeType::Positive, 2.0, VoltageUnit::V).unwrap(),
    )
}

#[fixture]
fn external_config() -> AcquisitionConfig {
    config_with(
        Trigger::new(
            TriggerSource::External,
            SlopeType::Negative,
            500.0,
            VoltageUnit::mV,
        )
        .unwrap(),
    )
}

fn reset_cmds() -> Vec<&'static str> {
    vec![
        "*RST",
        "*CLS",
        ":STOP",
        ":CHANnel1:DISPlay OFF",
        ":CHANnel2:DISPlay OFF",
        ":CHANnel3:DISPlay OFF",
        ":CHANnel4:DISPlay OFF",
        ":ACQuire:TYPE NORMal",
        ":TIMebase:SCALe 2.0E-4",
        ":TIMebase:REFerence LEFT",
        ":TIMebase:POSition 0",
    ]
}

fn channel_cmds() -> Vec<&'static str> {
    vec![
        ":CHANnel2:COUPling DC",
        ":CHANnel2:UNITs VOLT",
        ":CHANnel2:PROBe 1.0E0",
        ":CHANnel2:SCALe 3.0E1mV",
        ":CHANnel2:OFFSet 3.0E1mV",
        ":CHANnel2:DISPlay ON",
        ":CHANnel2:LABel \"RECEIVER\"",
        ":CHANnel3:COUPling DC",
        ":CHANnel3:UNITs VOLT",
        ":CHANnel3:PROBe 1.0E1",
        ":CHANnel3:SCALe 2.0E0V",
        ":CHANnel3:OFFSet 3.0E0V",
        ":CHANnel3:DISPlay ON",
        ":CHANnel3:LABel \"PWM_XIAO\"",
        ":DISPlay:LABel ON",
    ]
}

/// Full setup sequence for a trigger on channel 3.
fn channel_setup_cmds() -> Vec<&'static str> {
    let mut cmds = reset_cmds();
    cmds.extend(channel_cmds());
    cmds.extend([
        ":TRIGger:MODE EDGE",
        ":TRIGger:EDGE:SOURce CHANnel3",
        ":TRIGger:EDGE:SLOPe POS",
        ":TRIGger:EDGE:LEVel 2.0E0",
    ]);
    cmds
}

/// Full setup sequence for a trigger on the external input.
fn external_setup_cmds() -> Vec<&'static str> {
    let mut cmds = reset_cmds();
    cmds.extend([
        ":EXTernal:POSition 0",
        ":EXTernal:PROBe X1",
        ":EXTernal:RANGe 5.0E2mV",
    ]);
    cmds.extend(channel_cmds());
    cmds.extend([
        ":TRIGger:MODE EDGE",
        ":TRIGger:EDGE:SOURce EXTernal",
        ":TRIGger:EDGE:SLOPe NEG",
        ":TRIGger:EDGE:LEVel 5.0E2",
    ]);
    cmds
}

fn connected(
    config: AcquisitionConfig,
    cmds: Vec<&'static str>,
) -> KeysightDevice<LoopbackInterface> {
    let mut from_host = vec!["*IDN?"];
    from_host.extend(cmds);
    let lbk = LoopbackInterface::new(from_host, [IDN], "\n");
    let mut device = KeysightDevice::new(config);
    device.connect(lbk).unwrap();
    device
}

#[rstest]
fn test_connect() {
    let lbk = LoopbackInterface::new(["*IDN?"], [IDN], "\n");
    let mut device = KeysightDevice::new(channel_config());
    assert!(!device.is_connected());
    device.connect(lbk).unwrap();
    assert!(device.is_connected());
    assert_eq!(device.identity(), Some(IDN));
    assert_eq!(device.state(), AcquisitionState::Idle);
}

/// A transport that does not answer the identification is closed and not bound.
#[rstest]
fn test_connect_fails() {
    let scope = SimScope::new().fail_on("*IDN?");
    let closed = scope.closed();
    let mut device = KeysightDevice::new(channel_config());
    let res = device.connect(scope);
    assert!(matches!(res, Err(ScopeError::Connection(_))));
    assert!(!device.is_connected());
    assert!(closed.load(std::sync::atomic::Ordering::SeqCst));
}

/// A transport that also fails to close is still dropped, the connection error is returned.
#[rstest]
fn test_connect_fails_close_fails() {
    let scope = SimScope::new().fail_on("*IDN?").fail_close();
    let closed = scope.closed();
    let mut device = KeysightDevice::new(channel_config());
    let res = device.connect(scope);
    assert!(matches!(res, Err(ScopeError::Connection(_))));
    assert!(!device.is_connected());
    assert!(closed.load(std::sync::atomic::Ordering::SeqCst));
}

#[rstest]
fn test_setup_channel_trigger(channel_config: AcquisitionConfig) {
    let mut device = connected(channel_config, channel_setup_cmds());
    device.setup().unwrap();
    assert!(device.errors().is_empty());
}

#[rstest]
fn test_setup_external_trigger(external_config: AcquisitionConfig) {
    let mut device = connected(external_config, external_setup_cmds());
    device.setup().unwrap();
    assert!(device.errors().is_empty());
}

/// External trigger commands come before the edge source, and only for an external trigger.
#[rstest]
#[case(external_config(), true)]
#[case(channel_config(), false)]
fn test_external_commands_ordering(#[case] config: AcquisitionConfig, #[case] external: bool) {
    let scope = SimScope::new();
    let sent = scope.sent();
    let mut device = KeysightDevice::new(config);
    device.connect(scope).unwrap();
    device.setup().unwrap();

    let sent = sent.lock().unwrap();
    let ext_pos = sent.iter().position(|c| c.starts_with(":EXTernal:"));
    let src_pos = sent
        .iter()
        .position(|c| c.starts_with(":TRIGger:EDGE:SOURce"))
        .unwrap();
    match ext_pos {
        Some(pos) => {
            assert!(external);
            assert!(pos < src_pos);
        }
        None => assert!(!external),
    }
}

/// Running the setup twice sends the same commands twice.
#[rstest]
#[case(channel_config(), channel_setup_cmds())]
#[case(external_config(), external_setup_cmds())]
fn test_setup_twice(#[case] config: AcquisitionConfig, #[case] cmds: Vec<&'static str>) {
    let mut twice = cmds.clone();
    twice.extend(cmds);
    let mut device = connected(config, twice);
    device.setup().unwrap();
    device.setup().unwrap();
}

#[rstest]
fn test_setup_not_connected(channel_config: AcquisitionConfig) {
    let mut device: KeysightDevice<LoopbackInterface> = KeysightDevice::new(channel_config);
    assert!(matches!(device.setup(), Err(ScopeError::NotConnected)));
}

/// A failing command is recorded and the remaining commands are still sent.
#[rstest]
fn test_setup_best_effort(channel_config: AcquisitionConfig) {
    let scope = SimScope::new()
        .fail_on(":TIMebase:REFerence LEFT")
        .fail_on(":CHANnel2:LABel \"RECEIVER\"");
    let sent = scope.sent();
    let mut device = KeysightDevice::new(channel_config);
    device.connect(scope).unwrap();
    device.setup().unwrap();

    assert_eq!(device.errors().len(), 2);
    assert!(matches!(
        &device.errors()[0],
        ScopeError::Command { command, .. } if command == ":TIMebase:REFerence LEFT"
    ));

    let mut exp = vec!["*IDN?"];
    exp.extend(channel_setup_cmds());
    assert_eq!(*sent.lock().unwrap(), exp);
}

/// A cancelled setup stops before sending anything.
#[rstest]
fn test_setup_cancelled(channel_config: AcquisitionConfig) {
    let scope = SimScope::new();
    let sent = scope.sent();
    let mut device = KeysightDevice::new(channel_config);
    device.connect(scope).unwrap();

    let token = device.cancel_token();
    token.cancel();
    assert!(matches!(device.setup(), Err(ScopeError::Cancelled)));
    assert_eq!(*sent.lock().unwrap(), vec!["*IDN?"]);

    token.reset();
    device.setup().unwrap();
    assert_eq!(sent.lock().unwrap().len(), 1 + channel_setup_cmds().len());
}

/// A new configuration is used by the next setup.
#[rstest]
fn test_set_config(channel_config: AcquisitionConfig, external_config: AcquisitionConfig) {
    let mut device = connected(channel_config, external_setup_cmds());
    device.set_config(external_config.clone());
    assert_eq!(device.config(), &external_config);
    device.setup().unwrap();
}

/// Connecting again releases the previous transport.
#[rstest]
fn test_reconnect(channel_config: AcquisitionConfig) {
    let first = SimScope::new();
    let first_closed = first.closed();
    let mut device = KeysightDevice::new(channel_config);
    device.connect(first).unwrap();
    device.connect(SimScope::new()).unwrap();
    assert!(first_closed.load(std::sync::atomic::Ordering::SeqCst));
    assert!(device.is_connected());
}
