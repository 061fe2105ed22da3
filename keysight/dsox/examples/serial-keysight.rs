//! This example demonstrates how to capture a single-shot waveform with a Keysight oscilloscope
//! that is connected to a serial interface. We need to specify the serial port and the baud rate
//! to use.
//!
//! Run with `RUST_LOG=debug` to see every command that is sent to the instrument.

use benchlink::SerialInterface;

use keysight_dsox::{
    AcquisitionConfig, Channel, FrequencyUnit, KeysightDevice, SlopeType, TimeUnit, Trigger,
    TriggerSource, VoltageUnit,
};

fn main() {
    env_logger::init();

    let port = "/dev/ttyUSB0";
    let baud = 9600;

    // Two channels: a receiver signal in mV and a PWM signal on a 10:1 probe.
    let receiver =
        Channel::new(2, "RECEIVER", 30.0, VoltageUnit::mV, 30.0, VoltageUnit::mV, 1.0).unwrap();
    let pwm = Channel::new(3, "PWM_XIAO", 2.0, VoltageUnit::V, 3.0, VoltageUnit::V, 10.0).unwrap();

    // Trigger on the rising edge of the PWM signal.
    let trigger =
        Trigger::new(TriggerSource::Channel3, SlopeType::Positive, 2.0, VoltageUnit::V).unwrap();

    // 2 ms window sampled at 1 MHz, i.e., 20000 points.
    let config = AcquisitionConfig::new(
        vec![receiver, pwm],
        trigger,
        2.0,
        TimeUnit::ms,
        1.0,
        FrequencyUnit::MHz,
    )
    .unwrap();

    // Define the serial instrument interface using the `simple` method.
    let serial_inst = SerialInterface::simple(port, baud).expect("Failed to open serial port");

    let mut device = KeysightDevice::new(config);
    device.connect(serial_inst).unwrap();
    println!("Connected to: {}", device.identity().unwrap_or("unknown"));

    device.setup().unwrap();
    device.collect().unwrap();

    for (name, samples) in device.waveforms() {
        println!("{name}: {} samples", samples.len());
    }
    if let Some(dt) = device.time_increment() {
        println!("Time increment: {dt:.3e} s");
    }

    device.release();
}
