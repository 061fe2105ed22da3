//! Capture a number of single-shot acquisitions with a configuration read from a TOML file.
//!
//! Usage:
//!
//! ```text
//! cargo run --example capture -- <config.toml> [resource] [captures]
//! ```
//!
//! The resource is a VISA-style identifier, e.g., `ASRL/dev/ttyUSB0::INSTR` or
//! `TCPIP::192.168.1.10::5025::SOCKET`. If it is omitted or `auto`, the first available serial
//! port is used. See `config/bench.toml` for a sample configuration.

use std::{env, process};

use benchlink::InstrumentInterface;

use keysight_dsox::{AcquisitionConfig, KeysightDevice};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(config_path) = args.first() else {
        eprintln!("Usage: capture <config.toml> [resource] [captures]");
        process::exit(2);
    };
    let resource = args.get(1).map(String::as_str).filter(|r| *r != "auto");
    let captures: usize = match args.get(2).map(|n| n.parse()) {
        Some(Ok(n)) => n,
        Some(Err(err)) => {
            eprintln!("Invalid number of captures: {err}");
            process::exit(2);
        }
        None => 1,
    };

    let config = match AcquisitionConfig::from_toml_file(config_path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            process::exit(1);
        }
    };
    if let Some(warning) = config.points_warning() {
        eprintln!("Warning: {warning}");
    }

    let mut device: KeysightDevice<Box<dyn InstrumentInterface>> = KeysightDevice::new(config);
    if let Err(err) = device.connect_resource(resource) {
        eprintln!("{err}");
        process::exit(1);
    }
    if let Err(err) = device.setup() {
        eprintln!("{err}");
        device.release();
        process::exit(1);
    }

    for capture in 1..=captures {
        match device.collect() {
            Ok(()) => {
                println!("Capture {capture}/{captures}:");
                let mut names: Vec<&String> = device.waveforms().keys().collect();
                names.sort();
                for name in names {
                    let len = device.waveform(name).map_or(0, <[f64]>::len);
                    println!("  {name}: {len} samples");
                }
                for err in device.errors() {
                    println!("  skipped: {err}");
                }
            }
            Err(err) => {
                eprintln!("Capture {capture}/{captures} failed: {err}");
                break;
            }
        }
    }

    device.release();
}
