//! Tests for the generic [`Instrument`] interface.

use std::{collections::VecDeque, time::Duration};

use rstest::*;

use benchlink::{Instrument, InstrumentError, InstrumentInterface};

/// Set up an empty instrument with a three second timeout.
#[fixture]
fn empt_inst() -> Instrument<VecDeque<u8>> {
    Instrument::new(VecDeque::new(), Duration::from_secs(3))
}

/// Set up an instrument whose port holds a response without terminator and no timeout duration.
#[fixture]
fn no_term_inst() -> Instrument<VecDeque<u8>> {
    Instrument::new(VecDeque::from(b"resp".to_vec()), Duration::from_secs(0))
}

#[rstest]
fn test_instrument_terminator(mut empt_inst: Instrument<VecDeque<u8>>) {
    assert_eq!(empt_inst.get_terminator(), "\n");

    empt_inst.set_terminator("\r\n");
    assert_eq!(empt_inst.get_terminator(), "\r\n");
}

#[rstest]
fn test_instrument_timeout(mut empt_inst: Instrument<VecDeque<u8>>) {
    assert_eq!(empt_inst.get_timeout(), Duration::from_secs(3));

    empt_inst.set_timeout(Duration::from_secs(15));
    assert_eq!(empt_inst.get_timeout(), Duration::from_secs(15));
}

#[rstest]
fn test_instrument_sendcmd_appends_terminator(mut empt_inst: Instrument<VecDeque<u8>>) {
    empt_inst.sendcmd(":STOP").unwrap();
    let port = empt_inst.into_inner();
    assert_eq!(port, VecDeque::from(b":STOP\n".to_vec()));
}

/// A `VecDeque` reads back what was written, so a query returns its own command.
#[rstest]
fn test_instrument_query_echo(mut empt_inst: Instrument<VecDeque<u8>>) {
    let resp = empt_inst.query("*OPC?").unwrap();
    assert_eq!(resp, "*OPC?");
}

#[rstest]
fn test_instrument_read_until_terminator_timeout(mut no_term_inst: Instrument<VecDeque<u8>>) {
    match no_term_inst.read_until_terminator() {
        Err(InstrumentError::Timeout(timeout)) => {
            assert_eq!(Duration::from_secs(0), timeout);
        }
        _ => panic!("Expected timeout error, but got a different result."),
    }
}

#[rstest]
fn test_instrument_query_timeout(mut no_term_inst: Instrument<VecDeque<u8>>) {
    match no_term_inst.query(":WAVeform:DATA?") {
        Err(InstrumentError::TimeoutQuery { query, timeout }) => {
            assert_eq!(":WAVeform:DATA?", query);
            assert_eq!(Duration::from_secs(0), timeout);
        }
        _ => panic!("Expected timeout error, but got a different result."),
    }
}

/// Reading from an exhausted port is an I/O error, not a hang.
#[rstest]
fn test_instrument_read_exhausted(mut empt_inst: Instrument<VecDeque<u8>>) {
    assert!(matches!(
        empt_inst.read_until_terminator(),
        Err(InstrumentError::Io(_))
    ));
}

/// A port that streams its response slowly, one byte per read.
struct SlowPort {
    data: VecDeque<u8>,
    delay: Duration,
}

impl std::io::Read for SlowPort {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        std::thread::sleep(self.delay);
        match (self.data.pop_front(), buf.first_mut()) {
            (Some(byte), Some(slot)) => {
                *slot = byte;
                Ok(1)
            }
            _ => Ok(0),
        }
    }
}

impl std::io::Write for SlowPort {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// A response that keeps arriving is read completely, even if it takes longer than the timeout.
#[rstest]
fn test_instrument_query_slow_stream() {
    let resp = format!("#800000050 {}", vec!["1.0E-1"; 7].join(","));
    let port = SlowPort {
        data: format!("{resp}\n").into_bytes().into(),
        delay: Duration::from_millis(2),
    };
    let mut inst = Instrument::new(port, Duration::from_millis(50));
    assert_eq!(inst.query(":WAVeform:DATA?").unwrap(), resp);
}

/// Reads are buffered, so a second response already sent by the port is not lost.
#[rstest]
fn test_instrument_buffered_responses() {
    let mut inst = Instrument::new(
        VecDeque::from(b"+8\n+0\n".to_vec()),
        Duration::from_secs(3),
    );
    assert_eq!(inst.read_until_terminator().unwrap(), "+8");
    assert_eq!(inst.read_until_terminator().unwrap(), "+0");
}
