//! The loopback module provides a scripted instrument simulator for testing purposes.

use std::{collections::VecDeque, time::Duration};

use crate::{DEFAULT_TIMEOUT, InstrumentError, InstrumentInterface};

/// A self-incrementing index structure that by default starts at 0 and increments whenever `next`
/// is called.
#[derive(Debug, Default)]
struct IncrIndex {
    index: usize,
}

impl IncrIndex {
    fn next(&mut self) -> usize {
        let current = self.index;
        self.index += 1;
        current
    }
}

/// An interface that allows you to simply write tests for your instrument driver.
///
/// You provide the commands that are expected to go from the host to the instrument and the
/// responses that go from the instrument to the host, both in order. Whenever the driver sends a
/// command that is not the next expected one, the loopback panics. When the loopback is dropped,
/// it panics if not all commands and responses were used.
///
/// # Example
///
/// ```
/// use benchlink::{InstrumentInterface, LoopbackInterface};
///
/// let mut lbk = LoopbackInterface::new(["*RST", "*IDN?"], ["Scope,1.0"], "\n");
/// lbk.sendcmd("*RST").unwrap();
/// assert_eq!(lbk.query("*IDN?").unwrap(), "Scope,1.0");
/// ```
#[derive(Debug)]
pub struct LoopbackInterface {
    from_host: Vec<String>,
    from_inst: Vec<String>,
    terminator_exp: String,
    from_host_index: IncrIndex,
    from_inst_index: IncrIndex,
    curr_bytes: VecDeque<u8>,
    terminator: String,
    timeout: Duration,
    closed: bool,
}

impl LoopbackInterface {
    /// Create a new loopback instrument with given commands to and from the instrument.
    ///
    /// # Arguments:
    /// * `from_host` - Commands from host to instrument.
    /// * `from_inst` - Responses from instrument to host.
    /// * `terminator_exp` - The terminator that the driver is expected to use.
    pub fn new<H, I>(from_host: H, from_inst: I, terminator_exp: &str) -> Self
    where
        H: IntoIterator,
        H::Item: Into<String>,
        I: IntoIterator,
        I::Item: Into<String>,
    {
        LoopbackInterface {
            from_host: from_host.into_iter().map(Into::into).collect(),
            from_inst: from_inst.into_iter().map(Into::into).collect(),
            terminator_exp: terminator_exp.to_string(),
            from_host_index: IncrIndex::default(),
            from_inst_index: IncrIndex::default(),
            curr_bytes: VecDeque::new(),
            terminator: "\n".to_string(),
            timeout: DEFAULT_TIMEOUT,
            closed: false,
        }
    }

    /// Panic if not all commands in the [`LoopbackInterface`] have been used.
    ///
    /// It is automatically called when the [`LoopbackInterface`] is dropped, but you can also call
    /// it manually to ensure that all commands have been used.
    pub fn finalize(&mut self) {
        let from_host_leftover = self.from_host.get(self.from_host_index.index);
        let from_inst_leftover = self.from_inst.get(self.from_inst_index.index);
        if let Some(fil) = from_host_leftover {
            panic!("Leftover expected commands found from host to instrument: {fil}");
        }
        if let Some(fil) = from_inst_leftover {
            panic!("Leftover expected commands found from instrument to host: {fil}");
        }
    }

    /// Whether [`InstrumentInterface::close`] was called on this interface.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn get_next_from_host(&mut self) -> String {
        let cmd = self
            .from_host
            .get(self.from_host_index.next())
            .expect("No more commands were expected from host to instrument.");
        format!("{cmd}{}", self.terminator_exp)
    }

    fn get_next_from_inst(&mut self) -> String {
        let resp = self
            .from_inst
            .get(self.from_inst_index.next())
            .expect("No more commands were expected from instrument to host.");
        format!("{resp}{}", self.terminator_exp)
    }

    /// Read exactly one byte from the next response of the instrument.
    ///
    /// Panics if there are no more responses, which is justified as this is a test interface.
    fn read_one_byte(&mut self) -> u8 {
        match self.curr_bytes.pop_front() {
            Some(byte) => byte,
            None => {
                let next = self.get_next_from_inst();
                self.curr_bytes = next.as_bytes().iter().copied().collect();
                self.read_one_byte()
            }
        }
    }
}

impl InstrumentInterface for LoopbackInterface {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), InstrumentError> {
        for byte in buf.iter_mut() {
            *byte = self.read_one_byte();
        }
        Ok(())
    }

    fn write_raw(&mut self, cmd: &[u8]) -> Result<(), InstrumentError> {
        assert!(!self.closed, "Write to a closed loopback interface.");
        let exp = self.get_next_from_host();
        assert_eq!(
            exp.as_bytes(),
            cmd,
            "Expected sendcmd '{0}', got '{1:?}'",
            exp,
            str::from_utf8(cmd)
        );
        Ok(())
    }

    fn get_terminator(&self) -> &str {
        self.terminator.as_str()
    }

    fn set_terminator(&mut self, terminator: &str) {
        self.terminator = terminator.to_string();
    }

    fn get_timeout(&self) -> Duration {
        self.timeout
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    fn close(&mut self) -> Result<(), InstrumentError> {
        self.closed = true;
        Ok(())
    }
}

impl Drop for LoopbackInterface {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            self.finalize();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incrementing_index() {
        let mut idx = IncrIndex::default();
        assert_eq!(0, idx.next());
        assert_eq!(1, idx.next());
        assert_eq!(2, idx.next());
    }
}
