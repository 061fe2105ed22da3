//! A simulated oscilloscope that answers queries by command instead of by script.
//!
//! The [`benchlink::LoopbackInterface`] is used wherever the exact command sequence matters. This
//! simulator is used where a test needs an instrument that keeps answering, e.g., an instrument
//! that never stops running.

#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    io,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use benchlink::{InstrumentError, InstrumentInterface};
use keysight_dsox::CancelToken;

pub const IDN: &str = "KEYSIGHT TECHNOLOGIES,DSOX1204G,CN60000000,02.12";

#[derive(Default)]
pub struct SimScope {
    sent: Arc<Mutex<Vec<String>>>,
    polls: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
    fail_on: Vec<String>,
    fail_close: bool,
    busy_polls: usize,
    cancel_after: Option<(usize, CancelToken)>,
    data: HashMap<u8, String>,
    source: u8,
    pending: VecDeque<u8>,
}

impl SimScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every time this exact command is sent.
    pub fn fail_on(mut self, cmd: &str) -> Self {
        self.fail_on.push(cmd.to_string());
        self
    }

    /// Fail when the transport is closed.
    pub fn fail_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// Report the run bit for the first `polls` polls. `usize::MAX` keeps it set forever.
    pub fn busy_polls(mut self, polls: usize) -> Self {
        self.busy_polls = polls;
        self
    }

    /// Cancel the given token when the register was polled `polls` times.
    pub fn cancel_after(mut self, polls: usize, token: CancelToken) -> Self {
        self.cancel_after = Some((polls, token));
        self
    }

    /// Response to `:WAVeform:DATA?` for a channel.
    pub fn data(mut self, channel: u8, response: &str) -> Self {
        self.data.insert(channel, response.to_string());
        self
    }

    pub fn sent(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.sent)
    }

    pub fn polls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.polls)
    }

    pub fn closed(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }

    fn respond(&mut self, cmd: &str) -> Option<String> {
        match cmd {
            "*IDN?" => Some(IDN.to_string()),
            "*OPC?" => Some("1".to_string()),
            ":OPERegister:CONDition?" => {
                let polls = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some((after, token)) = &self.cancel_after {
                    if polls >= *after {
                        token.cancel();
                    }
                }
                if polls <= self.busy_polls {
                    Some("8".to_string())
                } else {
                    Some("0".to_string())
                }
            }
            ":WAVeform:DATA?" => Some(self.data.get(&self.source).cloned().unwrap_or_default()),
            _ => {
                if let Some(ch) = cmd.strip_prefix(":WAVeform:SOURce CHANnel") {
                    self.source = ch.parse().unwrap_or(0);
                }
                None
            }
        }
    }
}

impl InstrumentInterface for SimScope {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), InstrumentError> {
        for byte in buf.iter_mut() {
            *byte = self
                .pending
                .pop_front()
                .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "no response"))?;
        }
        Ok(())
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<(), InstrumentError> {
        let cmd = String::from_utf8_lossy(data).trim_end().to_string();
        self.sent.lock().unwrap().push(cmd.clone());
        if self.fail_on.contains(&cmd) {
            return Err(io::Error::other("simulated write failure").into());
        }
        if let Some(resp) = self.respond(&cmd) {
            self.pending.extend(format!("{resp}\n").bytes());
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), InstrumentError> {
        self.closed.store(true, Ordering::SeqCst);
        if self.fail_close {
            return Err(io::Error::other("simulated close failure").into());
        }
        Ok(())
    }
}
