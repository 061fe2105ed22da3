//! Building blocks of the single-shot acquisition: states, cancellation, polling, and parsing.

use std::{
    fmt::Display,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use crate::ScopeError;

/// Bit of the operation condition register that is set while the instrument is running.
pub const RUN_BIT: u32 = 0b1000;

/// Default interval between two polls of the operation condition register.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// States of the acquisition state machine.
///
/// A capture walks through the states in order and always ends in [`AcquisitionState::Idle`],
/// whether it succeeded or not.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionState {
    /// No capture in progress.
    #[default]
    Idle,
    /// Waveform transfer is being configured and the instrument is being armed.
    Armed,
    /// Single-shot capture started, polling for the trigger.
    WaitingForTrigger,
    /// The instrument stopped running, the capture is complete.
    Captured,
    /// Waveform data is being transferred.
    ReadOut,
}

impl Display for AcquisitionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AcquisitionState::Idle => write!(f, "idle"),
            AcquisitionState::Armed => write!(f, "armed"),
            AcquisitionState::WaitingForTrigger => write!(f, "waiting for trigger"),
            AcquisitionState::Captured => write!(f, "captured"),
            AcquisitionState::ReadOut => write!(f, "reading out"),
        }
    }
}

/// A handle to cancel a running setup or acquisition from another thread.
///
/// Clones share the same flag. A cancelled token stays cancelled until [`CancelToken::reset`] is
/// called.
///
/// # Example
///
/// ```
/// use keysight_dsox::CancelToken;
///
/// let token = CancelToken::new();
/// let remote = token.clone();
/// std::thread::spawn(move || remote.cancel()).join().unwrap();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a new token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Clear a previous cancellation request.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Return [`ScopeError::Cancelled`] if cancellation was requested.
    pub(crate) fn check(&self) -> Result<(), ScopeError> {
        if self.is_cancelled() {
            Err(ScopeError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// How the trigger is polled.
///
/// By default there is no timeout: polling only stops when the instrument reports that it
/// stopped running, or when the [`CancelToken`] of the device is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Sleep between two polls.
    pub interval: Duration,
    /// Give up waiting for the trigger after this time.
    pub timeout: Option<Duration>,
}

impl Default for PollSettings {
    fn default() -> Self {
        PollSettings {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: None,
        }
    }
}

impl PollSettings {
    /// Poll settings with the default interval and the given timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        PollSettings {
            timeout: Some(timeout),
            ..Default::default()
        }
    }
}

/// Poll `read_condition` until the run bit clears.
///
/// Cancellation and the deadline are checked before every poll.
pub(crate) fn wait_for_run_bit_clear<F>(
    settings: &PollSettings,
    cancel: &CancelToken,
    mut read_condition: F,
) -> Result<u32, ScopeError>
where
    F: FnMut() -> Result<u32, ScopeError>,
{
    let tic = Instant::now();
    loop {
        cancel.check()?;
        if let Some(timeout) = settings.timeout {
            if tic.elapsed() >= timeout {
                return Err(ScopeError::AcquisitionTimeout(timeout));
            }
        }
        let cond = read_condition()?;
        if cond & RUN_BIT == 0 {
            return Ok(cond);
        }
        std::thread::sleep(settings.interval);
    }
}

/// Parse the response of an operation condition register query.
pub(crate) fn parse_condition(resp: &str) -> Result<u32, ScopeError> {
    let resp = resp.trim();
    resp.strip_prefix('+')
        .unwrap_or(resp)
        .parse::<u32>()
        .map_err(|_| {
            ScopeError::Acquisition(format!(
                "Unexpected operation condition register value: '{resp}'"
            ))
        })
}

/// Parse ASCII waveform data.
///
/// The response is a comma-separated list. The first field is a header of the transfer and is
/// discarded, all other fields are sample values. An empty response or any field that is not a
/// number makes the whole response invalid.
pub fn parse_waveform(raw: &str) -> Option<Vec<f64>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    raw.split(',')
        .skip(1)
        .map(|v| v.trim().parse::<f64>().ok())
        .collect()
}
