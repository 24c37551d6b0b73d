//! Access Point Scanning
//!
//! Drives the wireless-extensions scan protocol: optionally trigger a scan,
//! poll for results with a growing buffer until the kernel has them, then
//! decode the event stream into [`ScanResult`]s.
//!
//! The kernel side sits behind [`ScanTransport`] and waiting behind
//! [`Clock`], so the whole protocol runs without a device or real delays.

pub mod events;
#[cfg(target_os = "linux")]
pub mod wext;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::error::ScanError;

pub use events::{parse_scan_stream, Frequency, Quality, ScanResult};

/// Outcome of one transport request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Success,
    /// Buffer too small; the kernel's size hint
    BufferTooSmall(usize),
    /// Results not ready yet
    NotReadyRetry,
    PermissionDenied,
    DeviceAbsent,
    OtherError { code: i32, message: String },
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Success => write!(f, "success"),
            Status::BufferTooSmall(hint) => write!(f, "buffer too small (need {} bytes)", hint),
            Status::NotReadyRetry => write!(f, "results not ready"),
            Status::PermissionDenied => write!(f, "permission denied (need root/CAP_NET_ADMIN)"),
            Status::DeviceAbsent => write!(f, "no such device"),
            Status::OtherError { code, message } => write!(f, "error {}: {}", code, message),
        }
    }
}

/// Kernel side of the scan protocol
pub trait ScanTransport {
    /// Ask the driver to start a scan
    fn trigger_scan(&mut self, interface: &str) -> Status;

    /// Fetch the results of the last scan into a buffer of `buffer_size` bytes
    fn get_scan_results(&mut self, interface: &str, buffer_size: usize) -> (Status, Vec<u8>);
}

impl<T: ScanTransport + ?Sized> ScanTransport for &mut T {
    fn trigger_scan(&mut self, interface: &str) -> Status {
        (**self).trigger_scan(interface)
    }

    fn get_scan_results(&mut self, interface: &str, buffer_size: usize) -> (Status, Vec<u8>) {
        (**self).get_scan_results(interface, buffer_size)
    }
}

/// Source of the waits between polls
pub trait Clock {
    fn sleep(&mut self, duration: Duration);
}

impl<C: Clock + ?Sized> Clock for &mut C {
    fn sleep(&mut self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// Blocks the calling thread
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Scan timing and buffer limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Interface to scan on
    pub interface: String,
    /// Wait after triggering a scan before the first poll
    pub trigger_delay_ms: u64,
    /// Wait between polls while results are not ready
    pub retry_delay_ms: u64,
    /// Initial result buffer size
    pub initial_buffer_size: usize,
    /// Largest result buffer to request
    pub max_buffer_size: usize,
    /// Result requests before giving up
    pub max_polls: u32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            interface: "wlan0".to_string(),
            trigger_delay_ms: 250,
            retry_delay_ms: 100,
            initial_buffer_size: 4096,
            // Point lengths are 16 bits
            max_buffer_size: u16::MAX as usize,
            max_polls: 100,
        }
    }
}

impl ScanConfig {
    pub fn for_interface(name: &str) -> Self {
        Self {
            interface: name.to_string(),
            ..Default::default()
        }
    }
}

/// Protocol state
#[derive(Debug)]
enum ScanState {
    Idle,
    Triggering,
    Polling {
        delay: Duration,
        buffer_size: usize,
        polls: u32,
    },
    Parsing(Vec<u8>),
    Done(Vec<ScanResult>),
    Failed(ScanError),
}

/// Scan protocol state machine over a transport and a clock
pub struct ScanEventStream<T, C = SystemClock> {
    transport: T,
    clock: C,
    config: ScanConfig,
}

impl<T: ScanTransport> ScanEventStream<T, SystemClock> {
    pub fn new(transport: T, config: ScanConfig) -> Self {
        Self::with_clock(transport, SystemClock, config)
    }
}

impl<T: ScanTransport, C: Clock> ScanEventStream<T, C> {
    pub fn with_clock(transport: T, clock: C, config: ScanConfig) -> Self {
        Self {
            transport,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Run a scan.
    ///
    /// With `full_scan` a new scan is triggered first; otherwise the
    /// driver's cached results are read.
    pub fn scan(&mut self, full_scan: bool) -> Result<Vec<ScanResult>, ScanError> {
        let mut state = ScanState::Idle;
        loop {
            state = match state {
                ScanState::Done(results) => {
                    info!(
                        interface = %self.config.interface,
                        access_points = results.len(),
                        "scan complete"
                    );
                    return Ok(results);
                }
                ScanState::Failed(err) => return Err(err),
                other => self.step(other, full_scan),
            };
        }
    }

    fn polling(&self, delay: Duration) -> ScanState {
        ScanState::Polling {
            delay,
            buffer_size: self.config.initial_buffer_size,
            polls: 0,
        }
    }

    fn step(&mut self, state: ScanState, full_scan: bool) -> ScanState {
        match state {
            ScanState::Idle if full_scan => ScanState::Triggering,
            ScanState::Idle => self.polling(Duration::ZERO),
            ScanState::Triggering => self.trigger(),
            ScanState::Polling {
                delay,
                buffer_size,
                polls,
            } => self.poll(delay, buffer_size, polls),
            ScanState::Parsing(data) => match parse_scan_stream(&data) {
                Ok(results) => ScanState::Done(results),
                Err(e) => ScanState::Failed(e),
            },
            terminal => terminal,
        }
    }

    fn trigger(&mut self) -> ScanState {
        match self.transport.trigger_scan(&self.config.interface) {
            Status::Success => {
                debug!(interface = %self.config.interface, "scan triggered");
                self.polling(Duration::from_millis(self.config.trigger_delay_ms))
            }
            Status::PermissionDenied => {
                // Not allowed to scan, read what the driver has cached
                debug!(interface = %self.config.interface, "scan trigger denied, reading cached results");
                self.polling(Duration::ZERO)
            }
            status => ScanState::Failed(ScanError::Transport {
                op: "trigger scan",
                status,
            }),
        }
    }

    fn poll(&mut self, delay: Duration, buffer_size: usize, polls: u32) -> ScanState {
        if polls >= self.config.max_polls {
            return ScanState::Failed(ScanError::Timeout { polls });
        }

        if !delay.is_zero() {
            self.clock.sleep(delay);
        }

        let (status, data) = self
            .transport
            .get_scan_results(&self.config.interface, buffer_size);
        let polls = polls + 1;

        match status {
            Status::Success => {
                debug!(bytes = data.len(), polls, "scan results received");
                ScanState::Parsing(data)
            }
            Status::BufferTooSmall(hint) => {
                let wanted = hint.max(buffer_size.saturating_mul(2));
                let limit = self.config.max_buffer_size;
                if hint > limit || buffer_size >= limit {
                    return ScanState::Failed(ScanError::BufferLimit {
                        requested: wanted,
                        limit,
                    });
                }
                let buffer_size = wanted.min(limit);
                debug!(buffer_size, hint, "growing scan buffer");
                ScanState::Polling {
                    delay: Duration::ZERO,
                    buffer_size,
                    polls,
                }
            }
            Status::NotReadyRetry => ScanState::Polling {
                delay: Duration::from_millis(self.config.retry_delay_ms),
                buffer_size,
                polls,
            },
            status => ScanState::Failed(ScanError::Transport {
                op: "get scan results",
                status,
            }),
        }
    }
}
