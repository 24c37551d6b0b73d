use thiserror::Error;

use super::scan::Status;

/// Per-packet decode failure. The packet is skipped, the session goes on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unsupported radiotap version {0}")]
    UnsupportedVersion(u8),

    #[error("truncated {what}: need {needed} bytes, have {available}")]
    Truncated {
        what: &'static str,
        needed: usize,
        available: usize,
    },
}

/// Failure of a whole scan call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("scan protocol error: {0}")]
    Protocol(String),

    #[error("{op} failed: {status}")]
    Transport { op: &'static str, status: Status },

    #[error("scan results not ready after {polls} polls")]
    Timeout { polls: u32 },

    #[error("scan buffer of {requested} bytes exceeds limit of {limit}")]
    BufferLimit { requested: usize, limit: usize },
}

/// Packet source failure
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("pcap error: {0}")]
    Pcap(String),

    #[error("no capture source configured (need an interface or a pcap file)")]
    NoSource,

    #[error("invalid BSSID filter: {0}")]
    InvalidFilter(String),
}

pub type Result<T> = std::result::Result<T, DecodeError>;
