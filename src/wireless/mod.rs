//! 802.11 Wireless Decoding
//!
//! This module provides:
//! - Radiotap capture header parsing
//! - IEEE 802.11 MAC frame and information element parsing
//! - Access point scanning over wireless extensions
//! - Packet capture from monitor-mode interfaces or pcap files
//!
//! Live capture requires a wireless interface in monitor mode.

pub mod capture;
pub mod convert;
pub mod error;
pub mod ieee80211;
pub mod radiotap;
pub mod scan;

pub use capture::{decode_packet, CaptureConfig, CaptureStats, WirelessCapture, WirelessFrame};
pub use error::{CaptureError, DecodeError, ScanError};
pub use ieee80211::{
    parse_ieee80211, parse_ies, ElementId, Frame, FrameFlag, FrameSubtype, FrameType, HwAddr,
    InformationElement,
};
pub use radiotap::{FieldMap, RadiotapField, RadiotapHeader};
pub use scan::{ScanConfig, ScanEventStream, ScanResult, ScanTransport, Status};
