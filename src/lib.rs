//! wifitap: wireless capture and scan decoding
//!
//! Decodes radiotap capture headers, raw 802.11 MAC frames with their
//! information elements, and the Linux wireless-extensions scan result
//! stream.

pub mod config;
pub mod wireless;

pub use config::Config;
pub use wireless::{
    decode_packet, parse_ieee80211, Frame, HwAddr, ScanConfig, ScanEventStream, ScanResult,
    WirelessCapture, WirelessFrame,
};
