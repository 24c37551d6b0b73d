//! 802.11 Frame Parsing
//!
//! This module provides parsing for IEEE 802.11 MAC frames.

mod addr;
mod elements;
mod frame;

pub use addr::*;
pub use elements::*;
pub use frame::*;

/// Parse an 802.11 frame from bytes
pub fn parse_ieee80211(data: &[u8], deep: bool) -> crate::wireless::error::Result<Frame> {
    Frame::parse(data, deep)
}
