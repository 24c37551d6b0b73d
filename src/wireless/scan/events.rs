//! Wireless-extensions scan event stream
//!
//! The kernel answers `SIOCGIWSCAN` with a packed sequence of events, each a
//! `(length u16, command u16)` header in host byte order followed by the
//! event payload. An access-point event opens a group; the events after it
//! describe that access point until the next one.

use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::wireless::convert::{channel_from_mhz, expand_frequency, format_bitrate, format_frequency, MEGA};
use crate::wireless::error::ScanError;
use crate::wireless::ieee80211::HwAddr;

/// Event codes
pub const SIOCGIWNAME: u16 = 0x8B01;
pub const SIOCGIWFREQ: u16 = 0x8B05;
pub const SIOCGIWMODE: u16 = 0x8B07;
pub const SIOCGIWAP: u16 = 0x8B15;
pub const SIOCGIWESSID: u16 = 0x8B1B;
pub const SIOCGIWRATE: u16 = 0x8B21;
pub const SIOCGIWENCODE: u16 = 0x8B2B;
pub const IWEVQUAL: u16 = 0x8C01;
pub const IWEVCUSTOM: u16 = 0x8C02;

/// `(length, command)` event header
pub const EVENT_HEADER_LEN: usize = 4;
/// `(length, flags)` header of variable-length payloads
pub const POINT_HEADER_LEN: usize = 4;
/// `(mantissa i32, exponent i16, index u8, flags u8)`
pub const FREQ_LEN: usize = 8;

/// Encoding flag: encryption disabled
pub const IW_ENCODE_DISABLED: u16 = 0x8000;

const MODE_NAMES: [&str; 8] = [
    "Auto",
    "Ad-Hoc",
    "Managed",
    "Master",
    "Repeater",
    "Secondary",
    "Monitor",
    "Mesh",
];

fn ne_u16(b: &[u8]) -> u16 {
    u16::from_ne_bytes([b[0], b[1]])
}

fn ne_u32(b: &[u8]) -> u32 {
    u32::from_ne_bytes([b[0], b[1], b[2], b[3]])
}

/// Link quality as reported by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Quality {
    pub quality: u8,
    /// Raw signal level byte
    pub level: u8,
    /// Raw noise level byte
    pub noise: u8,
    pub updated: u8,
}

impl Quality {
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        match data {
            [quality, level, noise, updated, ..] => Some(Self {
                quality: *quality,
                level: *level,
                noise: *noise,
                updated: *updated,
            }),
            _ => None,
        }
    }

    /// Signal level in dBm
    pub fn signal_dbm(&self) -> i16 {
        self.level as i16 - 0x100
    }

    /// Noise level in dBm
    pub fn noise_dbm(&self) -> i16 {
        self.noise as i16 - 0x100
    }
}

/// Frequency or channel carried as a mantissa/exponent pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Frequency {
    pub mantissa: i32,
    pub exponent: i16,
    /// `mantissa * 10^exponent`
    pub value: f64,
}

impl Frequency {
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < FREQ_LEN {
            return None;
        }
        let mantissa = i32::from_ne_bytes([data[0], data[1], data[2], data[3]]);
        let exponent = i16::from_ne_bytes([data[4], data[5]]);
        Some(Self {
            mantissa,
            exponent,
            value: expand_frequency(mantissa, exponent),
        })
    }

    /// Values below a kilohertz are channel numbers
    pub fn is_channel(&self) -> bool {
        self.value < 1e3
    }

    pub fn channel(&self) -> Option<u8> {
        if self.is_channel() {
            u8::try_from(self.value as i64).ok()
        } else {
            channel_from_mhz((self.value / MEGA) as u32)
        }
    }

    pub fn formatted(&self) -> String {
        format_frequency(self.value)
    }
}

/// One access point from a scan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanResult {
    pub bssid: HwAddr,
    pub essid: Option<String>,
    pub mode: Option<String>,
    /// Bitrates in event order
    pub rates: Vec<String>,
    pub quality: Quality,
    pub frequency: Option<Frequency>,
    /// Raw encoding event payload
    pub encoding: Option<Vec<u8>>,
    /// Vendor-specific strings
    pub custom: Vec<String>,
    /// Protocol name, e.g. `IEEE 802.11bgn`
    pub protocol: Option<String>,
}

impl ScanResult {
    pub fn new(bssid: HwAddr) -> Self {
        Self {
            bssid,
            essid: None,
            mode: None,
            rates: Vec::new(),
            quality: Quality::default(),
            frequency: None,
            encoding: None,
            custom: Vec::new(),
            protocol: None,
        }
    }

    /// Whether the encoding event reported encryption enabled
    pub fn is_encrypted(&self) -> Option<bool> {
        let enc = self.encoding.as_deref()?;
        let flags = enc.get(2..4).map(ne_u16)?;
        Some(flags & IW_ENCODE_DISABLED == 0)
    }

    /// Highest advertised bitrate (drivers list rates in ascending order)
    pub fn max_rate(&self) -> Option<&str> {
        self.rates.last().map(String::as_str)
    }

    /// Attach one event's payload to this access point
    fn apply(&mut self, code: u16, payload: &[u8]) {
        match code {
            SIOCGIWESSID => self.essid = Some(point_text(payload)),
            SIOCGIWMODE => match payload.get(..4).map(ne_u32) {
                Some(mode) => {
                    self.mode = Some(
                        MODE_NAMES
                            .get(mode as usize)
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| format!("Unknown({})", mode)),
                    )
                }
                None => debug!(bssid = %self.bssid, "short mode event"),
            },
            SIOCGIWRATE => {
                for tuple in payload.chunks_exact(FREQ_LEN) {
                    if let Some(rate) = Frequency::from_bytes(tuple) {
                        self.rates.push(format_bitrate(rate.value));
                    }
                }
            }
            IWEVQUAL => match Quality::from_bytes(payload) {
                Some(q) => self.quality = q,
                None => debug!(bssid = %self.bssid, "short quality event"),
            },
            SIOCGIWFREQ => match Frequency::from_bytes(payload) {
                Some(f) => self.frequency = Some(f),
                None => debug!(bssid = %self.bssid, "short frequency event"),
            },
            SIOCGIWENCODE => self.encoding = Some(payload.to_vec()),
            IWEVCUSTOM => self.custom.push(point_text(payload)),
            SIOCGIWNAME => self.protocol = Some(c_string(payload)),
            _ => {}
        }
    }
}

/// Whether `code` is an event attached to the current access point
pub fn is_result_event(code: u16) -> bool {
    matches!(
        code,
        SIOCGIWESSID
            | SIOCGIWMODE
            | SIOCGIWRATE
            | IWEVQUAL
            | SIOCGIWFREQ
            | SIOCGIWENCODE
            | IWEVCUSTOM
            | SIOCGIWNAME
    )
}

/// Text after a `(length, flags)` point header, bounded by that length
fn point_text(payload: &[u8]) -> String {
    let body = payload.get(POINT_HEADER_LEN..).unwrap_or(&[]);
    let declared = payload.get(..2).map(ne_u16).unwrap_or(0) as usize;
    let text = &body[..declared.min(body.len())];
    String::from_utf8_lossy(text).into_owned()
}

/// NUL-padded string
fn c_string(payload: &[u8]) -> String {
    let end = payload.iter().position(|b| *b == 0).unwrap_or(payload.len());
    String::from_utf8_lossy(&payload[..end]).into_owned()
}

/// Group a scan event stream into access points, in stream order.
///
/// Running out of bytes mid-header, or a header declaring less than its own
/// size, ends the stream quietly. Result events before the first access
/// point, or a stream without a usable final access point, are protocol
/// errors.
pub fn parse_scan_stream(mut data: &[u8]) -> Result<Vec<ScanResult>, ScanError> {
    let mut results = Vec::new();
    let mut current: Option<ScanResult> = None;

    while data.len() >= EVENT_HEADER_LEN {
        let len = ne_u16(&data[0..2]) as usize;
        let code = ne_u16(&data[2..4]);

        if len < EVENT_HEADER_LEN {
            debug!(len, code, "event shorter than its header, ending stream");
            break;
        }

        let end = len.min(data.len());
        let payload = &data[EVENT_HEADER_LEN..end];

        if code == SIOCGIWAP {
            // sockaddr: family, then the address
            let Some(bssid) = payload.get(2..8).and_then(HwAddr::from_slice) else {
                debug!(len, "access point event without address, ending stream");
                break;
            };
            if let Some(done) = current.replace(ScanResult::new(bssid)) {
                push_result(&mut results, done);
            }
        } else if is_result_event(code) {
            let ap = current.as_mut().ok_or_else(|| {
                ScanError::Protocol(format!("event {:#06x} before any access point", code))
            })?;
            ap.apply(code, payload);
        } else {
            trace!(code, len, "ignoring event");
        }

        data = &data[end..];
    }

    match current {
        Some(last) if !last.bssid.is_zero() => {
            results.push(last);
            Ok(results)
        }
        Some(_) => Err(ScanError::Protocol(
            "final access point has no BSSID".to_string(),
        )),
        None => Err(ScanError::Protocol(
            "no access points in scan results (scanning may need CAP_NET_ADMIN)".to_string(),
        )),
    }
}

fn push_result(results: &mut Vec<ScanResult>, result: ScanResult) {
    if result.bssid.is_zero() {
        warn!("dropping access point with all-zero BSSID");
    } else {
        results.push(result);
    }
}


#[cfg(test)]
mod tests {
    use super::stream::*;
    use super::*;

    const AP1: [u8; 6] = [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff];
    const AP2: [u8; 6] = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55];

    fn concat(events: &[Vec<u8>]) -> Vec<u8> {
        events.concat()
    }

    #[test]
    fn test_two_access_points_in_order() {
        let data = concat(&[ap(AP1), essid("Home"), ap(AP2), essid("Office")]);
        let results = parse_scan_stream(&data).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].bssid, HwAddr::new(AP1));
        assert_eq!(results[0].essid.as_deref(), Some("Home"));
        assert_eq!(results[1].bssid, HwAddr::new(AP2));
        assert_eq!(results[1].essid.as_deref(), Some("Office"));
    }

    #[test]
    fn test_event_before_access_point() {
        let data = concat(&[essid("Home"), ap(AP1)]);
        assert!(matches!(parse_scan_stream(&data), Err(ScanError::Protocol(_))));
    }

    #[test]
    fn test_unknown_events_ignored() {
        let data = concat(&[event(0x8C05, &[1, 2, 3]), ap(AP1), event(0x8B99, &[0; 4]), essid("Home")]);
        let results = parse_scan_stream(&data).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].essid.as_deref(), Some("Home"));
    }

    #[test]
    fn test_empty_and_zero_bssid_streams() {
        assert!(matches!(parse_scan_stream(&[]), Err(ScanError::Protocol(_))));

        let data = concat(&[ap([0; 6]), essid("Ghost")]);
        assert!(matches!(parse_scan_stream(&data), Err(ScanError::Protocol(_))));
    }

    #[test]
    fn test_zero_bssid_mid_stream_is_dropped() {
        let data = concat(&[ap([0; 6]), essid("Ghost"), ap(AP1), essid("Home")]);
        let results = parse_scan_stream(&data).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].essid.as_deref(), Some("Home"));
    }

    #[test]
    fn test_stream_cutoffs() {
        // Trailing partial header is ignored
        let mut data = concat(&[ap(AP1), essid("Home")]);
        data.extend_from_slice(&[0x08, 0x00]);
        assert_eq!(parse_scan_stream(&data).unwrap().len(), 1);

        // Header declaring less than itself stops parsing
        let mut data = concat(&[ap(AP1)]);
        data.extend_from_slice(&2u16.to_ne_bytes());
        data.extend_from_slice(&SIOCGIWESSID.to_ne_bytes());
        data.extend(essid("Never"));
        let results = parse_scan_stream(&data).unwrap();
        assert_eq!(results[0].essid, None);
    }

    #[test]
    fn test_all_event_kinds() {
        let mut rates = freq_tuple(1_000_000, 0);
        rates.extend(freq_tuple(54, 6));
        let mut name = b"IEEE 802.11bgn".to_vec();
        name.resize(16, 0);
        let mut encode = Vec::new();
        encode.extend_from_slice(&0u16.to_ne_bytes());
        encode.extend_from_slice(&0x0800u16.to_ne_bytes());

        let data = concat(&[
            ap(AP1),
            event(SIOCGIWNAME, &name),
            event(SIOCGIWMODE, &3u32.to_ne_bytes()),
            event(SIOCGIWFREQ, &freq_tuple(2412, 6)),
            event(IWEVQUAL, &[70, 0xc4, 0xa0, 0x07]),
            event(SIOCGIWRATE, &rates),
            event(SIOCGIWENCODE, &encode),
            point(IWEVCUSTOM, b"tsf=0000000000000000"),
            essid("Home"),
        ]);
        let results = parse_scan_stream(&data).unwrap();
        let r = &results[0];

        assert_eq!(r.protocol.as_deref(), Some("IEEE 802.11bgn"));
        assert_eq!(r.mode.as_deref(), Some("Master"));
        let freq = r.frequency.unwrap();
        assert_eq!(freq.formatted(), "2.412 GHz");
        assert_eq!(freq.channel(), Some(1));
        assert_eq!(r.quality.quality, 70);
        assert_eq!(r.quality.signal_dbm(), -60);
        assert_eq!(r.quality.noise_dbm(), -96);
        assert_eq!(r.quality.updated, 7);
        assert_eq!(r.rates, vec!["1 Mb/s".to_string(), "54 Mb/s".to_string()]);
        assert_eq!(r.max_rate(), Some("54 Mb/s"));
        assert_eq!(r.is_encrypted(), Some(true));
        assert_eq!(r.custom, vec!["tsf=0000000000000000".to_string()]);
        assert_eq!(r.essid.as_deref(), Some("Home"));
    }

    #[test]
    fn test_channel_frequency() {
        let freq = Frequency::from_bytes(&freq_tuple(6, 0)).unwrap();
        assert!(freq.is_channel());
        assert_eq!(freq.channel(), Some(6));
        assert_eq!(freq.formatted(), "6");
    }

    #[test]
    fn test_open_network_encoding() {
        let mut r = ScanResult::new(HwAddr::new(AP1));
        assert_eq!(r.is_encrypted(), None);
        let mut encode = 0u16.to_ne_bytes().to_vec();
        encode.extend_from_slice(&IW_ENCODE_DISABLED.to_ne_bytes());
        r.apply(SIOCGIWENCODE, &encode);
        assert_eq!(r.is_encrypted(), Some(false));
    }
}
