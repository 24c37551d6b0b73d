//! Radiotap Header Parser
//!
//! Parses radiotap headers from wireless captures.
//! Radiotap is a de facto standard for 802.11 frame injection and reception.
//!
//! Only the first present word selects fields. Extended present words are
//! skipped, and the payload always starts at the declared header length so
//! unknown trailing fields are never mistaken for frame data.
//!
//! Reference: https://www.radiotap.org/

use std::collections::BTreeMap;

use super::convert::channel_from_mhz;
use super::error::{DecodeError, Result};

/// Size of version + pad + length + first present word
pub const PREAMBLE_LEN: usize = 8;

/// Bit in a present word announcing another present word
pub const EXT_BIT: u32 = 1 << 31;

/// Fields this decoder understands, in wire order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RadiotapField {
    Tsft,
    Flags,
    Rate,
    Channel,
    Fhss,
    DbmAntSignal,
    DbmAntNoise,
    LockQuality,
    TxAttenuation,
    DbTxAttenuation,
    DbmTxPower,
    Antenna,
    DbAntSignal,
    DbAntNoise,
    RxFlags,
    TxFlags,
    RtsRetries,
    DataRetries,
}

/// Layout of one field: present bit, width, required alignment, signedness
#[derive(Debug, Clone, Copy)]
struct FieldLayout {
    field: RadiotapField,
    bit: u32,
    width: usize,
    align: usize,
    signed: bool,
}

const fn layout(field: RadiotapField, bit: u32, width: usize, align: usize, signed: bool) -> FieldLayout {
    FieldLayout { field, bit, width, align, signed }
}

/// Walk order of the fixed-field region
const LAYOUT: [FieldLayout; 18] = [
    layout(RadiotapField::Tsft, 0, 8, 8, false),
    layout(RadiotapField::Flags, 1, 1, 1, false),
    layout(RadiotapField::Rate, 2, 1, 1, false),
    layout(RadiotapField::Channel, 3, 4, 2, false),
    layout(RadiotapField::Fhss, 4, 2, 1, false),
    layout(RadiotapField::DbmAntSignal, 5, 1, 1, true),
    layout(RadiotapField::DbmAntNoise, 6, 1, 1, true),
    layout(RadiotapField::LockQuality, 7, 2, 2, false),
    layout(RadiotapField::TxAttenuation, 8, 2, 2, false),
    layout(RadiotapField::DbTxAttenuation, 9, 2, 2, false),
    layout(RadiotapField::DbmTxPower, 10, 1, 1, true),
    layout(RadiotapField::Antenna, 11, 1, 1, false),
    layout(RadiotapField::DbAntSignal, 12, 1, 1, false),
    layout(RadiotapField::DbAntNoise, 13, 1, 1, false),
    layout(RadiotapField::RxFlags, 14, 2, 2, false),
    layout(RadiotapField::TxFlags, 15, 2, 2, false),
    layout(RadiotapField::RtsRetries, 16, 1, 1, false),
    layout(RadiotapField::DataRetries, 17, 1, 1, false),
];

impl RadiotapField {
    /// Present-word bit announcing this field
    pub fn bit(self) -> u32 {
        LAYOUT
            .iter()
            .find(|l| l.field == self)
            .map(|l| l.bit)
            .unwrap_or(u32::MAX)
    }
}

/// Decoded field value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue {
    Unsigned(u64),
    Signed(i64),
}

impl FieldValue {
    pub fn as_u64(self) -> Option<u64> {
        match self {
            FieldValue::Unsigned(v) => Some(v),
            FieldValue::Signed(v) => u64::try_from(v).ok(),
        }
    }

    pub fn as_i64(self) -> Option<i64> {
        match self {
            FieldValue::Unsigned(v) => i64::try_from(v).ok(),
            FieldValue::Signed(v) => Some(v),
        }
    }
}

/// Fixed part of a radiotap header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RadiotapHeader {
    /// Header version (always 0)
    pub version: u8,
    /// Total header length including fields
    pub length: u16,
    /// First present word
    pub present_flags: u32,
    /// Number of extended present words that followed
    pub extra_present_words: usize,
}

/// Fields decoded from one radiotap header
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldMap {
    fields: BTreeMap<RadiotapField, FieldValue>,
}

impl FieldMap {
    pub fn get(&self, field: RadiotapField) -> Option<FieldValue> {
        self.fields.get(&field).copied()
    }

    pub fn contains(&self, field: RadiotapField) -> bool {
        self.fields.contains_key(&field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RadiotapField, FieldValue)> + '_ {
        self.fields.iter().map(|(k, v)| (*k, *v))
    }

    fn unsigned(&self, field: RadiotapField) -> Option<u64> {
        self.get(field).and_then(FieldValue::as_u64)
    }

    fn signed(&self, field: RadiotapField) -> Option<i64> {
        self.get(field).and_then(FieldValue::as_i64)
    }

    /// MAC timestamp in microseconds
    pub fn tsft(&self) -> Option<u64> {
        self.unsigned(RadiotapField::Tsft)
    }

    /// Data rate in 500 Kbps units
    pub fn rate(&self) -> Option<u8> {
        self.unsigned(RadiotapField::Rate).map(|v| v as u8)
    }

    /// Channel frequency in MHz (low half of the channel field)
    pub fn channel_freq(&self) -> Option<u16> {
        self.unsigned(RadiotapField::Channel).map(|v| (v & 0xffff) as u16)
    }

    /// Channel flags (high half of the channel field)
    pub fn channel_flags(&self) -> Option<u16> {
        self.unsigned(RadiotapField::Channel).map(|v| (v >> 16) as u16)
    }

    /// Channel number derived from the channel frequency
    pub fn channel(&self) -> Option<u8> {
        self.channel_freq().and_then(|f| channel_from_mhz(f as u32))
    }

    /// Signal strength in dBm
    pub fn signal_dbm(&self) -> Option<i8> {
        self.signed(RadiotapField::DbmAntSignal).map(|v| v as i8)
    }

    /// Noise floor in dBm
    pub fn noise_dbm(&self) -> Option<i8> {
        self.signed(RadiotapField::DbmAntNoise).map(|v| v as i8)
    }

    pub fn antenna(&self) -> Option<u8> {
        self.unsigned(RadiotapField::Antenna).map(|v| v as u8)
    }

    /// Get signal-to-noise ratio if available
    pub fn snr(&self) -> Option<i16> {
        match (self.signal_dbm(), self.noise_dbm()) {
            (Some(sig), Some(noise)) => Some(sig as i16 - noise as i16),
            _ => None,
        }
    }

    /// Check if this is 2.4GHz band
    pub fn is_2_4ghz(&self) -> bool {
        self.channel_freq().map(|f| (2400..=2500).contains(&f)).unwrap_or(false)
    }

    /// Check if this is 5GHz band
    pub fn is_5ghz(&self) -> bool {
        self.channel_freq().map(|f| (5000..=6000).contains(&f)).unwrap_or(false)
    }
}

fn le_u32(data: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
}

fn truncated(what: &'static str, needed: usize, available: usize) -> DecodeError {
    DecodeError::Truncated { what, needed, available }
}

/// Parse the preamble and any chained present words
pub fn parse_header(data: &[u8]) -> Result<RadiotapHeader> {
    if data.len() < PREAMBLE_LEN {
        return Err(truncated("radiotap preamble", PREAMBLE_LEN, data.len()));
    }

    let version = data[0];
    if version != 0 {
        return Err(DecodeError::UnsupportedVersion(version));
    }

    let length = u16::from_le_bytes([data[2], data[3]]);
    let present_flags = le_u32(data, 4);

    // Extended present words are chained through their top bit
    let mut word = present_flags;
    let mut extra_present_words = 0;
    while word & EXT_BIT != 0 {
        let pos = PREAMBLE_LEN + extra_present_words * 4;
        if pos + 4 > data.len() {
            return Err(truncated("radiotap present word", pos + 4, data.len()));
        }
        word = le_u32(data, pos);
        extra_present_words += 1;
    }

    Ok(RadiotapHeader {
        version,
        length,
        present_flags,
        extra_present_words,
    })
}

/// Parse a radiotap header.
///
/// Returns the decoded fields and the offset of the 802.11 frame, which is
/// always the declared header length.
pub fn parse(data: &[u8]) -> Result<(FieldMap, usize)> {
    parse_radiotap(data).map(|(_, fields, offset)| (fields, offset))
}

/// Parse a radiotap header, also returning its fixed part
pub fn parse_radiotap(data: &[u8]) -> Result<(RadiotapHeader, FieldMap, usize)> {
    let header = parse_header(data)?;
    let declared = header.length as usize;

    if data.len() < declared {
        return Err(truncated("radiotap header", declared, data.len()));
    }

    let start = PREAMBLE_LEN + header.extra_present_words * 4;
    if start > declared {
        return Err(truncated("radiotap header", start, declared));
    }

    let fields = parse_fields(&data[start..declared], header.present_flags)?;
    Ok((header, fields, declared))
}

/// Parse the fixed-field region selected by `present`
fn parse_fields(data: &[u8], present: u32) -> Result<FieldMap> {
    let mut map = FieldMap::default();
    let mut pos = 0usize;

    for l in LAYOUT.iter().filter(|l| present & (1 << l.bit) != 0) {
        // Pad to the field's natural boundary
        if pos % l.align != 0 {
            pos += l.align - (pos % l.align);
        }
        if pos + l.width > data.len() {
            return Err(truncated("radiotap fields", pos + l.width, data.len()));
        }

        let mut raw = [0u8; 8];
        raw[..l.width].copy_from_slice(&data[pos..pos + l.width]);
        let value = u64::from_le_bytes(raw);

        let value = if l.signed {
            // Sign-extend from the field width
            let shift = 64 - 8 * l.width as u32;
            FieldValue::Signed(((value << shift) as i64) >> shift)
        } else {
            FieldValue::Unsigned(value)
        };

        map.fields.insert(l.field, value);
        pos += l.width;
    }

    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(present: u32, extra: &[u32], fields: &[u8], declared: Option<u16>) -> Vec<u8> {
        let len = PREAMBLE_LEN + extra.len() * 4 + fields.len();
        let declared = declared.unwrap_or(len as u16);
        let mut buf = vec![0x00, 0x00];
        buf.extend_from_slice(&declared.to_le_bytes());
        buf.extend_from_slice(&present.to_le_bytes());
        for word in extra {
            buf.extend_from_slice(&word.to_le_bytes());
        }
        buf.extend_from_slice(fields);
        buf.resize(buf.len().max(declared as usize), 0xee);
        buf
    }

    #[test]
    fn test_parse_minimal_radiotap() {
        // Minimal radiotap header: version, pad, length=8, present=0
        let data = [0x00, 0x00, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00];
        let (hdr, fields, len) = parse_radiotap(&data).unwrap();
        assert_eq!(hdr.version, 0);
        assert_eq!(hdr.length, 8);
        assert_eq!(hdr.present_flags, 0);
        assert_eq!(len, 8);
        assert!(fields.is_empty());
        assert!(fields.tsft().is_none());
    }

    #[test]
    fn test_rate_and_signal_only() {
        let present = (1 << 2) | (1 << 5);
        // Declared length is larger than the two fields need
        let data = header(present, &[], &[0x6c, 0xb5], Some(14));
        let (fields, offset) = parse(&data).unwrap();

        assert_eq!(fields.len(), 2);
        assert_eq!(fields.get(RadiotapField::Rate), Some(FieldValue::Unsigned(0x6c)));
        assert_eq!(fields.get(RadiotapField::DbmAntSignal), Some(FieldValue::Signed(-75)));
        assert_eq!(fields.signal_dbm(), Some(-75));
        assert_eq!(offset, 14);
    }

    #[test]
    fn test_channel_alignment_padding() {
        // Flags (1 byte) then channel (4 bytes, 2-aligned): one pad byte
        let present = (1 << 1) | (1 << 3);
        let fields = [0x10, 0x00, 0x85, 0x09, 0xa0, 0x00];
        let data = header(present, &[], &fields, None);
        let (map, offset) = parse(&data).unwrap();

        assert_eq!(map.get(RadiotapField::Flags), Some(FieldValue::Unsigned(0x10)));
        assert_eq!(map.channel_freq(), Some(2437));
        assert_eq!(map.channel_flags(), Some(0x00a0));
        assert_eq!(map.channel(), Some(6));
        assert_eq!(offset, data.len());
    }

    #[test]
    fn test_extended_present_words() {
        let present = EXT_BIT | (1 << 2);
        let data = header(present, &[0x0000_0001], &[0x02], None);
        let (hdr, map, _) = parse_radiotap(&data).unwrap();
        assert_eq!(hdr.extra_present_words, 1);
        assert_eq!(map.rate(), Some(2));

        // Second word chains to a third
        let data = header(present, &[EXT_BIT, 0x0000_0000], &[0x04], None);
        let (hdr, map, _) = parse_radiotap(&data).unwrap();
        assert_eq!(hdr.extra_present_words, 2);
        assert_eq!(map.rate(), Some(4));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_full_layout() {
        let present = (1 << 0) | (1 << 1) | (1 << 2) | (1 << 3) | (1 << 5) | (1 << 6) | (1 << 11) | (1 << 14);
        let mut fields = Vec::new();
        fields.extend_from_slice(&0x1122_3344_5566_7788u64.to_le_bytes());
        fields.push(0x02); // flags
        fields.push(0x0c); // rate
        fields.extend_from_slice(&[0x6c, 0x09, 0x80, 0x04]); // channel 2412
        fields.push(0xc4); // -60 dBm
        fields.push(0xa0); // -96 dBm
        fields.push(0x01); // antenna
        fields.push(0x00); // pad
        fields.extend_from_slice(&0x0002u16.to_le_bytes()); // rx flags
        let data = header(present, &[], &fields, None);
        let (map, _) = parse(&data).unwrap();

        assert_eq!(map.tsft(), Some(0x1122_3344_5566_7788));
        assert_eq!(map.rate(), Some(12));
        assert_eq!(map.channel_freq(), Some(2412));
        assert_eq!(map.signal_dbm(), Some(-60));
        assert_eq!(map.noise_dbm(), Some(-96));
        assert_eq!(map.snr(), Some(36));
        assert_eq!(map.antenna(), Some(1));
        assert_eq!(map.get(RadiotapField::RxFlags), Some(FieldValue::Unsigned(2)));
        assert!(map.is_2_4ghz());
        assert!(!map.is_5ghz());
    }

    #[test]
    fn test_remaining_fields() {
        let present = [2, 4, 7, 8, 9, 10, 12, 13, 15, 16, 17]
            .iter()
            .fold(0u32, |acc, bit| acc | (1 << bit));
        let mut fields = Vec::new();
        fields.push(0x02); // rate
        fields.extend_from_slice(&0x2211u16.to_le_bytes()); // fhss, byte aligned
        fields.push(0xff); // pad
        fields.extend_from_slice(&0x1234u16.to_le_bytes()); // lock quality
        fields.extend_from_slice(&5u16.to_le_bytes()); // tx attenuation
        fields.extend_from_slice(&6u16.to_le_bytes()); // dB tx attenuation
        fields.push(0xf6); // -10 dBm tx power
        fields.push(0x20); // dB antenna signal
        fields.push(0x08); // dB antenna noise
        fields.push(0xff); // pad
        fields.extend_from_slice(&9u16.to_le_bytes()); // tx flags
        fields.push(3); // rts retries
        fields.push(4); // data retries
        assert_eq!(fields.len(), 18);

        let data = header(present, &[], &fields, None);
        let (map, offset) = parse(&data).unwrap();
        let unsigned = |field| map.get(field).and_then(FieldValue::as_u64);

        assert_eq!(map.len(), 11);
        assert_eq!(map.rate(), Some(2));
        assert_eq!(unsigned(RadiotapField::Fhss), Some(0x2211));
        assert_eq!(unsigned(RadiotapField::LockQuality), Some(0x1234));
        assert_eq!(unsigned(RadiotapField::TxAttenuation), Some(5));
        assert_eq!(unsigned(RadiotapField::DbTxAttenuation), Some(6));
        assert_eq!(map.get(RadiotapField::DbmTxPower), Some(FieldValue::Signed(-10)));
        assert_eq!(unsigned(RadiotapField::DbAntSignal), Some(0x20));
        assert_eq!(unsigned(RadiotapField::DbAntNoise), Some(0x08));
        assert_eq!(unsigned(RadiotapField::TxFlags), Some(9));
        assert_eq!(unsigned(RadiotapField::RtsRetries), Some(3));
        assert_eq!(unsigned(RadiotapField::DataRetries), Some(4));
        assert_eq!(offset, PREAMBLE_LEN + 18);
    }

    #[test]
    fn test_bad_version() {
        let mut data = header(0, &[], &[], None);
        data[0] = 1;
        assert_eq!(parse(&data), Err(DecodeError::UnsupportedVersion(1)));
    }

    #[test]
    fn test_truncated() {
        assert!(matches!(parse(&[0, 0, 8, 0]), Err(DecodeError::Truncated { .. })));

        // Declared length too short for the channel field
        let data = header(1 << 3, &[], &[0x6c, 0x09], None);
        assert!(matches!(parse(&data), Err(DecodeError::Truncated { .. })));

        // Buffer shorter than declared length
        let mut data = header(0, &[], &[], Some(16));
        data.truncate(10);
        assert!(matches!(parse(&data), Err(DecodeError::Truncated { .. })));

        // Extended present word missing
        let data = header(EXT_BIT, &[], &[], None);
        assert!(matches!(parse(&data), Err(DecodeError::Truncated { .. })));
    }

    #[test]
    fn test_decode_is_repeatable() {
        let data = header((1 << 2) | (1 << 11), &[], &[0x16, 0x02], None);
        assert_eq!(parse(&data).unwrap(), parse(&data).unwrap());
    }
}
