//! 802.11 Frame Structure
//!
//! Decodes the MAC header, resolves address roles from the DS flags and
//! optionally decodes the information elements of management frames.

use std::ops::Range;

use super::addr::HwAddr;
use super::elements::{parse_ies, ElementId, InformationElement};
use crate::wireless::error::{DecodeError, Result};

/// Byte layout of the MAC header as read by this decoder.
///
/// The third address slot is eight bytes wide and the body starts at a
/// fixed offset of 36 whatever the frame type. Both differ from the
/// IEEE 802.11 header (6-byte address, 24/30-byte header). They match the
/// source layout; do not correct them without confirming against captures.
pub mod layout {
    use std::ops::Range;

    pub const FRAME_CONTROL: usize = 0;
    pub const FLAGS: usize = 1;
    pub const DURATION: Range<usize> = 2..4;
    pub const ADDR1: Range<usize> = 4..10;
    pub const ADDR2: Range<usize> = 10..16;
    pub const ADDR3: Range<usize> = 16..24;
    pub const SEQ_CONTROL: Range<usize> = 24..26;
    pub const ADDR4: Range<usize> = 26..32;
    pub const PAYLOAD_OFFSET: usize = 36;
    /// Frame control, duration and addr1
    pub const MIN_LEN: usize = 10;
    pub const FCS_LEN: usize = 4;
}

/// A bit field within a single header byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitField {
    pub shift: u8,
    pub mask: u8,
}

impl BitField {
    pub const fn new(shift: u8, mask: u8) -> Self {
        Self { shift, mask }
    }

    pub fn extract(self, byte: u8) -> u8 {
        (byte >> self.shift) & self.mask
    }
}

/// Frame control byte 0
pub const VERSION_BITS: BitField = BitField::new(0, 0b11);
pub const TYPE_BITS: BitField = BitField::new(2, 0b11);
pub const SUBTYPE_BITS: BitField = BitField::new(4, 0b1111);

/// Frame control byte 1 flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFlag {
    ToDs,
    FromDs,
    MoreFragments,
    Retry,
    PowerManagement,
    MoreData,
    Protected,
}

pub const FLAG_BITS: [(FrameFlag, BitField); 7] = [
    (FrameFlag::ToDs, BitField::new(0, 1)),
    (FrameFlag::FromDs, BitField::new(1, 1)),
    (FrameFlag::MoreFragments, BitField::new(2, 1)),
    (FrameFlag::Retry, BitField::new(3, 1)),
    (FrameFlag::PowerManagement, BitField::new(4, 1)),
    (FrameFlag::MoreData, BitField::new(5, 1)),
    (FrameFlag::Protected, BitField::new(6, 1)),
];

/// Set of frame control flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameFlags(u8);

impl FrameFlags {
    pub fn from_byte(byte: u8) -> Self {
        let bits = FLAG_BITS
            .iter()
            .enumerate()
            .filter(|(_, (_, field))| field.extract(byte) != 0)
            .fold(0u8, |acc, (i, _)| acc | (1 << i));
        Self(bits)
    }

    pub fn contains(self, flag: FrameFlag) -> bool {
        FLAG_BITS
            .iter()
            .position(|(f, _)| *f == flag)
            .map(|i| self.0 & (1 << i) != 0)
            .unwrap_or(false)
    }

    pub fn iter(self) -> impl Iterator<Item = FrameFlag> {
        FLAG_BITS.iter().map(|(f, _)| *f).filter(move |f| self.contains(*f))
    }
}

/// Frame type (2 bits)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Management = 0,
    Control = 1,
    Data = 2,
    Extension = 3,
}

impl From<u8> for FrameType {
    fn from(val: u8) -> Self {
        match val & 0x03 {
            0 => FrameType::Management,
            1 => FrameType::Control,
            2 => FrameType::Data,
            _ => FrameType::Extension,
        }
    }
}

impl FrameType {
    pub fn name(self) -> &'static str {
        match self {
            FrameType::Management => "Management",
            FrameType::Control => "Control",
            FrameType::Data => "Data",
            FrameType::Extension => "Reserved",
        }
    }
}

/// Frame subtype (4 bits), qualified by frame type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSubtype {
    // Management subtypes
    AssocRequest,
    AssocResponse,
    ReassocRequest,
    ReassocResponse,
    ProbeRequest,
    ProbeResponse,
    TimingAdvertisement,
    Beacon,
    Atim,
    Disassociation,
    Authentication,
    Deauthentication,
    Action,
    ActionNoAck,

    // Control subtypes
    CtrlWrapper,
    BlockAckRequest,
    BlockAck,
    PsPoll,
    Rts,
    Cts,
    Ack,
    CfEnd,
    CfEndCfAck,

    // Data subtypes
    Data,
    DataCfAck,
    DataCfPoll,
    DataCfAckCfPoll,
    Null,
    NullCfAck,
    NullCfPoll,
    NullCfAckCfPoll,
    QosData,
    QosDataCfAck,
    QosDataCfPoll,
    QosDataCfAckCfPoll,
    QosNull,
    QosNullCfAck,
    QosNullCfPoll,
    QosNullCfAckCfPoll,

    Unknown(u8),
}

impl FrameSubtype {
    pub fn from_raw(frame_type: FrameType, subtype: u8) -> Self {
        use FrameSubtype::*;
        let sub = subtype & 0x0f;
        match frame_type {
            FrameType::Management => match sub {
                0 => AssocRequest,
                1 => AssocResponse,
                2 => ReassocRequest,
                3 => ReassocResponse,
                4 => ProbeRequest,
                5 => ProbeResponse,
                6 => TimingAdvertisement,
                8 => Beacon,
                9 => Atim,
                10 => Disassociation,
                11 => Authentication,
                12 => Deauthentication,
                13 => Action,
                14 => ActionNoAck,
                _ => Unknown(sub),
            },
            FrameType::Control => match sub {
                7 => CtrlWrapper,
                8 => BlockAckRequest,
                9 => BlockAck,
                10 => PsPoll,
                11 => Rts,
                12 => Cts,
                13 => Ack,
                14 => CfEnd,
                15 => CfEndCfAck,
                _ => Unknown(sub),
            },
            FrameType::Data => match sub {
                0 => Data,
                1 => DataCfAck,
                2 => DataCfPoll,
                3 => DataCfAckCfPoll,
                4 => Null,
                5 => NullCfAck,
                6 => NullCfPoll,
                7 => NullCfAckCfPoll,
                8 => QosData,
                9 => QosDataCfAck,
                10 => QosDataCfPoll,
                11 => QosDataCfAckCfPoll,
                12 => QosNull,
                13 => QosNullCfAck,
                14 => QosNullCfPoll,
                _ => QosNullCfAckCfPoll,
            },
            FrameType::Extension => Unknown(sub),
        }
    }

    pub fn name(self) -> String {
        use FrameSubtype::*;
        let name = match self {
            AssocRequest => "Association Request",
            AssocResponse => "Association Response",
            ReassocRequest => "Reassociation Request",
            ReassocResponse => "Reassociation Response",
            ProbeRequest => "Probe Request",
            ProbeResponse => "Probe Response",
            TimingAdvertisement => "Timing Advertisement",
            Beacon => "Beacon",
            Atim => "ATIM",
            Disassociation => "Disassociation",
            Authentication => "Authentication",
            Deauthentication => "Deauthentication",
            Action => "Action",
            ActionNoAck => "Action No Ack",
            CtrlWrapper => "Control Wrapper",
            BlockAckRequest => "Block Ack Request",
            BlockAck => "Block Ack",
            PsPoll => "PS-Poll",
            Rts => "RTS",
            Cts => "CTS",
            Ack => "ACK",
            CfEnd => "CF-End",
            CfEndCfAck => "CF-End + CF-Ack",
            Data => "Data",
            DataCfAck => "Data + CF-Ack",
            DataCfPoll => "Data + CF-Poll",
            DataCfAckCfPoll => "Data + CF-Ack + CF-Poll",
            Null => "Null",
            NullCfAck => "CF-Ack",
            NullCfPoll => "CF-Poll",
            NullCfAckCfPoll => "CF-Ack + CF-Poll",
            QosData => "QoS Data",
            QosDataCfAck => "QoS Data + CF-Ack",
            QosDataCfPoll => "QoS Data + CF-Poll",
            QosDataCfAckCfPoll => "QoS Data + CF-Ack + CF-Poll",
            QosNull => "QoS Null",
            QosNullCfAck => "QoS CF-Ack",
            QosNullCfPoll => "QoS CF-Poll",
            QosNullCfAckCfPoll => "QoS CF-Ack + CF-Poll",
            Unknown(raw) => return raw.to_string(),
        };
        name.to_string()
    }
}

/// Which address slot plays a role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrSlot {
    Addr1,
    Addr2,
    Addr3,
    Addr4,
}

/// Address roles for one (toDS, fromDS) combination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressRoles {
    pub dest: AddrSlot,
    pub src: AddrSlot,
    pub bssid: Option<AddrSlot>,
}

/// Address roles indexed by (toDS, fromDS)
pub fn address_roles(to_ds: bool, from_ds: bool) -> AddressRoles {
    use AddrSlot::*;
    let (dest, src, bssid) = match (to_ds, from_ds) {
        (false, false) => (Addr1, Addr2, Some(Addr3)),
        (false, true) => (Addr1, Addr3, Some(Addr2)),
        (true, false) => (Addr3, Addr2, Some(Addr1)),
        // Repeated frame between distribution systems
        (true, true) => (Addr3, Addr4, None),
    };
    AddressRoles { dest, src, bssid }
}

/// Decoded 802.11 frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Protocol version (should be 0)
    pub version: u8,
    pub frame_type: FrameType,
    /// Raw 4-bit subtype
    pub subtype: u8,
    pub flags: FrameFlags,
    /// Duration/ID
    pub duration: u16,
    pub addr1: HwAddr,
    pub addr2: Option<HwAddr>,
    /// Eight bytes wide, see [`layout`]
    pub addr3: Option<HwAddr>,
    pub seq_control: Option<u16>,
    pub addr4: Option<HwAddr>,
    /// Frame body, without the FCS trailer
    pub payload: Vec<u8>,
    pub fcs: Option<[u8; 4]>,
    /// Only filled for management frames decoded with `deep`
    pub elements: Vec<InformationElement>,
}

fn le_u16(data: &[u8], range: Range<usize>) -> Option<u16> {
    data.get(range).map(|b| u16::from_le_bytes([b[0], b[1]]))
}

fn addr(data: &[u8], range: Range<usize>) -> Option<HwAddr> {
    data.get(range).and_then(HwAddr::from_slice)
}

impl Frame {
    /// Parse an 802.11 frame.
    ///
    /// With `deep` set, management frame bodies are decoded into
    /// information elements.
    pub fn parse(data: &[u8], deep: bool) -> Result<Self> {
        if data.len() < layout::MIN_LEN {
            return Err(DecodeError::Truncated {
                what: "802.11 header",
                needed: layout::MIN_LEN,
                available: data.len(),
            });
        }

        let fc = data[layout::FRAME_CONTROL];
        let version = VERSION_BITS.extract(fc);
        let frame_type = FrameType::from(TYPE_BITS.extract(fc));
        let subtype = SUBTYPE_BITS.extract(fc);
        let flags = FrameFlags::from_byte(data[layout::FLAGS]);

        let duration = le_u16(data, layout::DURATION).unwrap_or_default();
        let addr1 = addr(data, layout::ADDR1).unwrap_or(HwAddr::ZERO);

        let body = data.get(layout::PAYLOAD_OFFSET..).unwrap_or(&[]);
        let (payload, fcs) = if body.len() > layout::FCS_LEN {
            let split = body.len() - layout::FCS_LEN;
            let mut fcs = [0u8; 4];
            fcs.copy_from_slice(&body[split..]);
            (body[..split].to_vec(), Some(fcs))
        } else {
            (body.to_vec(), None)
        };

        let elements = if deep && frame_type == FrameType::Management {
            parse_ies(&payload)
        } else {
            Vec::new()
        };

        Ok(Self {
            version,
            frame_type,
            subtype,
            flags,
            duration,
            addr1,
            addr2: addr(data, layout::ADDR2),
            addr3: addr(data, layout::ADDR3),
            seq_control: le_u16(data, layout::SEQ_CONTROL),
            addr4: addr(data, layout::ADDR4),
            payload,
            fcs,
            elements,
        })
    }

    pub fn to_ds(&self) -> bool {
        self.flags.contains(FrameFlag::ToDs)
    }

    pub fn from_ds(&self) -> bool {
        self.flags.contains(FrameFlag::FromDs)
    }

    pub fn is_protected(&self) -> bool {
        self.flags.contains(FrameFlag::Protected)
    }

    pub fn subtype_kind(&self) -> FrameSubtype {
        FrameSubtype::from_raw(self.frame_type, self.subtype)
    }

    /// Type and subtype names, e.g. `("Management", "Beacon")`
    pub fn type_names(&self) -> (&'static str, String) {
        (self.frame_type.name(), self.subtype_kind().name())
    }

    /// Check if this is a management frame
    pub fn is_management(&self) -> bool {
        self.frame_type == FrameType::Management
    }

    /// Check if this is a control frame
    pub fn is_control(&self) -> bool {
        self.frame_type == FrameType::Control
    }

    /// Check if this is a data frame
    pub fn is_data(&self) -> bool {
        self.frame_type == FrameType::Data
    }

    pub fn is_beacon(&self) -> bool {
        self.is_management() && self.subtype == 8
    }

    pub fn is_probe_req(&self) -> bool {
        self.is_management() && self.subtype == 4
    }

    pub fn is_probe_resp(&self) -> bool {
        self.is_management() && self.subtype == 5
    }

    fn slot(&self, slot: AddrSlot) -> Option<HwAddr> {
        match slot {
            AddrSlot::Addr1 => Some(self.addr1),
            AddrSlot::Addr2 => self.addr2,
            AddrSlot::Addr3 => self.addr3,
            AddrSlot::Addr4 => self.addr4,
        }
    }

    pub fn roles(&self) -> AddressRoles {
        address_roles(self.to_ds(), self.from_ds())
    }

    /// Get the source address
    pub fn source(&self) -> Option<HwAddr> {
        self.slot(self.roles().src)
    }

    /// Get the destination address
    pub fn destination(&self) -> Option<HwAddr> {
        self.slot(self.roles().dest)
    }

    /// Get the BSSID; repeated (toDS and fromDS) frames have none
    pub fn bssid(&self) -> Option<HwAddr> {
        self.roles().bssid.and_then(|slot| self.slot(slot))
    }

    /// Transmitter and receiver station of a repeated frame
    pub fn repeater_addresses(&self) -> Option<(HwAddr, HwAddr)> {
        if self.to_ds() && self.from_ds() {
            self.addr2.map(|tx| (tx, self.addr1))
        } else {
            None
        }
    }

    /// Raw SSID of beacons and probes
    pub fn ssid_bytes(&self) -> Option<&[u8]> {
        if !(self.is_beacon() || self.is_probe_req() || self.is_probe_resp()) {
            return None;
        }
        self.elements
            .iter()
            .find(|ie| ie.id() == ElementId::Ssid)
            .map(|ie| ie.value.as_slice())
    }

    /// SSID of beacons and probes, `None` for every other frame
    pub fn ssid(&self) -> Option<String> {
        self.ssid_bytes()
            .map(|raw| String::from_utf8_lossy(raw).into_owned())
    }

    /// Get sequence number
    pub fn sequence_number(&self) -> Option<u16> {
        self.seq_control.map(|sc| sc >> 4)
    }

    /// Get fragment number
    pub fn fragment_number(&self) -> Option<u8> {
        self.seq_control.map(|sc| (sc & 0x0f) as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A1: [u8; 6] = [0x11; 6];
    const A2: [u8; 6] = [0x22; 6];
    const A3: [u8; 8] = [0x33; 8];
    const A4: [u8; 6] = [0x44; 6];

    /// Header with sentinel addresses in every slot, then `body`
    fn build(frame_type: u8, subtype: u8, flags: u8, body: &[u8]) -> Vec<u8> {
        let mut buf = vec![(subtype << 4) | (frame_type << 2), flags];
        buf.extend_from_slice(&0x013au16.to_le_bytes());
        buf.extend_from_slice(&A1);
        buf.extend_from_slice(&A2);
        buf.extend_from_slice(&A3);
        buf.extend_from_slice(&0x1234u16.to_le_bytes());
        buf.extend_from_slice(&A4);
        buf.extend_from_slice(&[0u8; 4]);
        assert_eq!(buf.len(), layout::PAYLOAD_OFFSET);
        buf.extend_from_slice(body);
        buf
    }

    fn with_fcs(body: &[u8]) -> Vec<u8> {
        let mut v = body.to_vec();
        v.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        v
    }

    #[test]
    fn test_header_bits() {
        let data = build(2, 8, 0b0100_1001, &[]);
        let frame = Frame::parse(&data, false).unwrap();
        assert_eq!(frame.version, 0);
        assert_eq!(frame.frame_type, FrameType::Data);
        assert_eq!(frame.subtype, 8);
        assert_eq!(frame.subtype_kind(), FrameSubtype::QosData);
        assert!(frame.to_ds());
        assert!(!frame.from_ds());
        assert!(frame.flags.contains(FrameFlag::Retry));
        assert!(frame.is_protected());
        assert!(!frame.flags.contains(FrameFlag::MoreData));
        assert_eq!(frame.flags.iter().count(), 3);
        assert_eq!(frame.duration, 0x013a);
        assert_eq!(frame.seq_control, Some(0x1234));
        assert_eq!(frame.sequence_number(), Some(0x123));
        assert_eq!(frame.fragment_number(), Some(4));
        assert!(frame.is_data());
        assert!(!frame.is_management());
    }

    #[test]
    fn test_address_table() {
        let a1 = Some(HwAddr::new(A1));
        let a2 = Some(HwAddr::new(A2));
        let a3 = HwAddr::from_slice(&A3);
        let a4 = Some(HwAddr::new(A4));

        let cases = [
            (0b00, a1, a2, a3),
            (0b10, a1, a3, a2),
            (0b01, a3, a2, a1),
            (0b11, a3, a4, None),
        ];

        for (flags, dest, src, bssid) in cases {
            let frame = Frame::parse(&build(2, 0, flags, &[]), false).unwrap();
            assert_eq!(frame.destination(), dest, "dest flags={:02b}", flags);
            assert_eq!(frame.source(), src, "src flags={:02b}", flags);
            assert_eq!(frame.bssid(), bssid, "bssid flags={:02b}", flags);
        }

        let wds = Frame::parse(&build(2, 0, 0b11, &[]), false).unwrap();
        assert_eq!(wds.repeater_addresses(), Some((HwAddr::new(A2), HwAddr::new(A1))));
        let plain = Frame::parse(&build(2, 0, 0b01, &[]), false).unwrap();
        assert_eq!(plain.repeater_addresses(), None);
    }

    #[test]
    fn test_third_address_is_eight_bytes() {
        let frame = Frame::parse(&build(0, 8, 0, &[]), false).unwrap();
        assert_eq!(frame.addr3.unwrap().len(), 8);
    }

    #[test]
    fn test_fcs_trailer() {
        let frame = Frame::parse(&build(2, 0, 0, &with_fcs(b"hello")), false).unwrap();
        assert_eq!(frame.payload, b"hello");
        assert_eq!(frame.fcs, Some([0xde, 0xad, 0xbe, 0xef]));

        // Four bytes or fewer: no trailer
        let frame = Frame::parse(&build(2, 0, 0, b"abcd"), false).unwrap();
        assert_eq!(frame.payload, b"abcd");
        assert_eq!(frame.fcs, None);
    }

    #[test]
    fn test_deep_decode_elements() {
        let body = [0x00, 0x04, b'a', b'b', b'c', b'd', 0x01, 0x01, b'x', 0x32, 0x09, 0x01];
        let frame = Frame::parse(&build(0, 0, 0, &with_fcs(&body)), true).unwrap();
        assert_eq!(frame.elements.len(), 2);
        assert_eq!(frame.elements[0], InformationElement { tag: 0, value: b"abcd".to_vec() });
        assert_eq!(frame.elements[1], InformationElement { tag: 1, value: b"x".to_vec() });

        // Without deep decoding nothing is parsed
        let frame = Frame::parse(&build(0, 0, 0, &with_fcs(&body)), false).unwrap();
        assert!(frame.elements.is_empty());
    }

    #[test]
    fn test_beacon_ssid() {
        let mut body = vec![0x00, 9];
        body.extend_from_slice(b"MyNetwork");
        body.extend_from_slice(&[0x03, 0x01, 0x06]);
        let frame = Frame::parse(&build(0, 8, 0, &with_fcs(&body)), true).unwrap();
        assert!(frame.is_beacon());
        assert_eq!(frame.ssid().as_deref(), Some("MyNetwork"));
        assert_eq!(frame.type_names(), ("Management", "Beacon".to_string()));

        let probe = Frame::parse(&build(0, 4, 0, &with_fcs(&body)), true).unwrap();
        assert!(probe.is_probe_req());
        assert_eq!(probe.ssid().as_deref(), Some("MyNetwork"));
    }

    #[test]
    fn test_ssid_none_for_other_frames() {
        let mut body = vec![0x00, 9];
        body.extend_from_slice(b"MyNetwork");

        let data = Frame::parse(&build(2, 0, 0, &with_fcs(&body)), true).unwrap();
        assert_eq!(data.ssid(), None);

        // Management, but not a beacon or probe
        let auth = Frame::parse(&build(0, 11, 0, &with_fcs(&body)), true).unwrap();
        assert_eq!(auth.elements.len(), 1);
        assert_eq!(auth.ssid(), None);
    }

    #[test]
    fn test_short_frames() {
        assert!(matches!(Frame::parse(&[0xd4, 0x00, 0x00], false), Err(DecodeError::Truncated { .. })));

        // ACK: frame control, duration, receiver only
        let ack = [0xd4, 0x00, 0x00, 0x00, 1, 2, 3, 4, 5, 6];
        let frame = Frame::parse(&ack, true).unwrap();
        assert!(frame.is_control());
        assert_eq!(frame.subtype_kind(), FrameSubtype::Ack);
        assert_eq!(frame.addr1, HwAddr::new([1, 2, 3, 4, 5, 6]));
        assert_eq!(frame.addr2, None);
        assert!(frame.payload.is_empty());
        assert_eq!(frame.source(), None);
    }

    #[test]
    fn test_decode_is_repeatable() {
        let data = build(0, 5, 0, &with_fcs(&[0x00, 0x02, b'h', b'i']));
        assert_eq!(Frame::parse(&data, true).unwrap(), Frame::parse(&data, true).unwrap());
    }
}
