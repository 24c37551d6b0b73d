//! 802.11 Information Elements
//!
//! Tag/length/value records carried in management frame bodies.

use tracing::debug;

/// Information Element (IE) types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ElementId {
    Ssid = 0,
    SupportedRates = 1,
    DsParameter = 3,
    Tim = 5,
    Country = 7,
    HtCapabilities = 45,
    RsnInfo = 48,
    ExtendedSupportedRates = 50,
    HtOperation = 61,
    VhtCapabilities = 191,
    VhtOperation = 192,
    VendorSpecific = 221,
    Unknown = 255,
}

impl From<u8> for ElementId {
    fn from(val: u8) -> Self {
        match val {
            0 => ElementId::Ssid,
            1 => ElementId::SupportedRates,
            3 => ElementId::DsParameter,
            5 => ElementId::Tim,
            7 => ElementId::Country,
            45 => ElementId::HtCapabilities,
            48 => ElementId::RsnInfo,
            50 => ElementId::ExtendedSupportedRates,
            61 => ElementId::HtOperation,
            191 => ElementId::VhtCapabilities,
            192 => ElementId::VhtOperation,
            221 => ElementId::VendorSpecific,
            _ => ElementId::Unknown,
        }
    }
}

impl ElementId {
    pub fn name(self) -> &'static str {
        match self {
            ElementId::Ssid => "SSID",
            ElementId::SupportedRates => "Supported Rates",
            ElementId::DsParameter => "DS Parameter Set",
            ElementId::Tim => "TIM",
            ElementId::Country => "Country",
            ElementId::HtCapabilities => "HT Capabilities",
            ElementId::RsnInfo => "RSN",
            ElementId::ExtendedSupportedRates => "Extended Supported Rates",
            ElementId::HtOperation => "HT Operation",
            ElementId::VhtCapabilities => "VHT Capabilities",
            ElementId::VhtOperation => "VHT Operation",
            ElementId::VendorSpecific => "Vendor Specific",
            ElementId::Unknown => "Unknown",
        }
    }
}

/// One information element, in wire order within its frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InformationElement {
    pub tag: u8,
    pub value: Vec<u8>,
}

impl InformationElement {
    pub fn id(&self) -> ElementId {
        ElementId::from(self.tag)
    }

    /// Current channel carried by a DS Parameter Set element
    pub fn ds_channel(&self) -> Option<u8> {
        match self.id() {
            ElementId::DsParameter => self.value.first().copied(),
            _ => None,
        }
    }
}

/// Parse information elements from a management frame body.
///
/// Stops at the first element whose header or value runs past the end of
/// `data`; everything decoded before it is kept.
pub fn parse_ies(data: &[u8]) -> Vec<InformationElement> {
    let mut ies = Vec::new();
    let mut pos = 0;

    while pos < data.len() {
        if pos + 2 > data.len() {
            debug!(offset = pos, "dangling information element header");
            break;
        }

        let tag = data[pos];
        let len = data[pos + 1] as usize;
        pos += 2;

        if pos + len > data.len() {
            debug!(tag, len, remaining = data.len() - pos, "information element overruns frame body");
            break;
        }

        ies.push(InformationElement {
            tag,
            value: data[pos..pos + len].to_vec(),
        });

        pos += len;
    }

    ies
}
