//! Hardware addresses as carried in frames and scan events

use serde::{Serialize, Serializer};

/// Widest address slot the frame layout defines (the third address field)
pub const MAX_ADDR_LEN: usize = 8;

/// Hardware address of up to eight bytes.
///
/// Regular MAC addresses are six bytes; the frame layout reads its third
/// address slot as eight bytes, so the type carries its own length.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HwAddr {
    bytes: [u8; MAX_ADDR_LEN],
    len: u8,
}

impl HwAddr {
    pub const BROADCAST: HwAddr = HwAddr::new([0xff; 6]);
    pub const ZERO: HwAddr = HwAddr::new([0; 6]);

    /// Six-byte MAC address
    pub const fn new(mac: [u8; 6]) -> Self {
        let mut bytes = [0u8; MAX_ADDR_LEN];
        let mut i = 0;
        while i < 6 {
            bytes[i] = mac[i];
            i += 1;
        }
        Self { bytes, len: 6 }
    }

    /// Address of `data.len()` bytes; `None` if wider than eight bytes
    pub fn from_slice(data: &[u8]) -> Option<Self> {
        if data.len() > MAX_ADDR_LEN {
            return None;
        }
        let mut bytes = [0u8; MAX_ADDR_LEN];
        bytes[..data.len()].copy_from_slice(data);
        Some(Self {
            bytes,
            len: data.len() as u8,
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The all-zero address, which marks an unset BSSID
    pub fn is_zero(&self) -> bool {
        self.as_bytes().iter().all(|b| *b == 0)
    }

    pub fn is_broadcast(&self) -> bool {
        self.len > 0 && self.as_bytes().iter().all(|b| *b == 0xff)
    }

    pub fn is_multicast(&self) -> bool {
        self.len > 0 && self.bytes[0] & 0x01 != 0
    }

    pub fn is_locally_administered(&self) -> bool {
        self.len > 0 && self.bytes[0] & 0x02 != 0
    }
}

impl std::fmt::Display for HwAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, b) in self.as_bytes().iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for HwAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HwAddr({})", self)
    }
}

impl std::str::FromStr for HwAddr {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s
            .split(|c| c == ':' || c == '-')
            .map(|part| u8::from_str_radix(part, 16))
            .collect::<Result<Vec<u8>, _>>()
            .map_err(|e| format!("{}: {}", s, e))?;
        if bytes.len() != 6 {
            return Err(format!("{}: expected 6 octets, got {}", s, bytes.len()));
        }
        Self::from_slice(&bytes).ok_or_else(|| s.to_string())
    }
}

impl Serialize for HwAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
