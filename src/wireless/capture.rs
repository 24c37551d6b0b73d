//! Wireless Packet Capture
//!
//! Pulls radiotap-prefixed 802.11 frames from a packet source and decodes
//! both layers. Packets that fail to decode are counted and skipped; they
//! never end the session.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::error::{CaptureError, DecodeError};
use super::ieee80211::{Frame, HwAddr};
use super::radiotap::{self, FieldMap};

/// Link type of radiotap-prefixed 802.11 captures
pub const DLT_IEEE802_11_RADIO: i32 = 127;

/// Wireless capture configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Monitor-mode interface for live capture
    pub interface: Option<String>,
    /// Capture file to replay instead of a live interface
    pub pcap_file: Option<PathBuf>,
    /// Snapshot length
    pub snaplen: i32,
    /// Read timeout in milliseconds
    pub timeout_ms: i32,
    /// Promiscuous mode (usually true for monitor mode)
    pub promiscuous: bool,
    /// Decode information elements of management frames
    pub deep_decode: bool,
    /// Only keep frames of this BSSID
    pub bssid_filter: Option<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            interface: None,
            pcap_file: None,
            snaplen: 2548,
            timeout_ms: 1000,
            promiscuous: true,
            deep_decode: true,
            bssid_filter: None,
        }
    }
}

impl CaptureConfig {
    /// Create config for a specific interface
    pub fn for_interface(name: &str) -> Self {
        Self {
            interface: Some(name.to_string()),
            ..Default::default()
        }
    }

    /// Create config replaying a capture file
    pub fn for_file<P: AsRef<Path>>(path: P) -> Self {
        Self {
            pcap_file: Some(path.as_ref().to_path_buf()),
            ..Default::default()
        }
    }

    /// Filter to specific BSSID
    pub fn with_bssid_filter(mut self, bssid: &str) -> Self {
        self.bssid_filter = Some(bssid.to_string());
        self
    }

    pub fn bssid(&self) -> Result<Option<HwAddr>, CaptureError> {
        self.bssid_filter
            .as_deref()
            .map(|s| s.parse::<HwAddr>().map_err(CaptureError::InvalidFilter))
            .transpose()
    }
}

/// Result of asking a source for the next packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Polled {
    Packet(Vec<u8>),
    /// Nothing arrived within the read timeout
    Timeout,
    /// The source has no more packets
    Exhausted,
}

/// Something that delivers one captured packet per read
pub trait PacketSource {
    fn next_packet(&mut self) -> Result<Polled, CaptureError>;
}

impl<S: PacketSource + ?Sized> PacketSource for Box<S> {
    fn next_packet(&mut self) -> Result<Polled, CaptureError> {
        (**self).next_packet()
    }
}

/// Packet source backed by libpcap
pub struct PcapSource<T: pcap::Activated + ?Sized> {
    cap: pcap::Capture<T>,
}

impl PcapSource<pcap::Active> {
    /// Open a live capture on a monitor-mode interface
    pub fn live(config: &CaptureConfig) -> Result<Self, CaptureError> {
        let interface = config.interface.as_deref().ok_or(CaptureError::NoSource)?;
        let cap = pcap::Capture::from_device(interface)
            .map_err(|e| CaptureError::Pcap(e.to_string()))?
            .promisc(config.promiscuous)
            .immediate_mode(true)
            .snaplen(config.snaplen)
            .timeout(config.timeout_ms)
            .open()
            .map_err(|e| CaptureError::Pcap(e.to_string()))?;
        Ok(Self::checked(cap))
    }
}

impl PcapSource<pcap::Offline> {
    /// Replay a capture file
    pub fn file<P: AsRef<Path>>(path: P) -> Result<Self, CaptureError> {
        let cap = pcap::Capture::from_file(path).map_err(|e| CaptureError::Pcap(e.to_string()))?;
        Ok(Self::checked(cap))
    }
}

impl<T: pcap::Activated + ?Sized> PcapSource<T> {
    fn checked(cap: pcap::Capture<T>) -> Self {
        let link = cap.get_datalink();
        if link.0 != DLT_IEEE802_11_RADIO {
            warn!(linktype = link.0, "capture is not radiotap 802.11, frames will fail to decode");
        }
        Self { cap }
    }
}

impl<T: pcap::Activated + ?Sized> PacketSource for PcapSource<T> {
    fn next_packet(&mut self) -> Result<Polled, CaptureError> {
        match self.cap.next_packet() {
            Ok(packet) => Ok(Polled::Packet(packet.data.to_vec())),
            Err(pcap::Error::TimeoutExpired) => Ok(Polled::Timeout),
            Err(pcap::Error::NoMorePackets) => Ok(Polled::Exhausted),
            Err(e) => Err(CaptureError::Pcap(e.to_string())),
        }
    }
}

/// Open the source a config names, preferring the capture file
pub fn open_source(config: &CaptureConfig) -> Result<Box<dyn PacketSource>, CaptureError> {
    if let Some(path) = &config.pcap_file {
        info!(file = %path.display(), "replaying capture file");
        return Ok(Box::new(PcapSource::file(path)?));
    }
    if let Some(interface) = &config.interface {
        info!(interface = %interface, "capturing live");
        return Ok(Box::new(PcapSource::live(config)?));
    }
    Err(CaptureError::NoSource)
}

/// One decoded packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WirelessFrame {
    /// Radiotap metadata
    pub radiotap: FieldMap,
    /// Parsed 802.11 frame
    pub frame: Frame,
    /// Captured length including the radiotap header
    pub captured_len: usize,
}

/// Decode a radiotap header and the 802.11 frame after it
pub fn decode_packet(data: &[u8], deep: bool) -> Result<WirelessFrame, DecodeError> {
    let (radiotap, offset) = radiotap::parse(data)?;
    let frame = Frame::parse(&data[offset..], deep)?;
    Ok(WirelessFrame {
        radiotap,
        frame,
        captured_len: data.len(),
    })
}

/// Session counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub received: u64,
    pub decoded: u64,
    /// Failed to decode
    pub skipped: u64,
    /// Dropped by the BSSID filter
    pub filtered: u64,
}

/// Wireless packet capture session
pub struct WirelessCapture<S> {
    source: S,
    deep: bool,
    bssid_filter: Option<HwAddr>,
    running: Arc<AtomicBool>,
    stats: CaptureStats,
}

impl<S: PacketSource> WirelessCapture<S> {
    pub fn new(source: S, deep: bool) -> Self {
        Self {
            source,
            deep,
            bssid_filter: None,
            running: Arc::new(AtomicBool::new(false)),
            stats: CaptureStats::default(),
        }
    }

    /// Build a session from a source and its config
    pub fn with_config(source: S, config: &CaptureConfig) -> Result<Self, CaptureError> {
        let mut capture = Self::new(source, config.deep_decode);
        capture.bssid_filter = config.bssid()?;
        Ok(capture)
    }

    pub fn with_bssid_filter(mut self, bssid: HwAddr) -> Self {
        self.bssid_filter = Some(bssid);
        self
    }

    /// Stop capture
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Check if capture is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get running flag for external control
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn stats(&self) -> CaptureStats {
        self.stats
    }

    fn keep(&self, frame: &Frame) -> bool {
        match (&self.bssid_filter, frame.bssid()) {
            (Some(filter), Some(bssid)) => bssid.as_bytes().starts_with(filter.as_bytes()),
            _ => true,
        }
    }

    /// Capture until the source is exhausted, `limit` frames were handed
    /// out, or [`stop`](Self::stop) is called.
    pub fn run<F>(&mut self, limit: Option<u64>, mut handler: F) -> Result<CaptureStats, CaptureError>
    where
        F: FnMut(WirelessFrame),
    {
        self.running.store(true, Ordering::SeqCst);

        while self.is_running() {
            if limit.is_some_and(|n| self.stats.decoded >= n) {
                break;
            }

            let data = match self.source.next_packet() {
                Ok(Polled::Packet(data)) => data,
                Ok(Polled::Timeout) => continue,
                Ok(Polled::Exhausted) => break,
                Err(e) => {
                    self.running.store(false, Ordering::SeqCst);
                    return Err(e);
                }
            };
            self.stats.received += 1;

            match decode_packet(&data, self.deep) {
                Ok(decoded) if self.keep(&decoded.frame) => {
                    self.stats.decoded += 1;
                    handler(decoded);
                }
                Ok(_) => self.stats.filtered += 1,
                Err(e) => {
                    self.stats.skipped += 1;
                    debug!(error = %e, len = data.len(), "skipping packet");
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!(
            received = self.stats.received,
            decoded = self.stats.decoded,
            skipped = self.stats.skipped,
            filtered = self.stats.filtered,
            "capture finished"
        );
        Ok(self.stats)
    }
}
