//! Wireless-extensions ioctl transport
//!
//! Issues `SIOCSIWSCAN`/`SIOCGIWSCAN` on a datagram socket, the way
//! `iwlist scan` does. Requires root or CAP_NET_ADMIN to trigger scans;
//! reading cached results usually works unprivileged.

use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

use tracing::trace;

use super::{ScanTransport, Status};

const SIOCSIWSCAN: u32 = 0x8B18;
const SIOCGIWSCAN: u32 = 0x8B19;

/// `struct iw_point`
#[repr(C)]
#[derive(Clone, Copy)]
struct IwPoint {
    pointer: *mut libc::c_void,
    length: u16,
    flags: u16,
}

/// `union iwreq_data`, sized by its largest member
#[repr(C)]
union IwReqData {
    data: IwPoint,
    _size: [u8; 16],
}

/// `struct iwreq`
#[repr(C)]
struct IwReq {
    ifr_name: [libc::c_char; libc::IFNAMSIZ],
    u: IwReqData,
}

impl IwReq {
    fn new(interface: &str, buffer: &mut [u8]) -> io::Result<Self> {
        let name = interface.as_bytes();
        if name.is_empty() || name.len() >= libc::IFNAMSIZ || name.contains(&0) {
            return Err(io::Error::from_raw_os_error(libc::EINVAL));
        }

        let mut ifr_name = [0 as libc::c_char; libc::IFNAMSIZ];
        for (dst, src) in ifr_name.iter_mut().zip(name) {
            *dst = *src as libc::c_char;
        }

        let (pointer, length) = if buffer.is_empty() {
            (std::ptr::null_mut(), 0)
        } else {
            (buffer.as_mut_ptr() as *mut libc::c_void, buffer.len() as u16)
        };

        Ok(Self {
            ifr_name,
            u: IwReqData {
                data: IwPoint {
                    pointer,
                    length,
                    flags: 0,
                },
            },
        })
    }

    fn length(&self) -> u16 {
        // SAFETY: every request is built with the `data` member
        unsafe { self.u.data.length }
    }
}

/// Scan transport over the kernel's wireless extensions
#[derive(Debug)]
pub struct WextTransport {
    socket: OwnedFd,
}

impl WextTransport {
    pub fn open() -> io::Result<Self> {
        // SAFETY: plain socket(2) call, the descriptor is owned below
        let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_DGRAM, 0) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: fd is a freshly opened descriptor nobody else owns
        Ok(Self {
            socket: unsafe { OwnedFd::from_raw_fd(fd) },
        })
    }

    fn ioctl(&self, request: u32, iwr: &mut IwReq) -> io::Result<()> {
        // SAFETY: iwr is a valid iwreq whose data pointer, if any, covers
        // `length` writable bytes for the duration of the call
        let rc = unsafe { libc::ioctl(self.socket.as_raw_fd(), request as _, iwr as *mut IwReq) };
        if rc < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }
}

fn status_from_error(err: &io::Error, hint: u16) -> Status {
    match err.raw_os_error() {
        Some(libc::EPERM) => Status::PermissionDenied,
        Some(libc::E2BIG) => Status::BufferTooSmall(hint as usize),
        Some(libc::EAGAIN) => Status::NotReadyRetry,
        Some(libc::ENODEV) => Status::DeviceAbsent,
        Some(code) => Status::OtherError {
            code,
            message: err.to_string(),
        },
        None => Status::OtherError {
            code: -1,
            message: err.to_string(),
        },
    }
}

impl ScanTransport for WextTransport {
    fn trigger_scan(&mut self, interface: &str) -> Status {
        let mut iwr = match IwReq::new(interface, &mut []) {
            Ok(iwr) => iwr,
            Err(e) => return status_from_error(&e, 0),
        };
        match self.ioctl(SIOCSIWSCAN, &mut iwr) {
            Ok(()) => Status::Success,
            Err(e) => status_from_error(&e, 0),
        }
    }

    fn get_scan_results(&mut self, interface: &str, buffer_size: usize) -> (Status, Vec<u8>) {
        let mut buffer = vec![0u8; buffer_size.min(u16::MAX as usize)];
        let mut iwr = match IwReq::new(interface, &mut buffer) {
            Ok(iwr) => iwr,
            Err(e) => return (status_from_error(&e, 0), Vec::new()),
        };

        let result = self.ioctl(SIOCGIWSCAN, &mut iwr);
        let length = iwr.length();
        trace!(interface, buffer_size, length, ok = result.is_ok(), "SIOCGIWSCAN");

        match result {
            Ok(()) => {
                buffer.truncate(length as usize);
                (Status::Success, buffer)
            }
            Err(e) => (status_from_error(&e, length), Vec::new()),
        }
    }
}
