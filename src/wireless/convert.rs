//! Unit Conversions
//!
//! Helpers shared by the radiotap and scan decoders: wireless-extensions
//! mantissa/exponent expansion, engineering-unit formatting and power
//! conversion.

pub const KILO: f64 = 1e3;
pub const MEGA: f64 = 1e6;
pub const GIGA: f64 = 1e9;

/// Expand a `(mantissa, exponent)` pair into `mantissa * 10^exponent`.
///
/// The unit (Hz or bit/s) depends on the caller. An exponent of zero
/// returns the mantissa unchanged, which is how drivers report channel
/// numbers instead of frequencies.
pub fn expand_frequency(mantissa: i32, exponent: i16) -> f64 {
    if exponent == 0 {
        mantissa as f64
    } else {
        mantissa as f64 * 10f64.powi(exponent as i32)
    }
}

/// Format a frequency in Hz using the largest fitting GHz/MHz/KHz suffix
pub fn format_frequency(hz: f64) -> String {
    if hz >= GIGA {
        format!("{:.3} GHz", hz / GIGA)
    } else if hz >= MEGA {
        format!("{:.3} MHz", hz / MEGA)
    } else if hz >= KILO {
        format!("{:.3} KHz", hz / KILO)
    } else {
        // Below a kilohertz the value is a channel number
        format!("{}", hz)
    }
}

/// Format a bitrate in bit/s, truncated to a whole number of units
pub fn format_bitrate(bps: f64) -> String {
    if bps >= GIGA {
        format!("{} Gb/s", (bps / GIGA) as u64)
    } else if bps >= MEGA {
        format!("{} Mb/s", (bps / MEGA) as u64)
    } else if bps >= KILO {
        format!("{} Kb/s", (bps / KILO) as u64)
    } else {
        format!("{} b/s", bps as u64)
    }
}

/// Convert milliwatts to dBm, rounding up.
///
/// `mw` must be positive.
pub fn milliwatt_to_dbm(mw: f64) -> i32 {
    (10.0 * mw.log10()).ceil() as i32
}

/// Convert a channel centre frequency in MHz to its channel number
pub fn channel_from_mhz(freq: u32) -> Option<u8> {
    match freq {
        2484 => Some(14),
        // 2.4 GHz band
        2412..=2472 => Some(((freq - 2407) / 5) as u8),
        // 5 GHz band
        5170..=5825 => Some(((freq - 5000) / 5) as u8),
        // 6 GHz band (WiFi 6E)
        5955..=7115 => Some(((freq - 5950) / 5) as u8),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_frequency() {
        assert_eq!(expand_frequency(6, 0), 6.0);
        assert_eq!(expand_frequency(2412, 6), 2_412_000_000.0);
        assert_eq!(expand_frequency(54, 6), 54_000_000.0);
    }

    #[test]
    fn test_format_frequency_thresholds() {
        assert_eq!(format_frequency(2_412_000_000.0), "2.412 GHz");
        assert_eq!(format_frequency(5_000_000.0), "5.000 MHz");
        assert_eq!(format_frequency(1_500.0), "1.500 KHz");
        assert_eq!(format_frequency(11.0), "11");
    }

    #[test]
    fn test_format_bitrate_thresholds() {
        assert_eq!(format_bitrate(54_000_000.0), "54 Mb/s");
        assert_eq!(format_bitrate(5_500_000.0), "5 Mb/s");
        assert_eq!(format_bitrate(1_300_000_000.0), "1 Gb/s");
        assert_eq!(format_bitrate(500_000.0), "500 Kb/s");
        assert_eq!(format_bitrate(12.0), "12 b/s");
    }

    #[test]
    fn test_milliwatt_to_dbm() {
        assert_eq!(milliwatt_to_dbm(1.0), 0);
        assert_eq!(milliwatt_to_dbm(100.0), 20);
        assert_eq!(milliwatt_to_dbm(50.0), 17);
    }

    #[test]
    fn test_channel_from_mhz() {
        assert_eq!(channel_from_mhz(2412), Some(1));
        assert_eq!(channel_from_mhz(2437), Some(6));
        assert_eq!(channel_from_mhz(2484), Some(14));
        assert_eq!(channel_from_mhz(5180), Some(36));
        assert_eq!(channel_from_mhz(5745), Some(149));
        assert_eq!(channel_from_mhz(900), None);
    }
}
