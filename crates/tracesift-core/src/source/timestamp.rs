use std::fmt;

use serde::{Serialize, Serializer};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

const NANOS_PER_SEC: u64 = 1_000_000_000;
const MAX_DECIMAL_DIGITS: u8 = 9;

/// Capture timestamp at the precision the capture format supplied.
///
/// The fractional part is kept as an integer with a fixed number of decimal
/// digits so that rendering never goes through floating point.
///
/// # Examples
/// ```
/// use tracesift_core::CaptureTime;
///
/// let ts = CaptureTime::from_parts(1_205_794_800, 42, 6);
/// assert_eq!(ts.to_string(), "1205794800.000042");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CaptureTime {
    secs: u64,
    frac: u32,
    digits: u8,
}

impl CaptureTime {
    /// `digits` above 9 are clamped to nanosecond precision.
    pub fn from_parts(secs: u64, frac: u32, digits: u8) -> Self {
        let digits = digits.min(MAX_DECIMAL_DIGITS);
        let frac = frac % 10u32.pow(u32::from(digits));
        Self { secs, frac, digits }
    }

    /// Build from a pcapng tick count and the interface's `if_tsresol` value.
    ///
    /// With the high bit clear the resolution is 10^-n seconds, with it set
    /// 2^-n seconds. Binary resolutions are rendered in nanoseconds.
    pub fn from_ticks(ticks: u64, tsresol: u8) -> Self {
        if tsresol & 0x80 == 0 {
            let exp = u32::from(tsresol.min(19));
            let units = 10u64.pow(exp);
            let secs = ticks / units;
            let frac = ticks % units;
            if exp <= u32::from(MAX_DECIMAL_DIGITS) {
                Self::from_parts(secs, frac as u32, exp as u8)
            } else {
                let scale = 10u64.pow(exp - u32::from(MAX_DECIMAL_DIGITS));
                Self::from_parts(secs, (frac / scale) as u32, MAX_DECIMAL_DIGITS)
            }
        } else {
            let shift = u32::from(tsresol & 0x7f).min(63);
            let units = 1u64 << shift;
            let secs = ticks >> shift;
            let frac = ticks & (units - 1);
            let nanos = (u128::from(frac) * u128::from(NANOS_PER_SEC)) / u128::from(units);
            Self::from_parts(secs, nanos as u32, MAX_DECIMAL_DIGITS)
        }
    }

    /// Shift by a whole number of seconds, saturating at the epoch.
    pub fn offset_by(self, secs: i64) -> Self {
        Self {
            secs: self.secs.saturating_add_signed(secs),
            ..self
        }
    }

    pub fn as_nanos(&self) -> u128 {
        let scale = 10u128.pow(u32::from(MAX_DECIMAL_DIGITS - self.digits));
        u128::from(self.secs) * u128::from(NANOS_PER_SEC) + u128::from(self.frac) * scale
    }

    pub fn to_rfc3339(&self) -> Option<String> {
        let nanos = i128::try_from(self.as_nanos()).ok()?;
        OffsetDateTime::from_unix_timestamp_nanos(nanos)
            .ok()
            .and_then(|dt| dt.format(&Rfc3339).ok())
    }
}

impl fmt::Display for CaptureTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.digits == 0 {
            write!(f, "{}", self.secs)
        } else {
            write!(
                f,
                "{}.{:0width$}",
                self.secs,
                self.frac,
                width = usize::from(self.digits)
            )
        }
    }
}

impl Serialize for CaptureTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::CaptureTime;

    #[test]
    fn renders_microseconds_with_padding() {
        let ts = CaptureTime::from_parts(1, 5, 6);
        assert_eq!(ts.to_string(), "1.000005");
    }

    #[test]
    fn renders_nanoseconds() {
        let ts = CaptureTime::from_parts(1_600_000_000, 123_456_789, 9);
        assert_eq!(ts.to_string(), "1600000000.123456789");
        assert_eq!(ts.as_nanos(), 1_600_000_000_123_456_789);
    }

    #[test]
    fn pcapng_default_resolution_is_microseconds() {
        let ts = CaptureTime::from_ticks(1_500_000, 6);
        assert_eq!(ts.to_string(), "1.500000");
        assert_eq!(ts.as_nanos(), 1_500_000_000);
    }

    #[test]
    fn pcapng_binary_resolution_renders_nanoseconds() {
        let ts = CaptureTime::from_ticks((3 << 10) | 512, 0x80 | 10);
        assert_eq!(ts.to_string(), "3.500000000");
    }

    #[test]
    fn pcapng_resolution_finer_than_nanoseconds_is_scaled() {
        let ts = CaptureTime::from_ticks(2_000_000_000_250, 12);
        assert_eq!(ts.to_string(), "2.000000000");
    }

    #[test]
    fn offset_saturates_at_epoch() {
        let ts = CaptureTime::from_parts(10, 0, 6).offset_by(-20);
        assert_eq!(ts.as_nanos(), 0);
    }

    #[test]
    fn rfc3339_rendering() {
        let ts = CaptureTime::from_parts(0, 0, 6);
        assert_eq!(ts.to_rfc3339().as_deref(), Some("1970-01-01T00:00:00Z"));
    }
}
