//! Broadcast date and time fields (ARIB STD-B10 Part 2 Annex C).
//!
//! Dates are Modified Julian Day numbers, times are three BCD bytes (HHMMSS).

use std::fmt;

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Serialize, Serializer};

/// Modified Julian Day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Mjd(pub u16);

impl Mjd {
    /// All ones: no date transmitted.
    pub const UNDEFINED: Mjd = Mjd(0xFFFF);

    /// Whether this is the undefined pattern.
    pub fn is_undefined(self) -> bool {
        self == Self::UNDEFINED
    }

    /// Calendar date. MJD 0 is 1858-11-17.
    pub fn to_date(self) -> Option<NaiveDate> {
        if self.is_undefined() {
            return None;
        }
        NaiveDate::from_ymd_opt(1858, 11, 17)?.checked_add_days(Days::new(self.0 as u64))
    }

    /// Combine with a time of day.
    pub fn with_time(self, time: BcdTime) -> Option<NaiveDateTime> {
        Some(self.to_date()?.and_time(time.to_naive_time()?))
    }
}

impl fmt::Display for Mjd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_date() {
            Some(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            None => f.write_str("----/--/--"),
        }
    }
}

/// Three BCD bytes: hours, minutes, seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BcdTime(pub [u8; 3]);

impl BcdTime {
    /// All ones: no time or duration transmitted.
    pub const UNDEFINED: BcdTime = BcdTime([0xFF; 3]);

    /// Whether this is the undefined pattern.
    pub fn is_undefined(self) -> bool {
        self == Self::UNDEFINED
    }

    /// Decoded (hours, minutes, seconds), `None` when any byte is not BCD.
    pub fn hms(self) -> Option<(u32, u32, u32)> {
        Some((
            bcd_byte(self.0[0])?,
            bcd_byte(self.0[1])?,
            bcd_byte(self.0[2])?,
        ))
    }

    /// Time of day.
    pub fn to_naive_time(self) -> Option<NaiveTime> {
        let (h, m, s) = self.hms()?;
        NaiveTime::from_hms_opt(h, m, s)
    }

    /// Length of time, for durations (hours may exceed 23).
    pub fn to_duration(self) -> Option<chrono::Duration> {
        let (h, m, s) = self.hms()?;
        if m > 59 || s > 59 {
            return None;
        }
        Some(chrono::Duration::seconds((h * 3600 + m * 60 + s) as i64))
    }
}

impl Default for BcdTime {
    fn default() -> Self {
        BcdTime([0; 3])
    }
}

impl fmt::Display for BcdTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_undefined() {
            return f.write_str("--:--:--");
        }
        write!(f, "{:02x}:{:02x}:{:02x}", self.0[0], self.0[1], self.0[2])
    }
}

impl Serialize for BcdTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn bcd_byte(byte: u8) -> Option<u32> {
    let high = (byte >> 4) as u32;
    let low = (byte & 0x0F) as u32;
    if high > 9 || low > 9 {
        return None;
    }
    Some(high * 10 + low)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mjd_to_date() {
        assert_eq!(Mjd(58849).to_date(), NaiveDate::from_ymd_opt(2020, 1, 1));
        assert_eq!(Mjd(0).to_date(), NaiveDate::from_ymd_opt(1858, 11, 17));
        assert_eq!(Mjd::UNDEFINED.to_date(), None);
        assert_eq!(Mjd(58849).to_string(), "2020-01-01");
    }

    #[test]
    fn test_bcd_time() {
        let time = BcdTime([0x12, 0x30, 0x00]);
        assert_eq!(time.to_string(), "12:30:00");
        assert_eq!(time.to_naive_time(), NaiveTime::from_hms_opt(12, 30, 0));
        assert_eq!(BcdTime::UNDEFINED.to_string(), "--:--:--");
        assert_eq!(BcdTime::UNDEFINED.to_naive_time(), None);
    }

    #[test]
    fn test_duration() {
        let duration = BcdTime([0x01, 0x45, 0x30]).to_duration().unwrap();
        assert_eq!(duration.num_seconds(), 3600 + 45 * 60 + 30);
        assert!(BcdTime([0x00, 0x75, 0x00]).to_duration().is_none());
    }

    #[test]
    fn test_with_time() {
        let start = Mjd(58849).with_time(BcdTime([0x21, 0x00, 0x00])).unwrap();
        assert_eq!(start.to_string(), "2020-01-01 21:00:00");
    }
}
