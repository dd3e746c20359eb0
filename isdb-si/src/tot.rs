//! TOT (Time Offset Table) decoding.

use chrono::NaiveDateTime;
use log::trace;
use serde::Serialize;

use crate::config::SiConfig;
use crate::error::Reject;
use crate::section::{Section, SectionReader};
use crate::table_id;
use crate::time::{BcdTime, Mjd};

/// Reassembly buffer size for the TOT.
pub const TOT_BUFFER_SIZE: usize = 188;

/// Current broadcast time. Every valid TOT overwrites it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TotState {
    received: bool,
    day: Mjd,
    time: BcdTime,
}

impl Default for TotState {
    fn default() -> Self {
        Self {
            received: false,
            day: Mjd::UNDEFINED,
            time: BcdTime::UNDEFINED,
        }
    }
}

impl TotState {
    pub fn is_received(&self) -> bool {
        self.received
    }

    pub fn day(&self) -> Mjd {
        self.day
    }

    pub fn time(&self) -> BcdTime {
        self.time
    }

    /// Broadcast time (JST), `None` until a valid TOT arrives.
    pub fn to_datetime(&self) -> Option<NaiveDateTime> {
        self.day.with_time(self.time)
    }

    /// Apply a TOT section.
    pub fn decode(&mut self, section: &Section<'_>, config: &SiConfig) -> Result<(), Reject> {
        section.validate_short(table_id::TOT, config)?;
        let mut reader = SectionReader::new(section.short_body());
        let day = Mjd(reader.u16()?);
        let time = BcdTime(reader.array3()?);
        trace!("TOT {} {}", day, time);

        self.received = true;
        self.day = day;
        self.time = time;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::short_section;

    fn tot_bytes(day: u16, time: [u8; 3]) -> Vec<u8> {
        let mut body = day.to_be_bytes().to_vec();
        body.extend_from_slice(&time);
        // empty descriptor loop
        body.extend_from_slice(&[0xF0, 0x00]);
        short_section(0x73, 0x70, &body)
    }

    #[test]
    fn test_decode_tot() {
        let bytes = tot_bytes(58849, [0x12, 0x30, 0x00]);
        let section = Section::new(&bytes).unwrap();
        let config = SiConfig::default();
        let mut tot = TotState::default();
        assert!(tot.to_datetime().is_none());

        tot.decode(&section, &config).unwrap();
        assert_eq!(tot.day(), Mjd(58849));
        assert_eq!(tot.time().to_string(), "12:30:00");
        assert_eq!(
            tot.to_datetime().unwrap().to_string(),
            "2020-01-01 12:30:00"
        );
        // no version: every delivery is applied
        assert!(tot.decode(&section, &config).is_ok());
    }

    #[test]
    fn test_short_tot_is_truncated() {
        let bytes = short_section(0x73, 0x70, &[0xE5, 0xE1, 0x12]);
        let mut tot = TotState::default();
        assert_eq!(
            tot.decode(&Section::new(&bytes).unwrap(), &SiConfig::default()),
            Err(Reject::Truncated)
        );
        assert!(!tot.is_received());
    }

    #[test]
    fn test_tot_header_bits() {
        let bytes = short_section(0x73, 0xB0, &[0xE5, 0xE1, 0x12, 0x30, 0x00]);
        let mut tot = TotState::default();
        assert!(matches!(
            tot.decode(&Section::new(&bytes).unwrap(), &SiConfig::default()),
            Err(Reject::HeaderBits(_))
        ));
    }
}
