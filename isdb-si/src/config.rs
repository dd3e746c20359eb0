//! Decoder configuration.

use serde::{Deserialize, Serialize};

/// CA system id assigned to ARIB (MULTI2 conditional access).
pub const ARIB_CAS_ID: u16 = 0x0005;

/// How strictly the fixed bits of a section header are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderCheck {
    /// Require the section syntax indicator and both reserved bits
    /// (`0xB0` under mask `0xB0` for long sections, `0x30` for the TOT).
    #[default]
    Strict,
    /// Skip the fixed-bit check entirely.
    Permissive,
}

/// Which CA descriptors are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CasFilter {
    /// Keep every CA system.
    #[default]
    Any,
    /// Keep only descriptors carrying this CA system id.
    Only(u16),
}

impl CasFilter {
    /// Only the ARIB CA system.
    pub const ARIB: CasFilter = CasFilter::Only(ARIB_CAS_ID);

    /// Whether a descriptor for `cas_id` passes this filter.
    pub fn accepts(self, cas_id: u16) -> bool {
        match self {
            CasFilter::Any => true,
            CasFilter::Only(id) => id == cas_id,
        }
    }
}

/// Configuration for [`ServiceInformation`](crate::ServiceInformation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiConfig {
    /// Verify the trailing CRC-32 of every long section (and the TOT).
    pub verify_crc: bool,
    /// Fixed header bit check.
    pub header_check: HeaderCheck,
    /// Filter applied to the EMM descriptors of the CAT.
    pub cas_filter: CasFilter,
    /// Whether `is_complete()` also waits for a CAT with at least one EMM entry.
    pub require_cat: bool,
}

impl Default for SiConfig {
    fn default() -> Self {
        Self {
            verify_crc: true,
            header_check: HeaderCheck::Strict,
            cas_filter: CasFilter::Any,
            require_cat: false,
        }
    }
}
