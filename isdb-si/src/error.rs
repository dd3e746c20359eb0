//! Section rejection reasons and decode outcome codes.

use serde::Serialize;
use thiserror::Error;

/// Why a completed section was not applied to its table.
///
/// A rejection never mutates the table it was aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Reject {
    #[error("unexpected table id 0x{found:02x} (expected 0x{expected:02x})")]
    WrongTableId { expected: u8, found: u8 },

    #[error("bad fixed header bits 0x{0:02x}")]
    HeaderBits(u8),

    #[error("section is not yet applicable (current_next_indicator unset)")]
    NotCurrent,

    #[error("CRC mismatch (computed 0x{computed:08x}, carried 0x{carried:08x})")]
    CrcMismatch { computed: u32, carried: u32 },

    #[error("section body truncated")]
    Truncated,

    #[error("invalid section layout: {0}")]
    Layout(&'static str),

    #[error("{field} 0x{found:04x} differs from earlier sections (0x{expected:04x})")]
    Inconsistent {
        field: &'static str,
        expected: u16,
        found: u16,
    },

    #[error("version {0} already applied")]
    SameVersion(u8),

    #[error("section {found} already received (expecting {expected})")]
    DuplicateSection { expected: u16, found: u8 },

    #[error("section {found} received out of order (expecting {expected})")]
    SectionGap { expected: u16, found: u8 },

    #[error("PAT must be received first")]
    NoPat,

    #[error("service 0x{0:04x} not found in PAT")]
    UnknownService(u16),

    #[error("{field} 0x{found:04x} does not match 0x{expected:04x}")]
    IdMismatch {
        field: &'static str,
        expected: u16,
        found: u16,
    },
}

impl Reject {
    /// Outcome code reported for this rejection.
    pub fn outcome(&self) -> Outcome {
        match self {
            Reject::WrongTableId { .. }
            | Reject::HeaderBits(_)
            | Reject::NotCurrent
            | Reject::CrcMismatch { .. }
            | Reject::Truncated
            | Reject::Layout(_)
            | Reject::Inconsistent { .. } => Outcome::Malformed,
            Reject::SameVersion(_)
            | Reject::DuplicateSection { .. }
            | Reject::SectionGap { .. }
            | Reject::NoPat
            | Reject::UnknownService(_)
            | Reject::IdMismatch { .. } => Outcome::Rejected,
        }
    }

    /// True for the "already have it" cases that repeat on every carousel cycle.
    pub fn is_repeat(&self) -> bool {
        matches!(
            self,
            Reject::SameVersion(_) | Reject::DuplicateSection { .. }
        )
    }
}

/// Result of handing one reassembled section to its decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// The section updated its table.
    Accepted = 0,
    /// Stale, duplicate, out-of-order or unresolvable cross-reference.
    Rejected = 1,
    /// Bad header, CRC or body layout.
    Malformed = 2,
}

impl Outcome {
    /// Numeric code (0, 1 or 2).
    pub fn code(self) -> u32 {
        self as u32
    }
}

impl<T> From<Result<T, Reject>> for Outcome {
    fn from(result: Result<T, Reject>) -> Self {
        match result {
            Ok(_) => Outcome::Accepted,
            Err(reject) => reject.outcome(),
        }
    }
}
