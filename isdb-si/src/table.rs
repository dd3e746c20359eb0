//! Table kinds handled by the aggregate.

use std::fmt;

use serde::Serialize;

use crate::{pid, table_id};

/// Every table this crate decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    Pat,
    Cat,
    Pmt,
    Nit,
    Sdt,
    EitPresent,
    EitFollowing,
    Tot,
}

impl TableKind {
    /// All kinds, in dump order.
    pub const ALL: [TableKind; 8] = [
        TableKind::Pat,
        TableKind::Cat,
        TableKind::Pmt,
        TableKind::Nit,
        TableKind::Sdt,
        TableKind::EitPresent,
        TableKind::EitFollowing,
        TableKind::Tot,
    ];

    /// Table id carried by sections of this kind.
    pub fn table_id(self) -> u8 {
        match self {
            TableKind::Pat => table_id::PAT,
            TableKind::Cat => table_id::CAT,
            TableKind::Pmt => table_id::PMT,
            TableKind::Nit => table_id::NIT_ACTUAL,
            TableKind::Sdt => table_id::SDT_ACTUAL,
            TableKind::EitPresent | TableKind::EitFollowing => table_id::EIT_PF_ACTUAL,
            TableKind::Tot => table_id::TOT,
        }
    }

    /// Fixed PID, or `None` for the PMT whose PID comes from the PAT.
    pub fn pid(self) -> Option<u16> {
        match self {
            TableKind::Pat => Some(pid::PAT),
            TableKind::Cat => Some(pid::CAT),
            TableKind::Pmt => None,
            TableKind::Nit => Some(pid::NIT),
            TableKind::Sdt => Some(pid::SDT),
            TableKind::EitPresent | TableKind::EitFollowing => Some(pid::EIT),
            TableKind::Tot => Some(pid::TOT),
        }
    }

    /// Kind carried on a fixed PID. The EIT PID maps to [`TableKind::EitPresent`];
    /// the slot is chosen per section.
    pub fn for_pid(pid: u16) -> Option<TableKind> {
        match pid {
            pid::PAT => Some(TableKind::Pat),
            pid::CAT => Some(TableKind::Cat),
            pid::NIT => Some(TableKind::Nit),
            pid::SDT => Some(TableKind::Sdt),
            pid::EIT => Some(TableKind::EitPresent),
            pid::TOT => Some(TableKind::Tot),
            _ => None,
        }
    }

    /// Short display name.
    pub fn name(self) -> &'static str {
        match self {
            TableKind::Pat => "PAT",
            TableKind::Cat => "CAT",
            TableKind::Pmt => "PMT",
            TableKind::Nit => "NIT",
            TableKind::Sdt => "SDT",
            TableKind::EitPresent => "EIT-p",
            TableKind::EitFollowing => "EIT-f",
            TableKind::Tot => "TOT",
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
