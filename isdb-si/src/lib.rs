//! ISDB-T PSI/SI section reassembly and table decoding.
//!
//! This crate turns a sequence of 188-byte MPEG-TS packets into validated,
//! versioned broadcast metadata (ARIB STD-B10): program maps, the network and
//! service catalogs, present/following events and the broadcast clock.
//!
//! # Supported Tables
//! - PAT (Program Association Table) - PID 0x0000
//! - CAT (Conditional Access Table) - PID 0x0001
//! - PMT (Program Map Table) - Variable PIDs from PAT
//! - NIT (Network Information Table, actual) - PID 0x0010
//! - SDT (Service Description Table, actual) - PID 0x0011
//! - EIT (Event Information Table, actual present/following) - PID 0x0012
//! - TOT (Time Offset Table) - PID 0x0014
//!
//! # Usage
//! ```ignore
//! use isdb_si::{ServiceInformation, SiConfig};
//!
//! let mut si = ServiceInformation::new(SiConfig::default());
//! for packet in ts_data.chunks_exact(188) {
//!     si.feed(packet);
//! }
//!
//! if let Some(pat) = si.pat() {
//!     println!("TSID: {:04x}", pat.transport_stream_id().unwrap_or_default());
//! }
//! ```

mod bounded;
mod cat;
mod config;
mod descriptors;
mod eit;
mod error;
mod nit;
mod packet;
mod pat;
mod pmt;
mod sdt;
mod section;
mod si;
mod table;
mod text;
mod time;
mod tot;

#[cfg(test)]
mod testutil;

pub use bounded::{BoundedVec, CapacityExceeded};
pub use cat::{CatState, MAX_CAS};
pub use config::{CasFilter, HeaderCheck, SiConfig, ARIB_CAS_ID};
pub use descriptors::{
    AudioComponentDescriptor, CaDescriptor, CaEmmTsDescriptor, ComponentDescriptor, Descriptor,
    DescriptorLoop, DescriptorTag, ServiceDescriptor, ShortEventDescriptor, TransmissionLevel,
    TsInformationDescriptor,
};
pub use eit::{audio_flag, AudioComponent, EitSlot, EitState, VideoComponent};
pub use error::{Outcome, Reject};
pub use nit::{NitService, NitState, NitTransportStream, MAX_NIT_SERVICES};
pub use packet::{TsHeader, TsPacket, SYNC_BYTE, TS_PACKET_SIZE};
pub use pat::{PatState, ProgramEntry, MAX_PROGRAMS};
pub use pmt::{stream_type, ElementaryStream, PmtState, MAX_STREAMS};
pub use sdt::{service_flag, service_type_name, SdtService, SdtState, MAX_SERVICES};
pub use section::{crc32_mpeg2, FeedSummary, PsiHeader, Section, SectionBuffer, SectionSequence};
pub use si::{ChannelInfo, ServiceInformation, Snapshot, Statistics, TableCounters};
pub use table::TableKind;
pub use text::{decode_broadcast_string, BroadcastString, LanguageCode};
pub use time::{BcdTime, Mjd};
pub use tot::TotState;

/// Well-known PIDs in ISDB-T transport streams.
pub mod pid {
    /// Program Association Table PID.
    pub const PAT: u16 = 0x0000;
    /// Conditional Access Table PID.
    pub const CAT: u16 = 0x0001;
    /// Network Information Table PID.
    pub const NIT: u16 = 0x0010;
    /// Service Description Table PID.
    pub const SDT: u16 = 0x0011;
    /// Event Information Table PID (EIT-H).
    pub const EIT: u16 = 0x0012;
    /// Time and Date / Time Offset Table PID.
    pub const TOT: u16 = 0x0014;
    /// Null packet PID (stuffing). Also used as the "CA off" marker.
    pub const NULL: u16 = 0x1FFF;
}

/// Table IDs for PSI/SI tables.
pub mod table_id {
    /// Program Association Section.
    pub const PAT: u8 = 0x00;
    /// Conditional Access Section.
    pub const CAT: u8 = 0x01;
    /// Program Map Section.
    pub const PMT: u8 = 0x02;
    /// Network Information Section - actual.
    pub const NIT_ACTUAL: u8 = 0x40;
    /// Service Description Section - actual.
    pub const SDT_ACTUAL: u8 = 0x42;
    /// Event Information Section - actual, present/following.
    pub const EIT_PF_ACTUAL: u8 = 0x4E;
    /// Time Offset Section.
    pub const TOT: u8 = 0x73;
}

/// Descriptor tags used in PSI/SI tables.
pub mod descriptor_tag {
    /// Conditional access descriptor (0x09).
    pub const CONDITIONAL_ACCESS: u8 = 0x09;
    /// Service list descriptor (0x41).
    pub const SERVICE_LIST: u8 = 0x41;
    /// Service descriptor (0x48).
    pub const SERVICE: u8 = 0x48;
    /// Short event descriptor (0x4D).
    pub const SHORT_EVENT: u8 = 0x4D;
    /// Component descriptor (0x50).
    pub const COMPONENT: u8 = 0x50;
    /// Stream identifier descriptor (0x52).
    pub const STREAM_IDENTIFIER: u8 = 0x52;
    /// Audio component descriptor (0xC4).
    pub const AUDIO_COMPONENT: u8 = 0xC4;
    /// CA EMM TS descriptor (0xCA).
    pub const CA_EMM_TS: u8 = 0xCA;
    /// TS information descriptor (0xCD).
    pub const TS_INFORMATION: u8 = 0xCD;
    /// Partial reception descriptor (0xFB for ISDB-T 1seg).
    pub const PARTIAL_RECEPTION: u8 = 0xFB;
}
