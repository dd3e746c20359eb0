//! SDT (Service Description Table, actual TS) decoding.
//!
//! The SDT is transmitted on PID 0x0011 and names the services (channels)
//! of the transport stream.

use log::{debug, trace, warn};
use serde::Serialize;

use crate::bounded::BoundedVec;
use crate::config::SiConfig;
use crate::descriptors::{DescriptorLoop, DescriptorTag, ServiceDescriptor};
use crate::error::Reject;
use crate::section::{Section, SectionReader, SectionSequence};
use crate::table_id;
use crate::text::BroadcastString;

/// Reassembly buffer size for the SDT.
pub const SDT_BUFFER_SIZE: usize = 1024;

/// Maximum services kept.
pub const MAX_SERVICES: usize = 8;

/// Service name cap in bytes.
pub const MAX_SERVICE_NAME: usize = 20;

/// Bits of [`SdtService::flags`].
pub mod service_flag {
    /// Free CA mode (service is scrambled).
    pub const FREE_CA: u8 = 0x80;
    pub const H_EIT: u8 = 0x10;
    pub const M_EIT: u8 = 0x08;
    pub const L_EIT: u8 = 0x04;
    pub const EIT_SCHEDULE: u8 = 0x02;
    pub const EIT_PRESENT_FOLLOWING: u8 = 0x01;
}

/// Human-readable service type name.
pub fn service_type_name(service_type: u8) -> &'static str {
    match service_type {
        0x01 => "Digital TV",
        0x02 => "Digital Audio",
        0x0C => "Data Service",
        0xA1 => "Special Video (ISDB)",
        0xA2 => "Special Audio (ISDB)",
        0xA3 => "Special Data (ISDB)",
        0xA4 => "Engineering (ISDB)",
        0xA5 => "Promotional Video (ISDB)",
        0xA6 => "Promotional Audio (ISDB)",
        0xA7 => "Promotional Data (ISDB)",
        0xA8 => "For Advance Storage (ISDB)",
        0xA9 => "For Exclusive Storage (ISDB)",
        0xAA => "Bookmark List (ISDB)",
        0xAB => "Server Type Simultaneous (ISDB)",
        0xAC => "Independent File (ISDB)",
        0xC0 => "1seg (ISDB)",
        _ => "Unknown",
    }
}

/// Service entry in the SDT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SdtService {
    /// Service ID (program number).
    pub service_id: u16,
    /// EIT flags plus [`service_flag::FREE_CA`].
    pub flags: u8,
    pub running_status: u8,
    /// Service type from the service descriptor, 0 if absent.
    pub service_type: u8,
    pub name: BroadcastString,
}

impl SdtService {
    pub fn is_free_ca(&self) -> bool {
        self.flags & service_flag::FREE_CA != 0
    }

    pub fn has_present_following(&self) -> bool {
        self.flags & service_flag::EIT_PRESENT_FOLLOWING != 0
    }

    pub fn service_type_name(&self) -> &'static str {
        service_type_name(self.service_type)
    }

    /// Get running status name.
    pub fn running_status_name(&self) -> &'static str {
        match self.running_status {
            0 => "Undefined",
            1 => "Not running",
            2 => "Starts in a few seconds",
            3 => "Pausing",
            4 => "Running",
            5..=7 => "Reserved",
            _ => "Unknown",
        }
    }
}

/// SDT state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SdtState {
    sequence: SectionSequence,
    transport_stream_id: Option<u16>,
    original_network_id: Option<u16>,
    services: BoundedVec<SdtService, MAX_SERVICES>,
}

impl SdtState {
    pub fn version(&self) -> Option<u8> {
        self.sequence.version()
    }

    pub fn is_received(&self) -> bool {
        self.sequence.version().is_some()
    }

    /// Every section of the current version has arrived.
    pub fn is_complete(&self) -> bool {
        self.sequence.is_complete()
    }

    pub fn sequence(&self) -> &SectionSequence {
        &self.sequence
    }

    pub fn transport_stream_id(&self) -> Option<u16> {
        self.transport_stream_id
    }

    pub fn original_network_id(&self) -> Option<u16> {
        self.original_network_id
    }

    pub fn services(&self) -> &[SdtService] {
        &self.services
    }

    /// Find service by service ID.
    pub fn service(&self, service_id: u16) -> Option<&SdtService> {
        self.services.iter().find(|s| s.service_id == service_id)
    }

    /// Apply an SDT section.
    pub fn decode(&mut self, section: &Section<'_>, config: &SiConfig) -> Result<(), Reject> {
        let header = section.validate(table_id::SDT_ACTUAL, config)?;
        let ts_id = header.table_id_extension;

        let mut sequence = self.sequence;
        let fresh = sequence.admit(&header)?;

        let mut reader = SectionReader::new(section.body());
        let onid = reader.u16()?;
        reader.u8()?;

        if !fresh {
            if let Some(expected) = self.transport_stream_id.filter(|&id| id != ts_id) {
                return Err(Reject::Inconsistent {
                    field: "transport_stream_id",
                    expected,
                    found: ts_id,
                });
            }
            if let Some(expected) = self.original_network_id.filter(|&id| id != onid) {
                return Err(Reject::Inconsistent {
                    field: "original_network_id",
                    expected,
                    found: onid,
                });
            }
        }

        let mut services = if fresh {
            BoundedVec::new()
        } else {
            self.services.clone()
        };
        while reader.remaining() > 0 {
            let service_id = reader.u16()?;
            let eit_flags = reader.u8()? & 0x1F;
            let status = reader.u8()?;
            let descriptors_length = (((status & 0x0F) as usize) << 8) | reader.u8()? as usize;
            let descriptors = reader.take(descriptors_length)?;

            let mut service = SdtService {
                service_id,
                flags: eit_flags | ((status & 0x10) << 3),
                running_status: status >> 5,
                service_type: 0,
                name: BroadcastString::default(),
            };
            for descriptor in DescriptorLoop::new(descriptors) {
                if descriptor.tag != DescriptorTag::Service {
                    trace!("SDT: skipping descriptor {:?}", descriptor.tag);
                    continue;
                }
                match ServiceDescriptor::parse(descriptor.data) {
                    Ok(desc) => {
                        service.service_type = desc.service_type;
                        service.name = BroadcastString::truncated(desc.service_name, MAX_SERVICE_NAME);
                    }
                    Err(e) => debug!("SDT service 0x{:04x}: {}", service_id, e),
                }
            }

            if let Err(overflow) = services.try_push(service) {
                warn!(
                    "SDT service list full, dropping service 0x{:04x}",
                    overflow.into_inner().service_id
                );
            }
        }

        debug!(
            "SDT ts:0x{:04x} onid:0x{:04x} version {} section {}/{} services:{}",
            ts_id,
            onid,
            header.version_number,
            header.section_number,
            header.last_section_number,
            services.len()
        );

        self.sequence = sequence;
        self.transport_stream_id = Some(ts_id);
        self.original_network_id = Some(onid);
        self.services = services;
        Ok(())
    }
}
