//! NIT (Network Information Table, actual network) decoding.
//!
//! ISDB-T terrestrial NITs describe a single transport stream: the station
//! name and remote control key from the TS information descriptor, the
//! services of each hierarchy level, and which service is partially received
//! (one-seg). Sections after the first add to the same transport stream.

use log::{debug, trace, warn};
use serde::Serialize;

use crate::bounded::BoundedVec;
use crate::config::SiConfig;
use crate::descriptors::{
    partial_reception, service_list, CaEmmTsDescriptor, DescriptorLoop, DescriptorTag,
    TsInformationDescriptor,
};
use crate::error::Reject;
use crate::section::{Section, SectionReader, SectionSequence};
use crate::table_id;
use crate::text::BroadcastString;

/// Reassembly buffer size for the NIT.
pub const NIT_BUFFER_SIZE: usize = 1024;

/// Maximum services kept for the transport stream.
pub const MAX_NIT_SERVICES: usize = 8;

/// Station name cap in bytes.
pub const MAX_TS_NAME: usize = 20;

/// A service as described by the NIT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NitService {
    pub service_id: u16,
    /// Service type from the service list descriptor, 0 if not listed.
    pub service_type: u8,
    /// Transmission type info of the hierarchy level carrying the service.
    pub transmission_type: Option<u8>,
    /// Listed in the partial reception descriptor.
    pub partial_reception: bool,
    /// First service of its hierarchy level.
    pub primary: bool,
}

impl NitService {
    fn new(service_id: u16) -> Self {
        Self {
            service_id,
            service_type: 0,
            transmission_type: None,
            partial_reception: false,
            primary: false,
        }
    }
}

/// The transport stream entry of the NIT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NitTransportStream {
    transport_stream_id: u16,
    original_network_id: u16,
    remote_control_key_id: Option<u8>,
    name: BroadcastString,
    hierarchy_levels: u8,
    services: BoundedVec<NitService, MAX_NIT_SERVICES>,
}

impl NitTransportStream {
    fn new(transport_stream_id: u16, original_network_id: u16) -> Self {
        Self {
            transport_stream_id,
            original_network_id,
            remote_control_key_id: None,
            name: BroadcastString::default(),
            hierarchy_levels: 0,
            services: BoundedVec::new(),
        }
    }

    pub fn transport_stream_id(&self) -> u16 {
        self.transport_stream_id
    }

    pub fn original_network_id(&self) -> u16 {
        self.original_network_id
    }

    /// Remote control key number (one-touch button), when announced.
    pub fn remote_control_key_id(&self) -> Option<u8> {
        self.remote_control_key_id
    }

    /// Station name from the TS information descriptor.
    pub fn name(&self) -> &BroadcastString {
        &self.name
    }

    pub fn hierarchy_levels(&self) -> u8 {
        self.hierarchy_levels
    }

    /// Services in order of first mention.
    pub fn services(&self) -> &[NitService] {
        &self.services
    }

    pub fn service(&self, service_id: u16) -> Option<&NitService> {
        self.services.iter().find(|s| s.service_id == service_id)
    }

    /// Entry for `service_id`, created on first mention. `None` once the
    /// table is full.
    fn service_entry(&mut self, service_id: u16) -> Option<&mut NitService> {
        if let Some(index) = self.services.iter().position(|s| s.service_id == service_id) {
            return self.services.get_mut(index);
        }
        if let Err(overflow) = self.services.try_push(NitService::new(service_id)) {
            warn!(
                "NIT service table full, dropping service 0x{:04x}",
                overflow.into_inner().service_id
            );
            return None;
        }
        self.services.last_mut()
    }

    fn apply_descriptors(&mut self, descriptors: &[u8]) {
        for descriptor in DescriptorLoop::new(descriptors) {
            match descriptor.tag {
                DescriptorTag::TsInformation => {
                    let info = match TsInformationDescriptor::parse(descriptor.data) {
                        Ok(info) => info,
                        Err(e) => {
                            debug!("NIT: {}", e);
                            continue;
                        }
                    };
                    self.remote_control_key_id = Some(info.remote_control_key_id);
                    self.name = BroadcastString::truncated(info.ts_name, MAX_TS_NAME);
                    self.hierarchy_levels = info.levels.len() as u8;
                    for level in &info.levels {
                        for (index, &service_id) in level.service_ids.iter().enumerate() {
                            if let Some(service) = self.service_entry(service_id) {
                                service.transmission_type = Some(level.transmission_type_info);
                                if index == 0 {
                                    service.primary = true;
                                }
                            }
                        }
                    }
                }
                DescriptorTag::ServiceList => {
                    for (service_id, service_type) in service_list(descriptor.data) {
                        if let Some(service) = self.service_entry(service_id) {
                            service.service_type = service_type;
                        }
                    }
                }
                DescriptorTag::PartialReception => {
                    for service_id in partial_reception(descriptor.data) {
                        if let Some(service) = self.service_entry(service_id) {
                            service.partial_reception = true;
                        }
                    }
                }
                other => trace!("NIT: skipping descriptor {:?}", other),
            }
        }
    }
}

/// NIT state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NitState {
    sequence: SectionSequence,
    network_id: Option<u16>,
    emm_transport_stream: Option<CaEmmTsDescriptor>,
    transport_stream: Option<NitTransportStream>,
}

impl NitState {
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

    pub fn network_id(&self) -> Option<u16> {
        self.network_id
    }

    /// Where EMMs are carried (CA EMM TS descriptor), if announced.
    pub fn emm_transport_stream(&self) -> Option<&CaEmmTsDescriptor> {
        self.emm_transport_stream.as_ref()
    }

    pub fn transport_stream(&self) -> Option<&NitTransportStream> {
        self.transport_stream.as_ref()
    }

    /// Apply a NIT section.
    pub fn decode(&mut self, section: &Section<'_>, config: &SiConfig) -> Result<(), Reject> {
        let header = section.validate(table_id::NIT_ACTUAL, config)?;
        let network_id = header.table_id_extension;

        let mut sequence = self.sequence;
        let fresh = sequence.admit(&header)?;

        let mut reader = SectionReader::new(section.body());
        let network_info_length = reader.length12()?;
        let network_info = reader.take(network_info_length)?;

        if !fresh {
            if !network_info.is_empty() {
                return Err(Reject::Layout("network descriptors after NIT section 0"));
            }
            if let Some(expected) = self.network_id.filter(|&id| id != network_id) {
                return Err(Reject::Inconsistent {
                    field: "network_id",
                    expected,
                    found: network_id,
                });
            }
        }

        let mut emm_transport_stream = if fresh {
            None
        } else {
            self.emm_transport_stream
        };
        for descriptor in DescriptorLoop::new(network_info) {
            if descriptor.tag == DescriptorTag::CaEmmTs {
                match CaEmmTsDescriptor::parse(descriptor.data) {
                    Ok(emm) => emm_transport_stream = Some(emm),
                    Err(e) => debug!("NIT: {}", e),
                }
            }
        }

        let ts_loop_length = reader.length12()?;
        let mut ts_loop = SectionReader::new(reader.take(ts_loop_length)?);

        let mut transport_stream = if fresh {
            None
        } else {
            self.transport_stream.clone()
        };
        if ts_loop.remaining() > 0 {
            let ts_id = ts_loop.u16()?;
            let onid = ts_loop.u16()?;
            let descriptors_length = ts_loop.length12()?;
            let descriptors = ts_loop.take(descriptors_length)?;

            let ts = transport_stream.get_or_insert_with(|| NitTransportStream::new(ts_id, onid));
            if ts.transport_stream_id != ts_id {
                return Err(Reject::Inconsistent {
                    field: "transport_stream_id",
                    expected: ts.transport_stream_id,
                    found: ts_id,
                });
            }
            ts.apply_descriptors(descriptors);

            if ts_loop.remaining() > 0 {
                trace!(
                    "NIT: ignoring {} bytes after the first transport stream",
                    ts_loop.remaining()
                );
            }
        }

        debug!(
            "NIT nid:0x{:04x} version {} section {}/{} services:{}",
            network_id,
            header.version_number,
            header.section_number,
            header.last_section_number,
            transport_stream.as_ref().map_or(0, |ts| ts.services.len())
        );

        self.sequence = sequence;
        self.network_id = Some(network_id);
        self.emm_transport_stream = emm_transport_stream;
        self.transport_stream = transport_stream;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{descriptor, loop12, SectionBuilder};

    fn nit_section(
        network_id: u16,
        version: u8,
        section: (u8, u8),
        network_descriptors: &[u8],
        ts_descriptors: Option<Vec<u8>>,
    ) -> Vec<u8> {
        let mut body = loop12(network_descriptors);
        let mut ts_loop = Vec::new();
        if let Some(descriptors) = ts_descriptors {
            ts_loop.extend_from_slice(&0x7FE0u16.to_be_bytes());
            ts_loop.extend_from_slice(&0x7FE0u16.to_be_bytes());
            ts_loop.extend_from_slice(&loop12(&descriptors));
        }
        body.extend_from_slice(&loop12(&ts_loop));
        SectionBuilder::new(0x40, network_id)
            .flags(0xF0)
            .version(version)
            .section(section.0, section.1)
            .body(&body)
            .build()
    }

    fn ts_information() -> Vec<u8> {
        let mut data = vec![0x03, (6 << 2) | 2];
        data.extend_from_slice(b"STN-TV");
        data.extend_from_slice(&[0x0F, 0x01, 0x05, 0x98]);
        data.extend_from_slice(&[0xAF, 0x02, 0x04, 0x00, 0x04, 0x01]);
        descriptor(0xCD, &data)
    }

    #[test]
    fn test_decode_nit() {
        let ts_descriptors = [
            ts_information(),
            descriptor(0x41, &[0x04, 0x00, 0x01, 0x04, 0x01, 0x01, 0x05, 0x98, 0xC0]),
            descriptor(0xFB, &[0x05, 0x98]),
        ]
        .concat();
        let emm = descriptor(0xCA, &[0x00, 0x05, 0x7F, 0xE0, 0x7F, 0xE0, 0x10]);
        let bytes = nit_section(0x7FE0, 1, (0, 0), &emm, Some(ts_descriptors));

        let mut nit = NitState::default();
        nit.decode(&Section::new(&bytes).unwrap(), &SiConfig::default())
            .unwrap();
        assert!(nit.is_complete());
        assert_eq!(nit.network_id(), Some(0x7FE0));
        assert_eq!(nit.emm_transport_stream().unwrap().power_supply_period, 0x10);

        let ts = nit.transport_stream().unwrap();
        assert_eq!(ts.remote_control_key_id(), Some(3));
        assert_eq!(ts.name().to_string(), "STN-TV");
        assert_eq!(ts.hierarchy_levels(), 2);
        let ids: Vec<_> = ts.services().iter().map(|s| s.service_id).collect();
        assert_eq!(ids, vec![0x0598, 0x0400, 0x0401]);

        let oneseg = ts.service(0x0598).unwrap();
        assert!(oneseg.primary && oneseg.partial_reception);
        assert_eq!(oneseg.service_type, 0xC0);
        assert_eq!(oneseg.transmission_type, Some(0x0F));
        let sub = ts.service(0x0401).unwrap();
        assert!(!sub.primary && !sub.partial_reception);
        assert_eq!(sub.transmission_type, Some(0xAF));
    }

    #[test]
    fn test_sections_accumulate() {
        let config = SiConfig::default();
        let mut nit = NitState::default();
        let first = nit_section(1, 2, (0, 1), &[], Some(descriptor(0x41, &[0x04, 0x00, 0x01])));
        let second = nit_section(1, 2, (1, 1), &[], Some(descriptor(0x41, &[0x04, 0x08, 0x01])));
        let first = Section::new(&first).unwrap();
        let second = Section::new(&second).unwrap();

        assert_eq!(nit.decode(&second, &config), Err(Reject::SectionGap { expected: 0, found: 1 }));
        nit.decode(&first, &config).unwrap();
        assert!(!nit.is_complete());
        assert_eq!(
            nit.decode(&first, &config),
            Err(Reject::DuplicateSection { expected: 1, found: 0 })
        );
        nit.decode(&second, &config).unwrap();
        assert!(nit.is_complete());
        assert_eq!(nit.transport_stream().unwrap().services().len(), 2);
    }

    #[test]
    fn test_later_section_consistency() {
        let config = SiConfig::default();
        let mut nit = NitState::default();
        let first = nit_section(1, 0, (0, 2), &[], Some(Vec::new()));
        nit.decode(&Section::new(&first).unwrap(), &config).unwrap();

        let other_network = nit_section(2, 0, (1, 2), &[], Some(Vec::new()));
        let err = nit
            .decode(&Section::new(&other_network).unwrap(), &config)
            .unwrap_err();
        assert_eq!(
            err,
            Reject::Inconsistent {
                field: "network_id",
                expected: 1,
                found: 2
            }
        );

        let with_descriptors = nit_section(1, 0, (1, 2), &descriptor(0x40, b"N"), Some(Vec::new()));
        let err = nit
            .decode(&Section::new(&with_descriptors).unwrap(), &config)
            .unwrap_err();
        assert!(matches!(err, Reject::Layout(_)));
        assert_eq!(nit.sequence().next_section(), 1);
    }

    #[test]
    fn test_new_version_resets_services() {
        let config = SiConfig::default();
        let mut nit = NitState::default();
        let first = nit_section(1, 0, (0, 0), &[], Some(descriptor(0x41, &[0x04, 0x00, 0x01])));
        nit.decode(&Section::new(&first).unwrap(), &config).unwrap();
        let second = nit_section(1, 1, (0, 0), &[], Some(descriptor(0x41, &[0x04, 0x10, 0x01])));
        nit.decode(&Section::new(&second).unwrap(), &config).unwrap();

        let ids: Vec<_> = nit
            .transport_stream()
            .unwrap()
            .services()
            .iter()
            .map(|s| s.service_id)
            .collect();
        assert_eq!(ids, vec![0x0410]);
    }

    #[test]
    fn test_service_overflow_keeps_first_entries() {
        let list: Vec<u8> = (0..=MAX_NIT_SERVICES as u16)
            .flat_map(|n| {
                let [hi, lo] = (0x0400 + n).to_be_bytes();
                [hi, lo, 0x01]
            })
            .collect();
        let ts_descriptors = [descriptor(0x41, &list), descriptor(0xFB, &[0x04, 0x00])].concat();
        let bytes = nit_section(1, 0, (0, 0), &[], Some(ts_descriptors));

        let mut nit = NitState::default();
        nit.decode(&Section::new(&bytes).unwrap(), &SiConfig::default())
            .unwrap();
        let ts = nit.transport_stream().unwrap();
        assert_eq!(ts.services().len(), MAX_NIT_SERVICES);
        assert!(ts.service(0x0400 + MAX_NIT_SERVICES as u16).is_none());
        // descriptors after the overflowing one are still applied
        assert!(ts.service(0x0400).unwrap().partial_reception);
    }

    #[test]
    fn test_empty_transport_stream_loop() {
        let bytes = nit_section(1, 0, (0, 0), &[], None);
        let mut nit = NitState::default();
        nit.decode(&Section::new(&bytes).unwrap(), &SiConfig::default())
            .unwrap();
        assert!(nit.is_received());
        assert!(nit.transport_stream().is_none());
    }
}
