//! Descriptor parsing for PSI/SI tables.
//!
//! [`DescriptorLoop`] walks a tag-length-value loop; the parsers below turn
//! the descriptors this crate uses into borrowed views over the section.

use log::trace;
use serde::Serialize;

use crate::descriptor_tag;
use crate::text::LanguageCode;

/// Descriptor tags recognized by the table decoders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorTag {
    ConditionalAccess,
    ServiceList,
    Service,
    ShortEvent,
    Component,
    StreamIdentifier,
    AudioComponent,
    CaEmmTs,
    TsInformation,
    PartialReception,
    Other(u8),
}

impl From<u8> for DescriptorTag {
    fn from(tag: u8) -> Self {
        match tag {
            descriptor_tag::CONDITIONAL_ACCESS => DescriptorTag::ConditionalAccess,
            descriptor_tag::SERVICE_LIST => DescriptorTag::ServiceList,
            descriptor_tag::SERVICE => DescriptorTag::Service,
            descriptor_tag::SHORT_EVENT => DescriptorTag::ShortEvent,
            descriptor_tag::COMPONENT => DescriptorTag::Component,
            descriptor_tag::STREAM_IDENTIFIER => DescriptorTag::StreamIdentifier,
            descriptor_tag::AUDIO_COMPONENT => DescriptorTag::AudioComponent,
            descriptor_tag::CA_EMM_TS => DescriptorTag::CaEmmTs,
            descriptor_tag::TS_INFORMATION => DescriptorTag::TsInformation,
            descriptor_tag::PARTIAL_RECEPTION => DescriptorTag::PartialReception,
            other => DescriptorTag::Other(other),
        }
    }
}

impl DescriptorTag {
    /// Wire value of the tag.
    pub fn value(self) -> u8 {
        match self {
            DescriptorTag::ConditionalAccess => descriptor_tag::CONDITIONAL_ACCESS,
            DescriptorTag::ServiceList => descriptor_tag::SERVICE_LIST,
            DescriptorTag::Service => descriptor_tag::SERVICE,
            DescriptorTag::ShortEvent => descriptor_tag::SHORT_EVENT,
            DescriptorTag::Component => descriptor_tag::COMPONENT,
            DescriptorTag::StreamIdentifier => descriptor_tag::STREAM_IDENTIFIER,
            DescriptorTag::AudioComponent => descriptor_tag::AUDIO_COMPONENT,
            DescriptorTag::CaEmmTs => descriptor_tag::CA_EMM_TS,
            DescriptorTag::TsInformation => descriptor_tag::TS_INFORMATION,
            DescriptorTag::PartialReception => descriptor_tag::PARTIAL_RECEPTION,
            DescriptorTag::Other(tag) => tag,
        }
    }
}

/// One descriptor: tag plus its payload (length byte excluded).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor<'a> {
    pub tag: DescriptorTag,
    pub data: &'a [u8],
}

/// Iterator over a descriptor loop.
///
/// Every step advances by the declared length plus two, whether or not the
/// tag is known. A descriptor whose declared length runs past the loop ends
/// the walk.
#[derive(Debug, Clone)]
pub struct DescriptorLoop<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> DescriptorLoop<'a> {
    /// Walk `data`, which must already be bounded to the loop length.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Bytes consumed so far.
    pub fn consumed(&self) -> usize {
        self.offset
    }
}

impl<'a> Iterator for DescriptorLoop<'a> {
    type Item = Descriptor<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset + 2 > self.data.len() {
            self.offset = self.data.len();
            return None;
        }
        let tag = self.data[self.offset];
        let length = self.data[self.offset + 1] as usize;
        let start = self.offset + 2;
        if start + length > self.data.len() {
            trace!(
                "descriptor 0x{:02x} of {} bytes overruns its loop ({} left)",
                tag,
                length,
                self.data.len() - start
            );
            self.offset = self.data.len();
            return None;
        }
        self.offset = start + length;
        Some(Descriptor {
            tag: DescriptorTag::from(tag),
            data: &self.data[start..start + length],
        })
    }
}

/// Conditional access descriptor (0x09) with the ARIB private extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CaDescriptor {
    /// CA system id.
    pub cas_id: u16,
    /// ECM or EMM PID.
    pub ca_pid: u16,
    /// Private type byte (0 when absent).
    pub ca_type: u8,
    /// Secondary (key-change) PID, when announced.
    pub secondary_pid: Option<u16>,
}

impl CaDescriptor {
    /// Parse a CA descriptor payload.
    pub fn parse(data: &[u8]) -> Result<Self, &'static str> {
        if data.len() < 4 {
            return Err("CA descriptor too short");
        }
        let cas_id = u16::from_be_bytes([data[0], data[1]]);
        let ca_pid = u16::from_be_bytes([data[2], data[3]]) & 0x1FFF;
        let ca_type = if data.len() > 4 { data[4] } else { 0 };
        let private_length = (data[2] & 0xC0) >> 6;
        let secondary_pid = if private_length >= 3 && data.len() >= 7 {
            Some(u16::from_be_bytes([data[5], data[6]]) & 0x1FFF)
        } else {
            None
        };

        Ok(CaDescriptor {
            cas_id,
            ca_pid,
            ca_type,
            secondary_pid,
        })
    }
}

/// Service descriptor (0x48).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceDescriptor<'a> {
    /// Service type.
    pub service_type: u8,
    /// Service provider name.
    pub provider_name: &'a [u8],
    /// Service name.
    pub service_name: &'a [u8],
}

impl<'a> ServiceDescriptor<'a> {
    /// Parse a service descriptor from raw bytes.
    pub fn parse(data: &'a [u8]) -> Result<Self, &'static str> {
        if data.len() < 3 {
            return Err("Service descriptor too short");
        }

        let service_type = data[0];
        let provider_name_length = data[1] as usize;

        if data.len() < 2 + provider_name_length + 1 {
            return Err("Invalid provider name length");
        }

        let provider_name = &data[2..2 + provider_name_length];

        let service_name_offset = 2 + provider_name_length;
        let service_name_length = data[service_name_offset] as usize;

        if data.len() < service_name_offset + 1 + service_name_length {
            return Err("Invalid service name length");
        }

        let service_name =
            &data[service_name_offset + 1..service_name_offset + 1 + service_name_length];

        Ok(ServiceDescriptor {
            service_type,
            provider_name,
            service_name,
        })
    }
}

/// Service list descriptor (0x41) entries: (service_id, service_type).
pub fn service_list(data: &[u8]) -> impl Iterator<Item = (u16, u8)> + '_ {
    data.chunks_exact(3)
        .map(|entry| (u16::from_be_bytes([entry[0], entry[1]]), entry[2]))
}

/// Partial reception descriptor (0xFB) entries: service ids.
pub fn partial_reception(data: &[u8]) -> impl Iterator<Item = u16> + '_ {
    data.chunks_exact(2)
        .map(|entry| u16::from_be_bytes([entry[0], entry[1]]))
}

/// One hierarchy level listed in a TS information descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransmissionLevel {
    /// Transmission type info (layer and modulation bits).
    pub transmission_type_info: u8,
    /// Services carried on this level, primary first.
    pub service_ids: Vec<u16>,
}

/// TS information descriptor (0xCD for ISDB).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TsInformationDescriptor<'a> {
    /// Remote control key ID.
    pub remote_control_key_id: u8,
    /// TS name.
    pub ts_name: &'a [u8],
    /// Hierarchy levels.
    pub levels: Vec<TransmissionLevel>,
}

impl<'a> TsInformationDescriptor<'a> {
    /// Parse a TS information descriptor.
    pub fn parse(data: &'a [u8]) -> Result<Self, &'static str> {
        if data.len() < 2 {
            return Err("TS information descriptor too short");
        }

        let remote_control_key_id = data[0];
        let ts_name_length = (data[1] >> 2) as usize;
        let level_count = data[1] & 0x03;

        if data.len() < 2 + ts_name_length {
            return Err("Invalid TS name length");
        }
        let ts_name = &data[2..2 + ts_name_length];

        let mut offset = 2 + ts_name_length;
        let mut levels = Vec::with_capacity(level_count as usize);
        for _ in 0..level_count {
            if data.len() < offset + 2 {
                return Err("Truncated transmission type loop");
            }
            let transmission_type_info = data[offset];
            let count = data[offset + 1] as usize;
            offset += 2;
            let ids = data
                .get(offset..offset + 2 * count)
                .ok_or("Truncated service id list")?;
            levels.push(TransmissionLevel {
                transmission_type_info,
                service_ids: ids
                    .chunks_exact(2)
                    .map(|id| u16::from_be_bytes([id[0], id[1]]))
                    .collect(),
            });
            offset += 2 * count;
        }

        Ok(TsInformationDescriptor {
            remote_control_key_id,
            ts_name,
            levels,
        })
    }
}

/// CA EMM TS descriptor (0xCA): where EMMs are carried.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CaEmmTsDescriptor {
    pub cas_id: u16,
    pub transport_stream_id: u16,
    pub original_network_id: u16,
    pub power_supply_period: u8,
}

impl CaEmmTsDescriptor {
    pub fn parse(data: &[u8]) -> Result<Self, &'static str> {
        if data.len() < 7 {
            return Err("CA EMM TS descriptor too short");
        }
        Ok(CaEmmTsDescriptor {
            cas_id: u16::from_be_bytes([data[0], data[1]]),
            transport_stream_id: u16::from_be_bytes([data[2], data[3]]),
            original_network_id: u16::from_be_bytes([data[4], data[5]]),
            power_supply_period: data[6],
        })
    }
}

/// Short event descriptor (0x4D).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortEventDescriptor<'a> {
    pub language: LanguageCode,
    pub event_name: &'a [u8],
    pub text: &'a [u8],
}

impl<'a> ShortEventDescriptor<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self, &'static str> {
        if data.len() < 5 {
            return Err("Short event descriptor too short");
        }
        let language = LanguageCode([data[0], data[1], data[2]]);
        let name_length = data[3] as usize;
        let event_name = data
            .get(4..4 + name_length)
            .ok_or("Invalid event name length")?;
        let text_offset = 4 + name_length;
        let text_length = *data.get(text_offset).ok_or("Missing event text length")? as usize;
        let text = data
            .get(text_offset + 1..text_offset + 1 + text_length)
            .ok_or("Invalid event text length")?;

        Ok(ShortEventDescriptor {
            language,
            event_name,
            text,
        })
    }
}

/// Component descriptor (0x50), video components of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentDescriptor<'a> {
    pub stream_content: u8,
    pub component_type: u8,
    pub component_tag: u8,
    pub language: LanguageCode,
    pub text: &'a [u8],
}

impl<'a> ComponentDescriptor<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self, &'static str> {
        if data.len() < 6 {
            return Err("Component descriptor too short");
        }
        Ok(ComponentDescriptor {
            stream_content: data[0] & 0x0F,
            component_type: data[1],
            component_tag: data[2],
            language: LanguageCode([data[3], data[4], data[5]]),
            text: &data[6..],
        })
    }
}

/// Audio component descriptor (0xC4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioComponentDescriptor<'a> {
    pub stream_content: u8,
    pub component_type: u8,
    pub component_tag: u8,
    pub stream_type: u8,
    pub simulcast_group_tag: u8,
    /// Multi-lingual, main component, quality indicator and sampling rate bits.
    pub flags: u8,
    pub language: LanguageCode,
    /// Present only when the multi-lingual flag is set.
    pub second_language: Option<LanguageCode>,
    pub text: &'a [u8],
}

impl<'a> AudioComponentDescriptor<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self, &'static str> {
        if data.len() < 9 {
            return Err("Audio component descriptor too short");
        }
        let flags = data[5];
        let language = LanguageCode([data[6], data[7], data[8]]);
        let (second_language, text) = if flags & 0x80 != 0 {
            let second = data
                .get(9..12)
                .ok_or("Missing second language code")?;
            (
                Some(LanguageCode([second[0], second[1], second[2]])),
                &data[12..],
            )
        } else {
            (None, &data[9..])
        };

        Ok(AudioComponentDescriptor {
            stream_content: data[0] & 0x0F,
            component_type: data[1],
            component_tag: data[2],
            stream_type: data[3],
            simulcast_group_tag: data[4],
            flags,
            language,
            second_language,
            text,
        })
    }
}
