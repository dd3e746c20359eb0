//! PMT (Program Map Table) decoding.
//!
//! The PMT contains information about a specific program/service,
//! including the PIDs of its elementary streams (video, audio, etc.)
//! and the ECM PIDs needed to descramble them.

use log::{debug, trace, warn};
use serde::Serialize;

use crate::bounded::BoundedVec;
use crate::config::{CasFilter, SiConfig};
use crate::descriptors::{CaDescriptor, DescriptorLoop, DescriptorTag};
use crate::error::Reject;
use crate::section::{require_single_section, Section, SectionReader};
use crate::table_id;

/// Reassembly buffer size for one PMT.
pub const PMT_BUFFER_SIZE: usize = 1024;

/// Maximum elementary streams kept per program.
pub const MAX_STREAMS: usize = 32;

/// Stream type constants.
pub mod stream_type {
    /// MPEG-1 Video.
    pub const MPEG1_VIDEO: u8 = 0x01;
    /// MPEG-2 Video.
    pub const MPEG2_VIDEO: u8 = 0x02;
    /// MPEG-1 Audio.
    pub const MPEG1_AUDIO: u8 = 0x03;
    /// MPEG-2 Audio.
    pub const MPEG2_AUDIO: u8 = 0x04;
    /// MPEG-2 Private Sections.
    pub const PRIVATE_SECTIONS: u8 = 0x05;
    /// MPEG-2 PES Private Data (captions, superimpose).
    pub const PES_PRIVATE_DATA: u8 = 0x06;
    /// DSM-CC data carousel.
    pub const DSMCC: u8 = 0x0D;
    /// AAC Audio (ADTS).
    pub const AAC_AUDIO: u8 = 0x0F;
    /// AAC Audio (LATM).
    pub const AAC_LATM: u8 = 0x11;
    /// MPEG-4 Video (H.264/AVC).
    pub const H264_VIDEO: u8 = 0x1B;
    /// HEVC Video (H.265).
    pub const H265_VIDEO: u8 = 0x24;
}

/// A single elementary stream entry in the PMT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElementaryStream {
    /// Stream type.
    pub stream_type: u8,
    /// Elementary PID.
    pub elementary_pid: u16,
    /// Component tag from the stream identifier descriptor; links EIT components.
    pub component_tag: Option<u8>,
    /// Per-stream ECM (secondary ECM), ARIB CA only.
    pub ecm: Option<CaDescriptor>,
}

impl ElementaryStream {
    /// Check if this is a video stream.
    pub fn is_video(&self) -> bool {
        matches!(
            self.stream_type,
            stream_type::MPEG1_VIDEO
                | stream_type::MPEG2_VIDEO
                | stream_type::H264_VIDEO
                | stream_type::H265_VIDEO
        )
    }

    /// Check if this is an audio stream.
    pub fn is_audio(&self) -> bool {
        matches!(
            self.stream_type,
            stream_type::MPEG1_AUDIO
                | stream_type::MPEG2_AUDIO
                | stream_type::AAC_AUDIO
                | stream_type::AAC_LATM
        )
    }

    /// Get a human-readable stream type name.
    pub fn stream_type_name(&self) -> &'static str {
        match self.stream_type {
            stream_type::MPEG1_VIDEO => "MPEG-1 Video",
            stream_type::MPEG2_VIDEO => "MPEG-2 Video",
            stream_type::MPEG1_AUDIO => "MPEG-1 Audio",
            stream_type::MPEG2_AUDIO => "MPEG-2 Audio",
            stream_type::PRIVATE_SECTIONS => "Private Sections",
            stream_type::PES_PRIVATE_DATA => "PES Private Data",
            stream_type::DSMCC => "Data Carousel",
            stream_type::H264_VIDEO => "H.264/AVC Video",
            stream_type::H265_VIDEO => "H.265/HEVC Video",
            stream_type::AAC_AUDIO => "AAC Audio (ADTS)",
            stream_type::AAC_LATM => "AAC Audio (LATM)",
            _ => "Unknown",
        }
    }
}

/// PMT state of one program.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PmtState {
    version: Option<u8>,
    program_number: u16,
    pcr_pid: u16,
    ecm: Option<CaDescriptor>,
    streams: BoundedVec<ElementaryStream, MAX_STREAMS>,
}

impl PmtState {
    /// Version, `None` until the first PMT arrives.
    pub fn version(&self) -> Option<u8> {
        self.version
    }

    /// Whether a PMT has been applied.
    pub fn is_received(&self) -> bool {
        self.version.is_some()
    }

    /// Program number (service ID).
    pub fn program_number(&self) -> u16 {
        self.program_number
    }

    /// PCR PID.
    pub fn pcr_pid(&self) -> u16 {
        self.pcr_pid
    }

    /// Program-level ECM, `None` when the program is not scrambled with ARIB CA.
    pub fn ecm(&self) -> Option<&CaDescriptor> {
        self.ecm.as_ref()
    }

    /// Elementary streams in PMT order.
    pub fn streams(&self) -> &[ElementaryStream] {
        &self.streams
    }

    /// Stream carrying the given component tag.
    pub fn stream_by_tag(&self, component_tag: u8) -> Option<&ElementaryStream> {
        self.streams
            .iter()
            .find(|s| s.component_tag == Some(component_tag))
    }

    /// Get video PIDs.
    pub fn video_pids(&self) -> Vec<u16> {
        self.streams
            .iter()
            .filter(|s| s.is_video())
            .map(|s| s.elementary_pid)
            .collect()
    }

    /// Get audio PIDs.
    pub fn audio_pids(&self) -> Vec<u16> {
        self.streams
            .iter()
            .filter(|s| s.is_audio())
            .map(|s| s.elementary_pid)
            .collect()
    }

    /// Apply a PMT section for the program `program_id` owns.
    pub(crate) fn decode(
        &mut self,
        program_id: u16,
        section: &Section<'_>,
        config: &SiConfig,
    ) -> Result<(), Reject> {
        let header = section.validate(table_id::PMT, config)?;
        require_single_section(&header)?;

        let program_number = header.table_id_extension;
        let version = header.version_number;
        if program_number != program_id {
            return Err(Reject::IdMismatch {
                field: "program_number",
                expected: program_id,
                found: program_number,
            });
        }
        if self.version == Some(version) {
            trace!("same PMT prog:0x{:04x} version {}", program_number, version);
            return Err(Reject::SameVersion(version));
        }

        let mut reader = SectionReader::new(section.body());
        let pcr_pid = reader.u16()? & 0x1FFF;
        let program_info_length = reader.length12()?;
        let program_info = reader.take(program_info_length)?;

        let ecm = DescriptorLoop::new(program_info)
            .filter(|d| d.tag == DescriptorTag::ConditionalAccess)
            .filter_map(|d| CaDescriptor::parse(d.data).ok())
            .find(|ca| CasFilter::ARIB.accepts(ca.cas_id));

        let mut streams = BoundedVec::new();
        while reader.remaining() > 0 {
            let stream_type = reader.u8()?;
            let elementary_pid = reader.u16()? & 0x1FFF;
            let es_info_length = reader.length12()?;
            let es_info = reader.take(es_info_length)?;

            let mut stream = ElementaryStream {
                stream_type,
                elementary_pid,
                component_tag: None,
                ecm: None,
            };
            for descriptor in DescriptorLoop::new(es_info) {
                match descriptor.tag {
                    DescriptorTag::ConditionalAccess if stream.ecm.is_none() => {
                        stream.ecm = CaDescriptor::parse(descriptor.data)
                            .ok()
                            .filter(|ca| CasFilter::ARIB.accepts(ca.cas_id));
                    }
                    DescriptorTag::StreamIdentifier => {
                        stream.component_tag = descriptor.data.first().copied();
                    }
                    _ => {}
                }
            }

            if let Err(overflow) = streams.try_push(stream) {
                warn!(
                    "PMT prog:0x{:04x} stream list full, dropping pid:0x{:04x}",
                    program_number,
                    overflow.into_inner().elementary_pid
                );
            }
        }

        debug!(
            "new PMT prog:0x{:04x} version {} pcr:0x{:04x} ecm:{} streams:{}",
            program_number,
            version,
            pcr_pid,
            ecm.map(|ca| format!("0x{:04x}", ca.ca_pid))
                .unwrap_or_else(|| "----".to_string()),
            streams.len()
        );

        self.version = Some(version);
        self.program_number = program_number;
        self.pcr_pid = pcr_pid;
        self.ecm = ecm;
        self.streams = streams;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{descriptor, loop12, SectionBuilder};

    fn es_entry(stream_type: u8, pid: u16, descriptors: &[u8]) -> Vec<u8> {
        let mut entry = vec![stream_type, 0xE0 | (pid >> 8) as u8, pid as u8];
        entry.extend_from_slice(&loop12(descriptors));
        entry
    }

    fn pmt_section(program: u16, version: u8, streams: &[Vec<u8>]) -> Vec<u8> {
        let ecm = descriptor(0x09, &[0x00, 0x05, 0xE0, 0x31]);
        let mut body = vec![0xE1, 0x00];
        body.extend_from_slice(&loop12(&ecm));
        for s in streams {
            body.extend_from_slice(s);
        }
        SectionBuilder::new(0x02, program).version(version).body(&body).build()
    }

    #[test]
    fn test_decode_pmt() {
        let video = es_entry(0x02, 0x0111, &descriptor(0x52, &[0x00]));
        let audio = es_entry(
            0x0F,
            0x0112,
            &[descriptor(0x52, &[0x10]), descriptor(0x09, &[0x00, 0x05, 0xE0, 0x32])].concat(),
        );
        let bytes = pmt_section(0x0400, 1, &[video, audio]);
        let section = Section::new(&bytes).unwrap();

        let mut pmt = PmtState::default();
        pmt.decode(0x0400, &section, &SiConfig::default()).unwrap();
        assert_eq!(pmt.version(), Some(1));
        assert_eq!(pmt.pcr_pid(), 0x0100);
        assert_eq!(pmt.ecm().map(|ca| ca.ca_pid), Some(0x0031));
        assert_eq!(pmt.streams().len(), 2);
        assert_eq!(pmt.video_pids(), vec![0x0111]);
        assert_eq!(pmt.audio_pids(), vec![0x0112]);
        assert_eq!(pmt.stream_by_tag(0x10).map(|s| s.elementary_pid), Some(0x0112));
        assert_eq!(pmt.streams()[1].ecm.map(|ca| ca.ca_pid), Some(0x0032));
        assert_eq!(pmt.streams()[0].stream_type_name(), "MPEG-2 Video");
    }

    #[test]
    fn test_same_version_and_program_mismatch() {
        let bytes = pmt_section(0x0400, 1, &[]);
        let section = Section::new(&bytes).unwrap();
        let mut pmt = PmtState::default();
        let config = SiConfig::default();

        assert_eq!(
            pmt.decode(0x0401, &section, &config),
            Err(Reject::IdMismatch {
                field: "program_number",
                expected: 0x0401,
                found: 0x0400
            })
        );
        assert!(!pmt.is_received());

        pmt.decode(0x0400, &section, &config).unwrap();
        assert_eq!(pmt.decode(0x0400, &section, &config), Err(Reject::SameVersion(1)));
    }

    #[test]
    fn test_non_arib_ecm_ignored() {
        let ecm = descriptor(0x09, &[0x00, 0x0A, 0xE0, 0x31]);
        let mut body = vec![0xE1, 0x00];
        body.extend_from_slice(&loop12(&ecm));
        let bytes = SectionBuilder::new(0x02, 0x0400).body(&body).build();
        let section = Section::new(&bytes).unwrap();

        let mut pmt = PmtState::default();
        pmt.decode(0x0400, &section, &SiConfig::default()).unwrap();
        assert!(pmt.ecm().is_none());
    }

    #[test]
    fn test_stream_overflow_keeps_first_entries() {
        let streams: Vec<_> = (0..MAX_STREAMS as u16 + 1)
            .map(|i| es_entry(0x06, 0x0200 + i, &[]))
            .collect();
        let bytes = pmt_section(0x0400, 2, &streams);
        let section = Section::new(&bytes).unwrap();

        let mut pmt = PmtState::default();
        pmt.decode(0x0400, &section, &SiConfig::default()).unwrap();
        assert_eq!(pmt.streams().len(), MAX_STREAMS);
        assert_eq!(pmt.streams().last().map(|s| s.elementary_pid), Some(0x021F));
    }

    #[test]
    fn test_truncated_stream_loop_is_malformed() {
        let mut body = vec![0xE1, 0x00, 0xF0, 0x00];
        body.extend_from_slice(&[0x02, 0xE1, 0x11, 0xF0, 0x05, 0x52]);
        let bytes = SectionBuilder::new(0x02, 0x0400).body(&body).build();
        let section = Section::new(&bytes).unwrap();

        let mut pmt = PmtState::default();
        assert_eq!(
            pmt.decode(0x0400, &section, &SiConfig::default()),
            Err(Reject::Truncated)
        );
        assert!(!pmt.is_received());
    }
}
