//! EIT present/following (actual TS) decoding.
//!
//! Each program owns two event slots filled from table 0x4E: section 0 is
//! the event on air now, section 1 the next one.

use chrono::NaiveDateTime;
use log::{debug, trace, warn};
use serde::Serialize;

use crate::bounded::BoundedVec;
use crate::config::SiConfig;
use crate::descriptors::{
    AudioComponentDescriptor, ComponentDescriptor, DescriptorLoop, DescriptorTag,
    ShortEventDescriptor,
};
use crate::error::Reject;
use crate::pat::PatState;
use crate::section::{Section, SectionReader};
use crate::table::TableKind;
use crate::text::{BroadcastString, LanguageCode};
use crate::time::{BcdTime, Mjd};
use crate::table_id;

/// Reassembly buffer size shared by all EIT sections.
pub const EIT_BUFFER_SIZE: usize = 4096;

pub const MAX_EVENT_NAME: usize = 96;
pub const MAX_EVENT_TEXT: usize = 192;
pub const MAX_VIDEO_COMPONENTS: usize = 16;
pub const MAX_VIDEO_COMPONENT_NAME: usize = 16;
pub const MAX_AUDIO_COMPONENTS: usize = 34;
pub const MAX_AUDIO_COMPONENT_NAME: usize = 33;

/// Audio component flag bits.
pub mod audio_flag {
    /// Second language code present (dual mono, two languages).
    pub const MULTI_LINGUAL: u8 = 0x80;
    /// Main audio component.
    pub const MAIN: u8 = 0x40;
    /// Quality indicator (2 bits).
    pub const QUALITY: u8 = 0x30;
    /// Sampling rate code (3 bits).
    pub const SAMPLING_RATE: u8 = 0x0E;
}

/// Which of the two event slots a section fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EitSlot {
    Present,
    Following,
}

impl EitSlot {
    /// Slot addressed by an EIT p/f section number.
    pub fn from_section_number(section_number: u8) -> Option<Self> {
        match section_number {
            0 => Some(EitSlot::Present),
            1 => Some(EitSlot::Following),
            _ => None,
        }
    }

    /// Matching table kind.
    pub fn table_kind(self) -> TableKind {
        match self {
            EitSlot::Present => TableKind::EitPresent,
            EitSlot::Following => TableKind::EitFollowing,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            EitSlot::Present => "present",
            EitSlot::Following => "following",
        }
    }
}

/// Video component of an event (component descriptor).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoComponent {
    pub stream_content: u8,
    pub component_type: u8,
    pub component_tag: u8,
    pub language: LanguageCode,
    pub name: BroadcastString,
}

impl VideoComponent {
    /// Video format from the upper nibble of the component type.
    pub fn format_name(&self) -> &'static str {
        match self.component_type & 0xF0 {
            0x00 => "480i",
            0xA0 => "480p",
            0xB0 => "1080i",
            0xC0 => "720p",
            0xD0 => "240p",
            0xE0 => "1080p",
            _ => "unknown",
        }
    }

    /// Aspect ratio from the lower nibble of the component type.
    pub fn aspect_name(&self) -> &'static str {
        match self.component_type & 0x0F {
            0x01 => "4:3",
            0x02 | 0x03 => "16:9",
            0x04 => ">16:9",
            _ => "unknown",
        }
    }
}

/// Audio component of an event (audio component descriptor).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioComponent {
    pub stream_content: u8,
    pub component_type: u8,
    pub component_tag: u8,
    pub stream_type: u8,
    pub simulcast_group_tag: u8,
    pub flags: u8,
    pub language: LanguageCode,
    pub second_language: Option<LanguageCode>,
    pub name: BroadcastString,
}

impl AudioComponent {
    pub fn is_multi_lingual(&self) -> bool {
        self.flags & audio_flag::MULTI_LINGUAL != 0
    }

    pub fn is_main(&self) -> bool {
        self.flags & audio_flag::MAIN != 0
    }

    pub fn quality_indicator(&self) -> u8 {
        (self.flags & audio_flag::QUALITY) >> 4
    }

    /// Sampling rate in Hz, `None` for reserved codes.
    pub fn sampling_rate(&self) -> Option<u32> {
        match (self.flags & audio_flag::SAMPLING_RATE) >> 1 {
            1 => Some(16_000),
            2 => Some(22_050),
            3 => Some(24_000),
            5 => Some(32_000),
            6 => Some(44_100),
            7 => Some(48_000),
            _ => None,
        }
    }

    /// Channel layout from the component type.
    pub fn mode_name(&self) -> &'static str {
        match self.component_type {
            0x01 => "mono",
            0x02 => "dual mono",
            0x03 => "stereo",
            0x04 => "2/1",
            0x05 => "3/0",
            0x06 => "2/2",
            0x07 => "3/1",
            0x08 => "3/2",
            0x09 => "3/2+LFE",
            _ => "unknown",
        }
    }
}

/// One present or following event of a program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EitState {
    version: Option<u8>,
    service_id: u16,
    transport_stream_id: u16,
    original_network_id: u16,
    event_id: Option<u16>,
    start_day: Mjd,
    start_time: BcdTime,
    duration: BcdTime,
    running_status: u8,
    free_ca: bool,
    language: Option<LanguageCode>,
    name: BroadcastString,
    text: BroadcastString,
    video: BoundedVec<VideoComponent, MAX_VIDEO_COMPONENTS>,
    audio: BoundedVec<AudioComponent, MAX_AUDIO_COMPONENTS>,
}

impl Default for EitState {
    fn default() -> Self {
        Self {
            version: None,
            service_id: 0,
            transport_stream_id: 0,
            original_network_id: 0,
            event_id: None,
            start_day: Mjd::UNDEFINED,
            start_time: BcdTime::UNDEFINED,
            duration: BcdTime::UNDEFINED,
            running_status: 0,
            free_ca: false,
            language: None,
            name: BroadcastString::default(),
            text: BroadcastString::default(),
            video: BoundedVec::new(),
            audio: BoundedVec::new(),
        }
    }
}

impl EitState {
    pub fn version(&self) -> Option<u8> {
        self.version
    }

    pub fn service_id(&self) -> u16 {
        self.service_id
    }

    pub fn transport_stream_id(&self) -> u16 {
        self.transport_stream_id
    }

    pub fn original_network_id(&self) -> u16 {
        self.original_network_id
    }

    /// Event id, `None` when the section carried no event.
    pub fn event_id(&self) -> Option<u16> {
        self.event_id
    }

    pub fn start_day(&self) -> Mjd {
        self.start_day
    }

    pub fn start_time(&self) -> BcdTime {
        self.start_time
    }

    pub fn duration(&self) -> BcdTime {
        self.duration
    }

    pub fn running_status(&self) -> u8 {
        self.running_status
    }

    pub fn free_ca(&self) -> bool {
        self.free_ca
    }

    pub fn language(&self) -> Option<LanguageCode> {
        self.language
    }

    pub fn name(&self) -> &BroadcastString {
        &self.name
    }

    pub fn text(&self) -> &BroadcastString {
        &self.text
    }

    pub fn video_components(&self) -> &[VideoComponent] {
        &self.video
    }

    pub fn audio_components(&self) -> &[AudioComponent] {
        &self.audio
    }

    /// Start as local (JST) date-time, `None` when undefined.
    pub fn start(&self) -> Option<NaiveDateTime> {
        self.start_day.with_time(self.start_time)
    }

    /// End as local date-time, `None` when start or duration is undefined.
    pub fn end(&self) -> Option<NaiveDateTime> {
        self.start()?
            .checked_add_signed(self.duration.to_duration()?)
    }

    /// Build a fully populated state from one section body.
    fn parse(version: u8, service_id: u16, body: &[u8]) -> Result<Self, Reject> {
        let mut reader = SectionReader::new(body);
        let mut state = EitState {
            version: Some(version),
            service_id,
            transport_stream_id: reader.u16()?,
            original_network_id: reader.u16()?,
            ..EitState::default()
        };
        // segment_last_section_number and last_table_id, checked by the caller
        reader.take(2)?;

        if reader.remaining() == 0 {
            return Ok(state);
        }

        state.event_id = Some(reader.u16()?);
        state.start_day = Mjd(reader.u16()?);
        state.start_time = BcdTime(reader.array3()?);
        state.duration = BcdTime(reader.array3()?);
        let flags = reader.u16()?;
        state.running_status = (flags >> 13) as u8;
        state.free_ca = flags & 0x1000 != 0;
        let descriptors = reader.take((flags & 0x0FFF) as usize)?;

        for descriptor in DescriptorLoop::new(descriptors) {
            match descriptor.tag {
                DescriptorTag::ShortEvent => match ShortEventDescriptor::parse(descriptor.data) {
                    Ok(event) => {
                        state.language = Some(event.language);
                        state.name = BroadcastString::truncated(event.event_name, MAX_EVENT_NAME);
                        state.text = BroadcastString::truncated(event.text, MAX_EVENT_TEXT);
                    }
                    Err(e) => debug!("service 0x{:04x}: {}", service_id, e),
                },
                DescriptorTag::Component => match ComponentDescriptor::parse(descriptor.data) {
                    Ok(component) => state.push_video(component),
                    Err(e) => debug!("service 0x{:04x}: {}", service_id, e),
                },
                DescriptorTag::AudioComponent => {
                    match AudioComponentDescriptor::parse(descriptor.data) {
                        Ok(component) => state.push_audio(component),
                        Err(e) => debug!("service 0x{:04x}: {}", service_id, e),
                    }
                }
                other => trace!("service 0x{:04x}: skipping descriptor {:?}", service_id, other),
            }
        }

        if reader.remaining() > 0 {
            trace!(
                "service 0x{:04x}: ignoring {} bytes after the first event",
                service_id,
                reader.remaining()
            );
        }
        Ok(state)
    }

    fn push_video(&mut self, component: ComponentDescriptor<'_>) {
        let video = VideoComponent {
            stream_content: component.stream_content,
            component_type: component.component_type,
            component_tag: component.component_tag,
            language: component.language,
            name: BroadcastString::truncated(component.text, MAX_VIDEO_COMPONENT_NAME),
        };
        if let Err(overflow) = self.video.try_push(video) {
            warn!(
                "event 0x{:04x} video component list full, dropping tag 0x{:02x}",
                self.event_id.unwrap_or_default(),
                overflow.into_inner().component_tag
            );
        }
    }

    fn push_audio(&mut self, component: AudioComponentDescriptor<'_>) {
        let audio = AudioComponent {
            stream_content: component.stream_content,
            component_type: component.component_type,
            component_tag: component.component_tag,
            stream_type: component.stream_type,
            simulcast_group_tag: component.simulcast_group_tag,
            flags: component.flags,
            language: component.language,
            second_language: component.second_language,
            name: BroadcastString::truncated(component.text, MAX_AUDIO_COMPONENT_NAME),
        };
        if let Err(overflow) = self.audio.try_push(audio) {
            warn!(
                "event 0x{:04x} audio component list full, dropping tag 0x{:02x}",
                self.event_id.unwrap_or_default(),
                overflow.into_inner().component_tag
            );
        }
    }
}

/// Apply an EIT p/f section to the slot of the program it describes.
pub(crate) fn decode(
    pat: &mut PatState,
    section: &Section<'_>,
    config: &SiConfig,
) -> Result<EitSlot, Reject> {
    let header = section.validate(table_id::EIT_PF_ACTUAL, config)?;
    let slot = EitSlot::from_section_number(header.section_number)
        .ok_or(Reject::Layout("EIT p/f section number beyond following"))?;
    if header.last_section_number != 1 {
        return Err(Reject::Layout("EIT p/f last_section_number must be 1"));
    }

    let body = section.body();
    let mut reader = SectionReader::new(body);
    let transport_stream_id = reader.u16()?;
    reader.u16()?;
    let segment_last_section_number = reader.u8()?;
    let last_table_id = reader.u8()?;
    if segment_last_section_number != 1 || last_table_id != header.table_id {
        return Err(Reject::Layout("EIT p/f segment fields"));
    }

    let expected_ts_id = pat.transport_stream_id().ok_or(Reject::NoPat)?;
    if transport_stream_id != expected_ts_id {
        return Err(Reject::IdMismatch {
            field: "transport_stream_id",
            expected: expected_ts_id,
            found: transport_stream_id,
        });
    }

    let service_id = header.table_id_extension;
    let program = pat
        .program_mut(service_id)
        .ok_or(Reject::UnknownService(service_id))?;
    let state = program
        .eit_slot_mut(slot)
        .get_or_insert_with(EitState::default);

    let version = header.version_number;
    if state.version == Some(version) {
        trace!(
            "same EIT-{} service 0x{:04x} version {}",
            slot.name(),
            service_id,
            version
        );
        return Err(Reject::SameVersion(version));
    }

    *state = EitState::parse(version, service_id, body)?;
    debug!(
        "new EIT-{} service 0x{:04x} version {} event {:?} start {} {}",
        slot.name(),
        service_id,
        version,
        state.event_id,
        state.start_day,
        state.start_time
    );
    Ok(slot)
}
