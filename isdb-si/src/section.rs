//! PSI section handling.
//!
//! This module covers the common section header, CRC validation, the per-PID
//! reassembly buffer that rebuilds sections split across TS packets, and the
//! version/section-number bookkeeping shared by multi-section tables.

use log::{debug, trace};
use serde::Serialize;

use crate::config::{HeaderCheck, SiConfig};
use crate::error::{Outcome, Reject};
use crate::packet::TsPacket;

/// Stuffing byte that ends the section data inside a packet.
const STUFFING: u8 = 0xFF;

/// Pending section whose first header bytes ended a packet.
const HEADER_PENDING: usize = usize::MAX;

/// PSI long-section header (common to all versioned tables).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PsiHeader {
    /// Table ID.
    pub table_id: u8,
    /// Section syntax indicator.
    pub section_syntax_indicator: bool,
    /// Section length (12 bits).
    pub section_length: u16,
    /// Table ID extension.
    pub table_id_extension: u16,
    /// Version number (5 bits).
    pub version_number: u8,
    /// Current/next indicator.
    pub current_next_indicator: bool,
    /// Section number.
    pub section_number: u8,
    /// Last section number.
    pub last_section_number: u8,
}

/// One complete section, from table_id through the CRC.
#[derive(Debug, Clone, Copy)]
pub struct Section<'a> {
    data: &'a [u8],
}

impl<'a> Section<'a> {
    /// Wrap raw bytes starting at table_id. Trailing bytes past the declared
    /// length are ignored.
    pub fn new(data: &'a [u8]) -> Result<Self, Reject> {
        if data.len() < 3 {
            return Err(Reject::Truncated);
        }
        let total = section_total_length(data);
        if data.len() < total {
            return Err(Reject::Truncated);
        }
        Ok(Section {
            data: &data[..total],
        })
    }

    /// Wrap bytes the reassembler already sized to the declared length.
    fn complete(data: &'a [u8]) -> Self {
        Section { data }
    }

    /// Raw section bytes including the CRC.
    pub fn bytes(&self) -> &'a [u8] {
        self.data
    }

    /// Table ID.
    pub fn table_id(&self) -> u8 {
        self.data[0]
    }

    /// Section number, or 0 for sections too short to carry one.
    pub fn section_number(&self) -> u8 {
        self.data.get(6).copied().unwrap_or(0)
    }

    /// Total length including header and CRC.
    pub fn total_length(&self) -> usize {
        self.data.len()
    }

    /// Parse the long-section header.
    pub fn header(&self) -> Result<PsiHeader, Reject> {
        let data = self.data;
        if data.len() < 12 {
            return Err(Reject::Truncated);
        }
        Ok(PsiHeader {
            table_id: data[0],
            section_syntax_indicator: data[1] & 0x80 != 0,
            section_length: ((data[1] as u16 & 0x0F) << 8) | data[2] as u16,
            table_id_extension: ((data[3] as u16) << 8) | data[4] as u16,
            version_number: (data[5] >> 1) & 0x1F,
            current_next_indicator: data[5] & 0x01 != 0,
            section_number: data[6],
            last_section_number: data[7],
        })
    }

    /// Long-section body: after the 8-byte header, before the CRC.
    pub fn body(&self) -> &'a [u8] {
        self.payload_from(8)
    }

    /// Short-section payload: after the 3-byte header, before the CRC.
    pub fn short_body(&self) -> &'a [u8] {
        self.payload_from(3)
    }

    fn payload_from(&self, start: usize) -> &'a [u8] {
        let end = self.data.len().saturating_sub(4);
        if end <= start {
            return &[];
        }
        &self.data[start..end]
    }

    /// CRC32 value carried at the end of the section.
    pub fn crc32(&self) -> Option<u32> {
        let len = self.data.len();
        if len < 7 {
            return None;
        }
        let crc = &self.data[len - 4..];
        Some(u32::from_be_bytes([crc[0], crc[1], crc[2], crc[3]]))
    }

    /// Verify the CRC32 of the section.
    pub fn verify_crc(&self) -> Result<(), Reject> {
        let carried = self.crc32().ok_or(Reject::Truncated)?;
        let computed = crc32_mpeg2(&self.data[..self.data.len() - 4]);
        if computed != carried {
            return Err(Reject::CrcMismatch { computed, carried });
        }
        Ok(())
    }

    /// Common checks for a long section: table id, fixed bits, CRC and the
    /// current/next indicator.
    pub fn validate(&self, expected_table_id: u8, config: &SiConfig) -> Result<PsiHeader, Reject> {
        self.check_table_id(expected_table_id)?;
        let header = self.header()?;
        self.check_fixed_bits(config, 0xB0)?;
        if config.verify_crc {
            self.verify_crc()?;
        }
        if !header.current_next_indicator {
            return Err(Reject::NotCurrent);
        }
        Ok(header)
    }

    /// Common checks for a short section with CRC (the TOT).
    pub fn validate_short(&self, expected_table_id: u8, config: &SiConfig) -> Result<(), Reject> {
        self.check_table_id(expected_table_id)?;
        self.check_fixed_bits(config, 0x30)?;
        if config.verify_crc {
            self.verify_crc()?;
        }
        Ok(())
    }

    fn check_table_id(&self, expected: u8) -> Result<(), Reject> {
        let found = self.table_id();
        if found != expected {
            return Err(Reject::WrongTableId { expected, found });
        }
        Ok(())
    }

    fn check_fixed_bits(&self, config: &SiConfig, pattern: u8) -> Result<(), Reject> {
        let bits = self.data[1];
        if config.header_check == HeaderCheck::Strict && bits & 0xB0 != pattern {
            return Err(Reject::HeaderBits(bits & 0xF0));
        }
        Ok(())
    }
}

fn section_total_length(data: &[u8]) -> usize {
    (((data[1] as usize) & 0x0F) << 8 | data[2] as usize) + 3
}

/// Bounds-checked big-endian cursor over a section body.
#[derive(Debug, Clone)]
pub(crate) struct SectionReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> SectionReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    pub(crate) fn u8(&mut self) -> Result<u8, Reject> {
        let value = *self.data.get(self.position).ok_or(Reject::Truncated)?;
        self.position += 1;
        Ok(value)
    }

    pub(crate) fn u16(&mut self) -> Result<u16, Reject> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// 12-bit length field (upper nibble reserved).
    pub(crate) fn length12(&mut self) -> Result<usize, Reject> {
        Ok((self.u16()? & 0x0FFF) as usize)
    }

    pub(crate) fn array3(&mut self) -> Result<[u8; 3], Reject> {
        let bytes = self.take(3)?;
        Ok([bytes[0], bytes[1], bytes[2]])
    }

    pub(crate) fn take(&mut self, len: usize) -> Result<&'a [u8], Reject> {
        let end = self.position.checked_add(len).ok_or(Reject::Truncated)?;
        let bytes = self.data.get(self.position..end).ok_or(Reject::Truncated)?;
        self.position = end;
        Ok(bytes)
    }
}

/// Counts of what one packet produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FeedSummary {
    /// Sections applied to their table.
    pub accepted: u32,
    /// Sections rejected as stale, duplicate, out of order or unresolvable.
    pub rejected: u32,
    /// Sections with a bad header, CRC or body.
    pub malformed: u32,
    /// Partial sections dropped before decoding (continuity break, oversize,
    /// bad pointer field or superseded by a new section).
    pub discarded: u32,
}

impl FeedSummary {
    pub(crate) fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Accepted => self.accepted += 1,
            Outcome::Rejected => self.rejected += 1,
            Outcome::Malformed => self.malformed += 1,
        }
    }

    /// Number of sections handed to a decoder.
    pub fn decoded(&self) -> u32 {
        self.accepted + self.rejected + self.malformed
    }

    /// Additive summary code: each decoder outcome code plus one per discard.
    pub fn code(&self) -> u32 {
        self.rejected * Outcome::Rejected.code()
            + self.malformed * Outcome::Malformed.code()
            + self.discarded
    }

    /// Nothing was decoded or discarded.
    pub fn is_empty(&self) -> bool {
        self.decoded() == 0 && self.discarded == 0
    }
}

impl std::ops::AddAssign for FeedSummary {
    fn add_assign(&mut self, other: Self) {
        self.accepted += other.accepted;
        self.rejected += other.rejected;
        self.malformed += other.malformed;
        self.discarded += other.discarded;
    }
}

/// Per-PID section reassembly buffer.
///
/// Holds at most one partially received section. A section whose declared
/// length exceeds the capacity is dropped before any byte is copied.
#[derive(Debug, Clone)]
pub struct SectionBuffer {
    data: Vec<u8>,
    capacity: usize,
    /// Declared total length of the pending section, 0 when idle and
    /// `HEADER_PENDING` while its length field is still incomplete.
    expected_length: usize,
    continuity_counter: u8,
}

impl SectionBuffer {
    /// Create a buffer that accepts sections up to `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: Vec::new(),
            capacity,
            expected_length: 0,
            continuity_counter: 0,
        }
    }

    /// Maximum section size in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether a section is partially received.
    pub fn is_pending(&self) -> bool {
        self.expected_length != 0
    }

    /// Bytes of the pending section received so far.
    pub fn filled(&self) -> usize {
        self.data.len()
    }

    /// Drop any pending section.
    pub fn clear(&mut self) {
        self.data.clear();
        self.expected_length = 0;
    }

    /// Feed one raw 188-byte packet already filtered to this buffer's PID.
    pub fn feed<F>(&mut self, packet: &[u8], decode: F) -> FeedSummary
    where
        F: FnMut(&Section<'_>) -> Outcome,
    {
        match TsPacket::parse(packet) {
            Ok(packet) => self.feed_packet(&packet, decode),
            Err(reason) => {
                debug!("skipping packet: {}", reason);
                FeedSummary::default()
            }
        }
    }

    /// Feed one parsed packet, calling `decode` once per completed section.
    pub fn feed_packet<F>(&mut self, packet: &TsPacket<'_>, mut decode: F) -> FeedSummary
    where
        F: FnMut(&Section<'_>) -> Outcome,
    {
        let mut summary = FeedSummary::default();
        let header = &packet.header;
        if !header.has_payload() || header.transport_error {
            return summary;
        }

        let pid = header.pid;
        let cc = header.continuity_counter;
        let payload = packet.payload;

        let (head, mut rest) = if header.payload_unit_start {
            let Some((&pointer, after)) = payload.split_first() else {
                return summary;
            };
            let pointer = pointer as usize;
            if pointer > after.len() {
                debug!("pointer field {} beyond payload on pid:0x{:04x}", pointer, pid);
                if self.is_pending() {
                    self.clear();
                    summary.discarded += 1;
                }
                return summary;
            }
            after.split_at(pointer)
        } else {
            (payload, &[][..])
        };

        // fill the pending section
        if !head.is_empty() && self.is_pending() {
            let expected_cc = (self.continuity_counter + 1) & 0x0F;
            if cc != expected_cc {
                debug!(
                    "broken section data in pid:0x{:04x} (cc {} expected {})",
                    pid, cc, expected_cc
                );
                self.clear();
                summary.discarded += 1;
            } else {
                self.continuity_counter = cc;
                let mut head = head;
                if self.expected_length == HEADER_PENDING {
                    let take = (3 - self.data.len()).min(head.len());
                    self.data.extend_from_slice(&head[..take]);
                    head = &head[take..];
                    if self.data.len() == 3 {
                        let total = section_total_length(&self.data);
                        if total > self.capacity {
                            debug!(
                                "section of {} bytes exceeds {} byte buffer on pid:0x{:04x}",
                                total, self.capacity, pid
                            );
                            self.clear();
                            summary.discarded += 1;
                        } else {
                            self.expected_length = total;
                        }
                    }
                }
                if self.is_pending() && self.expected_length != HEADER_PENDING {
                    let missing = self.expected_length - self.data.len();
                    if head.len() < missing {
                        self.data.extend_from_slice(head);
                        trace!("pid:0x{:04x} {} bytes remain", pid, missing - head.len());
                    } else {
                        self.data.extend_from_slice(&head[..missing]);
                        summary.record(decode(&Section::complete(&self.data)));
                        self.clear();
                        if header.payload_unit_start && head.len() > missing {
                            debug!("illegal section gap in pid:0x{:04x}", pid);
                        }
                    }
                }
            }
        }

        // start new sections
        while !rest.is_empty() {
            if rest[0] == STUFFING {
                break;
            }
            if self.is_pending() {
                debug!("unfinished section in pid:0x{:04x} superseded", pid);
                self.clear();
                summary.discarded += 1;
            }
            if rest.len() < 3 {
                // length field continues in the next packet
                self.data.extend_from_slice(rest);
                self.expected_length = HEADER_PENDING;
                self.continuity_counter = cc;
                break;
            }

            let total = section_total_length(rest);
            trace!(
                "new section pid:0x{:04x} tid:0x{:02x} len:{} cc:{}",
                pid,
                rest[0],
                total,
                cc
            );
            if total > self.capacity {
                debug!(
                    "section of {} bytes exceeds {} byte buffer on pid:0x{:04x}",
                    total, self.capacity, pid
                );
                summary.discarded += 1;
                break;
            }
            if rest.len() < total {
                self.data.extend_from_slice(rest);
                self.expected_length = total;
                self.continuity_counter = cc;
                break;
            }

            let (section, tail) = rest.split_at(total);
            summary.record(decode(&Section::complete(section)));
            rest = tail;
        }

        summary
    }
}

/// Version and section-number tracking for tables delivered in several
/// sections (NIT, SDT).
///
/// A section is admitted only when its version is new and it is section 0,
/// or its version is the stored one and it is the next expected section.
/// A refused section leaves the tracker untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SectionSequence {
    version: Option<u8>,
    next_section: u16,
    last_section: u8,
}

impl SectionSequence {
    /// Version of the table being collected.
    pub fn version(&self) -> Option<u8> {
        self.version
    }

    /// Section number expected next.
    pub fn next_section(&self) -> u16 {
        self.next_section
    }

    /// Last section number announced by the current version.
    pub fn last_section(&self) -> u8 {
        self.last_section
    }

    /// Every section up to `last_section_number` has been admitted.
    pub fn is_complete(&self) -> bool {
        self.version.is_some() && self.next_section > self.last_section as u16
    }

    /// Admit a section. Returns `Ok(true)` when it starts a new version and
    /// the table must be reset before applying it.
    pub fn admit(&mut self, header: &PsiHeader) -> Result<bool, Reject> {
        let version = header.version_number;
        let fresh = self.version != Some(version);
        let expected = if fresh { 0 } else { self.next_section };
        let found = header.section_number;

        if (found as u16) < expected {
            return Err(Reject::DuplicateSection { expected, found });
        }
        if found as u16 > expected {
            return Err(Reject::SectionGap { expected, found });
        }

        self.version = Some(version);
        self.next_section = expected + 1;
        self.last_section = header.last_section_number;
        Ok(fresh)
    }
}

/// Single-section tables (PAT, CAT, PMT) only ever carry section 0.
pub(crate) fn require_single_section(header: &PsiHeader) -> Result<(), Reject> {
    if header.section_number != 0 {
        return Err(Reject::SectionGap {
            expected: 0,
            found: header.section_number,
        });
    }
    Ok(())
}

/// Calculate CRC32 for MPEG-2 (polynomial 0x04C11DB7).
pub fn crc32_mpeg2(data: &[u8]) -> u32 {
    // CRC32 lookup table for MPEG-2 polynomial
    static CRC_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = (i as u32) << 24;
            let mut j = 0;
            while j < 8 {
                if crc & 0x80000000 != 0 {
                    crc = (crc << 1) ^ 0x04C11DB7;
                } else {
                    crc <<= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFFFFFFu32;
    for &byte in data {
        let index = ((crc >> 24) ^ byte as u32) as usize;
        crc = (crc << 8) ^ CRC_TABLE[index];
    }
    crc
}
