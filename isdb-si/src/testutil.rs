//! Section and packet builders for unit tests.

use crate::packet::{SYNC_BYTE, TS_PACKET_SIZE};
use crate::section::crc32_mpeg2;

pub(crate) struct SectionBuilder {
    table_id: u8,
    flags: u8,
    extension: u16,
    version: u8,
    current: bool,
    section_number: u8,
    last_section_number: u8,
    body: Vec<u8>,
}

impl SectionBuilder {
    pub(crate) fn new(table_id: u8, extension: u16) -> Self {
        Self {
            table_id,
            flags: 0xB0,
            extension,
            version: 0,
            current: true,
            section_number: 0,
            last_section_number: 0,
            body: Vec::new(),
        }
    }

    pub(crate) fn flags(mut self, flags: u8) -> Self {
        self.flags = flags;
        self
    }

    pub(crate) fn version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }

    pub(crate) fn section(mut self, number: u8, last: u8) -> Self {
        self.section_number = number;
        self.last_section_number = last;
        self
    }

    pub(crate) fn not_current(mut self) -> Self {
        self.current = false;
        self
    }

    pub(crate) fn body(mut self, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(bytes);
        self
    }

    pub(crate) fn build(self) -> Vec<u8> {
        let section_length = 5 + self.body.len() + 4;
        let mut bytes = vec![
            self.table_id,
            self.flags | ((section_length >> 8) as u8 & 0x0F),
            section_length as u8,
            (self.extension >> 8) as u8,
            self.extension as u8,
            0xC0 | (self.version & 0x1F) << 1 | self.current as u8,
            self.section_number,
            self.last_section_number,
        ];
        bytes.extend_from_slice(&self.body);
        with_crc(bytes)
    }
}

/// Short section (3-byte header) followed by a CRC.
pub(crate) fn short_section(table_id: u8, flags: u8, body: &[u8]) -> Vec<u8> {
    let section_length = body.len() + 4;
    let mut bytes = vec![
        table_id,
        flags | ((section_length >> 8) as u8 & 0x0F),
        section_length as u8,
    ];
    bytes.extend_from_slice(body);
    with_crc(bytes)
}

fn with_crc(mut bytes: Vec<u8>) -> Vec<u8> {
    let crc = crc32_mpeg2(&bytes);
    bytes.extend_from_slice(&crc.to_be_bytes());
    bytes
}

pub(crate) fn descriptor(tag: u8, data: &[u8]) -> Vec<u8> {
    let mut bytes = vec![tag, data.len() as u8];
    bytes.extend_from_slice(data);
    bytes
}

/// 12-bit length prefix followed by the bytes, reserved bits set.
pub(crate) fn loop12(data: &[u8]) -> Vec<u8> {
    let mut bytes = vec![0xF0 | (data.len() >> 8) as u8 & 0x0F, data.len() as u8];
    bytes.extend_from_slice(data);
    bytes
}

/// One payload-only packet, padded with stuffing.
pub(crate) fn packet(pid: u16, pusi: bool, cc: u8, payload: &[u8]) -> [u8; TS_PACKET_SIZE] {
    let mut packet = [0xFFu8; TS_PACKET_SIZE];
    packet[0] = SYNC_BYTE;
    packet[1] = ((pid >> 8) as u8 & 0x1F) | if pusi { 0x40 } else { 0 };
    packet[2] = pid as u8;
    packet[3] = 0x10 | (cc & 0x0F);
    packet[4..4 + payload.len()].copy_from_slice(payload);
    packet
}

/// Split a section over as many packets as needed, starting at `first_cc`.
pub(crate) fn packetize(pid: u16, section: &[u8], first_cc: u8) -> Vec<[u8; TS_PACKET_SIZE]> {
    let mut packets = Vec::new();
    let mut payload = vec![0u8];
    payload.extend_from_slice(section);
    let mut cc = first_cc;
    for (i, chunk) in payload.chunks(TS_PACKET_SIZE - 4).enumerate() {
        packets.push(packet(pid, i == 0, cc, chunk));
        cc = (cc + 1) & 0x0F;
    }
    packets
}
