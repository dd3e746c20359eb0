//! MPEG-TS packet parsing.
//!
//! This module handles parsing of 188-byte MPEG Transport Stream packets.

/// TS packet size in bytes.
pub const TS_PACKET_SIZE: usize = 188;

/// TS sync byte (0x47).
pub const SYNC_BYTE: u8 = 0x47;

/// Parsed TS packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TsHeader {
    /// Transport error indicator.
    pub transport_error: bool,
    /// Payload unit start indicator.
    pub payload_unit_start: bool,
    /// Transport priority.
    pub transport_priority: bool,
    /// Packet Identifier (13 bits).
    pub pid: u16,
    /// Transport scrambling control (2 bits).
    pub scrambling_control: u8,
    /// Adaptation field control (2 bits).
    pub adaptation_field_control: u8,
    /// Continuity counter (4 bits).
    pub continuity_counter: u8,
}

impl TsHeader {
    /// Parse the 4-byte header. The caller guarantees `data` holds at least 4 bytes.
    fn from_bytes(data: &[u8]) -> Self {
        TsHeader {
            transport_error: data[1] & 0x80 != 0,
            payload_unit_start: data[1] & 0x40 != 0,
            transport_priority: data[1] & 0x20 != 0,
            pid: ((data[1] as u16 & 0x1F) << 8) | data[2] as u16,
            scrambling_control: (data[3] >> 6) & 0x03,
            adaptation_field_control: (data[3] >> 4) & 0x03,
            continuity_counter: data[3] & 0x0F,
        }
    }

    /// Check if packet has adaptation field.
    pub fn has_adaptation_field(&self) -> bool {
        self.adaptation_field_control & 0x02 != 0
    }

    /// Check if packet has payload.
    pub fn has_payload(&self) -> bool {
        self.adaptation_field_control & 0x01 != 0
    }

    /// Check if packet is scrambled.
    pub fn is_scrambled(&self) -> bool {
        self.scrambling_control != 0
    }
}

/// A parsed TS packet: header plus the payload that follows any adaptation field.
#[derive(Debug, Clone, Copy)]
pub struct TsPacket<'a> {
    /// Packet header.
    pub header: TsHeader,
    /// Payload data (empty when the packet carries none).
    pub payload: &'a [u8],
}

impl<'a> TsPacket<'a> {
    /// Parse a TS packet from raw bytes.
    ///
    /// # Arguments
    /// * `data` - Slice containing at least 188 bytes
    ///
    /// # Returns
    /// Parsed packet or error message
    pub fn parse(data: &'a [u8]) -> Result<Self, &'static str> {
        if data.len() < TS_PACKET_SIZE {
            return Err("Packet too short");
        }

        if data[0] != SYNC_BYTE {
            return Err("Invalid sync byte");
        }

        let header = TsHeader::from_bytes(data);

        let mut offset = 4;
        if header.has_adaptation_field() {
            offset += 1 + data[4] as usize;
            if offset > TS_PACKET_SIZE {
                return Err("Adaptation field exceeds packet");
            }
        }

        let payload = if header.has_payload() {
            &data[offset..TS_PACKET_SIZE]
        } else {
            &[]
        };

        Ok(TsPacket { header, payload })
    }

    /// PID shortcut.
    pub fn pid(&self) -> u16 {
        self.header.pid
    }
}
