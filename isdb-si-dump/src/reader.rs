//! Packet synchronization over a raw byte stream.

use std::io::{self, BufReader, ErrorKind, Read};

use isdb_si::{SYNC_BYTE, TS_PACKET_SIZE};
use log::{debug, warn};

/// Reads 188-byte TS packets, resynchronizing on the sync byte.
pub struct PacketReader<R: Read> {
    inner: BufReader<R>,
    skipped: u64,
    packets: u64,
}

impl<R: Read> PacketReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
            skipped: 0,
            packets: 0,
        }
    }

    /// Total bytes dropped while hunting for a sync byte.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn packets(&self) -> u64 {
        self.packets
    }

    /// Next packet, or `None` at end of input.
    ///
    /// A trailing partial packet is dropped.
    pub fn read_packet(&mut self) -> io::Result<Option<[u8; TS_PACKET_SIZE]>> {
        let mut skipped = 0u64;
        let mut byte = [0u8; 1];
        loop {
            match self.inner.read_exact(&mut byte) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                    self.note_skip(skipped);
                    return Ok(None);
                }
                Err(e) => return Err(e),
            }
            if byte[0] == SYNC_BYTE {
                break;
            }
            skipped += 1;
        }
        self.note_skip(skipped);

        let mut packet = [0u8; TS_PACKET_SIZE];
        packet[0] = SYNC_BYTE;
        match self.inner.read_exact(&mut packet[1..]) {
            Ok(()) => {
                self.packets += 1;
                Ok(Some(packet))
            }
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                debug!("Dropping truncated packet at end of input");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn note_skip(&mut self, skipped: u64) {
        if skipped > 0 {
            warn!("Skipped {} bytes to find sync byte", skipped);
            self.skipped += skipped;
        }
    }
}
