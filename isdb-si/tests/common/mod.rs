//! Stream builders shared by the integration tests.

#![allow(dead_code)]

use isdb_si::{crc32_mpeg2, FeedSummary, ServiceInformation, TS_PACKET_SIZE};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Long-form section with a valid CRC.
pub fn long_section(
    table_id: u8,
    extension: u16,
    version: u8,
    section: (u8, u8),
    body: &[u8],
) -> Vec<u8> {
    let section_length = 5 + body.len() + 4;
    let mut bytes = vec![
        table_id,
        0xF0 | ((section_length >> 8) as u8 & 0x0F),
        section_length as u8,
    ];
    bytes.extend_from_slice(&extension.to_be_bytes());
    bytes.push(0xC1 | ((version & 0x1F) << 1));
    bytes.push(section.0);
    bytes.push(section.1);
    bytes.extend_from_slice(body);
    let crc = crc32_mpeg2(&bytes);
    bytes.extend_from_slice(&crc.to_be_bytes());
    bytes
}

pub fn descriptor(tag: u8, data: &[u8]) -> Vec<u8> {
    let mut bytes = vec![tag, data.len() as u8];
    bytes.extend_from_slice(data);
    bytes
}

/// 12-bit length prefixed loop.
pub fn loop12(data: &[u8]) -> Vec<u8> {
    let mut bytes = vec![0xF0 | ((data.len() >> 8) as u8 & 0x0F), data.len() as u8];
    bytes.extend_from_slice(data);
    bytes
}

pub fn packet(pid: u16, pusi: bool, cc: u8, payload: &[u8]) -> [u8; TS_PACKET_SIZE] {
    let mut packet = [0xFFu8; TS_PACKET_SIZE];
    packet[0] = 0x47;
    packet[1] = ((pid >> 8) as u8 & 0x1F) | if pusi { 0x40 } else { 0 };
    packet[2] = pid as u8;
    packet[3] = 0x10 | (cc & 0x0F);
    packet[4..4 + payload.len()].copy_from_slice(payload);
    packet
}

pub fn packetize(pid: u16, section: &[u8], first_cc: u8) -> Vec<[u8; TS_PACKET_SIZE]> {
    let mut payload = vec![0u8];
    payload.extend_from_slice(section);
    payload
        .chunks(TS_PACKET_SIZE - 4)
        .enumerate()
        .map(|(i, chunk)| packet(pid, i == 0, first_cc.wrapping_add(i as u8) & 0x0F, chunk))
        .collect()
}

pub fn feed_all(si: &mut ServiceInformation, packets: &[[u8; TS_PACKET_SIZE]]) -> FeedSummary {
    let mut total = FeedSummary::default();
    for packet in packets {
        total += si.feed(packet);
    }
    total
}

pub fn feed_section(si: &mut ServiceInformation, pid: u16, section: &[u8], cc: u8) -> FeedSummary {
    feed_all(si, &packetize(pid, section, cc))
}

/// PAT listing `(program_number, pmt_pid)` pairs.
pub fn pat(ts_id: u16, version: u8, programs: &[(u16, u16)]) -> Vec<u8> {
    let mut body = Vec::new();
    for &(program, pid) in programs {
        body.extend_from_slice(&program.to_be_bytes());
        body.extend_from_slice(&(0xE000 | pid).to_be_bytes());
    }
    long_section(0x00, ts_id, version, (0, 0), &body)
}

/// PMT with one video and one audio stream.
pub fn pmt(program: u16, version: u8, video_pid: u16, audio_pid: u16) -> Vec<u8> {
    let mut body = (0xE000 | video_pid).to_be_bytes().to_vec();
    body.extend_from_slice(&loop12(&[]));
    body.push(0x02);
    body.extend_from_slice(&(0xE000 | video_pid).to_be_bytes());
    body.extend_from_slice(&loop12(&descriptor(0x52, &[0x00])));
    body.push(0x0F);
    body.extend_from_slice(&(0xE000 | audio_pid).to_be_bytes());
    body.extend_from_slice(&loop12(&descriptor(0x52, &[0x10])));
    long_section(0x02, program, version, (0, 0), &body)
}

/// NIT section carrying one transport stream with the given descriptors.
pub fn nit(network_id: u16, version: u8, section: (u8, u8), ts_descriptors: &[u8]) -> Vec<u8> {
    let mut ts = network_id.to_be_bytes().to_vec();
    ts.extend_from_slice(&network_id.to_be_bytes());
    ts.extend_from_slice(&loop12(ts_descriptors));
    let mut body = loop12(&[]);
    body.extend_from_slice(&loop12(&ts));
    long_section(0x40, network_id, version, section, &body)
}

/// One SDT service entry with a service descriptor.
pub fn sdt_service(service_id: u16, name: &[u8]) -> Vec<u8> {
    let mut data = vec![0x01, 0x00, name.len() as u8];
    data.extend_from_slice(name);
    let descriptors = descriptor(0x48, &data);
    let mut entry = service_id.to_be_bytes().to_vec();
    entry.push(0xE3);
    entry.push(0x80 | ((descriptors.len() >> 8) as u8 & 0x0F));
    entry.push(descriptors.len() as u8);
    entry.extend_from_slice(&descriptors);
    entry
}

pub fn sdt(ts_id: u16, onid: u16, version: u8, section: (u8, u8), services: &[Vec<u8>]) -> Vec<u8> {
    let mut body = onid.to_be_bytes().to_vec();
    body.push(0xFF);
    for service in services {
        body.extend_from_slice(service);
    }
    long_section(0x42, ts_id, version, section, &body)
}

/// Short event descriptor payload.
pub fn short_event(name: &[u8], text: &[u8]) -> Vec<u8> {
    let mut data = b"jpn".to_vec();
    data.push(name.len() as u8);
    data.extend_from_slice(name);
    data.push(text.len() as u8);
    data.extend_from_slice(text);
    descriptor(0x4D, &data)
}

/// EIT p/f section with at most one event.
pub fn eit(
    service_id: u16,
    ts_id: u16,
    version: u8,
    section_number: u8,
    event: Option<(u16, &[u8])>,
) -> Vec<u8> {
    let mut body = ts_id.to_be_bytes().to_vec();
    body.extend_from_slice(&0x0004u16.to_be_bytes());
    body.push(0x01);
    body.push(0x4E);
    if let Some((event_id, descriptors)) = event {
        body.extend_from_slice(&event_id.to_be_bytes());
        body.extend_from_slice(&58849u16.to_be_bytes());
        body.extend_from_slice(&[0x21, 0x00, 0x00, 0x00, 0x30, 0x00]);
        body.push(0x80 | ((descriptors.len() >> 8) as u8 & 0x0F));
        body.push(descriptors.len() as u8);
        body.extend_from_slice(descriptors);
    }
    long_section(0x4E, service_id, version, (section_number, 1), &body)
}

/// TOT short section.
pub fn tot(day: u16, time: [u8; 3]) -> Vec<u8> {
    let mut bytes = vec![0x73, 0x70, 0x0B];
    bytes.extend_from_slice(&day.to_be_bytes());
    bytes.extend_from_slice(&time);
    bytes.extend_from_slice(&[0xF0, 0x00]);
    let crc = crc32_mpeg2(&bytes);
    bytes.extend_from_slice(&crc.to_be_bytes());
    bytes
}
