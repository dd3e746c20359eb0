mod common;

use common::*;
use isdb_si::{pid, EitSlot, Mjd, ServiceInformation, SiConfig, TableKind};

const TS_ID: u16 = 0x7FE0;
const SERVICE: u16 = 0x1234;
const PMT_PID: u16 = 0x01F0;

fn with_pat() -> ServiceInformation {
    init_logger();
    let mut si = ServiceInformation::new(SiConfig::default());
    let summary = feed_section(&mut si, pid::PAT, &pat(TS_ID, 0, &[(SERVICE, PMT_PID)]), 0);
    assert_eq!(summary.accepted, 1);
    si
}

#[test]
fn test_pat_program_order_and_network_entry() {
    init_logger();
    let mut si = ServiceInformation::default();
    let section = pat(TS_ID, 3, &[(1, 0x0100), (0, 0x0010), (2, 0x0200)]);
    feed_section(&mut si, pid::PAT, &section, 7);

    let pat = si.pat().unwrap();
    assert_eq!(pat.version(), Some(3));
    let programs: Vec<_> = si
        .programs()
        .iter()
        .map(|p| (p.program_id(), p.pmt_pid()))
        .collect();
    assert_eq!(programs, vec![(1, 0x0100), (2, 0x0200)]);
    assert!(si.program(0).is_none());
}

#[test]
fn test_long_section_reassembles_across_packets() {
    init_logger();
    let mut si = ServiceInformation::default();
    let services: Vec<_> = (0..6u16)
        .map(|n| sdt_service(0x0400 + n, b"A service name of some length"))
        .collect();
    let section = sdt(TS_ID, TS_ID, 0, (0, 0), &services);
    let packets = packetize(pid::SDT, &section, 14);
    assert!(packets.len() > 1);

    let summary = feed_all(&mut si, &packets);
    assert_eq!(summary.accepted, 1);
    assert_eq!(si.sdt().unwrap().services().len(), 6);
}

#[test]
fn test_continuity_gap_discards_then_recovers() {
    init_logger();
    let mut si = ServiceInformation::default();
    let services: Vec<_> = (0..6u16)
        .map(|n| sdt_service(0x0400 + n, b"A service name of some length"))
        .collect();
    let section = sdt(TS_ID, TS_ID, 0, (0, 0), &services);
    let mut packets = packetize(pid::SDT, &section, 2);
    packets[1][3] = (packets[1][3] & 0xF0) | 5;

    let summary = feed_all(&mut si, &packets);
    assert_eq!(summary.decoded(), 0);
    assert_eq!(summary.discarded, 1);
    assert!(si.sdt().is_none());
    assert_eq!(si.statistics().counters(TableKind::Sdt).discarded, 1);

    let summary = feed_section(&mut si, pid::SDT, &section, 9);
    assert_eq!(summary.accepted, 1);
    assert!(si.sdt().is_some());
}

#[test]
fn test_multi_section_table_accepts_each_section_once() {
    init_logger();
    let mut si = ServiceInformation::default();
    let sections: Vec<_> = (0..3u8)
        .map(|n| sdt(TS_ID, TS_ID, 4, (n, 2), &[sdt_service(0x0400 + n as u16, b"svc")]))
        .collect();

    let mut cc = 0;
    for section in &sections {
        assert_eq!(feed_section(&mut si, pid::SDT, section, cc).accepted, 1);
        cc += 1;
    }
    assert!(si.sdt().unwrap().is_complete());

    let before = si.sdt().unwrap().services().to_vec();
    let summary = feed_section(&mut si, pid::SDT, &sections[1], cc);
    assert_eq!(summary.rejected, 1);
    assert_eq!(si.sdt().unwrap().services(), &before[..]);
}

#[test]
fn test_new_version_restarts_table() {
    init_logger();
    let mut si = ServiceInformation::default();
    feed_section(&mut si, pid::NIT, &nit(TS_ID, 0, (0, 0), &descriptor(0x41, &[0x04, 0x00, 0x01])), 0);
    feed_section(&mut si, pid::NIT, &nit(TS_ID, 1, (0, 1), &descriptor(0x41, &[0x04, 0x10, 0x01])), 1);

    let nit = si.nit().unwrap();
    assert_eq!(nit.version(), Some(1));
    assert!(!nit.is_complete());
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
fn test_eit_present_event_and_replacement() {
    let mut si = with_pat();
    let descriptors = short_event(b"Foo", b"Bar");
    let summary = feed_section(&mut si, pid::EIT, &eit(SERVICE, TS_ID, 0, 0, Some((0x0001, &descriptors[..]))), 0);
    assert_eq!(summary.accepted, 1);

    let present = si.eit_present(SERVICE).unwrap();
    assert_eq!(present.event_id(), Some(0x0001));
    assert_eq!(present.name().to_string(), "Foo");
    assert_eq!(present.text().to_string(), "Bar");
    assert_eq!(present.start_day(), Mjd(58849));
    assert_eq!(present.start().unwrap().to_string(), "2020-01-01 21:00:00");
    assert_eq!(present.end().unwrap().to_string(), "2020-01-01 21:30:00");
    assert!(si.eit_following(SERVICE).is_none());

    // same version again is a duplicate
    let summary = feed_section(&mut si, pid::EIT, &eit(SERVICE, TS_ID, 0, 0, Some((0x0001, &descriptors[..]))), 1);
    assert_eq!(summary.rejected, 1);

    let descriptors = short_event(b"Next", b"");
    feed_section(&mut si, pid::EIT, &eit(SERVICE, TS_ID, 1, 0, Some((0x0002, &descriptors[..]))), 2);
    let present = si.eit(SERVICE, EitSlot::Present).unwrap();
    assert_eq!(present.version(), Some(1));
    assert_eq!(present.event_id(), Some(0x0002));
    assert_eq!(present.name().to_string(), "Next");
    assert!(present.text().is_empty());
    assert_eq!(si.statistics().counters(TableKind::EitPresent).accepted, 2);
}

#[test]
fn test_eit_following_slot() {
    let mut si = with_pat();
    let descriptors = short_event(b"Later", b"");
    feed_section(&mut si, pid::EIT, &eit(SERVICE, TS_ID, 0, 1, Some((0x0009, &descriptors[..]))), 0);
    assert!(si.eit_present(SERVICE).is_none());
    assert_eq!(si.eit_following(SERVICE).unwrap().event_id(), Some(0x0009));
    assert_eq!(si.statistics().counters(TableKind::EitFollowing).accepted, 1);
}

#[test]
fn test_eit_cross_reference_misses_are_rejected() {
    init_logger();
    let mut si = ServiceInformation::default();
    let section = eit(SERVICE, TS_ID, 0, 0, None);
    assert_eq!(feed_section(&mut si, pid::EIT, &section, 0).rejected, 1);

    let mut si = with_pat();
    assert_eq!(feed_section(&mut si, pid::EIT, &eit(0x9999, TS_ID, 0, 0, None), 0).rejected, 1);
    assert_eq!(feed_section(&mut si, pid::EIT, &eit(SERVICE, 0x0001, 0, 0, None), 1).rejected, 1);
    assert!(si.eit_present(SERVICE).is_none());
}

#[test]
fn test_pat_version_change_drops_program_children() {
    let mut si = with_pat();
    feed_section(&mut si, PMT_PID, &pmt(SERVICE, 0, 0x0111, 0x0112), 0);
    feed_section(&mut si, pid::EIT, &eit(SERVICE, TS_ID, 0, 0, None), 0);
    assert!(si.pmt(SERVICE).is_some());
    assert!(si.eit_present(SERVICE).is_some());

    feed_section(&mut si, pid::PAT, &pat(TS_ID, 1, &[(SERVICE, PMT_PID)]), 1);
    assert!(si.pmt(SERVICE).is_none());
    assert!(si.eit_present(SERVICE).is_none());

    // the PMT is accepted again for the new program list
    assert_eq!(feed_section(&mut si, PMT_PID, &pmt(SERVICE, 0, 0x0111, 0x0112), 1).accepted, 1);
}

#[test]
fn test_pmt_program_mismatch_is_rejected() {
    let mut si = with_pat();
    let summary = feed_section(&mut si, PMT_PID, &pmt(0x4321, 0, 0x0111, 0x0112), 0);
    assert_eq!(summary.rejected, 1);
    assert!(si.pmt(SERVICE).is_none());
}

#[test]
fn test_crc_mismatch_is_malformed() {
    init_logger();
    let mut si = ServiceInformation::default();
    let mut section = pat(TS_ID, 0, &[(SERVICE, PMT_PID)]);
    let last = section.len() - 1;
    section[last] ^= 0xFF;
    let summary = feed_section(&mut si, pid::PAT, &section, 0);
    assert_eq!(summary.malformed, 1);
    assert_eq!(summary.code(), 2);
    assert!(si.pat().is_none());
}

#[test]
fn test_tot_accepted_on_every_delivery() {
    init_logger();
    let mut si = ServiceInformation::default();
    for cc in 0..3 {
        let summary = feed_section(&mut si, pid::TOT, &tot(58849, [0x12, 0x30, 0x00]), cc);
        assert_eq!(summary.accepted, 1);
    }
    let tot = si.tot().unwrap();
    assert_eq!(tot.day(), Mjd(58849));
    assert_eq!(tot.time().to_string(), "12:30:00");
}

#[test]
fn test_sections_packed_in_one_packet() {
    init_logger();
    let mut si = ServiceInformation::default();
    let first = tot(58849, [0x12, 0x30, 0x00]);
    let second = tot(58849, [0x12, 0x30, 0x05]);
    let mut payload = vec![0u8];
    payload.extend_from_slice(&first);
    payload.extend_from_slice(&second);

    let summary = si.feed(&packet(pid::TOT, true, 0, &payload));
    assert_eq!(summary.accepted, 2);
    assert_eq!(si.tot().unwrap().time().to_string(), "12:30:05");
}

#[test]
fn test_full_stream_completes() {
    let mut si = with_pat();
    assert!(!si.is_complete());
    feed_section(&mut si, PMT_PID, &pmt(SERVICE, 0, 0x0111, 0x0112), 0);
    let ts_descriptors = [
        descriptor(0xCD, &[0x02, (4 << 2) | 1, b'T', b'E', b'S', b'T', 0x0F, 0x01, 0x12, 0x34]),
        descriptor(0x41, &[0x12, 0x34, 0x01]),
    ]
    .concat();
    feed_section(&mut si, pid::NIT, &nit(TS_ID, 0, (0, 0), &ts_descriptors), 0);
    assert!(!si.is_complete());
    feed_section(&mut si, pid::SDT, &sdt(TS_ID, TS_ID, 0, (0, 0), &[sdt_service(SERVICE, b"Test TV")]), 0);
    assert!(si.is_complete());

    let channels = si.channels();
    assert_eq!(channels.len(), 1);
    assert_eq!(channels[0].service_name.as_deref(), Some("Test TV"));
    assert_eq!(channels[0].remote_control_key_id, Some(2));
    assert_eq!(channels[0].video_pid, Some(0x0111));

    let service = si.nit().unwrap().transport_stream().unwrap().service(SERVICE).copied().unwrap();
    assert!(service.primary);
    assert_eq!(service.service_type, 0x01);
}
