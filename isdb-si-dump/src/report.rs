//! Text and JSON renderings of the collected tables.

use std::io::{self, Write};

use isdb_si::{
    ChannelInfo, EitSlot, EitState, ProgramEntry, ServiceInformation, Snapshot, TableCounters,
    TableKind,
};
use serde::Serialize;

use crate::error::DumpError;

#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    snapshot: Snapshot<'a>,
    channels: Vec<ChannelInfo>,
}

/// Write every received table and the joined channel list as pretty JSON.
pub fn write_json<W: Write>(out: &mut W, si: &ServiceInformation) -> Result<(), DumpError> {
    let report = JsonReport {
        snapshot: si.snapshot(),
        channels: si.channels(),
    };
    serde_json::to_writer_pretty(&mut *out, &report)?;
    writeln!(out)?;
    Ok(())
}

fn hex16(value: Option<u16>) -> String {
    value.map_or_else(|| "------".to_string(), |v| format!("0x{:04x}", v))
}

fn version(value: Option<u8>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

/// Write a human-readable dump.
pub fn write_text<W: Write>(out: &mut W, si: &ServiceInformation) -> io::Result<()> {
    write_pat(out, si)?;
    write_cat(out, si)?;
    write_nit(out, si)?;
    write_sdt(out, si)?;
    write_tot(out, si)?;
    write_channels(out, si)?;
    write_statistics(out, si)
}

fn write_pat<W: Write>(out: &mut W, si: &ServiceInformation) -> io::Result<()> {
    let Some(pat) = si.pat() else {
        return writeln!(out, "PAT: not received");
    };
    writeln!(
        out,
        "PAT: tsid {} version {} nit-pid {}",
        hex16(pat.transport_stream_id()),
        version(pat.version()),
        hex16(pat.network_pid())
    )?;
    for program in pat.programs() {
        write_program(out, program)?;
    }
    Ok(())
}

fn write_program<W: Write>(out: &mut W, program: &ProgramEntry) -> io::Result<()> {
    writeln!(
        out,
        "  program 0x{:04x} pmt-pid 0x{:04x}",
        program.program_id(),
        program.pmt_pid()
    )?;
    match program.pmt() {
        Some(pmt) => {
            write!(
                out,
                "    PMT version {} pcr-pid 0x{:04x}",
                version(pmt.version()),
                pmt.pcr_pid()
            )?;
            if let Some(ecm) = pmt.ecm() {
                write!(out, " ecm cas 0x{:04x} pid 0x{:04x}", ecm.cas_id, ecm.ca_pid)?;
            }
            writeln!(out)?;
            for stream in pmt.streams() {
                write!(
                    out,
                    "      pid 0x{:04x} type 0x{:02x} ({})",
                    stream.elementary_pid,
                    stream.stream_type,
                    stream.stream_type_name()
                )?;
                if let Some(tag) = stream.component_tag {
                    write!(out, " tag 0x{:02x}", tag)?;
                }
                if let Some(ecm) = &stream.ecm {
                    write!(out, " ecm 0x{:04x}", ecm.ca_pid)?;
                }
                writeln!(out)?;
            }
        }
        None => writeln!(out, "    PMT: not received")?,
    }
    for slot in [EitSlot::Present, EitSlot::Following] {
        if let Some(eit) = program.eit(slot) {
            write_event(out, slot, eit)?;
        }
    }
    Ok(())
}

fn write_event<W: Write>(out: &mut W, slot: EitSlot, eit: &EitState) -> io::Result<()> {
    let start = eit
        .start()
        .map_or_else(|| "undefined".to_string(), |t| t.to_string());
    write!(
        out,
        "    EIT {}: version {} event {} start {} duration {}",
        slot.name(),
        version(eit.version()),
        hex16(eit.event_id()),
        start,
        eit.duration()
    )?;
    if eit.free_ca() {
        write!(out, " free-ca")?;
    }
    writeln!(out)?;
    if !eit.name().is_empty() {
        writeln!(out, "      name \"{}\"", eit.name())?;
    }
    if !eit.text().is_empty() {
        writeln!(out, "      text \"{}\"", eit.text())?;
    }
    for video in eit.video_components() {
        writeln!(
            out,
            "      video tag 0x{:02x} {} {} {}",
            video.component_tag,
            video.format_name(),
            video.aspect_name(),
            video.language
        )?;
    }
    for audio in eit.audio_components() {
        let rate = audio
            .sampling_rate()
            .map_or_else(|| "-".to_string(), |hz| format!("{}Hz", hz));
        write!(
            out,
            "      audio tag 0x{:02x} {} {} {}",
            audio.component_tag,
            audio.mode_name(),
            rate,
            audio.language
        )?;
        if let Some(second) = audio.second_language {
            write!(out, "/{}", second)?;
        }
        if audio.is_main() {
            write!(out, " main")?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn write_cat<W: Write>(out: &mut W, si: &ServiceInformation) -> io::Result<()> {
    let Some(cat) = si.cat() else {
        return writeln!(out, "CAT: not received");
    };
    writeln!(out, "CAT: version {}", version(cat.version()))?;
    for emm in cat.emm() {
        write!(
            out,
            "  cas 0x{:04x} emm-pid 0x{:04x} type 0x{:02x}",
            emm.cas_id, emm.ca_pid, emm.ca_type
        )?;
        if let Some(pid) = emm.secondary_pid {
            write!(out, " second 0x{:04x}", pid)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn write_nit<W: Write>(out: &mut W, si: &ServiceInformation) -> io::Result<()> {
    let Some(nit) = si.nit() else {
        return writeln!(out, "NIT: not received");
    };
    writeln!(
        out,
        "NIT: nid {} version {} sections {}/{}{}",
        hex16(nit.network_id()),
        version(nit.version()),
        nit.sequence().next_section(),
        nit.sequence().last_section() as u16 + 1,
        if nit.is_complete() { "" } else { " (partial)" }
    )?;
    if let Some(emm) = nit.emm_transport_stream() {
        writeln!(
            out,
            "  emm-ts cas 0x{:04x} tsid 0x{:04x} onid 0x{:04x} power 0x{:02x}",
            emm.cas_id, emm.transport_stream_id, emm.original_network_id, emm.power_supply_period
        )?;
    }
    let Some(ts) = nit.transport_stream() else {
        return Ok(());
    };
    let rc_key = ts
        .remote_control_key_id()
        .map_or_else(|| "-".to_string(), |k| k.to_string());
    writeln!(
        out,
        "  ts 0x{:04x} onid 0x{:04x} rc-key {} name \"{}\" levels {}",
        ts.transport_stream_id(),
        ts.original_network_id(),
        rc_key,
        ts.name(),
        ts.hierarchy_levels()
    )?;
    for service in ts.services() {
        write!(
            out,
            "    svc 0x{:04x} svc-type 0x{:02x} ({})",
            service.service_id,
            service.service_type,
            isdb_si::service_type_name(service.service_type)
        )?;
        if let Some(trans) = service.transmission_type {
            write!(out, " trans-type 0x{:02x}", trans)?;
        }
        if service.partial_reception {
            write!(out, " partial")?;
        }
        if service.primary {
            write!(out, " primary")?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn write_sdt<W: Write>(out: &mut W, si: &ServiceInformation) -> io::Result<()> {
    let Some(sdt) = si.sdt() else {
        return writeln!(out, "SDT: not received");
    };
    writeln!(
        out,
        "SDT: tsid {} onid {} version {}{}",
        hex16(sdt.transport_stream_id()),
        hex16(sdt.original_network_id()),
        version(sdt.version()),
        if sdt.is_complete() { "" } else { " (partial)" }
    )?;
    for service in sdt.services() {
        write!(
            out,
            "  svc 0x{:04x} svc-type 0x{:02x} ({}) flags 0x{:02x} {}",
            service.service_id,
            service.service_type,
            service.service_type_name(),
            service.flags,
            service.running_status_name()
        )?;
        if service.is_free_ca() {
            write!(out, " free-ca")?;
        }
        writeln!(out, " \"{}\"", service.name)?;
    }
    Ok(())
}

fn write_tot<W: Write>(out: &mut W, si: &ServiceInformation) -> io::Result<()> {
    match si.tot() {
        Some(tot) => match tot.to_datetime() {
            Some(time) => writeln!(out, "TOT: {}", time),
            None => writeln!(out, "TOT: {} {}", tot.day(), tot.time()),
        },
        None => writeln!(out, "TOT: not received"),
    }
}

fn write_channels<W: Write>(out: &mut W, si: &ServiceInformation) -> io::Result<()> {
    let channels = si.channels();
    if channels.is_empty() {
        return Ok(());
    }
    writeln!(out, "Channels:")?;
    for channel in &channels {
        write!(out, "  0x{:04x}", channel.service_id)?;
        if let Some(key) = channel.remote_control_key_id {
            write!(out, " rc-key {}", key)?;
        }
        if let Some(name) = &channel.service_name {
            write!(out, " \"{}\"", name)?;
        }
        write!(out, " video {}", hex16(channel.video_pid))?;
        if !channel.audio_pids.is_empty() {
            let audio: Vec<_> = channel
                .audio_pids
                .iter()
                .map(|pid| format!("0x{:04x}", pid))
                .collect();
            write!(out, " audio {}", audio.join(","))?;
        }
        if channel.partial_reception {
            write!(out, " 1seg")?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn write_statistics<W: Write>(out: &mut W, si: &ServiceInformation) -> io::Result<()> {
    let stats = si.statistics();
    writeln!(
        out,
        "Packets: {} ({} invalid)",
        stats.packets, stats.invalid_packets
    )?;
    for kind in TableKind::ALL {
        let counters = stats.counters(kind);
        if counters == TableCounters::default() {
            continue;
        }
        writeln!(
            out,
            "  {:<13} accepted {} rejected {} malformed {} discarded {}",
            kind.name(),
            counters.accepted,
            counters.rejected,
            counters.malformed,
            counters.discarded
        )?;
    }
    Ok(())
}
