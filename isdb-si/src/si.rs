//! The service information aggregate.
//!
//! [`ServiceInformation`] owns every table state and every reassembly buffer.
//! Packets go in through [`ServiceInformation::feed`]; each one is routed by
//! PID to its buffer, and every section the buffer completes is decoded into
//! the matching table before `feed` returns.

use std::collections::BTreeMap;

use log::{debug, trace};
use serde::Serialize;

use crate::cat::{CatState, CAT_BUFFER_SIZE};
use crate::config::SiConfig;
use crate::eit::{self, EitSlot, EitState, EIT_BUFFER_SIZE};
use crate::error::{Outcome, Reject};
use crate::nit::{NitState, NIT_BUFFER_SIZE};
use crate::packet::TsPacket;
use crate::pat::{PatState, ProgramEntry, PAT_BUFFER_SIZE};
use crate::pmt::PmtState;
use crate::sdt::{SdtState, SDT_BUFFER_SIZE};
use crate::section::{FeedSummary, SectionBuffer};
use crate::table::TableKind;
use crate::tot::{TotState, TOT_BUFFER_SIZE};

/// Per-table section counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableCounters {
    pub accepted: u64,
    pub rejected: u64,
    pub malformed: u64,
    /// Partial sections dropped by the reassembler.
    pub discarded: u64,
}

/// Running totals since creation or the last reset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Statistics {
    /// Packets handed to `feed`.
    pub packets: u64,
    /// Packets that failed to parse (short, bad sync, bad adaptation field).
    pub invalid_packets: u64,
    /// Counters by table. EIT discards are counted under EIT-p since the
    /// slot of a partial section is unknown.
    pub tables: BTreeMap<TableKind, TableCounters>,
}

impl Statistics {
    /// Counters for one table kind.
    pub fn counters(&self, kind: TableKind) -> TableCounters {
        self.tables.get(&kind).copied().unwrap_or_default()
    }

    fn record(&mut self, kind: TableKind, outcome: Outcome) {
        let counters = self.tables.entry(kind).or_default();
        match outcome {
            Outcome::Accepted => counters.accepted += 1,
            Outcome::Rejected => counters.rejected += 1,
            Outcome::Malformed => counters.malformed += 1,
        }
    }

    fn discard(&mut self, kind: TableKind, count: u32) {
        if count > 0 {
            self.tables.entry(kind).or_default().discarded += count as u64;
        }
    }
}

/// Channel information joined from PAT, PMT, NIT and SDT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelInfo {
    /// Network ID.
    pub network_id: Option<u16>,
    /// Transport stream ID.
    pub transport_stream_id: Option<u16>,
    /// Service ID.
    pub service_id: u16,
    /// Service name, rendered with the fallback text decoder.
    pub service_name: Option<String>,
    /// Service type.
    pub service_type: Option<u8>,
    /// Remote control key of the station.
    pub remote_control_key_id: Option<u8>,
    /// One-seg (partial reception) service.
    pub partial_reception: bool,
    /// Primary video PID.
    pub video_pid: Option<u16>,
    /// Audio PIDs.
    pub audio_pids: Vec<u16>,
}

/// Borrowed view of every received table, for serialization.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot<'a> {
    pub complete: bool,
    pub pat: Option<&'a PatState>,
    pub cat: Option<&'a CatState>,
    pub nit: Option<&'a NitState>,
    pub sdt: Option<&'a SdtState>,
    pub tot: Option<&'a TotState>,
    pub statistics: &'a Statistics,
}

#[derive(Debug, Clone)]
struct Buffers {
    pat: SectionBuffer,
    cat: SectionBuffer,
    nit: SectionBuffer,
    sdt: SectionBuffer,
    eit: SectionBuffer,
    tot: SectionBuffer,
}

impl Default for Buffers {
    fn default() -> Self {
        Self {
            pat: SectionBuffer::new(PAT_BUFFER_SIZE),
            cat: SectionBuffer::new(CAT_BUFFER_SIZE),
            nit: SectionBuffer::new(NIT_BUFFER_SIZE),
            sdt: SectionBuffer::new(SDT_BUFFER_SIZE),
            eit: SectionBuffer::new(EIT_BUFFER_SIZE),
            tot: SectionBuffer::new(TOT_BUFFER_SIZE),
        }
    }
}

/// Decoded PSI/SI of one transport stream.
#[derive(Debug, Clone, Default)]
pub struct ServiceInformation {
    config: SiConfig,
    pat: PatState,
    cat: CatState,
    nit: NitState,
    sdt: SdtState,
    tot: TotState,
    buffers: Buffers,
    stats: Statistics,
}

impl ServiceInformation {
    /// Create an empty aggregate.
    pub fn new(config: SiConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &SiConfig {
        &self.config
    }

    /// Feed one 188-byte TS packet.
    ///
    /// Never fails: malformed input only shows up in the returned summary,
    /// the statistics and the log.
    pub fn feed(&mut self, data: &[u8]) -> FeedSummary {
        self.stats.packets += 1;
        let packet = match TsPacket::parse(data) {
            Ok(packet) => packet,
            Err(reason) => {
                debug!("skipping packet: {}", reason);
                self.stats.invalid_packets += 1;
                return FeedSummary::default();
            }
        };

        let ServiceInformation {
            config,
            pat,
            cat,
            nit,
            sdt,
            tot,
            buffers,
            stats,
        } = self;
        let config = &*config;
        let pid = packet.pid();

        let (kind, summary) = match TableKind::for_pid(pid) {
            Some(TableKind::Pat) => (
                TableKind::Pat,
                buffers.pat.feed_packet(&packet, |section| {
                    settle(stats, TableKind::Pat, pat.decode(section, config))
                }),
            ),
            Some(TableKind::Cat) => (
                TableKind::Cat,
                buffers.cat.feed_packet(&packet, |section| {
                    settle(stats, TableKind::Cat, cat.decode(section, config))
                }),
            ),
            Some(TableKind::Nit) => (
                TableKind::Nit,
                buffers.nit.feed_packet(&packet, |section| {
                    settle(stats, TableKind::Nit, nit.decode(section, config))
                }),
            ),
            Some(TableKind::Sdt) => (
                TableKind::Sdt,
                buffers.sdt.feed_packet(&packet, |section| {
                    settle(stats, TableKind::Sdt, sdt.decode(section, config))
                }),
            ),
            Some(TableKind::EitPresent | TableKind::EitFollowing) => (
                TableKind::EitPresent,
                buffers.eit.feed_packet(&packet, |section| {
                    let kind = EitSlot::from_section_number(section.section_number())
                        .map_or(TableKind::EitPresent, EitSlot::table_kind);
                    settle(stats, kind, eit::decode(pat, section, config))
                }),
            ),
            Some(TableKind::Tot) => (
                TableKind::Tot,
                buffers.tot.feed_packet(&packet, |section| {
                    settle(stats, TableKind::Tot, tot.decode(section, config))
                }),
            ),
            Some(TableKind::Pmt) | None => {
                let Some(program) = pat.program_by_pmt_pid_mut(pid) else {
                    return FeedSummary::default();
                };
                let (program_id, pmt, buffer) = program.pmt_parts();
                (
                    TableKind::Pmt,
                    buffer.feed_packet(&packet, |section| {
                        settle(stats, TableKind::Pmt, pmt.decode(program_id, section, config))
                    }),
                )
            }
        };

        stats.discard(kind, summary.discarded);
        summary
    }

    /// PAT, once received.
    pub fn pat(&self) -> Option<&PatState> {
        Some(&self.pat).filter(|t| t.is_received())
    }

    /// CAT, once received.
    pub fn cat(&self) -> Option<&CatState> {
        Some(&self.cat).filter(|t| t.is_received())
    }

    /// NIT, once its first section is received.
    pub fn nit(&self) -> Option<&NitState> {
        Some(&self.nit).filter(|t| t.is_received())
    }

    /// SDT, once its first section is received.
    pub fn sdt(&self) -> Option<&SdtState> {
        Some(&self.sdt).filter(|t| t.is_received())
    }

    /// TOT, once received.
    pub fn tot(&self) -> Option<&TotState> {
        Some(&self.tot).filter(|t| t.is_received())
    }

    /// Programs of the current PAT.
    pub fn programs(&self) -> &[ProgramEntry] {
        self.pat.programs()
    }

    pub fn program(&self, program_id: u16) -> Option<&ProgramEntry> {
        self.pat.program(program_id)
    }

    pub fn pmt(&self, program_id: u16) -> Option<&PmtState> {
        self.program(program_id)?.pmt()
    }

    pub fn eit(&self, program_id: u16, slot: EitSlot) -> Option<&EitState> {
        self.program(program_id)?.eit(slot)
    }

    pub fn eit_present(&self, program_id: u16) -> Option<&EitState> {
        self.eit(program_id, EitSlot::Present)
    }

    pub fn eit_following(&self, program_id: u16) -> Option<&EitState> {
        self.eit(program_id, EitSlot::Following)
    }

    /// PAT, NIT, SDT and every PMT received (and a CAT with EMM entries when
    /// `require_cat` is set).
    pub fn is_complete(&self) -> bool {
        if !self.pat.is_received() || !self.pat.all_pmts_received() {
            return false;
        }
        if !self.nit.is_complete() || !self.sdt.is_complete() {
            return false;
        }
        !self.config.require_cat || !self.cat.emm().is_empty()
    }

    pub fn statistics(&self) -> &Statistics {
        &self.stats
    }

    /// Drop every table, buffer and counter; the configuration is kept.
    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }

    /// PIDs worth feeding: the fixed SI PIDs plus the PMT PIDs of the
    /// current PAT.
    pub fn wanted_pids(&self) -> Vec<u16> {
        let mut pids: Vec<u16> = TableKind::ALL.iter().filter_map(|k| k.pid()).collect();
        pids.extend(self.pat.programs().iter().map(|p| p.pmt_pid()));
        pids.sort_unstable();
        pids.dedup();
        pids
    }

    /// Get channel info for a specific service ID.
    pub fn channel_info(&self, service_id: u16) -> Option<ChannelInfo> {
        let program = self.pat().and_then(|pat| pat.program(service_id))?;
        let pmt = program.pmt();
        let sdt_service = self.sdt().and_then(|sdt| sdt.service(service_id));
        let nit_ts = self.nit().and_then(|nit| nit.transport_stream());

        Some(ChannelInfo {
            network_id: self.nit.network_id(),
            transport_stream_id: self.pat.transport_stream_id(),
            service_id,
            service_name: sdt_service.map(|s| s.name.to_string()),
            service_type: sdt_service.map(|s| s.service_type),
            remote_control_key_id: nit_ts.and_then(|ts| ts.remote_control_key_id()),
            partial_reception: nit_ts
                .and_then(|ts| ts.service(service_id))
                .map_or(false, |s| s.partial_reception),
            video_pid: pmt.and_then(|p| p.video_pids().first().copied()),
            audio_pids: pmt.map(|p| p.audio_pids()).unwrap_or_default(),
        })
    }

    /// Get all channel info, in PAT order.
    pub fn channels(&self) -> Vec<ChannelInfo> {
        self.programs()
            .iter()
            .filter_map(|p| self.channel_info(p.program_id()))
            .collect()
    }

    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot {
            complete: self.is_complete(),
            pat: self.pat(),
            cat: self.cat(),
            nit: self.nit(),
            sdt: self.sdt(),
            tot: self.tot(),
            statistics: &self.stats,
        }
    }
}

fn settle<T>(stats: &mut Statistics, kind: TableKind, result: Result<T, Reject>) -> Outcome {
    if let Err(reject) = &result {
        if reject.is_repeat() {
            trace!("{} section skipped: {}", kind, reject);
        } else {
            debug!("{} section dropped: {}", kind, reject);
        }
    }
    let outcome = Outcome::from(result);
    stats.record(kind, outcome);
    outcome
}
