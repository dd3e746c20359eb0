//! PAT (Program Association Table) decoding.
//!
//! The PAT lists the programs of the transport stream and owns everything
//! hanging off each program: its PMT (with its own reassembly buffer) and its
//! present/following events. A new PAT replaces the whole program list.

use log::{debug, trace, warn};
use serde::Serialize;

use crate::bounded::BoundedVec;
use crate::config::SiConfig;
use crate::eit::{EitSlot, EitState};
use crate::error::Reject;
use crate::pmt::{PmtState, PMT_BUFFER_SIZE};
use crate::section::{require_single_section, Section, SectionBuffer};
use crate::table_id;

/// Reassembly buffer size for the PAT.
pub const PAT_BUFFER_SIZE: usize = 376;

/// Maximum programs kept from one PAT.
pub const MAX_PROGRAMS: usize = 8;

/// A program listed in the PAT.
#[derive(Debug, Clone, Serialize)]
pub struct ProgramEntry {
    program_id: u16,
    pmt_pid: u16,
    pmt: PmtState,
    #[serde(skip)]
    pmt_buffer: SectionBuffer,
    eit_present: Option<EitState>,
    eit_following: Option<EitState>,
}

impl ProgramEntry {
    fn new(program_id: u16, pmt_pid: u16) -> Self {
        Self {
            program_id,
            pmt_pid,
            pmt: PmtState::default(),
            pmt_buffer: SectionBuffer::new(PMT_BUFFER_SIZE),
            eit_present: None,
            eit_following: None,
        }
    }

    /// Program number (service ID).
    pub fn program_id(&self) -> u16 {
        self.program_id
    }

    /// PID carrying this program's PMT.
    pub fn pmt_pid(&self) -> u16 {
        self.pmt_pid
    }

    /// PMT state; check [`PmtState::is_received`].
    pub fn pmt_state(&self) -> &PmtState {
        &self.pmt
    }

    /// PMT, once received.
    pub fn pmt(&self) -> Option<&PmtState> {
        Some(&self.pmt).filter(|pmt| pmt.is_received())
    }

    /// Event in the given slot, once an EIT section touched it.
    pub fn eit(&self, slot: EitSlot) -> Option<&EitState> {
        match slot {
            EitSlot::Present => self.eit_present.as_ref(),
            EitSlot::Following => self.eit_following.as_ref(),
        }
    }

    pub(crate) fn eit_slot_mut(&mut self, slot: EitSlot) -> &mut Option<EitState> {
        match slot {
            EitSlot::Present => &mut self.eit_present,
            EitSlot::Following => &mut self.eit_following,
        }
    }

    /// PMT decoder and the buffer feeding it, borrowed together.
    pub(crate) fn pmt_parts(&mut self) -> (u16, &mut PmtState, &mut SectionBuffer) {
        (self.program_id, &mut self.pmt, &mut self.pmt_buffer)
    }
}

/// PAT state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PatState {
    version: Option<u8>,
    transport_stream_id: Option<u16>,
    network_pid: Option<u16>,
    programs: BoundedVec<ProgramEntry, MAX_PROGRAMS>,
}

impl PatState {
    /// Version, `None` until the first PAT arrives.
    pub fn version(&self) -> Option<u8> {
        self.version
    }

    /// Whether a PAT has been applied.
    pub fn is_received(&self) -> bool {
        self.version.is_some()
    }

    /// Transport stream ID.
    pub fn transport_stream_id(&self) -> Option<u16> {
        self.transport_stream_id
    }

    /// NIT PID announced by program number 0.
    pub fn network_pid(&self) -> Option<u16> {
        self.network_pid
    }

    /// Programs in PAT order.
    pub fn programs(&self) -> &[ProgramEntry] {
        &self.programs
    }

    /// Program with the given program number.
    pub fn program(&self, program_id: u16) -> Option<&ProgramEntry> {
        self.programs.iter().find(|p| p.program_id == program_id)
    }

    pub(crate) fn program_mut(&mut self, program_id: u16) -> Option<&mut ProgramEntry> {
        self.programs.iter_mut().find(|p| p.program_id == program_id)
    }

    pub(crate) fn program_by_pmt_pid_mut(&mut self, pid: u16) -> Option<&mut ProgramEntry> {
        self.programs.iter_mut().find(|p| p.pmt_pid == pid)
    }

    /// Every program has its PMT.
    pub fn all_pmts_received(&self) -> bool {
        self.programs.iter().all(|p| p.pmt.is_received())
    }

    /// Apply a PAT section.
    pub fn decode(&mut self, section: &Section<'_>, config: &SiConfig) -> Result<(), Reject> {
        let header = section.validate(table_id::PAT, config)?;
        require_single_section(&header)?;

        let ts_id = header.table_id_extension;
        let version = header.version_number;
        if self.transport_stream_id == Some(ts_id) && self.version == Some(version) {
            trace!("same PAT tsid:0x{:04x} version {}", ts_id, version);
            return Err(Reject::SameVersion(version));
        }

        let entries = section.body().chunks_exact(4);
        debug!(
            "new PAT for ts:0x{:04x} version {} entries:{}",
            ts_id,
            version,
            entries.len()
        );

        let mut programs = BoundedVec::new();
        let mut network_pid = None;
        for entry in entries {
            let program_id = u16::from_be_bytes([entry[0], entry[1]]);
            let pid = u16::from_be_bytes([entry[2], entry[3]]) & 0x1FFF;
            if program_id == 0 {
                network_pid = Some(pid);
                continue;
            }
            trace!("  prog:0x{:04x} pmt_pid:0x{:04x}", program_id, pid);
            if let Err(overflow) = programs.try_push(ProgramEntry::new(program_id, pid)) {
                warn!(
                    "PAT program list full, dropping prog:0x{:04x}",
                    overflow.into_inner().program_id
                );
            }
        }

        self.version = Some(version);
        self.transport_stream_id = Some(ts_id);
        self.network_pid = network_pid;
        self.programs = programs;
        Ok(())
    }
}
