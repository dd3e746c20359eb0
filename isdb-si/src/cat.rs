//! CAT (Conditional Access Table) decoding.

use log::{debug, trace, warn};
use serde::Serialize;

use crate::bounded::BoundedVec;
use crate::config::SiConfig;
use crate::descriptors::{CaDescriptor, DescriptorLoop, DescriptorTag};
use crate::error::Reject;
use crate::section::{require_single_section, Section};
use crate::table_id;

/// Reassembly buffer size for the CAT.
pub const CAT_BUFFER_SIZE: usize = 1024;

/// Maximum EMM descriptors kept.
pub const MAX_CAS: usize = 8;

/// CAT state: the EMM PIDs of each CA system.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CatState {
    version: Option<u8>,
    emm: BoundedVec<CaDescriptor, MAX_CAS>,
}

impl CatState {
    pub fn version(&self) -> Option<u8> {
        self.version
    }

    pub fn is_received(&self) -> bool {
        self.version.is_some()
    }

    /// EMM descriptors in CAT order.
    pub fn emm(&self) -> &[CaDescriptor] {
        &self.emm
    }

    /// Apply a CAT section.
    pub fn decode(&mut self, section: &Section<'_>, config: &SiConfig) -> Result<(), Reject> {
        let header = section.validate(table_id::CAT, config)?;
        require_single_section(&header)?;

        let version = header.version_number;
        if self.version == Some(version) {
            trace!("same CAT version {}", version);
            return Err(Reject::SameVersion(version));
        }

        let mut emm = BoundedVec::new();
        for descriptor in DescriptorLoop::new(section.body()) {
            if descriptor.tag != DescriptorTag::ConditionalAccess {
                trace!("CAT: skipping descriptor {:?}", descriptor.tag);
                continue;
            }
            let ca = match CaDescriptor::parse(descriptor.data) {
                Ok(ca) => ca,
                Err(e) => {
                    debug!("CAT: {}", e);
                    continue;
                }
            };
            if !config.cas_filter.accepts(ca.cas_id) {
                continue;
            }
            if let Err(overflow) = emm.try_push(ca) {
                warn!(
                    "CAT EMM list full, dropping cas:0x{:04x}",
                    overflow.into_inner().cas_id
                );
            }
        }

        debug!("new CAT version {} with {} EMM entries", version, emm.len());
        self.version = Some(version);
        self.emm = emm;
        Ok(())
    }
}
