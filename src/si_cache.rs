//! SI gathered from one capture, and the SDT/PAT service correlation.

use std::collections::BTreeMap;

use log::debug;
use serde::Serialize;

use crate::constants::{PID_CAT, PID_NIT, PID_PAT, PID_SDT, PID_TDT, TID_SDT_ACTUAL};
use crate::packet::TransportPacket;
use crate::psi::{
    CatTable, NitTable, PatTable, PmtTable, SdtTable, ServiceDescriptor, TimeTable,
    table_from_packets, tables_from_packets,
};

/// Pairs every SDT service with the PMT PID of the PAT program carrying the
/// same number. Services missing from the PAT are left out.
pub fn service_map_pids(sdt: &SdtTable, pat: &PatTable) -> Vec<(ServiceDescriptor, u16)> {
    sdt.services
        .iter()
        .filter_map(|svc| pat.pmt_pid(svc.program_number).map(|pid| (svc.clone(), pid)))
        .collect()
}

/// One row of the correlated catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceEntry {
    pub service: ServiceDescriptor,
    pub pmt_pid: u16,
    pub pmt:     Option<PmtTable>,
}

#[derive(Debug, Default, Serialize)]
pub struct SiCache {
    pub pat:  Option<PatTable>,
    pub cat:  Option<CatTable>,
    pub nit:  Option<NitTable>,
    pub sdt:  Option<SdtTable>,
    pub time: Option<TimeTable>,
    /// program_number -> PMT
    pub pmts: BTreeMap<u16, PmtTable>,
}

impl SiCache {
    /// Decodes the well-known tables of a capture, then every PMT named by the PAT.
    pub fn from_packets(packets: &[TransportPacket]) -> Self {
        let mut cache = SiCache {
            pat:  table_from_packets(packets, PID_PAT),
            cat:  table_from_packets(packets, PID_CAT),
            nit:  table_from_packets(packets, PID_NIT),
            sdt:  tables_from_packets::<SdtTable>(packets, PID_SDT)
                .into_iter()
                .find(|t| t.header.table_id == TID_SDT_ACTUAL),
            time: table_from_packets(packets, PID_TDT),
            pmts: BTreeMap::new(),
        };

        if let Some(pat) = &cache.pat {
            for entry in pat.programs.iter().filter(|p| p.program_number != 0) {
                let pmt = tables_from_packets::<PmtTable>(packets, entry.pmt_pid)
                    .into_iter()
                    .find(|t| t.program_number() == entry.program_number);
                match pmt {
                    Some(pmt) => {
                        cache.pmts.insert(entry.program_number, pmt);
                    }
                    None => debug!("program {}: no PMT on pid {:#06x}", entry.program_number, entry.pmt_pid),
                }
            }
        }
        cache
    }

    /// Services present in both SDT and PAT, with their PMT when one was seen.
    pub fn services(&self) -> Vec<ServiceEntry> {
        let (Some(sdt), Some(pat)) = (&self.sdt, &self.pat) else {
            return Vec::new();
        };
        service_map_pids(sdt, pat)
            .into_iter()
            .map(|(service, pmt_pid)| {
                let pmt = self.pmts.get(&service.program_number).cloned();
                ServiceEntry { service, pmt_pid, pmt }
            })
            .collect()
    }

    /// PAT programs (other than the network entry) the SDT does not describe.
    pub fn unmatched_programs(&self) -> Vec<u16> {
        let (Some(sdt), Some(pat)) = (&self.sdt, &self.pat) else {
            return Vec::new();
        };
        pat.programs
            .iter()
            .map(|p| p.program_number)
            .filter(|&n| n != 0 && sdt.service(n).is_none())
            .collect()
    }

    /// Whether the PAT announces a program the SDT is silent about.
    pub fn check_service_id_mismatch(&self) -> bool {
        !self.unmatched_programs().is_empty()
    }
}
