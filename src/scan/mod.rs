//! EIT aggregation over a captured packet set.
//!
//! Present/following sections (0x4E) give each service its current event;
//! schedule sections (0x50..=0x5F) build a per-service programme list. Both
//! maps are keyed by the PMT PID the PAT assigns to the service.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::Serialize;

use crate::constants::{PID_EIT, PID_PAT, TID_EIT_PF_ACTUAL, TID_EIT_SCHEDULE_ACTUAL};
use crate::packet::TransportPacket;
use crate::psi::{EitTable, EventItem, PatTable, table_from_packets, tables_from_packets};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanOptions {
    /// Take the first present/following event even when it is not on air.
    pub include_outdated: bool,
    /// Reference instant; `None` reads the wall clock when the scan starts.
    pub now: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScanStatus {
    Ok,
    MissingPat,
    /// At least one section selected a text encoding that cannot be decoded.
    /// Its events are still aggregated with the affected fields empty.
    UnsupportedEncoding,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EitScanResult {
    pub status:           ScanStatus,
    /// PMT PID -> event on air
    pub current_events:   BTreeMap<u16, EventItem>,
    /// PMT PID -> events sorted by start time
    pub scheduled_events: BTreeMap<u16, Vec<EventItem>>,
}

impl EitScanResult {
    fn empty(status: ScanStatus) -> Self {
        EitScanResult { status, current_events: BTreeMap::new(), scheduled_events: BTreeMap::new() }
    }

    pub fn ok(&self) -> bool {
        self.status == ScanStatus::Ok
    }
}

pub struct EitScanner {
    opts: ScanOptions,
}

impl EitScanner {
    pub fn new(opts: ScanOptions) -> Self {
        Self { opts }
    }

    pub fn scan(&self, packets: &[TransportPacket]) -> EitScanResult {
        let Some(pat) = table_from_packets::<PatTable>(packets, PID_PAT) else {
            debug!("EIT scan: no PAT found");
            return EitScanResult::empty(ScanStatus::MissingPat);
        };
        let now = self.opts.now.unwrap_or_else(Utc::now);
        let mut res = EitScanResult::empty(ScanStatus::Ok);

        for eit in tables_from_packets::<EitTable>(packets, PID_EIT) {
            if let Some(err) = &eit.text_error {
                warn!("EIT service {}: {err}, field left empty", eit.service_id());
                res.status = ScanStatus::UnsupportedEncoding;
            }

            let table_id = eit.header.table_id;
            let is_pf = table_id == TID_EIT_PF_ACTUAL;
            if !is_pf && !TID_EIT_SCHEDULE_ACTUAL.contains(&table_id) {
                continue;
            }
            let Some(pmt_pid) = pat.pmt_pid(eit.service_id()) else {
                debug!("EIT service {} is not in the PAT", eit.service_id());
                continue;
            };

            if is_pf {
                if res.current_events.contains_key(&pmt_pid) {
                    continue;
                }
                let current = eit
                    .events
                    .into_iter()
                    .find(|e| self.opts.include_outdated || e.is_current(now));
                if let Some(event) = current {
                    res.current_events.insert(pmt_pid, event);
                }
            } else {
                let list = res.scheduled_events.entry(pmt_pid).or_default();
                for event in eit.events {
                    if list.iter().all(|e| e.event_id != event.event_id) {
                        list.push(event);
                    }
                }
            }
        }

        for list in res.scheduled_events.values_mut() {
            list.sort_by_key(|e| e.start);
        }
        debug!(
            "EIT scan: {} current, {} scheduled events",
            res.current_events.len(),
            res.scheduled_events.values().map(Vec::len).sum::<usize>()
        );
        res
    }
}

/// Scans with the wall clock as reference.
pub fn scan_eit(packets: &[TransportPacket], include_outdated: bool) -> EitScanResult {
    EitScanner::new(ScanOptions { include_outdated, now: None }).scan(packets)
}
