// psi/nit.rs
//! Network Information Table (actual network 0x40, other network 0x41)
use serde::Serialize;

use crate::constants::{TID_NIT_ACTUAL, TID_NIT_OTHER};
use crate::error::TextError;
use crate::psi::descriptor::{Descriptor, ServiceListEntry, TextDecoder, read_descriptors};
use crate::psi::section::{Section, SectionHeader, length12};
use crate::psi::Table;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NitTable {
    pub header:              SectionHeader,
    pub crc_valid:           bool,
    pub network_name:        String,
    pub network_descriptors: Vec<Descriptor>,
    pub transports:          Vec<TransportStream>,
    #[serde(skip)]
    pub text_error:          Option<TextError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransportStream {
    pub ts_id:       u16,
    pub orig_net_id: u16,
    pub services:    Vec<ServiceListEntry>,
    pub descriptors: Vec<Descriptor>,
}

impl NitTable {
    pub fn network_id(&self) -> u16 {
        self.header.table_id_extension
    }

    /// Service lists of every transport stream, in loop order.
    pub fn services(&self) -> impl Iterator<Item = &ServiceListEntry> {
        self.transports.iter().flat_map(|t| t.services.iter())
    }
}

impl Table for NitTable {
    fn accepts(table_id: u8) -> bool {
        table_id == TID_NIT_ACTUAL || table_id == TID_NIT_OTHER
    }

    fn from_section(sec: &Section<'_>) -> Self {
        let b = sec.body;                 // shorthand, already stripped of CRC
        let mut text = TextDecoder::default();
        let mut nit = NitTable {
            header:              sec.header.clone(),
            crc_valid:           sec.crc_valid,
            network_name:        String::new(),
            network_descriptors: Vec::new(),
            transports:          Vec::new(),
            text_error:          None,
        };
        if b.len() < 2 {
            return nit;
        }

        let net_desc_len = length12(b[0], b[1]);
        let mut idx = (2 + net_desc_len).min(b.len());
        nit.network_descriptors = read_descriptors(&b[2..idx], &mut text);
        if let Some(name) = nit.network_descriptors.iter().find_map(|d| match d {
            Descriptor::NetworkName(n) => Some(n.clone()),
            _ => None,
        }) {
            nit.network_name = name;
        }

        // transport_stream_loop_length only bounds the loop; the body end wins.
        let loop_end = match b.get(idx..idx + 2) {
            Some(&[hi, lo]) => (idx + 2 + length12(hi, lo)).min(b.len()),
            _ => b.len(),
        };
        idx += 2;

        while idx + 6 <= loop_end {
            let ts_id       = u16::from_be_bytes([b[idx], b[idx + 1]]);
            let orig_net_id = u16::from_be_bytes([b[idx + 2], b[idx + 3]]);
            let desc_len    = length12(b[idx + 4], b[idx + 5]);
            let start       = idx + 6;
            let end         = (start + desc_len).min(loop_end);
            let descriptors = read_descriptors(&b[start..end], &mut text);
            let services = descriptors
                .iter()
                .filter_map(|d| match d {
                    Descriptor::ServiceList(list) => Some(list.iter().cloned()),
                    _ => None,
                })
                .flatten()
                .collect();
            nit.transports.push(TransportStream { ts_id, orig_net_id, services, descriptors });
            idx = end;
        }

        nit.text_error = text.error;
        nit
    }

    fn header(&self) -> &SectionHeader {
        &self.header
    }

    fn crc_valid(&self) -> bool {
        self.crc_valid
    }
}
