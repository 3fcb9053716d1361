// psi/sdt.rs
use serde::Serialize;

use crate::constants::{TID_SDT_ACTUAL, TID_SDT_OTHER};
use crate::error::TextError;
use crate::psi::descriptor::{Descriptor, ServiceType, TextDecoder, read_descriptors};
use crate::psi::section::{Section, SectionHeader, length12};
use crate::psi::{RunningStatus, Table};

/// SDT (table_id 0x42 actual / 0x46 other-TS).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SdtTable {
    pub header:              SectionHeader,
    pub crc_valid:           bool,
    pub original_network_id: u16,
    pub services:            Vec<ServiceDescriptor>,
    #[serde(skip)]
    pub text_error:          Option<TextError>,
}

/// One service of the SDT loop, with its service descriptor folded in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceDescriptor {
    /// service_id, equal to the PAT program number.
    pub program_number:        u16,
    pub provider:              String,
    pub name:                  String,
    /// `Other(0)` when the service carries no service descriptor.
    pub service_type:          ServiceType,
    /// Inverse of free_CA_mode.
    pub free:                  bool,
    pub eit_schedule:          bool,
    pub eit_present_following: bool,
    pub running_status:        RunningStatus,
    pub descriptors:           Vec<Descriptor>,
}

impl SdtTable {
    pub fn transport_stream_id(&self) -> u16 {
        self.header.table_id_extension
    }

    pub fn is_actual(&self) -> bool {
        self.header.table_id == TID_SDT_ACTUAL
    }

    pub fn service(&self, program_number: u16) -> Option<&ServiceDescriptor> {
        self.services.iter().find(|s| s.program_number == program_number)
    }
}

impl Table for SdtTable {
    fn accepts(table_id: u8) -> bool {
        table_id == TID_SDT_ACTUAL || table_id == TID_SDT_OTHER
    }

    fn from_section(sec: &Section<'_>) -> Self {
        let b = sec.body;
        let mut text = TextDecoder::default();
        let mut services = Vec::new();
        let original_network_id = match b {
            [hi, lo, ..] => u16::from_be_bytes([*hi, *lo]),
            _ => 0,
        };

        let mut idx = 3;                              // start of service loop
        while idx + 5 <= b.len() {
            let program_number = u16::from_be_bytes([b[idx], b[idx + 1]]);
            let flags          = b[idx + 2];
            let status         = b[idx + 3];
            let desc_len       = length12(b[idx + 3], b[idx + 4]);
            let start          = idx + 5;
            let end            = (start + desc_len).min(b.len());   // graceful exit on malformed len
            let descriptors    = read_descriptors(&b[start..end], &mut text);

            let mut svc = ServiceDescriptor {
                program_number,
                provider:              String::new(),
                name:                  String::new(),
                service_type:          ServiceType::Other(0),
                free:                  status & 0x10 == 0,
                eit_schedule:          flags & 0x02 != 0,
                eit_present_following: flags & 0x01 != 0,
                running_status:        RunningStatus::from(status >> 5),
                descriptors:           Vec::new(),
            };
            if let Some(Descriptor::Service(info)) =
                descriptors.iter().find(|d| matches!(d, Descriptor::Service(_)))
            {
                svc.provider = info.provider.clone();
                svc.name = info.name.clone();
                svc.service_type = info.service_type;
            }
            svc.descriptors = descriptors;
            services.push(svc);
            idx = end;
        }

        SdtTable {
            header: sec.header.clone(),
            crc_valid: sec.crc_valid,
            original_network_id,
            services,
            text_error: text.error,
        }
    }

    fn header(&self) -> &SectionHeader {
        &self.header
    }

    fn crc_valid(&self) -> bool {
        self.crc_valid
    }
}
