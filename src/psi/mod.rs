//! PSI / SI table decoders.
//!
//! Every table shares [`section::Section`] for its header and implements
//! [`Table`]. Decoding a section never fails because of its CRC; the result
//! carries `crc_valid` instead. The packet-level helpers only hand out tables
//! whose CRC matched.

pub mod cat;
pub mod descriptor;
pub mod eit;
pub mod nit;
pub mod pat;
pub mod pmt;
pub mod sdt;
pub mod section;
pub mod tdt;

pub use cat::CatTable;
pub use descriptor::{CaMap, Descriptor, ServiceType};
pub use eit::{EitKind, EitTable, EventItem};
pub use nit::NitTable;
pub use pat::PatTable;
pub use pmt::{PmtTable, StreamKind};
pub use sdt::{SdtTable, ServiceDescriptor};
pub use section::{Section, SectionHeader};
pub use tdt::TimeTable;

use log::{debug, warn};
use serde::Serialize;

use crate::demux::{reassemble_sections, split_sections};
use crate::error::SectionError;
use crate::packet::TransportPacket;

/// running_status of SDT services and EIT events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunningStatus {
    Undefined,
    NotRunning,
    StartsSoon,
    Pausing,
    Running,
    OffAir,
    Reserved(u8),
}

impl From<u8> for RunningStatus {
    fn from(bits: u8) -> Self {
        match bits & 0x07 {
            0 => RunningStatus::Undefined,
            1 => RunningStatus::NotRunning,
            2 => RunningStatus::StartsSoon,
            3 => RunningStatus::Pausing,
            4 => RunningStatus::Running,
            5 => RunningStatus::OffAir,
            n => RunningStatus::Reserved(n),
        }
    }
}

/// A table decoded from one section.
pub trait Table: Sized {
    /// Whether sections with `table_id` decode into this table.
    fn accepts(table_id: u8) -> bool;

    /// Builds the table from a section already known to carry an accepted id.
    /// Bytes missing from a truncated capture leave fields empty.
    fn from_section(section: &Section<'_>) -> Self;

    fn header(&self) -> &SectionHeader;

    fn crc_valid(&self) -> bool;

    /// Decodes one reassembled section.
    fn parse(bytes: &[u8]) -> Result<Self, SectionError> {
        let section = Section::parse(bytes)?;
        if !Self::accepts(section.header.table_id) {
            return Err(SectionError::UnexpectedTableId(section.header.table_id));
        }
        Ok(Self::from_section(&section))
    }
}

/// Every CRC-valid table of type `T` carried on `pid`, in stream order.
pub fn tables_from_packets<T: Table>(packets: &[TransportPacket], pid: u16) -> Vec<T> {
    let mut tables = Vec::new();
    for run in reassemble_sections(packets, pid) {
        for bytes in split_sections(&run) {
            match T::parse(bytes) {
                Ok(table) if table.crc_valid() => tables.push(table),
                Ok(table) => {
                    warn!("pid {pid:#06x}: table 0x{:02X} failed CRC", table.header().table_id)
                }
                Err(e) => debug!("pid {pid:#06x}: {e}"),
            }
        }
    }
    tables
}

/// First CRC-valid table of type `T` carried on `pid`.
pub fn table_from_packets<T: Table>(packets: &[TransportPacket], pid: u16) -> Option<T> {
    tables_from_packets(packets, pid).into_iter().next()
}
