// src/lib.rs
//! MPEG-TS demultiplexing and DVB SI table decoding.

pub mod constants;
pub mod crc32;
pub mod demux;
pub mod error;
pub mod packet;
pub mod psi;
pub mod report;
pub mod scan;
pub mod si_cache;
pub mod text;
pub mod time;

pub use demux::{find_sync_position, group_by_pid, parse_packets, reassemble_sections};
pub use error::{PacketError, SectionError, TextError};
pub use packet::TransportPacket;
pub use psi::{Table, table_from_packets, tables_from_packets};
pub use scan::{EitScanResult, EitScanner, ScanOptions, ScanStatus, scan_eit};
pub use si_cache::{SiCache, service_map_pids};
