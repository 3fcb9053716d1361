// psi/section.rs
//! Generic PSI / SI section header with CRC-32 (MPEG-2) validation.

use bitstream_io::{BigEndian, BitRead, BitReader};
use serde::Serialize;

use crate::constants::{TID_TDT, TID_TOT};
use crate::crc32;
use crate::error::SectionError;

const SHORT_HEADER: usize = 3;
const LONG_HEADER:  usize = 8;
const CRC_SIZE:     usize = 4;

/// Common section header. The long-form fields are zero for sections whose
/// syntax indicator is clear.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SectionHeader {
    pub table_id:                 u8,
    pub section_syntax_indicator: bool,
    pub private_indicator:        bool,
    pub reserved:                 u8,
    pub section_length:           u16,
    pub table_id_extension:       u16,
    pub version:                  u8,
    pub current_next:             bool,
    pub section_number:           u8,
    pub last_section_number:      u8,
}

/// One section, borrowed from reassembled bytes.
#[derive(Debug)]
pub struct Section<'a> {
    pub header:    SectionHeader,
    /// Bytes between the header and the CRC, clamped to what was captured.
    pub body:      &'a [u8],
    pub crc_valid: bool,
}

impl<'a> Section<'a> {
    /// Reads the header and locates the body. Fails only when fewer than
    /// 5 bytes are available; a declared length beyond the data is clamped
    /// and leaves `crc_valid` false.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, SectionError> {
        if bytes.len() < 5 {
            return Err(SectionError::TooShort(bytes.len()));
        }

        // Missing long-header bytes read as zero.
        let mut head = [0u8; LONG_HEADER];
        let n = bytes.len().min(LONG_HEADER);
        head[..n].copy_from_slice(&bytes[..n]);
        let mut header = read_header(&head).map_err(|_| SectionError::TooShort(bytes.len()))?;

        let end = SHORT_HEADER + header.section_length as usize;
        let (body, crc_valid) = if header.section_syntax_indicator {
            let start = LONG_HEADER.min(bytes.len());
            let stop  = end.saturating_sub(CRC_SIZE).clamp(start, bytes.len());
            let crc_valid = end <= bytes.len() && crc32::is_valid(&bytes[..end]);
            (&bytes[start..stop], crc_valid)
        } else {
            // Short form. Only TDT/TOT are exempt from the CRC; any other
            // table arriving here still has to match its trailer.
            header.table_id_extension = 0;
            header.version = 0;
            header.current_next = false;
            header.section_number = 0;
            header.last_section_number = 0;
            let crc_valid = match header.table_id {
                TID_TDT | TID_TOT => true,
                _ => end <= bytes.len() && crc32::is_valid(&bytes[..end]),
            };
            (&bytes[SHORT_HEADER..end.clamp(SHORT_HEADER, bytes.len())], crc_valid)
        };

        Ok(Section { header, body, crc_valid })
    }
}

fn read_header(head: &[u8; LONG_HEADER]) -> std::io::Result<SectionHeader> {
    let mut br = BitReader::endian(&head[..], BigEndian);
    let table_id                 = br.read::<8, u8>()?;
    let section_syntax_indicator = br.read_bit()?;
    let private_indicator        = br.read_bit()?;
    let reserved                 = br.read::<2, u8>()?;
    let section_length           = br.read::<12, u16>()?;
    let table_id_extension       = br.read::<16, u16>()?;
    br.skip(2)?;
    let version                  = br.read::<5, u8>()?;
    let current_next             = br.read_bit()?;
    let section_number           = br.read::<8, u8>()?;
    let last_section_number      = br.read::<8, u8>()?;

    Ok(SectionHeader {
        table_id,
        section_syntax_indicator,
        private_indicator,
        reserved,
        section_length,
        table_id_extension,
        version,
        current_next,
        section_number,
        last_section_number,
    })
}

/// 12-bit length field stored in the low bits of two bytes.
pub(crate) fn length12(hi: u8, lo: u8) -> usize {
    (((hi & 0x0F) as usize) << 8) | lo as usize
}

/// 13-bit PID stored in the low bits of two bytes.
pub(crate) fn pid13(hi: u8, lo: u8) -> u16 {
    (((hi & 0x1F) as u16) << 8) | lo as u16
}
