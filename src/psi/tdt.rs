// psi/tdt.rs
//! TDT (0x70, UTC only) and TOT (0x73, UTC + local time offsets).

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::constants::{TID_TDT, TID_TOT};
use crate::psi::descriptor::{Descriptor, LocalTimeOffset, TextDecoder, read_descriptors};
use crate::psi::section::{Section, SectionHeader, length12};
use crate::psi::Table;
use crate::time;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeTable {
    pub header:             SectionHeader,
    /// Always true: the short section form carries no CRC for the TDT and
    /// the TOT CRC is not checked.
    pub crc_valid:          bool,
    pub utc_time:           Option<DateTime<Utc>>,
    pub local_time_offsets: Vec<LocalTimeOffset>,
    pub descriptors:        Vec<Descriptor>,
}

impl TimeTable {
    pub fn is_offset_table(&self) -> bool {
        self.header.table_id == TID_TOT
    }
}

impl Table for TimeTable {
    fn accepts(table_id: u8) -> bool {
        table_id == TID_TDT || table_id == TID_TOT
    }

    fn from_section(sec: &Section<'_>) -> Self {
        let b = sec.body;
        let utc_time = match b {
            [a, b2, c, d, e, ..] => time::decode_utc(&[*a, *b2, *c, *d, *e]),
            _ => None,
        };

        let mut descriptors = Vec::new();
        if sec.header.table_id == TID_TOT {
            if let Some(&[hi, lo]) = b.get(5..7) {
                let end = (7 + length12(hi, lo)).min(b.len());
                descriptors = read_descriptors(&b[7..end], &mut TextDecoder::default());
            }
        }
        let local_time_offsets = descriptors
            .iter()
            .filter_map(|d| match d {
                Descriptor::LocalTimeOffset(list) => Some(list.iter().cloned()),
                _ => None,
            })
            .flatten()
            .collect();

        TimeTable {
            header: sec.header.clone(),
            crc_valid: true,
            utc_time,
            local_time_offsets,
            descriptors,
        }
    }

    fn header(&self) -> &SectionHeader {
        &self.header
    }

    fn crc_valid(&self) -> bool {
        self.crc_valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::psi::descriptor::TAG_LOCAL_TIME_OFFSET;
    use crate::psi::test_support::descriptor;
    use chrono::TimeZone;
    use hex_literal::hex;

    #[test]
    fn test_tdt() {
        let tdt = TimeTable::parse(&hex!("70 70 05 EB 1E 18 31 29")).unwrap();
        assert!(!tdt.is_offset_table());
        assert!(tdt.crc_valid());
        assert_eq!(tdt.utc_time, Some(Utc.with_ymd_and_hms(2023, 9, 3, 18, 31, 29).unwrap()));
        assert!(tdt.descriptors.is_empty());
    }

    #[test]
    fn test_tot_with_offsets() {
        // CZE, region 0, +02:00, changes 2023-10-29 01:00:00 to +01:00
        let lto = descriptor(TAG_LOCAL_TIME_OFFSET, &hex!("43 5A 45 02 02 00 EB 56 01 00 00 01 00"));
        let mut s = vec![0x73, 0x70, 0x00];
        s.extend(hex!("EB 1E 18 31 29"));
        s.extend([0xF0, lto.len() as u8]);
        s.extend(&lto);
        s.extend([0xDE, 0xAD, 0xBE, 0xEF]);
        s[2] = (s.len() - 3) as u8;

        let tot = TimeTable::parse(&s).unwrap();
        assert!(tot.is_offset_table());
        assert_eq!(tot.utc_time, Some(Utc.with_ymd_and_hms(2023, 9, 3, 18, 31, 29).unwrap()));
        assert_eq!(tot.local_time_offsets.len(), 1);
        let o = &tot.local_time_offsets[0];
        assert_eq!(o.country_code, "CZE");
        assert_eq!(o.offset_minutes, 120);
        assert_eq!(o.next_offset_minutes, 60);
        assert_eq!(o.time_of_change, Some(Utc.with_ymd_and_hms(2023, 10, 29, 1, 0, 0).unwrap()));
    }

    #[test]
    fn test_undefined_time() {
        let tdt = TimeTable::parse(&hex!("70 70 05 FF FF FF FF FF")).unwrap();
        assert_eq!(tdt.utc_time, None);
    }
}
