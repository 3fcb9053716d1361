use serde::Serialize;

use crate::constants::TID_PAT;
use crate::psi::section::{Section, SectionHeader, pid13};
use crate::psi::Table;

/// ─────────── PAT ───────────
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatTable {
    pub header:    SectionHeader,
    pub crc_valid: bool,
    /// Program 0 (network PID) is kept as an ordinary entry.
    pub programs:  Vec<PatEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PatEntry {
    pub program_number: u16,
    pub pmt_pid:        u16,
}

impl PatTable {
    pub fn transport_stream_id(&self) -> u16 {
        self.header.table_id_extension
    }

    /// PMT PID announced for `program_number`.
    pub fn pmt_pid(&self, program_number: u16) -> Option<u16> {
        self.programs
            .iter()
            .find(|p| p.program_number == program_number)
            .map(|p| p.pmt_pid)
    }

    /// NIT PID announced through program 0.
    pub fn network_pid(&self) -> Option<u16> {
        self.pmt_pid(0)
    }
}

impl Table for PatTable {
    fn accepts(table_id: u8) -> bool {
        table_id == TID_PAT
    }

    fn from_section(sec: &Section<'_>) -> Self {
        let programs = sec.body
            .chunks_exact(4)
            .map(|c| PatEntry {
                program_number: u16::from_be_bytes([c[0], c[1]]),
                pmt_pid:        pid13(c[2], c[3]),
            })
            .collect();
        PatTable { header: sec.header.clone(), crc_valid: sec.crc_valid, programs }
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
    use crate::constants::PID_PAT;
    use crate::demux::tests::packetize;
    use crate::psi::table_from_packets;
    use crate::psi::test_support::long_section;

    const PROGRAMS: &[(u16, u16)] = &[
        (0, 16), (268, 2100), (269, 2200), (270, 2300), (271, 2400),
        (272, 2500), (273, 2600), (274, 2700), (275, 2800), (276, 2900),
        (277, 3000), (278, 3100), (279, 3200), (280, 3300), (281, 3400),
        (282, 3500), (283, 3600), (284, 3700), (16650, 7000), (16651, 7010),
    ];

    fn pat_section() -> Vec<u8> {
        let mut body = Vec::new();
        for &(program, pid) in PROGRAMS {
            body.extend(program.to_be_bytes());
            body.extend((0xE000 | pid).to_be_bytes());
        }
        long_section(0x00, 0x0321, 5, &body)
    }

    #[test]
    fn test_pat() {
        let pat = PatTable::parse(&pat_section()).unwrap();
        assert!(pat.crc_valid());
        assert_eq!(pat.header.version, 5);
        assert_eq!(pat.transport_stream_id(), 0x0321);
        assert_eq!(pat.programs.len(), 20);
        assert_eq!(pat.network_pid(), Some(16));
        assert_eq!(pat.pmt_pid(268), Some(2100));
        assert_eq!(pat.pmt_pid(16651), Some(7010));
        assert_eq!(pat.pmt_pid(1), None);
        for (entry, &(program, pid)) in pat.programs.iter().zip(PROGRAMS) {
            assert_eq!((entry.program_number, entry.pmt_pid), (program, pid));
        }
    }

    #[test]
    fn test_flipped_byte_fails_crc() {
        let good = pat_section();
        for i in 0..good.len() - 4 {
            for mask in [0x01u8, 0x10, 0x80] {
                let mut s = good.clone();
                s[i] ^= mask;
                let crc_ok = PatTable::parse(&s).map(|p| p.crc_valid()).unwrap_or(false);
                assert!(!crc_ok, "byte {i} mask {mask:#04x}");
            }
        }
    }

    #[test]
    fn test_cleared_syntax_bit_is_not_accepted() {
        let mut s = pat_section();
        s[1] ^= 0x80;
        assert!(!PatTable::parse(&s).unwrap().crc_valid());
        assert!(table_from_packets::<PatTable>(&packetize(PID_PAT, &[s]), PID_PAT).is_none());

        let good = packetize(PID_PAT, &[pat_section()]);
        assert!(table_from_packets::<PatTable>(&good, PID_PAT).is_some());
    }

    #[test]
    fn test_truncated_pat_is_partial() {
        let s = pat_section();
        let pat = PatTable::parse(&s[..8 + 4 * 3 + 2]).unwrap();
        assert!(!pat.crc_valid());
        assert_eq!(pat.programs.len(), 3);
    }
}
