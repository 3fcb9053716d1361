use serde::Serialize;

use crate::constants::TID_CAT;
use crate::psi::descriptor::{CaDescriptor, CaMap, Descriptor, TextDecoder, read_descriptors};
use crate::psi::section::{Section, SectionHeader};
use crate::psi::Table;

/// CAT (table_id 0x01): CA system id -> EMM PID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatTable {
    pub header:         SectionHeader,
    pub crc_valid:      bool,
    pub emm:            CaMap,
    pub ca_descriptors: Vec<CaDescriptor>,
}

impl Table for CatTable {
    fn accepts(table_id: u8) -> bool {
        table_id == TID_CAT
    }

    fn from_section(sec: &Section<'_>) -> Self {
        let descriptors = read_descriptors(sec.body, &mut TextDecoder::default());
        let mut emm = CaMap::default();
        emm.extend_from(&descriptors);
        let ca_descriptors = descriptors
            .into_iter()
            .filter_map(|d| match d {
                Descriptor::ConditionalAccess(ca) => Some(ca),
                _ => None,
            })
            .collect();
        CatTable { header: sec.header.clone(), crc_valid: sec.crc_valid, emm, ca_descriptors }
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
    use crate::psi::descriptor::TAG_CA;
    use crate::psi::test_support::{descriptor, long_section};
    use hex_literal::hex;

    fn cat_section() -> Vec<u8> {
        let mut body = descriptor(TAG_CA, &hex!("0B 00 E0 C8 AA"));
        body.extend(descriptor(0x05, &hex!("01 02")));
        body.extend(descriptor(TAG_CA, &hex!("0D 00 FF FF")));
        body.extend(descriptor(TAG_CA, &hex!("0B 00 E0 C9")));
        long_section(0x01, 0xFFFF, 4, &body)
    }

    #[test]
    fn test_cat() {
        let cat = CatTable::parse(&cat_section()).unwrap();

        assert!(cat.crc_valid());
        assert_eq!(cat.header.version, 4);
        assert_eq!(cat.ca_descriptors.len(), 3);
        assert_eq!(cat.ca_descriptors[0].private_data, vec![0xAA]);
        assert_eq!(cat.emm.iter().collect::<Vec<_>>(), vec![(0x0B00, 200)]);
    }

    #[test]
    fn test_truncated_cat_is_partial() {
        // header 8, descriptors of 7 and 4 bytes, then 3 bytes of the third
        let s = cat_section();
        let cat = CatTable::parse(&s[..8 + 7 + 4 + 3]).unwrap();
        assert!(!cat.crc_valid());
        assert_eq!(cat.ca_descriptors.len(), 1);
        assert_eq!(cat.ca_descriptors[0].system_id, 0x0B00);
        assert_eq!(cat.emm.iter().collect::<Vec<_>>(), vec![(0x0B00, 200)]);
    }
}
