//! CRC-32/MPEG-2 section check.

use crc::{CRC_32_MPEG_2, Crc};

const CRC_MPEG: Crc<u32> = Crc::<u32>::new(&CRC_32_MPEG_2);

/// CRC-32/MPEG-2 of `bytes`.
pub fn checksum(bytes: &[u8]) -> u32 {
    CRC_MPEG.checksum(bytes)
}

/// True when the last 4 bytes (big-endian) equal the CRC of everything before them.
pub fn is_valid(section: &[u8]) -> bool {
    let Some(split) = section.len().checked_sub(4) else { return false };
    let (body, trailer) = section.split_at(split);
    let expected = u32::from_be_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    checksum(body) == expected
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    // PAT with a single program 1 -> PMT PID 0x1000.
    const PAT: [u8; 16] = hex!("00 B0 0D 00 01 C1 00 00 00 01 F0 00 2A B1 04 B2");

    #[test]
    fn test_valid_section() {
        assert!(is_valid(&PAT));
        assert_eq!(checksum(&PAT), 0);
    }

    #[test]
    fn test_any_flipped_body_byte_invalidates() {
        for i in 0..PAT.len() - 4 {
            let mut s = PAT;
            s[i] ^= 0x01;
            assert!(!is_valid(&s), "byte {i}");
        }
    }

    #[test]
    fn test_short_input() {
        assert!(!is_valid(&[]));
        assert!(!is_valid(&hex!("00 01 02")));
    }
}
