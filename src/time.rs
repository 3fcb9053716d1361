//! DVB date/time fields: 16-bit MJD followed by BCD hh:mm:ss, and BCD durations.

use chrono::{DateTime, Days, NaiveDate, TimeDelta, Utc};

fn bcd(byte: u8) -> Option<u32> {
    let (hi, lo) = (byte >> 4, byte & 0x0F);
    (hi <= 9 && lo <= 9).then(|| (hi * 10 + lo) as u32)
}

fn bcd_hms(h: u8, m: u8, s: u8) -> Option<(u32, u32, u32)> {
    let (h, m, s) = (bcd(h)?, bcd(m)?, bcd(s)?);
    (m < 60 && s < 60).then_some((h, m, s))
}

/// Decodes a 40-bit UTC time. Returns `None` for the "undefined" pattern
/// (all ones) and for digits that are not BCD.
pub fn decode_utc(bytes: &[u8; 5]) -> Option<DateTime<Utc>> {
    if bytes.iter().all(|b| *b == 0xFF) {
        return None;
    }
    let mjd = u16::from_be_bytes([bytes[0], bytes[1]]);
    let (h, m, s) = bcd_hms(bytes[2], bytes[3], bytes[4])?;
    if h > 23 {
        return None;
    }
    let date = NaiveDate::from_ymd_opt(1858, 11, 17)?.checked_add_days(Days::new(mjd as u64))?;
    Some(date.and_hms_opt(h, m, s)?.and_utc())
}

/// Decodes a 24-bit BCD duration (hh:mm:ss). Hours may exceed 23.
pub fn decode_duration(bytes: &[u8; 3]) -> Option<TimeDelta> {
    if bytes.iter().all(|b| *b == 0xFF) {
        return None;
    }
    let (h, m, s) = bcd_hms(bytes[0], bytes[1], bytes[2])?;
    Some(TimeDelta::seconds((h * 3600 + m * 60 + s) as i64))
}

/// Decodes a 16-bit BCD hh:mm offset.
pub fn decode_offset(bytes: &[u8; 2]) -> Option<TimeDelta> {
    let (h, m) = (bcd(bytes[0])?, bcd(bytes[1])?);
    (m < 60).then(|| TimeDelta::minutes((h * 60 + m) as i64))
}
