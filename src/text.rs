//! DVB SI text decoding (EN 300 468 annex A).
//!
//! A text field optionally starts with a character table selector in
//! 0x01..=0x1F. Without one the default table applies: printable ASCII plus
//! non-spacing diacritical marks (0xC1..=0xCF) that combine with the letter
//! that follows them. Reserved selectors decode to an empty string; only an
//! ISO/IEC 8859 part this crate has no table for is reported as an error.

use encoding_rs::{
    EUC_KR, Encoding, GBK, ISO_8859_2, ISO_8859_3, ISO_8859_4, ISO_8859_5, ISO_8859_6,
    ISO_8859_7, ISO_8859_8, ISO_8859_10, ISO_8859_13, ISO_8859_14, ISO_8859_15, UTF_16BE,
    WINDOWS_874, WINDOWS_1252, WINDOWS_1254,
};
use log::{debug, warn};

use crate::error::TextError;

const CR_LF: u8 = 0x8A;

/// Diacritical mark -> (plain letters, same letters carrying the mark).
const DIACRITICS: &[(u8, &str, &str)] = &[
    (0xC1, "AEIOUaeiou", "ÀÈÌÒÙàèìòù"),
    (0xC2, "ACEILNORSUYZacegilnorsuyz", "ÁĆÉÍĹŃÓŔŚÚÝŹáćéģíĺńóŕśúýź"),
    (0xC3, "ACEGHIJOSUWYaceghijosuwy", "ÂĈÊĜĤÎĴÔŜÛŴŶâĉêĝĥîĵôŝûŵŷ"),
    (0xC4, "AINOUainou", "ÃĨÑÕŨãĩñõũ"),
    (0xC5, "AEIOUaeiou", "ĀĒĪŌŪāēīōū"),
    (0xC6, "AGUagu", "ĂĞŬăğŭ"),
    (0xC7, "CEGIZcegz", "ĊĖĠİŻċėġż"),
    (0xC8, "AEIOUYaeiouy", "ÄËÏÖÜŸäëïöüÿ"),
    (0xC9, "", ""),
    (0xCA, "AUau", "ÅŮåů"),
    (0xCB, "CGKLNRSTcklnrst", "ÇĢĶĻŅŖŞŢçķļņŗşţ"),
    (0xCC, "", ""),
    (0xCD, "OUou", "ŐŰőű"),
    (0xCE, "AEIUaeiu", "ĄĘĮŲąęįų"),
    (0xCF, "CDELNRSTZcdelnrstz", "ČĎĚĽŇŘŠŤŽčďěľňřšťž"),
];

fn is_diacritic(b: u8) -> bool {
    (0xC1..=0xCF).contains(&b)
}

fn compose(mark: u8, letter: u8) -> char {
    DIACRITICS
        .iter()
        .find(|(m, _, _)| *m == mark)
        .and_then(|(_, plain, accented)| {
            let idx = plain.bytes().position(|c| c == letter)?;
            accented.chars().nth(idx)
        })
        .unwrap_or(letter as char)
}

/// Character coding selected by the leading byte of a text field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Charset {
    Default,
    /// Selector reserved for future use, or a malformed 0x10 prefix.
    Reserved(u8),
    SingleByte(&'static Encoding),
    MultiByte(&'static Encoding),
    Utf16Be,
    Utf8,
}

fn iso_8859_part(part: u8) -> Result<&'static Encoding, TextError> {
    // Parts 1, 9 and 11 only differ from their Windows supersets in
    // 0x80..=0x9F, which is stripped as control codes before decoding.
    Ok(match part {
        1 => WINDOWS_1252,
        2 => ISO_8859_2,
        3 => ISO_8859_3,
        4 => ISO_8859_4,
        5 => ISO_8859_5,
        6 => ISO_8859_6,
        7 => ISO_8859_7,
        8 => ISO_8859_8,
        9 => WINDOWS_1254,
        10 => ISO_8859_10,
        11 => WINDOWS_874,
        13 => ISO_8859_13,
        14 => ISO_8859_14,
        15 => ISO_8859_15,
        _ => return Err(TextError::UnsupportedIso8859Part(part)),
    })
}

/// Splits off the selector bytes and returns the charset for the rest.
fn select(bytes: &[u8]) -> Result<(Charset, &[u8]), TextError> {
    let Some((&first, rest)) = bytes.split_first() else {
        return Ok((Charset::Default, bytes));
    };
    match first {
        0x00 | 0x20..=0xFF => Ok((Charset::Default, bytes)),
        0x01..=0x07 | 0x09..=0x0B => {
            iso_8859_part(first + 4).map(|enc| (Charset::SingleByte(enc), rest))
        }
        0x10 => match rest {
            [0x00, part, text @ ..] => Ok((Charset::SingleByte(iso_8859_part(*part)?), text)),
            _ => Ok((Charset::Reserved(first), rest)),
        },
        0x11 | 0x14 => Ok((Charset::Utf16Be, rest)),
        0x12 => Ok((Charset::MultiByte(EUC_KR), rest)),
        0x13 => Ok((Charset::MultiByte(GBK), rest)),
        0x15 => Ok((Charset::Utf8, rest)),
        _ => Ok((Charset::Reserved(first), rest)),
    }
}

/// Decodes a DVB text field.
pub fn decode(bytes: &[u8]) -> Result<String, TextError> {
    let (charset, text) = select(bytes)?;
    Ok(match charset {
        Charset::Default => decode_default(text),
        Charset::Reserved(sel) => {
            debug!("reserved character table 0x{sel:02X}, field left empty");
            String::new()
        }
        Charset::SingleByte(enc) => decode_single_byte(enc, text),
        Charset::MultiByte(enc) => filter_wide_controls(&enc.decode_without_bom_handling(text).0),
        Charset::Utf16Be => filter_wide_controls(&UTF_16BE.decode_without_bom_handling(text).0),
        Charset::Utf8 => filter_wide_controls(&String::from_utf8_lossy(text)),
    })
}

/// Like [`decode`] but substitutes an empty string for an unsupported ISO/IEC 8859 part.
pub fn decode_lossy(bytes: &[u8]) -> String {
    decode(bytes).unwrap_or_else(|e| {
        warn!("text field dropped: {e}");
        String::new()
    })
}

fn decode_default(text: &[u8]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut accent: Option<u8> = None;

    for &b in text {
        match b {
            // emphasis on/off and reserved codes render as nothing
            0x80..=0x9F => {
                if b == CR_LF {
                    out.push('\n');
                }
                accent = None;
            }
            _ if is_diacritic(b) => accent = Some(b),
            0x20..=0x7F => {
                match accent.take() {
                    Some(mark) => out.push(compose(mark, b)),
                    None => out.push(b as char),
                }
            }
            _ => accent = None,
        }
    }
    out
}

fn decode_single_byte(enc: &'static Encoding, text: &[u8]) -> String {
    let filtered: Vec<u8> = text
        .iter()
        .filter_map(|&b| match b {
            CR_LF => Some(b'\n'),
            0x80..=0x9F => None,
            _ => Some(b),
        })
        .collect();
    enc.decode_without_bom_handling(&filtered).0.into_owned()
}

/// Control codes of the two-byte and UTF-8 tables live at U+E080..=U+E09F.
fn filter_wide_controls(text: &str) -> String {
    text.chars()
        .filter_map(|c| match c as u32 {
            0xE08A | 0x8A => Some('\n'),
            0xE080..=0xE09F | 0x80..=0x9F => None,
            _ => Some(c),
        })
        .collect()
}
