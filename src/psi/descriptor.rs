//! Descriptors embedded in PSI/SI sections.
//!
//! Loops are decoded into a closed [`Descriptor`] enumeration. Tags this crate
//! does not interpret, and bodies too short for their tag, end up in
//! [`Descriptor::Unknown`] with their raw bytes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use log::warn;
use serde::Serialize;

use crate::constants::PID_NULL;
use crate::error::TextError;
use crate::psi::section::pid13;
use crate::text;
use crate::time;

pub const TAG_CA: u8                = 0x09;
pub const TAG_ISO_639_LANGUAGE: u8  = 0x0A;
pub const TAG_NETWORK_NAME: u8      = 0x40;
pub const TAG_SERVICE_LIST: u8      = 0x41;
pub const TAG_SERVICE: u8           = 0x48;
pub const TAG_SHORT_EVENT: u8       = 0x4D;
pub const TAG_EXTENDED_EVENT: u8    = 0x4E;
pub const TAG_CONTENT: u8           = 0x54;
pub const TAG_LOCAL_TIME_OFFSET: u8 = 0x58;
pub const TAG_SUBTITLING: u8        = 0x59;

/// Decodes text fields and remembers the first unsupported encoding seen.
#[derive(Debug, Default)]
pub(crate) struct TextDecoder {
    pub(crate) error: Option<TextError>,
}

impl TextDecoder {
    pub(crate) fn decode(&mut self, bytes: &[u8]) -> String {
        match text::decode(bytes) {
            Ok(s) => s,
            Err(e) => {
                warn!("text field dropped: {e}");
                self.error.get_or_insert(e);
                String::new()
            }
        }
    }
}

/// Reads a one-byte length prefix followed by that many bytes, clamped.
fn take_prefixed<'a>(data: &mut &'a [u8]) -> &'a [u8] {
    let Some((&len, rest)) = data.split_first() else { return &[] };
    let (field, tail) = rest.split_at((len as usize).min(rest.len()));
    *data = tail;
    field
}

/// ISO 639-2 code (or ISO 3166 country code) stored as 3 Latin-1 bytes.
fn language_code(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Service type of a service or service list descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ServiceType {
    DigitalTelevision,
    DigitalRadio,
    Teletext,
    Nvod,
    Mosaic,
    FmRadio,
    AdvancedCodecRadio,
    DataBroadcast,
    AvcSdTelevision,
    AvcHdTelevision,
    HevcTelevision,
    Other(u8),
}

impl From<u8> for ServiceType {
    fn from(code: u8) -> Self {
        match code {
            0x01 => ServiceType::DigitalTelevision,
            0x02 => ServiceType::DigitalRadio,
            0x03 => ServiceType::Teletext,
            0x05 => ServiceType::Nvod,
            0x06 => ServiceType::Mosaic,
            0x07 => ServiceType::FmRadio,
            0x0A => ServiceType::AdvancedCodecRadio,
            0x0C => ServiceType::DataBroadcast,
            0x16 => ServiceType::AvcSdTelevision,
            0x19 => ServiceType::AvcHdTelevision,
            0x1F => ServiceType::HevcTelevision,
            other => ServiceType::Other(other),
        }
    }
}

impl ServiceType {
    pub fn code(self) -> u8 {
        match self {
            ServiceType::DigitalTelevision  => 0x01,
            ServiceType::DigitalRadio       => 0x02,
            ServiceType::Teletext           => 0x03,
            ServiceType::Nvod               => 0x05,
            ServiceType::Mosaic             => 0x06,
            ServiceType::FmRadio            => 0x07,
            ServiceType::AdvancedCodecRadio => 0x0A,
            ServiceType::DataBroadcast      => 0x0C,
            ServiceType::AvcSdTelevision    => 0x16,
            ServiceType::AvcHdTelevision    => 0x19,
            ServiceType::HevcTelevision     => 0x1F,
            ServiceType::Other(code)        => code,
        }
    }
}

/// CA system id -> ECM/EMM PID. The null PID is rejected and the first PID
/// registered for a system id is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CaMap(BTreeMap<u16, u16>);

impl CaMap {
    /// Returns whether the mapping was added.
    pub fn insert(&mut self, system_id: u16, pid: u16) -> bool {
        if pid == PID_NULL || self.0.contains_key(&system_id) {
            return false;
        }
        self.0.insert(system_id, pid);
        true
    }

    pub fn get(&self, system_id: u16) -> Option<u16> {
        self.0.get(&system_id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, u16)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Registers every CA descriptor found in `descriptors`.
    pub fn extend_from(&mut self, descriptors: &[Descriptor]) {
        for d in descriptors {
            if let Descriptor::ConditionalAccess(ca) = d {
                self.insert(ca.system_id, ca.pid);
            }
        }
    }
}

/// conditional_access_descriptor (0x09)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaDescriptor {
    pub system_id:    u16,
    pub pid:          u16,
    pub private_data: Vec<u8>,
}

impl CaDescriptor {
    fn read(data: &[u8]) -> Option<Self> {
        if data.len() < 4 {
            return None;
        }
        Some(CaDescriptor {
            system_id:    u16::from_be_bytes([data[0], data[1]]),
            pid:          pid13(data[2], data[3]),
            private_data: data[4..].to_vec(),
        })
    }
}

/// One entry of an ISO_639_language_descriptor (0x0A).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageEntry {
    pub language:   String,
    pub audio_type: u8,
}

impl LanguageEntry {
    fn read_all(data: &[u8]) -> Vec<Self> {
        data.chunks_exact(4)
            .map(|c| LanguageEntry { language: language_code(&c[..3]), audio_type: c[3] })
            .collect()
    }

    pub fn audio_type_name(&self) -> &'static str {
        match self.audio_type {
            0x00 => "undefined",
            0x01 => "clean effects",
            0x02 => "hearing impaired",
            0x03 => "visual impaired commentary",
            _ => "reserved",
        }
    }
}

/// One entry of a service_list_descriptor (0x41).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceListEntry {
    pub service_id:   u16,
    pub service_type: ServiceType,
}

impl ServiceListEntry {
    fn read_all(data: &[u8]) -> Vec<Self> {
        data.chunks_exact(3)
            .map(|c| ServiceListEntry {
                service_id:   u16::from_be_bytes([c[0], c[1]]),
                service_type: ServiceType::from(c[2]),
            })
            .collect()
    }
}

/// service_descriptor (0x48)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceInfo {
    pub service_type: ServiceType,
    pub provider:     String,
    pub name:         String,
}

impl ServiceInfo {
    fn read(mut data: &[u8], text: &mut TextDecoder) -> Option<Self> {
        let (&service_type, rest) = data.split_first()?;
        data = rest;
        let provider = text.decode(take_prefixed(&mut data));
        let name = text.decode(take_prefixed(&mut data));
        Some(ServiceInfo { service_type: ServiceType::from(service_type), provider, name })
    }
}

/// short_event_descriptor (0x4D)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShortEvent {
    pub language: String,
    pub name:     String,
    pub text:     String,
}

impl ShortEvent {
    fn read(data: &[u8], text: &mut TextDecoder) -> Option<Self> {
        if data.len() < 3 {
            return None;
        }
        let language = language_code(&data[..3]);
        let mut rest = &data[3..];
        let name = text.decode(take_prefixed(&mut rest));
        let body = text.decode(take_prefixed(&mut rest));
        Some(ShortEvent { language, name, text: body })
    }
}

/// Item of an extended event descriptor (e.g. "Director" / "...").
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtendedItem {
    pub description: String,
    pub item:        String,
}

/// extended_event_descriptor (0x4E)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtendedEvent {
    pub number:      u8,
    pub last_number: u8,
    pub language:    String,
    pub items:       Vec<ExtendedItem>,
    pub text:        String,
}

impl ExtendedEvent {
    fn read(data: &[u8], text: &mut TextDecoder) -> Option<Self> {
        if data.len() < 4 {
            return None;
        }
        let number = data[0] >> 4;
        let last_number = data[0] & 0x0F;
        let language = language_code(&data[1..4]);

        let mut rest = &data[4..];
        let mut item_bytes = take_prefixed(&mut rest);
        let mut items = Vec::new();
        while !item_bytes.is_empty() {
            let description = text.decode(take_prefixed(&mut item_bytes));
            let item = text.decode(take_prefixed(&mut item_bytes));
            items.push(ExtendedItem { description, item });
        }
        let body = text.decode(take_prefixed(&mut rest));

        Some(ExtendedEvent { number, last_number, language, items, text: body })
    }
}

/// Top-level content nibble of a content descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ContentGenre {
    Undefined,
    MovieDrama,
    NewsCurrentAffairs,
    ShowGameShow,
    Sports,
    ChildrenYouth,
    MusicBalletDance,
    ArtsCulture,
    SocialPoliticalEconomics,
    EducationScienceFactual,
    LeisureHobbies,
    SpecialCharacteristics,
    Reserved(u8),
    UserDefined,
}

impl From<u8> for ContentGenre {
    fn from(nibble: u8) -> Self {
        match nibble & 0x0F {
            0x0 => ContentGenre::Undefined,
            0x1 => ContentGenre::MovieDrama,
            0x2 => ContentGenre::NewsCurrentAffairs,
            0x3 => ContentGenre::ShowGameShow,
            0x4 => ContentGenre::Sports,
            0x5 => ContentGenre::ChildrenYouth,
            0x6 => ContentGenre::MusicBalletDance,
            0x7 => ContentGenre::ArtsCulture,
            0x8 => ContentGenre::SocialPoliticalEconomics,
            0x9 => ContentGenre::EducationScienceFactual,
            0xA => ContentGenre::LeisureHobbies,
            0xB => ContentGenre::SpecialCharacteristics,
            0xF => ContentGenre::UserDefined,
            n => ContentGenre::Reserved(n),
        }
    }
}

/// One classification of a content_descriptor (0x54).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ContentEntry {
    pub level_1: u8,
    pub level_2: u8,
    pub user:    u8,
}

impl ContentEntry {
    fn read_all(data: &[u8]) -> Vec<Self> {
        data.chunks_exact(2)
            .map(|c| ContentEntry { level_1: c[0] >> 4, level_2: c[0] & 0x0F, user: c[1] })
            .collect()
    }

    pub fn genre(&self) -> ContentGenre {
        ContentGenre::from(self.level_1)
    }
}

/// One region of a local_time_offset_descriptor (0x58).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalTimeOffset {
    pub country_code:        String,
    pub region_id:           u8,
    /// Signed offset from UTC.
    pub offset_minutes:      i32,
    pub time_of_change:      Option<DateTime<Utc>>,
    pub next_offset_minutes: i32,
}

impl LocalTimeOffset {
    fn read_all(data: &[u8]) -> Vec<Self> {
        data.chunks_exact(13)
            .map(|c| {
                let negative = c[3] & 0x01 != 0;
                let signed = |bytes: [u8; 2]| {
                    let minutes = time::decode_offset(&bytes).map_or(0, |d| d.num_minutes() as i32);
                    if negative { -minutes } else { minutes }
                };
                LocalTimeOffset {
                    country_code:        language_code(&c[..3]),
                    region_id:           c[3] >> 2,
                    offset_minutes:      signed([c[4], c[5]]),
                    time_of_change:      time::decode_utc(&[c[6], c[7], c[8], c[9], c[10]]),
                    next_offset_minutes: signed([c[11], c[12]]),
                }
            })
            .collect()
    }
}

/// One entry of a subtitling_descriptor (0x59).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subtitling {
    pub language:            String,
    pub subtitling_type:     u8,
    pub composition_page_id: u16,
    pub ancillary_page_id:   u16,
}

impl Subtitling {
    fn read_all(data: &[u8]) -> Vec<Self> {
        data.chunks_exact(8)
            .map(|c| Subtitling {
                language:            language_code(&c[..3]),
                subtitling_type:     c[3],
                composition_page_id: u16::from_be_bytes([c[4], c[5]]),
                ancillary_page_id:   u16::from_be_bytes([c[6], c[7]]),
            })
            .collect()
    }
}

/// A decoded descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Descriptor {
    ConditionalAccess(CaDescriptor),
    Iso639Language(Vec<LanguageEntry>),
    NetworkName(String),
    ServiceList(Vec<ServiceListEntry>),
    Service(ServiceInfo),
    ShortEvent(ShortEvent),
    ExtendedEvent(ExtendedEvent),
    Content(Vec<ContentEntry>),
    LocalTimeOffset(Vec<LocalTimeOffset>),
    Subtitling(Vec<Subtitling>),
    Unknown { tag: u8, data: Vec<u8> },
}

impl Descriptor {
    fn read(tag: u8, data: &[u8], text: &mut TextDecoder) -> Self {
        let parsed = match tag {
            TAG_CA                => CaDescriptor::read(data).map(Descriptor::ConditionalAccess),
            TAG_ISO_639_LANGUAGE  => Some(Descriptor::Iso639Language(LanguageEntry::read_all(data))),
            TAG_NETWORK_NAME      => Some(Descriptor::NetworkName(text.decode(data))),
            TAG_SERVICE_LIST      => Some(Descriptor::ServiceList(ServiceListEntry::read_all(data))),
            TAG_SERVICE           => ServiceInfo::read(data, text).map(Descriptor::Service),
            TAG_SHORT_EVENT       => ShortEvent::read(data, text).map(Descriptor::ShortEvent),
            TAG_EXTENDED_EVENT    => ExtendedEvent::read(data, text).map(Descriptor::ExtendedEvent),
            TAG_CONTENT           => Some(Descriptor::Content(ContentEntry::read_all(data))),
            TAG_LOCAL_TIME_OFFSET => Some(Descriptor::LocalTimeOffset(LocalTimeOffset::read_all(data))),
            TAG_SUBTITLING        => Some(Descriptor::Subtitling(Subtitling::read_all(data))),
            _ => None,
        };
        parsed.unwrap_or_else(|| Descriptor::Unknown { tag, data: data.to_vec() })
    }

    pub fn tag(&self) -> u8 {
        match self {
            Descriptor::ConditionalAccess(_) => TAG_CA,
            Descriptor::Iso639Language(_)    => TAG_ISO_639_LANGUAGE,
            Descriptor::NetworkName(_)       => TAG_NETWORK_NAME,
            Descriptor::ServiceList(_)       => TAG_SERVICE_LIST,
            Descriptor::Service(_)           => TAG_SERVICE,
            Descriptor::ShortEvent(_)        => TAG_SHORT_EVENT,
            Descriptor::ExtendedEvent(_)     => TAG_EXTENDED_EVENT,
            Descriptor::Content(_)           => TAG_CONTENT,
            Descriptor::LocalTimeOffset(_)   => TAG_LOCAL_TIME_OFFSET,
            Descriptor::Subtitling(_)        => TAG_SUBTITLING,
            Descriptor::Unknown { tag, .. }  => *tag,
        }
    }
}

/// Decodes a descriptor loop. A descriptor whose declared length runs past
/// the data gets whatever bytes remain.
pub(crate) fn read_descriptors(mut data: &[u8], text: &mut TextDecoder) -> Vec<Descriptor> {
    let mut out = Vec::new();
    while data.len() >= 2 {
        let tag = data[0];
        let end = (2 + data[1] as usize).min(data.len());
        out.push(Descriptor::read(tag, &data[2..end], text));
        data = &data[end..];
    }
    out
}

/// Decodes a descriptor loop, returning the first text encoding error if any.
pub fn parse_descriptors(data: &[u8]) -> (Vec<Descriptor>, Option<TextError>) {
    let mut text = TextDecoder::default();
    let descriptors = read_descriptors(data, &mut text);
    (descriptors, text.error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use hex_literal::hex;

    #[test]
    fn test_ca_map_rules() {
        let mut map = CaMap::default();
        assert!(map.insert(0x0B00, 0x0100));
        assert!(!map.insert(0x0B00, 0x0200));
        assert!(!map.insert(0x0D00, 0x1FFF));
        assert_eq!(map.get(0x0B00), Some(0x0100));
        assert_eq!(map.get(0x0D00), None);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_service_descriptor() {
        let data = hex!("48 11 1F 00 0E 43 45 53 4B 41 20 54 45 4C 45 56 49 5A 45");
        let (ds, err) = parse_descriptors(&data[..]);
        assert!(err.is_none());
        assert_eq!(
            ds,
            vec![Descriptor::Service(ServiceInfo {
                service_type: ServiceType::HevcTelevision,
                provider:     String::new(),
                name:         "CESKA TELEVIZE".into(),
            })]
        );
    }

    #[test]
    fn test_loop_with_unknown_and_truncated_tail() {
        let data = hex!("0A 04 63 65 73 00  FE 02 AA BB  09 07 0B 00 E1 23 01");
        let (ds, _) = parse_descriptors(&data);
        assert_eq!(ds.len(), 3);
        assert_eq!(
            ds[0],
            Descriptor::Iso639Language(vec![LanguageEntry { language: "ces".into(), audio_type: 0 }])
        );
        assert_eq!(ds[1], Descriptor::Unknown { tag: 0xFE, data: vec![0xAA, 0xBB] });
        assert_eq!(
            ds[2],
            Descriptor::ConditionalAccess(CaDescriptor { system_id: 0x0B00, pid: 0x0123, private_data: vec![1] })
        );
        assert_eq!(ds[2].tag(), TAG_CA);
    }

    #[test]
    fn test_short_ca_descriptor_is_unknown() {
        let (ds, _) = parse_descriptors(&hex!("09 02 0B 00"));
        assert_eq!(ds, vec![Descriptor::Unknown { tag: TAG_CA, data: vec![0x0B, 0x00] }]);
    }

    #[test]
    fn test_extended_event_with_items() {
        let mut data = vec![TAG_EXTENDED_EVENT, 0];
        data.extend(hex!("12 63 7A 65"));
        data.extend([13, 3]);
        data.extend(b"Dir");
        data.extend([8]);
        data.extend(b"J. Novak");
        data.extend([4]);
        data.extend(b"more");
        data[1] = (data.len() - 2) as u8;

        let (ds, _) = parse_descriptors(&data);
        let Descriptor::ExtendedEvent(ext) = &ds[0] else { panic!("{ds:?}") };
        assert_eq!(ext.number, 1);
        assert_eq!(ext.last_number, 2);
        assert_eq!(ext.language, "cze");
        assert_eq!(ext.items, vec![ExtendedItem { description: "Dir".into(), item: "J. Novak".into() }]);
        assert_eq!(ext.text, "more");
    }

    #[test]
    fn test_content_and_subtitling() {
        let (ds, _) = parse_descriptors(&hex!(
            "54 04 10 00 43 05
             59 08 63 65 73 10 00 01 00 02"
        ));
        let Descriptor::Content(entries) = &ds[0] else { panic!() };
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].genre(), ContentGenre::MovieDrama);
        assert_eq!(entries[1].genre(), ContentGenre::Sports);
        assert_eq!(entries[1].level_2, 3);
        assert_eq!(entries[1].user, 5);

        assert_eq!(
            ds[1],
            Descriptor::Subtitling(vec![Subtitling {
                language: "ces".into(),
                subtitling_type: 0x10,
                composition_page_id: 1,
                ancillary_page_id: 2,
            }])
        );
    }

    #[test]
    fn test_local_time_offset() {
        let (ds, _) = parse_descriptors(&hex!("58 0D 43 5A 45 02 01 00 EB 1E 01 00 00 02 00"));
        assert_eq!(
            ds,
            vec![Descriptor::LocalTimeOffset(vec![LocalTimeOffset {
                country_code: "CZE".into(),
                region_id: 0,
                offset_minutes: 60,
                time_of_change: Some(Utc.with_ymd_and_hms(2023, 9, 3, 1, 0, 0).unwrap()),
                next_offset_minutes: 120,
            }])]
        );
    }

    #[test]
    fn test_unsupported_text_is_reported() {
        let (ds, err) = parse_descriptors(&hex!("40 05 10 00 0C 41 42  40 03 1F 41 42"));
        assert_eq!(ds, vec![Descriptor::NetworkName(String::new()), Descriptor::NetworkName(String::new())]);
        assert_eq!(err, Some(TextError::UnsupportedIso8859Part(12)));

        let (_, err) = parse_descriptors(&hex!("40 03 1F 41 42"));
        assert_eq!(err, None);
    }
}
