// psi/eit.rs
//! Event Information Table (table_ids 0x4E..=0x6F).

use chrono::{DateTime, TimeDelta, Utc};
use log::debug;
use serde::Serialize;

use crate::constants::{TID_EIT_PF_ACTUAL, TID_EIT_PF_OTHER, TID_EIT_SCHEDULE_ACTUAL, TID_EIT_SCHEDULE_OTHER};
use crate::error::TextError;
use crate::psi::descriptor::{ContentEntry, Descriptor, ExtendedEvent, ExtendedItem, TextDecoder, read_descriptors};
use crate::psi::section::{Section, SectionHeader, length12};
use crate::psi::{RunningStatus, Table};
use crate::time;

/// Which EIT sub-table a section belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EitKind {
    PresentFollowing { actual: bool },
    Schedule { actual: bool },
}

impl EitKind {
    pub fn from_table_id(table_id: u8) -> Option<Self> {
        match table_id {
            TID_EIT_PF_ACTUAL => Some(EitKind::PresentFollowing { actual: true }),
            TID_EIT_PF_OTHER => Some(EitKind::PresentFollowing { actual: false }),
            t if TID_EIT_SCHEDULE_ACTUAL.contains(&t) => Some(EitKind::Schedule { actual: true }),
            t if TID_EIT_SCHEDULE_OTHER.contains(&t) => Some(EitKind::Schedule { actual: false }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EitTable {
    pub header:                      SectionHeader,
    pub crc_valid:                   bool,
    pub transport_stream_id:         u16,
    pub original_network_id:         u16,
    pub segment_last_section_number: u8,
    pub last_table_id:               u8,
    pub events:                      Vec<EventItem>,
    #[serde(skip)]
    pub text_error:                  Option<TextError>,
}

/// One event with its short/extended descriptors folded in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventItem {
    pub service_id:     u16,
    pub event_id:       u16,
    pub start:          DateTime<Utc>,
    pub finish:         DateTime<Utc>,
    pub duration_secs:  i64,
    pub running_status: RunningStatus,
    pub free:           bool,
    pub language:       String,
    pub name:           String,
    pub text:           String,
    /// Extended event fragments joined by descriptor number.
    pub extended_text:  String,
    pub extended_items: Vec<ExtendedItem>,
    pub content:        Vec<ContentEntry>,
}

impl EventItem {
    /// Short text and extended text, separated by a line break when both exist.
    pub fn full_text(&self) -> String {
        match (self.text.is_empty(), self.extended_text.is_empty()) {
            (_, true) => self.text.clone(),
            (true, false) => self.extended_text.clone(),
            (false, false) => format!("{}\n{}", self.text, self.extended_text),
        }
    }

    /// Whether `now` falls in `[start, finish)`.
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        self.start <= now && now < self.finish
    }

    fn apply_descriptors(&mut self, descriptors: Vec<Descriptor>) {
        let mut fragments: Vec<ExtendedEvent> = Vec::new();
        for d in descriptors {
            match d {
                Descriptor::ShortEvent(short) => {
                    if self.name.is_empty() && self.text.is_empty() {
                        self.language = short.language;
                        self.name = short.name;
                        self.text = short.text;
                    }
                }
                Descriptor::ExtendedEvent(ext) => fragments.push(ext),
                Descriptor::Content(entries) => self.content.extend(entries),
                _ => {}
            }
        }

        fragments.sort_by_key(|f| f.number);
        let last = fragments.first().map_or(0, |f| f.last_number);
        for f in fragments.into_iter().filter(|f| f.number <= last) {
            self.extended_text.push_str(&f.text);
            self.extended_items.extend(f.items);
        }
    }
}

impl EitTable {
    pub fn service_id(&self) -> u16 {
        self.header.table_id_extension
    }

    pub fn kind(&self) -> Option<EitKind> {
        EitKind::from_table_id(self.header.table_id)
    }
}

impl Table for EitTable {
    fn accepts(table_id: u8) -> bool {
        EitKind::from_table_id(table_id).is_some()
    }

    fn from_section(sec: &Section<'_>) -> Self {
        let b = sec.body;
        let mut text = TextDecoder::default();
        let service_id = sec.header.table_id_extension;
        let field = |i: usize| b.get(i).copied().unwrap_or(0);

        let mut eit = EitTable {
            header:                      sec.header.clone(),
            crc_valid:                   sec.crc_valid,
            transport_stream_id:         u16::from_be_bytes([field(0), field(1)]),
            original_network_id:         u16::from_be_bytes([field(2), field(3)]),
            segment_last_section_number: field(4),
            last_table_id:               field(5),
            events:                      Vec::new(),
            text_error:                  None,
        };

        let mut idx = 6;
        while idx + 12 <= b.len() {
            let e        = &b[idx..idx + 12];
            let event_id = u16::from_be_bytes([e[0], e[1]]);
            let desc_len = length12(e[10], e[11]);
            let start    = idx + 12;
            let end      = (start + desc_len).min(b.len());
            idx = end;

            let Some(start_time) = time::decode_utc(&[e[2], e[3], e[4], e[5], e[6]]) else {
                debug!("service {service_id}: event {event_id} has no usable start time");
                continue;
            };
            let duration = time::decode_duration(&[e[7], e[8], e[9]]).unwrap_or(TimeDelta::zero());

            let mut item = EventItem {
                service_id,
                event_id,
                start:          start_time,
                finish:         start_time + duration,
                duration_secs:  duration.num_seconds(),
                running_status: RunningStatus::from(e[10] >> 5),
                free:           e[10] & 0x10 == 0,
                language:       String::new(),
                name:           String::new(),
                text:           String::new(),
                extended_text:  String::new(),
                extended_items: Vec::new(),
                content:        Vec::new(),
            };
            item.apply_descriptors(read_descriptors(&b[start..end], &mut text));
            eit.events.push(item);
        }

        eit.text_error = text.error;
        eit
    }

    fn header(&self) -> &SectionHeader {
        &self.header
    }

    fn crc_valid(&self) -> bool {
        self.crc_valid
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::psi::descriptor::{ContentGenre, TAG_CONTENT, TAG_EXTENDED_EVENT, TAG_SHORT_EVENT};
    use crate::psi::test_support::{descriptor, long_section, loop_length};
    use chrono::TimeZone;
    use hex_literal::hex;

    /// BCD-encodes a value below 100.
    fn bcd(v: u32) -> u8 {
        ((v / 10) << 4 | v % 10) as u8
    }

    pub(crate) fn utc_bytes(t: DateTime<Utc>) -> [u8; 5] {
        use chrono::Timelike;
        let epoch = chrono::NaiveDate::from_ymd_opt(1858, 11, 17).unwrap();
        let mjd = (t.date_naive() - epoch).num_days() as u16;
        let [hi, lo] = mjd.to_be_bytes();
        [hi, lo, bcd(t.hour()), bcd(t.minute()), bcd(t.second())]
    }

    pub(crate) fn short_event(name: &[u8], text: &[u8]) -> Vec<u8> {
        let mut body = b"ces".to_vec();
        body.push(name.len() as u8);
        body.extend_from_slice(name);
        body.push(text.len() as u8);
        body.extend_from_slice(text);
        descriptor(TAG_SHORT_EVENT, &body)
    }

    fn extended_event(number: u8, last: u8, text: &[u8]) -> Vec<u8> {
        let mut body = vec![number << 4 | last];
        body.extend(b"ces");
        body.push(0);
        body.push(text.len() as u8);
        body.extend_from_slice(text);
        descriptor(TAG_EXTENDED_EVENT, &body)
    }

    /// One event loop entry; `minutes` is the duration.
    pub(crate) fn event(id: u16, start: DateTime<Utc>, minutes: u32, descriptors: &[u8]) -> Vec<u8> {
        let mut e = id.to_be_bytes().to_vec();
        e.extend(utc_bytes(start));
        e.extend([bcd(minutes / 60), bcd(minutes % 60), 0x00]);
        let len = loop_length(descriptors.len());
        e.push(0x80 | (len[0] & 0x0F));
        e.push(len[1]);
        e.extend_from_slice(descriptors);
        e
    }

    pub(crate) fn eit_section(table_id: u8, service_id: u16, events: &[Vec<u8>]) -> Vec<u8> {
        let mut body = vec![0x00, 0x01, 0x20, 0x55, 0x00, table_id];
        for e in events {
            body.extend_from_slice(e);
        }
        long_section(table_id, service_id, 1, &body)
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 9, 7, h, m, 0).unwrap()
    }

    const TEXT_175: &str = "Aktuální události z oblasti kriminality. Zločiny očima profesionálů, zkušených reportérů i diváků. (Premiéra)";
    const TEXT_178: &str = "V zábavné show Inkognito se čtveřice osobností snaží uhodnout profesi jednotlivých hostů nebo jejich identitu. Hádejte společně s nimi a pobavte se nečekanými myšlenkami. Moderuje Libor Bouček. (Premiéra)";

    fn utf8(s: &str) -> Vec<u8> {
        let mut v = vec![0x15];
        v.extend_from_slice(s.as_bytes());
        v
    }

    pub(crate) fn ct1_schedule() -> Vec<u8> {
        eit_section(0x50, 268, &[
            event(175, at(20, 40), 15, &short_event(b"Krimi zpr\xC2avy", &utf8(TEXT_175))),
            event(176, at(20, 55), 20, &short_event(b"SHOWTIME", b"")),
            event(177, at(21, 15), 80, &short_event(b"ZOO (130)", &utf8("Epizoda: Samá překvapení"))),
            event(178, at(22, 35), 70, &short_event(b"Inkognito", &utf8(TEXT_178))),
        ])
    }

    #[test]
    fn test_eit_events() {
        let eit = EitTable::parse(&ct1_schedule()).unwrap();
        assert!(eit.crc_valid());
        assert_eq!(eit.kind(), Some(EitKind::Schedule { actual: true }));
        assert_eq!(eit.service_id(), 268);
        assert_eq!(eit.original_network_id, 0x2055);
        assert_eq!(eit.last_table_id, 0x50);
        assert_eq!(eit.events.len(), 4);

        let expected = [
            (175, "Krimi zprávy", TEXT_175, at(20, 40), at(20, 55)),
            (176, "SHOWTIME", "", at(20, 55), at(21, 15)),
            (177, "ZOO (130)", "Epizoda: Samá překvapení", at(21, 15), at(22, 35)),
            (178, "Inkognito", TEXT_178, at(22, 35), at(23, 45)),
        ];
        for (ev, (id, name, text, start, finish)) in eit.events.iter().zip(expected) {
            assert_eq!(ev.event_id, id);
            assert_eq!(ev.name, name);
            assert_eq!(ev.text, text);
            assert_eq!(ev.start, start);
            assert_eq!(ev.finish, finish);
            assert_eq!(ev.language, "ces");
            assert_eq!(ev.service_id, 268);
            assert_eq!(ev.running_status, RunningStatus::Running);
            assert!(ev.free);
        }
        assert_eq!(eit.events[3].duration_secs, 70 * 60);
    }

    #[test]
    fn test_extended_fragments_are_joined_in_order() {
        let mut descs = short_event(b"Film", b"Short");
        descs.extend(extended_event(1, 2, b"middle "));
        descs.extend(extended_event(0, 2, b"Start "));
        descs.extend(extended_event(2, 2, b"end."));
        descs.extend(descriptor(TAG_CONTENT, &hex!("10 00")));

        let eit = EitTable::parse(&eit_section(0x4E, 1, &[event(9, at(10, 0), 90, &descs)])).unwrap();
        assert_eq!(eit.kind(), Some(EitKind::PresentFollowing { actual: true }));
        let ev = &eit.events[0];
        assert_eq!(ev.extended_text, "Start middle end.");
        assert_eq!(ev.full_text(), "Short\nStart middle end.");
        assert_eq!(ev.content[0].genre(), ContentGenre::MovieDrama);
    }

    #[test]
    fn test_undefined_start_time_is_skipped() {
        let mut bad = event(1, at(10, 0), 10, &[]);
        bad[2..7].copy_from_slice(&[0xFF; 5]);
        let good = event(2, at(10, 10), 10, &[]);
        let eit = EitTable::parse(&eit_section(0x4E, 1, &[bad, good])).unwrap();
        assert_eq!(eit.events.len(), 1);
        assert_eq!(eit.events[0].event_id, 2);
    }

    #[test]
    fn test_truncated_event_header_ends_loop() {
        // events 175 (156 bytes) and 176 (27 bytes) start at 14; 177 at 197
        let s = ct1_schedule();
        let eit = EitTable::parse(&s[..197 + 6]).unwrap();
        assert!(!eit.crc_valid());
        assert_eq!(eit.events.iter().map(|e| e.event_id).collect::<Vec<_>>(), vec![175, 176]);
        assert_eq!(eit.events[1].name, "SHOWTIME");
    }

    #[test]
    fn test_truncated_descriptor_keeps_event() {
        // cut right after the text length byte of event 175
        let s = ct1_schedule();
        let eit = EitTable::parse(&s[..14 + 12 + 2 + 3 + 1 + 13 + 1]).unwrap();
        assert!(!eit.crc_valid());
        assert_eq!(eit.events.len(), 1);
        let ev = &eit.events[0];
        assert_eq!(ev.event_id, 175);
        assert_eq!(ev.name, "Krimi zprávy");
        assert_eq!(ev.text, "");
        assert_eq!(ev.finish, at(20, 55));
    }

    #[test]
    fn test_kind_ranges() {
        assert_eq!(EitKind::from_table_id(0x4F), Some(EitKind::PresentFollowing { actual: false }));
        assert_eq!(EitKind::from_table_id(0x5F), Some(EitKind::Schedule { actual: true }));
        assert_eq!(EitKind::from_table_id(0x60), Some(EitKind::Schedule { actual: false }));
        assert_eq!(EitKind::from_table_id(0x70), None);
        assert!(!EitTable::accepts(0x42));
    }

    #[test]
    fn test_is_current() {
        let eit = EitTable::parse(&ct1_schedule()).unwrap();
        let ev = &eit.events[0];
        assert!(ev.is_current(at(20, 40)));
        assert!(ev.is_current(at(20, 54)));
        assert!(!ev.is_current(at(20, 55)));
        assert!(!ev.is_current(at(20, 39)));
    }
}
