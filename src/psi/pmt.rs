use serde::Serialize;

use crate::constants::{AUDIO_STREAM_TYPES, TID_PMT, VIDEO_STREAM_TYPES};
use crate::psi::descriptor::{CaMap, Descriptor, LanguageEntry, Subtitling, TextDecoder, read_descriptors};
use crate::psi::section::{Section, SectionHeader, length12, pid13};
use crate::psi::Table;

/// ─────────── PMT ───────────
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PmtTable {
    pub header:              SectionHeader,
    pub crc_valid:           bool,
    pub pcr_pid:             u16,
    pub program_ca:          CaMap,
    pub program_descriptors: Vec<Descriptor>,
    pub streams:             Vec<ElementaryStream>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElementaryStream {
    pub stream_type: u8,
    pub pid:         u16,
    pub kind:        StreamKind,
    pub languages:   Vec<LanguageEntry>,
    pub subtitles:   Vec<Subtitling>,
    /// ECM PIDs announced for this stream only.
    pub ca:          CaMap,
    pub descriptors: Vec<Descriptor>,
}

impl ElementaryStream {
    fn new(stream_type: u8, pid: u16, descriptors: Vec<Descriptor>) -> Self {
        let mut languages = Vec::new();
        let mut subtitles = Vec::new();
        let mut ca = CaMap::default();
        for d in &descriptors {
            match d {
                Descriptor::Iso639Language(l) => languages.extend(l.iter().cloned()),
                Descriptor::Subtitling(s) => subtitles.extend(s.iter().cloned()),
                Descriptor::ConditionalAccess(c) => {
                    ca.insert(c.system_id, c.pid);
                }
                _ => {}
            }
        }

        let kind = if VIDEO_STREAM_TYPES.contains(&stream_type) {
            StreamKind::Video
        } else if AUDIO_STREAM_TYPES.contains(&stream_type) {
            StreamKind::Audio
        } else if !subtitles.is_empty() {
            StreamKind::Subtitle
        } else {
            StreamKind::Other
        };

        ElementaryStream { stream_type, pid, kind, languages, subtitles, ca, descriptors }
    }

    pub fn is_audio(&self) -> bool {
        AUDIO_STREAM_TYPES.contains(&self.stream_type)
    }

    pub fn is_video(&self) -> bool {
        VIDEO_STREAM_TYPES.contains(&self.stream_type)
    }

    /// First ISO 639 language, falling back to the first subtitling language.
    pub fn language(&self) -> Option<&str> {
        self.languages
            .first()
            .map(|l| l.language.as_str())
            .or_else(|| self.subtitles.first().map(|s| s.language.as_str()))
    }
}

impl PmtTable {
    pub fn program_number(&self) -> u16 {
        self.header.table_id_extension
    }

    pub fn audio_streams(&self) -> impl Iterator<Item = &ElementaryStream> {
        self.streams.iter().filter(|s| s.is_audio())
    }

    pub fn video_streams(&self) -> impl Iterator<Item = &ElementaryStream> {
        self.streams.iter().filter(|s| s.is_video())
    }

    pub fn subtitle_streams(&self) -> impl Iterator<Item = &ElementaryStream> {
        self.streams.iter().filter(|s| s.kind == StreamKind::Subtitle)
    }

    /// Program-level CA entries merged with every stream's, first one wins.
    pub fn all_ca(&self) -> CaMap {
        let mut all = self.program_ca.clone();
        for (system_id, pid) in self.streams.iter().flat_map(|s| s.ca.iter()) {
            all.insert(system_id, pid);
        }
        all
    }
}

impl Table for PmtTable {
    fn accepts(table_id: u8) -> bool {
        table_id == TID_PMT
    }

    fn from_section(sec: &Section<'_>) -> Self {
        let b = sec.body;
        let mut text = TextDecoder::default();
        let mut pmt = PmtTable {
            header:              sec.header.clone(),
            crc_valid:           sec.crc_valid,
            pcr_pid:             0,
            program_ca:          CaMap::default(),
            program_descriptors: Vec::new(),
            streams:             Vec::new(),
        };
        if b.len() < 4 {
            return pmt;
        }

        /* ── fixed header inside the body ── */
        pmt.pcr_pid = pid13(b[0], b[1]);
        let prog_info_len = length12(b[2], b[3]);
        let mut idx = (4 + prog_info_len).min(b.len());
        pmt.program_descriptors = read_descriptors(&b[4..idx], &mut text);
        pmt.program_ca.extend_from(&pmt.program_descriptors);

        /* ── ES loop ── */
        while idx + 5 <= b.len() {
            let stype = b[idx];
            let pid   = pid13(b[idx + 1], b[idx + 2]);
            let eslen = length12(b[idx + 3], b[idx + 4]);
            let start = idx + 5;
            let end   = (start + eslen).min(b.len());
            let descriptors = read_descriptors(&b[start..end], &mut text);
            pmt.streams.push(ElementaryStream::new(stype, pid, descriptors));
            idx = end;
        }
        pmt
    }

    fn header(&self) -> &SectionHeader {
        &self.header
    }

    fn crc_valid(&self) -> bool {
        self.crc_valid
    }
}

/// Human-readable name of a PMT stream_type.
pub fn stream_type_name(st: u8) -> &'static str {
    match st {
        0x01 => "MPEG-1 Video",
        0x02 => "MPEG-2 Video",
        0x03 => "MPEG-1 Audio",
        0x04 => "MPEG-2 Audio",
        0x05 => "Private Sections",
        0x06 => "Private PES",
        0x0F => "AAC",
        0x10 => "MPEG-4 Visual",
        0x11 => "LATM AAC",
        0x12 | 0x13 => "MPEG-4 SL",
        0x15 => "Metadata PES",
        0x1B => "H.264",
        0x1C => "MPEG-4 Audio",
        0x1E | 0x1F => "Auxiliary / SVC Video",
        0x20 => "MVC Video",
        0x21 => "JPEG 2000",
        0x24 => "HEVC",
        0x42 => "AVS Video",
        0x6A => "AC-3",
        0x7A => "E-AC-3",
        0x80 => "LPCM",
        0x81 => "AC-3 (ATSC)",
        0x83 | 0x84 => "Dolby TrueHD / DD+",
        0x87 => "E-AC-3 (ATSC)",
        _ => "unk",
    }
}
