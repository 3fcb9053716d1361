//! Constants for MPEG-TS demultiplexing and DVB SI decoding

/// MPEG-TS packet constants
pub const TS_PACKET_SIZE: usize = 188;
pub const TS_SYNC_BYTE: u8 = 0x47;
pub const TS_HEADER_SIZE: usize = 4;

/// PCR constants
pub const PCR_CLOCK_HZ: u64 = 27_000_000; // 27 MHz
pub const PCR_SIZE: usize = 6;

/// Well-known PIDs
pub const PID_PAT: u16 = 0x0000;
pub const PID_CAT: u16 = 0x0001;
pub const PID_NIT: u16 = 0x0010;
pub const PID_SDT: u16 = 0x0011; // SDT/BAT
pub const PID_EIT: u16 = 0x0012;
pub const PID_TDT: u16 = 0x0014; // TDT/TOT
pub const PID_NULL: u16 = 0x1FFF;

/// Table ids
pub const TID_PAT: u8 = 0x00;
pub const TID_CAT: u8 = 0x01;
pub const TID_PMT: u8 = 0x02;
pub const TID_NIT_ACTUAL: u8 = 0x40;
pub const TID_NIT_OTHER: u8 = 0x41;
pub const TID_SDT_ACTUAL: u8 = 0x42;
pub const TID_SDT_OTHER: u8 = 0x46;
pub const TID_EIT_PF_ACTUAL: u8 = 0x4E;
pub const TID_EIT_PF_OTHER: u8 = 0x4F;
pub const TID_EIT_SCHEDULE_ACTUAL: std::ops::RangeInclusive<u8> = 0x50..=0x5F;
pub const TID_EIT_SCHEDULE_OTHER: std::ops::RangeInclusive<u8> = 0x60..=0x6F;
pub const TID_TDT: u8 = 0x70;
pub const TID_TOT: u8 = 0x73;

/// Stream types counted as audio when classifying PMT entries
pub const AUDIO_STREAM_TYPES: &[u8] = &[
    0x03, 0x04, 0x0F, 0x11, 0x1C, 0x6A, 0x7A, 0x80, 0x81, 0x83, 0x84, 0x87,
];

/// Stream types counted as video when classifying PMT entries
pub const VIDEO_STREAM_TYPES: &[u8] = &[
    0x01, 0x02, 0x10, 0x12, 0x13, 0x1B, 0x1E, 0x1F, 0x20, 0x21, 0x24, 0x42,
];
