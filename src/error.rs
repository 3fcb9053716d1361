//! Error types returned by the decoding layers.

use thiserror::Error;

/// A single 188-byte packet could not be decoded.
#[derive(Debug, Error)]
pub enum PacketError {
    #[error("packet must be 188 bytes, got {0}")]
    Length(usize),
    #[error("sync byte mismatch: 0x{0:02X}")]
    SyncByte(u8),
    #[error("packet header: {0}")]
    Header(#[from] std::io::Error),
}

/// A reassembled section could not be decoded into a table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SectionError {
    #[error("section header too short: {0} bytes")]
    TooShort(usize),
    #[error("unexpected table id 0x{0:02X}")]
    UnexpectedTableId(u8),
}

/// A DVB text field selected an encoding that cannot be materialised.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum TextError {
    #[error("unsupported ISO/IEC 8859 part {0}")]
    UnsupportedIso8859Part(u8),
}
