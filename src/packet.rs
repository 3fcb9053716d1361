//! Single 188-byte transport packet decoding (header, adaptation field, PCR).

use bitstream_io::{BigEndian, BitRead, BitReader};
use bytes::Bytes;
use serde::Serialize;

use crate::constants::{PCR_CLOCK_HZ, PCR_SIZE, PID_NULL, TS_HEADER_SIZE, TS_PACKET_SIZE, TS_SYNC_BYTE};
use crate::error::PacketError;

/// transport_scrambling_control (2 bits)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScramblingControl {
    NotScrambled,
    Reserved,
    EvenKey,
    OddKey,
}

impl From<u8> for ScramblingControl {
    fn from(bits: u8) -> Self {
        match bits & 0x03 {
            0 => ScramblingControl::NotScrambled,
            1 => ScramblingControl::Reserved,
            2 => ScramblingControl::EvenKey,
            _ => ScramblingControl::OddKey,
        }
    }
}

/// adaptation_field_control (2 bits)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AdaptationFieldControl {
    Reserved,
    PayloadOnly,
    AdaptationOnly,
    AdaptationAndPayload,
}

impl AdaptationFieldControl {
    pub fn has_adaptation(self) -> bool {
        matches!(self, Self::AdaptationOnly | Self::AdaptationAndPayload)
    }

    pub fn has_payload(self) -> bool {
        matches!(self, Self::PayloadOnly | Self::AdaptationAndPayload)
    }
}

impl From<u8> for AdaptationFieldControl {
    fn from(bits: u8) -> Self {
        match bits & 0x03 {
            0 => AdaptationFieldControl::Reserved,
            1 => AdaptationFieldControl::PayloadOnly,
            2 => AdaptationFieldControl::AdaptationOnly,
            _ => AdaptationFieldControl::AdaptationAndPayload,
        }
    }
}

/// Decoded adaptation field. Optional parts are `None` when their flag is
/// clear or the declared length does not cover them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AdaptationField {
    pub length:             u8,
    pub discontinuity:      bool,
    pub random_access:      bool,
    pub es_priority:        bool,
    pub pcr_flag:           bool,
    pub opcr_flag:          bool,
    pub splicing_point:     bool,
    pub private_data_flag:  bool,
    pub extension_flag:     bool,
    pub pcr_raw:            Option<[u8; PCR_SIZE]>,
    pub opcr_raw:           Option<[u8; PCR_SIZE]>,
    pub splice_countdown:   Option<i8>,
    pub private_data:       Option<Vec<u8>>,
}

impl AdaptationField {
    /// Parses the field starting at its length byte. `data` is everything
    /// from byte 4 of the packet to the end.
    fn parse(data: &[u8]) -> Self {
        let Some(&length) = data.first() else { return Self::default() };
        let end = (1 + length as usize).min(data.len());
        let mut af = AdaptationField { length, ..Default::default() };
        if length == 0 || end < 2 {
            return af;
        }

        let flags = data[1];
        af.discontinuity     = flags & 0x80 != 0;
        af.random_access     = flags & 0x40 != 0;
        af.es_priority       = flags & 0x20 != 0;
        af.pcr_flag          = flags & 0x10 != 0;
        af.opcr_flag         = flags & 0x08 != 0;
        af.splicing_point    = flags & 0x04 != 0;
        af.private_data_flag = flags & 0x02 != 0;
        af.extension_flag    = flags & 0x01 != 0;

        let mut pos = 2;
        if af.pcr_flag {
            af.pcr_raw = take_clock(data, &mut pos, end);
        }
        if af.opcr_flag {
            af.opcr_raw = take_clock(data, &mut pos, end);
        }
        if af.splicing_point && pos < end {
            af.splice_countdown = Some(data[pos] as i8);
            pos += 1;
        }
        if af.private_data_flag && pos < end {
            let len = data[pos] as usize;
            let start = pos + 1;
            af.private_data = Some(data[start..(start + len).min(end)].to_vec());
        }
        af
    }

    /// PCR as a 27 MHz tick count.
    pub fn pcr(&self) -> Option<u64> {
        self.pcr_raw.as_ref().map(decode_pcr)
    }

    /// OPCR as a 27 MHz tick count.
    pub fn opcr(&self) -> Option<u64> {
        self.opcr_raw.as_ref().map(decode_pcr)
    }
}

fn take_clock(data: &[u8], pos: &mut usize, end: usize) -> Option<[u8; PCR_SIZE]> {
    let raw = data.get(*pos..*pos + PCR_SIZE).filter(|_| *pos + PCR_SIZE <= end)?;
    *pos += PCR_SIZE;
    raw.try_into().ok()
}

/// Combines the 33-bit 90 kHz base and the 9-bit extension into 27 MHz ticks.
pub fn decode_pcr(p: &[u8; PCR_SIZE]) -> u64 {
    let base = ((p[0] as u64) << 25)
             | ((p[1] as u64) << 17)
             | ((p[2] as u64) << 9)
             | ((p[3] as u64) << 1)
             | ((p[4] as u64) >> 7);
    let ext = (((p[4] & 0x01) as u64) << 8) | (p[5] as u64);
    base * 300 + ext
}

/// Whole seconds of a 27 MHz tick count.
pub fn pcr_seconds(ticks: u64) -> u64 {
    ticks / PCR_CLOCK_HZ
}

/// One decoded transport packet. Owns a copy of its payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportPacket {
    pub sync_byte:                u8,
    pub transport_error:          bool,
    pub payload_unit_start:       bool,
    pub transport_priority:       bool,
    pub pid:                      u16,
    pub scrambling:               ScramblingControl,
    pub adaptation_field_control: AdaptationFieldControl,
    pub continuity_counter:       u8,
    pub adaptation_field:         Option<AdaptationField>,
    pub payload:                  Bytes,
}

impl TransportPacket {
    /// Decodes exactly one 188-byte packet.
    pub fn parse(data: &[u8]) -> Result<Self, PacketError> {
        if data.len() != TS_PACKET_SIZE {
            return Err(PacketError::Length(data.len()));
        }
        if data[0] != TS_SYNC_BYTE {
            return Err(PacketError::SyncByte(data[0]));
        }

        let mut br = BitReader::endian(&data[..TS_HEADER_SIZE], BigEndian);
        let sync_byte          = br.read::<8, u8>()?;
        let transport_error    = br.read_bit()?;
        let payload_unit_start = br.read_bit()?;
        let transport_priority = br.read_bit()?;
        let pid                = br.read::<13, u16>()?;
        let scrambling         = ScramblingControl::from(br.read::<2, u8>()?);
        let afc                = AdaptationFieldControl::from(br.read::<2, u8>()?);
        let continuity_counter = br.read::<4, u8>()?;

        let mut payload_offset = TS_HEADER_SIZE;
        let adaptation_field = if afc.has_adaptation() {
            let af = AdaptationField::parse(&data[TS_HEADER_SIZE..]);
            payload_offset = (TS_HEADER_SIZE + 1 + af.length as usize).min(TS_PACKET_SIZE);
            Some(af)
        } else {
            None
        };

        let payload = if afc.has_payload() {
            Bytes::copy_from_slice(&data[payload_offset..])
        } else {
            Bytes::new()
        };

        Ok(TransportPacket {
            sync_byte,
            transport_error,
            payload_unit_start,
            transport_priority,
            pid,
            scrambling,
            adaptation_field_control: afc,
            continuity_counter,
            adaptation_field,
            payload,
        })
    }

    pub fn has_payload(&self) -> bool {
        !self.payload.is_empty()
    }

    pub fn is_null(&self) -> bool {
        self.pid == PID_NULL
    }

    /// PCR carried in this packet's adaptation field, in 27 MHz ticks.
    pub fn pcr(&self) -> Option<u64> {
        self.adaptation_field.as_ref()?.pcr()
    }
}
