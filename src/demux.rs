//! Packet stream utilities: sync search, PID grouping and section reassembly.

use std::collections::BTreeMap;

use log::debug;

use crate::constants::{TS_PACKET_SIZE, TS_SYNC_BYTE};
use crate::packet::TransportPacket;

/// Returns the first offset in `buffer[start..end]` holding a sync byte that is
/// followed by another one exactly 188 bytes later. A candidate whose packet
/// ends exactly at `end` has no partner to check and only needs its own sync byte.
pub fn find_sync_position(buffer: &[u8], start: usize, end: usize) -> Option<usize> {
    let end = end.min(buffer.len());
    let mut pos = start;
    while pos + TS_PACKET_SIZE <= end {
        let next = pos + TS_PACKET_SIZE;
        if buffer[pos] == TS_SYNC_BYTE && (next == end || buffer[next] == TS_SYNC_BYTE) {
            return Some(pos);
        }
        pos += 1;
    }
    None
}

/// Parses every packet in a raw capture, optionally keeping a single PID.
///
/// Sequential parsing starts at the first sync position. When a packet
/// boundary no longer carries the sync byte the parser searches forward for
/// the next sync position. A trailing partial packet is ignored.
pub fn parse_packets(buffer: &[u8], pid_filter: Option<u16>) -> Vec<TransportPacket> {
    let mut packets = Vec::with_capacity(buffer.len() / TS_PACKET_SIZE);
    let Some(mut pos) = find_sync_position(buffer, 0, buffer.len()) else {
        debug!("no sync position in {} bytes", buffer.len());
        return packets;
    };

    while pos + TS_PACKET_SIZE <= buffer.len() {
        match TransportPacket::parse(&buffer[pos..pos + TS_PACKET_SIZE]) {
            Ok(packet) => {
                if pid_filter.is_none_or(|pid| pid == packet.pid) {
                    packets.push(packet);
                }
                pos += TS_PACKET_SIZE;
            }
            Err(e) => {
                debug!("offset {pos}: {e}, resyncing");
                match find_sync_position(buffer, pos + 1, buffer.len()) {
                    Some(next) => pos = next,
                    None => break,
                }
            }
        }
    }
    packets
}

/// Splits a packet sequence per PID, keeping the original order inside each group.
pub fn group_by_pid(packets: &[TransportPacket]) -> BTreeMap<u16, Vec<&TransportPacket>> {
    let mut groups: BTreeMap<u16, Vec<&TransportPacket>> = BTreeMap::new();
    for packet in packets {
        groups.entry(packet.pid).or_default().push(packet);
    }
    groups
}

/// Concatenates the payloads of `pid` into section byte runs.
///
/// A run opens on every payload-unit-start packet. Its first payload byte is
/// the pointer field: that many following bytes close the previous run before
/// the new one begins. Continuation packets seen before the first start
/// packet are dropped.
pub fn reassemble_sections<'a, I>(packets: I, pid: u16) -> Vec<Vec<u8>>
where
    I: IntoIterator<Item = &'a TransportPacket>,
{
    let mut sections: Vec<Vec<u8>> = Vec::new();
    for packet in packets.into_iter().filter(|p| p.pid == pid && p.has_payload()) {
        let payload = &packet.payload[..];
        if packet.payload_unit_start {
            let pointer = payload[0] as usize;
            let split = (1 + pointer).min(payload.len());
            if let Some(open) = sections.last_mut() {
                open.extend_from_slice(&payload[1..split]);
            }
            sections.push(payload[split..].to_vec());
        } else if let Some(open) = sections.last_mut() {
            open.extend_from_slice(payload);
        }
    }
    sections
}

/// Splits a reassembled run holding several back-to-back sections. Stops at
/// stuffing (0xFF) or when a declared length runs past the data, in which case
/// the truncated remainder is kept as the last section.
pub fn split_sections(run: &[u8]) -> Vec<&[u8]> {
    let mut out = Vec::new();
    let mut rest = run;
    while rest.len() >= 3 && rest[0] != 0xFF {
        let section_length = (((rest[1] & 0x0F) as usize) << 8) | rest[2] as usize;
        let total = 3 + section_length;
        if total > rest.len() {
            out.push(rest);
            break;
        }
        let (section, tail) = rest.split_at(total);
        out.push(section);
        rest = tail;
    }
    out
}

/// First PCR found on `pid`, in 27 MHz ticks.
pub fn first_pcr(packets: &[TransportPacket], pid: u16) -> Option<u64> {
    packets.iter().filter(|p| p.pid == pid).find_map(TransportPacket::pcr)
}
