//! JSON reports for the command-line analyzer

use std::collections::BTreeMap;

use serde::Serialize;

use crate::constants::PID_NULL;
use crate::demux::first_pcr;
use crate::packet::{TransportPacket, pcr_seconds};
use crate::psi::pmt::stream_type_name;
use crate::si_cache::{ServiceEntry, SiCache};

/// Per-PID packet counters
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct PidSummary {
    pub pid:                u16,
    pub packets:            usize,
    pub payload_unit_starts: usize,
    pub scrambled:          usize,
    pub transport_errors:   usize,
    pub with_pcr:           usize,
}

/// JSON structure for one elementary stream (internal serialization)
#[derive(Serialize)]
struct StreamJson<'a> {
    pid:         u16,
    stream_type: u8,
    codec:       &'static str,
    kind:        crate::psi::StreamKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    language:    Option<&'a str>,
}

/// JSON structure for one service (internal serialization)
#[derive(Serialize)]
struct ServiceJson<'a> {
    program:      u16,
    name:         &'a str,
    provider:     &'a str,
    service_type: u8,
    free:         bool,
    pmt_pid:      u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pcr_pid:      Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pmt_version:  Option<u8>,
    streams:      Vec<StreamJson<'a>>,
}

#[derive(Serialize)]
struct ServicesJson<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    network:             Option<&'a str>,
    services:            Vec<ServiceJson<'a>>,
    unmatched_programs:  Vec<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PcrReport {
    pub pid:     u16,
    pub ticks:   u64,
    pub seconds: u64,
}

pub struct Reporter;

impl Reporter {
    /// Counts packets per PID, optionally for one PID only.
    pub fn packet_summary(packets: &[TransportPacket], pid: Option<u16>) -> Vec<PidSummary> {
        let mut by_pid: BTreeMap<u16, PidSummary> = BTreeMap::new();
        for p in packets.iter().filter(|p| pid.is_none_or(|f| f == p.pid)) {
            let s = by_pid.entry(p.pid).or_insert_with(|| PidSummary { pid: p.pid, ..Default::default() });
            s.packets += 1;
            s.payload_unit_starts += p.payload_unit_start as usize;
            s.scrambled += (p.scrambling != crate::packet::ScramblingControl::NotScrambled) as usize;
            s.transport_errors += p.transport_error as usize;
            s.with_pcr += p.pcr().is_some() as usize;
        }
        by_pid.into_values().collect()
    }

    /// First PCR of the capture, on `pid` or on the first PID that carries one.
    pub fn first_pcr(packets: &[TransportPacket], pid: Option<u16>) -> Option<PcrReport> {
        let pid = match pid {
            Some(pid) => pid,
            None => packets.iter().find(|p| p.pid != PID_NULL && p.pcr().is_some())?.pid,
        };
        let ticks = first_pcr(packets, pid)?;
        Some(PcrReport { pid, ticks, seconds: pcr_seconds(ticks) })
    }

    /// Service catalog: SDT names joined with PAT/PMT data.
    pub fn services_json(cache: &SiCache, pretty: bool) -> String {
        let entries = cache.services();
        let services = entries.iter().map(service_json).collect();
        let rep = ServicesJson {
            network: cache.nit.as_ref().map(|n| n.network_name.as_str()),
            services,
            unmatched_programs: cache.unmatched_programs(),
        };
        Self::to_json(&rep, pretty)
    }

    /// Serializes any report value, compact or indented.
    pub fn to_json<T: Serialize + ?Sized>(value: &T, pretty: bool) -> String {
        let out = if pretty { serde_json::to_string_pretty(value) } else { serde_json::to_string(value) };
        out.unwrap_or_else(|_| "{\"error\": \"JSON serialization failed\"}".to_string())
    }
}

fn service_json(entry: &ServiceEntry) -> ServiceJson<'_> {
    let svc = &entry.service;
    let streams = entry
        .pmt
        .iter()
        .flat_map(|pmt| pmt.streams.iter())
        .map(|s| StreamJson {
            pid:         s.pid,
            stream_type: s.stream_type,
            codec:       stream_type_name(s.stream_type),
            kind:        s.kind,
            language:    s.language(),
        })
        .collect();
    ServiceJson {
        program:      svc.program_number,
        name:         &svc.name,
        provider:     &svc.provider,
        service_type: svc.service_type.code(),
        free:         svc.free,
        pmt_pid:      entry.pmt_pid,
        pcr_pid:      entry.pmt.as_ref().map(|p| p.pcr_pid),
        pmt_version:  entry.pmt.as_ref().map(|p| p.header.version),
        streams,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demux::tests::{packet, packetize};
    use crate::psi::sdt::tests::{sdt_section, service_entry};
    use crate::psi::test_support::long_section;
    use hex_literal::hex;

    #[test]
    fn test_packet_summary() {
        let packets = vec![
            packet(0x100, true, 0, &[0]),
            packet(0x100, false, 1, &[1]),
            packet(0x000, true, 0, &[0]),
        ];
        let all = Reporter::packet_summary(&packets, None);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].pid, 0);
        assert_eq!(all[1].packets, 2);
        assert_eq!(all[1].payload_unit_starts, 1);

        let only = Reporter::packet_summary(&packets, Some(0));
        assert_eq!(only, vec![PidSummary { pid: 0, packets: 1, payload_unit_starts: 1, ..Default::default() }]);
    }

    #[test]
    fn test_first_pcr() {
        let mut raw = vec![0xFF; 188];
        raw[..12].copy_from_slice(&hex!("47 01 00 20 B7 10 00 00 0D B0 7E 4E"));
        let packets = vec![packet(0x100, true, 0, &[0]), TransportPacket::parse(&raw).unwrap()];

        let pcr = Reporter::first_pcr(&packets, None).unwrap();
        assert_eq!(pcr, PcrReport { pid: 0x100, ticks: 0x2014CE, seconds: 0 });
        assert!(Reporter::first_pcr(&packets, Some(0x200)).is_none());
    }

    #[test]
    fn test_services_json() {
        let mut packets = packetize(0, &[long_section(0x00, 1, 0, &hex!("01 0C E8 34"))]);
        packets.extend(packetize(0x11, &[sdt_section(&[service_entry(268, true, 0x1F, b"", b"CT1")])]));
        packets.extend(packetize(2100, &[long_section(0x02, 268, 3, &hex!("E8 35 F0 00  1B E8 35 F0 00"))]));
        let cache = SiCache::from_packets(&packets);

        let v: serde_json::Value = serde_json::from_str(&Reporter::services_json(&cache, false)).unwrap();
        assert_eq!(v["services"][0]["name"], "CT1");
        assert_eq!(v["services"][0]["pmt_pid"], 2100);
        assert_eq!(v["services"][0]["pmt_version"], 3);
        assert_eq!(v["services"][0]["streams"][0]["kind"], "Video");
        assert!(v.get("network").is_none());
        assert_eq!(v["unmatched_programs"], serde_json::json!([]));
    }
}
