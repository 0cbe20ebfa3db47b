use std::net::Ipv4Addr;

use serde::{Serialize, Serializer};

use super::decode::{DecodedFrame, L4Protocol, Transport};
use crate::source::{CaptureTime, RawFrame};

/// Column order of the per-trace CSV.
pub const CSV_HEADER: [&str; 8] = [
    "timestamp",
    "source_ip",
    "source_port",
    "destination_ip",
    "destination_port",
    "dscp",
    "tos",
    "payload_length",
];

/// One output row. Ports and payload length are absent when the transport
/// header could not be read, and serialize as `0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputRecord {
    pub timestamp: CaptureTime,
    pub source_ip: Ipv4Addr,
    #[serde(serialize_with = "zero_when_missing")]
    pub source_port: Option<u16>,
    pub destination_ip: Ipv4Addr,
    #[serde(serialize_with = "zero_when_missing")]
    pub destination_port: Option<u16>,
    pub dscp: u8,
    pub tos: u8,
    #[serde(serialize_with = "zero_when_missing")]
    pub payload_length: Option<u32>,
}

fn zero_when_missing<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Serialize + Default,
    S: Serializer,
{
    match value {
        Some(value) => value.serialize(serializer),
        None => T::default().serialize(serializer),
    }
}

/// Counter bucket a frame falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    NonIpv4 { ipv6: bool },
    Tcp,
    Udp,
    /// TCP/UDP frame whose transport details could not be extracted.
    Unprocessed,
    /// IPv4 with a protocol other than TCP/UDP.
    OtherIp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub record: Option<OutputRecord>,
    pub outcome: FrameOutcome,
}

/// Turn a decoded frame into at most one output row plus its counter bucket.
///
/// ```text
/// NotIpv4                     -> no row, NonIpv4
/// TCP/UDP with ports          -> full row, Tcp | Udp
/// TCP/UDP without ports       -> row with zeroed ports, Unprocessed
/// other IP protocol           -> no row, OtherIp
/// ```
pub fn extract_record(frame: &RawFrame, decoded: &DecodedFrame) -> Extraction {
    let ip = match decoded {
        DecodedFrame::NotIpv4(reason) => {
            return Extraction {
                record: None,
                outcome: FrameOutcome::NonIpv4 {
                    ipv6: reason.is_ipv6(),
                },
            };
        }
        DecodedFrame::Ipv4(ip) => ip,
    };

    let ports = match (&ip.transport, ip.protocol) {
        (_, L4Protocol::Other(_)) | (Transport::NotApplicable, _) => {
            return Extraction {
                record: None,
                outcome: FrameOutcome::OtherIp,
            };
        }
        (Transport::Ports(ports), _) => Some(*ports),
        (Transport::Missing(_), _) => None,
    };

    let outcome = match (ports, ip.protocol) {
        (Some(_), L4Protocol::Tcp) => FrameOutcome::Tcp,
        (Some(_), _) => FrameOutcome::Udp,
        (None, _) => FrameOutcome::Unprocessed,
    };

    Extraction {
        record: Some(OutputRecord {
            timestamp: frame.ts,
            source_ip: ip.source,
            source_port: ports.map(|p| p.source_port),
            destination_ip: ip.destination,
            destination_port: ports.map(|p| p.destination_port),
            dscp: ip.dscp(),
            tos: ip.tos,
            payload_length: ports.map(|p| p.payload_length),
        }),
        outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::{FrameOutcome, extract_record};
    use crate::extract::decode::{
        DecodedFrame, Ipv4Frame, L4Protocol, NonIpv4, Transport, TransportGap, TransportPorts,
    };
    use crate::source::{CaptureTime, RawFrame};
    use etherparse::EtherType;
    use pcap_parser::Linktype;
    use std::net::Ipv4Addr;

    fn raw() -> RawFrame {
        RawFrame {
            ts: CaptureTime::from_parts(1_000, 250_000, 6),
            linktype: Linktype::ETHERNET,
            data: Vec::new(),
        }
    }

    fn ip(protocol: L4Protocol, transport: Transport) -> DecodedFrame {
        DecodedFrame::Ipv4(Ipv4Frame {
            source: Ipv4Addr::new(10, 0, 0, 1),
            destination: Ipv4Addr::new(10, 0, 0, 2),
            tos: 0xb8,
            protocol,
            transport,
        })
    }

    #[test]
    fn full_tcp_record() {
        let decoded = ip(
            L4Protocol::Tcp,
            Transport::Ports(TransportPorts {
                source_port: 80,
                destination_port: 4000,
                payload_length: 512,
            }),
        );
        let extraction = extract_record(&raw(), &decoded);
        assert_eq!(extraction.outcome, FrameOutcome::Tcp);

        let record = extraction.record.unwrap();
        assert_eq!(record.source_port, Some(80));
        assert_eq!(record.destination_port, Some(4000));
        assert_eq!(record.payload_length, Some(512));
        assert_eq!(record.dscp, 46);
        assert_eq!(record.tos, 184);
        assert_eq!(record.timestamp.to_string(), "1000.250000");
    }

    #[test]
    fn missing_transport_is_unprocessed_but_written() {
        let decoded = ip(L4Protocol::Udp, Transport::Missing(TransportGap::Truncated));
        let extraction = extract_record(&raw(), &decoded);
        assert_eq!(extraction.outcome, FrameOutcome::Unprocessed);

        let record = extraction.record.unwrap();
        assert_eq!(record.source_ip, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(record.source_port, None);
        assert_eq!(record.payload_length, None);
    }

    #[test]
    fn other_protocol_is_not_written() {
        let decoded = ip(L4Protocol::Other(1), Transport::NotApplicable);
        let extraction = extract_record(&raw(), &decoded);
        assert_eq!(extraction.outcome, FrameOutcome::OtherIp);
        assert!(extraction.record.is_none());
    }

    #[test]
    fn non_ipv4_flags_ipv6() {
        let v6 = DecodedFrame::NotIpv4(NonIpv4::EtherType(EtherType::IPV6));
        let arp = DecodedFrame::NotIpv4(NonIpv4::EtherType(EtherType::ARP));

        assert_eq!(
            extract_record(&raw(), &v6).outcome,
            FrameOutcome::NonIpv4 { ipv6: true }
        );
        assert_eq!(
            extract_record(&raw(), &arp).outcome,
            FrameOutcome::NonIpv4 { ipv6: false }
        );
        assert!(extract_record(&raw(), &arp).record.is_none());
    }
}
