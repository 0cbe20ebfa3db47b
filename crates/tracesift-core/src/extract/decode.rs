use std::net::Ipv4Addr;

use etherparse::{EtherType, IpNumber};
use pcap_parser::Linktype;

use crate::protocols::HeaderError;
use crate::protocols::ethernet::parse_ethernet;
use crate::protocols::ipv4::{Ipv4Header, layout as ipv4_layout, parse_ipv4};
use crate::protocols::transport::{TransportHeader, parse_tcp, parse_udp};

/// DLT 228: bare IPv4 datagrams without a link-layer header.
const LINKTYPE_IPV4: Linktype = Linktype(228);

/// Header view of one frame, as far as it could be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedFrame {
    NotIpv4(NonIpv4),
    Ipv4(Ipv4Frame),
}

/// Why a frame carries no usable IPv4 header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NonIpv4 {
    /// Fewer bytes than an Ethernet header.
    ShortFrame,
    /// Any link-layer payload other than IPv4 (ARP, IPv6, 802.1Q, ...).
    EtherType(EtherType),
    /// EtherType announced IPv4 but the fixed header did not parse.
    MalformedIpv4(HeaderError),
    UnsupportedLinktype(i32),
}

impl NonIpv4 {
    pub fn is_ipv6(&self) -> bool {
        matches!(self, NonIpv4::EtherType(ether_type) if *ether_type == EtherType::IPV6)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4Frame {
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
    pub tos: u8,
    pub protocol: L4Protocol,
    pub transport: Transport,
}

impl Ipv4Frame {
    /// DSCP is the top six bits of the TOS byte.
    pub fn dscp(&self) -> u8 {
        self.tos >> ipv4_layout::DSCP_SHIFT
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum L4Protocol {
    Tcp,
    Udp,
    Other(u8),
}

impl From<IpNumber> for L4Protocol {
    fn from(value: IpNumber) -> Self {
        match value {
            IpNumber::TCP => L4Protocol::Tcp,
            IpNumber::UDP => L4Protocol::Udp,
            other => L4Protocol::Other(other.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    Ports(TransportPorts),
    /// TCP/UDP whose header could not be read.
    Missing(TransportGap),
    /// Protocol other than TCP/UDP.
    NotApplicable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportPorts {
    pub source_port: u16,
    pub destination_port: u16,
    pub payload_length: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportGap {
    /// The IHL-declared IPv4 header runs past the captured bytes.
    HeaderBeyondCapture,
    /// Non-first fragment: the transport header lives in another packet.
    Fragment,
    /// Fewer captured bytes than the fixed transport header.
    Truncated,
    InvalidDataOffset,
}

/// Decode one captured frame down to its transport ports.
///
/// Pure and total: every failure below the link-layer type check is folded
/// into the returned value.
pub fn decode_frame(linktype: Linktype, data: &[u8]) -> DecodedFrame {
    match linktype {
        Linktype::ETHERNET => decode_ethernet(data),
        Linktype::RAW | LINKTYPE_IPV4 => decode_raw_ip(data),
        other => DecodedFrame::NotIpv4(NonIpv4::UnsupportedLinktype(other.0)),
    }
}

fn decode_ethernet(data: &[u8]) -> DecodedFrame {
    let frame = match parse_ethernet(data) {
        Ok(frame) => frame,
        Err(_) => return DecodedFrame::NotIpv4(NonIpv4::ShortFrame),
    };
    if frame.ether_type != EtherType::IPV4 {
        return DecodedFrame::NotIpv4(NonIpv4::EtherType(frame.ether_type));
    }
    decode_ipv4(frame.payload)
}

fn decode_raw_ip(data: &[u8]) -> DecodedFrame {
    match data.first().map(|b| b >> 4) {
        Some(6) => DecodedFrame::NotIpv4(NonIpv4::EtherType(EtherType::IPV6)),
        _ => decode_ipv4(data),
    }
}

fn decode_ipv4(packet: &[u8]) -> DecodedFrame {
    let header = match parse_ipv4(packet) {
        Ok(header) => header,
        Err(err) => return DecodedFrame::NotIpv4(NonIpv4::MalformedIpv4(err)),
    };
    let protocol = L4Protocol::from(header.protocol);
    let transport = decode_transport(&header, protocol);

    DecodedFrame::Ipv4(Ipv4Frame {
        source: header.source,
        destination: header.destination,
        tos: header.tos,
        protocol,
        transport,
    })
}

fn decode_transport(header: &Ipv4Header<'_>, protocol: L4Protocol) -> Transport {
    let parse: fn(&[u8]) -> Result<TransportHeader, HeaderError> = match protocol {
        L4Protocol::Tcp => parse_tcp,
        L4Protocol::Udp => parse_udp,
        L4Protocol::Other(_) => return Transport::NotApplicable,
    };
    if header.is_non_first_fragment() {
        return Transport::Missing(TransportGap::Fragment);
    }
    let Some(segment) = header.payload() else {
        return Transport::Missing(TransportGap::HeaderBeyondCapture);
    };

    match parse(segment) {
        Ok(transport) => Transport::Ports(TransportPorts {
            source_port: transport.source_port,
            destination_port: transport.destination_port,
            payload_length: header
                .payload_wire_len()
                .saturating_sub(transport.header_len)
                .try_into()
                .unwrap_or(u32::MAX),
        }),
        Err(HeaderError::InvalidDataOffset { .. }) => {
            Transport::Missing(TransportGap::InvalidDataOffset)
        }
        Err(_) => Transport::Missing(TransportGap::Truncated),
    }
}
