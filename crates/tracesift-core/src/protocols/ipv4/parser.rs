use std::net::Ipv4Addr;

use etherparse::IpNumber;

use super::layout;
use crate::protocols::common::{ByteReader, HeaderError};

/// Fixed IPv4 header fields plus the captured bytes of the datagram.
#[derive(Debug)]
pub struct Ipv4Header<'a> {
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
    pub tos: u8,
    pub protocol: IpNumber,
    /// Header length in bytes, as declared by IHL.
    pub header_len: usize,
    pub total_len: u16,
    pub fragment_offset: u16,
    packet: &'a [u8],
}

impl<'a> Ipv4Header<'a> {
    pub fn is_non_first_fragment(&self) -> bool {
        self.fragment_offset != 0
    }

    /// On-wire datagram length. Falls back to the captured length when the
    /// total-length field is smaller than the header itself.
    pub fn datagram_len(&self) -> usize {
        let total = usize::from(self.total_len);
        if total >= self.header_len {
            total
        } else {
            self.packet.len()
        }
    }

    /// Captured bytes after the IPv4 header, trimmed to the datagram length
    /// so link-layer padding is excluded.
    ///
    /// Returns `None` when the declared header extends past the capture.
    pub fn payload(&self) -> Option<&'a [u8]> {
        if self.header_len > self.packet.len() {
            return None;
        }
        let end = self.datagram_len().min(self.packet.len());
        self.packet.get(self.header_len..end.max(self.header_len))
    }

    /// On-wire length of the IPv4 payload, which may exceed `payload().len()`
    /// for snap-length-truncated captures.
    pub fn payload_wire_len(&self) -> usize {
        self.datagram_len().saturating_sub(self.header_len)
    }
}

pub fn parse_ipv4(packet: &[u8]) -> Result<Ipv4Header<'_>, HeaderError> {
    let reader = ByteReader::new(packet);
    reader.require_len(layout::MIN_HEADER_LEN)?;

    let version_ihl = reader.read_u8(layout::VERSION_IHL_OFFSET)?;
    let version = version_ihl >> 4;
    if version != layout::VERSION {
        return Err(HeaderError::InvalidVersion { version });
    }
    let ihl = version_ihl & 0x0f;
    let header_len = usize::from(ihl) * 4;
    if header_len < layout::MIN_HEADER_LEN {
        return Err(HeaderError::InvalidHeaderLength { ihl });
    }

    let flags_fragment = reader.read_u16_be(layout::FLAGS_FRAGMENT_RANGE)?;

    Ok(Ipv4Header {
        source: Ipv4Addr::from(reader.read_array::<4>(layout::SOURCE_RANGE)?),
        destination: Ipv4Addr::from(reader.read_array::<4>(layout::DESTINATION_RANGE)?),
        tos: reader.read_u8(layout::TOS_OFFSET)?,
        protocol: IpNumber(reader.read_u8(layout::PROTOCOL_OFFSET)?),
        header_len,
        total_len: reader.read_u16_be(layout::TOTAL_LENGTH_RANGE)?,
        fragment_offset: flags_fragment & layout::FRAGMENT_OFFSET_MASK,
        packet,
    })
}
