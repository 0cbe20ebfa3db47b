use etherparse::EtherType;

use super::layout;
use crate::protocols::common::{ByteReader, HeaderError};

/// Ethernet II header view: the EtherType and the bytes after the header.
#[derive(Debug)]
pub struct EthernetFrame<'a> {
    pub ether_type: EtherType,
    pub payload: &'a [u8],
}

pub fn parse_ethernet(frame: &[u8]) -> Result<EthernetFrame<'_>, HeaderError> {
    let reader = ByteReader::new(frame);
    reader.require_len(layout::HEADER_LEN)?;

    let ether_type = EtherType(reader.read_u16_be(layout::ETHER_TYPE_RANGE)?);
    let payload = reader.tail(layout::HEADER_LEN).unwrap_or_default();

    Ok(EthernetFrame {
        ether_type,
        payload,
    })
}
