use super::layout;
use crate::protocols::common::{ByteReader, HeaderError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportHeader {
    pub source_port: u16,
    pub destination_port: u16,
    /// Header length in bytes (8 for UDP, data offset * 4 for TCP).
    pub header_len: usize,
}

pub fn parse_udp(segment: &[u8]) -> Result<TransportHeader, HeaderError> {
    let reader = ByteReader::new(segment);
    reader.require_len(layout::UDP_HEADER_LEN)?;
    read_ports(&reader, layout::UDP_HEADER_LEN)
}

pub fn parse_tcp(segment: &[u8]) -> Result<TransportHeader, HeaderError> {
    let reader = ByteReader::new(segment);
    reader.require_len(layout::TCP_MIN_HEADER_LEN)?;

    let offset = reader.read_u8(layout::TCP_DATA_OFFSET_OFFSET)? >> 4;
    if offset < layout::TCP_MIN_DATA_OFFSET {
        return Err(HeaderError::InvalidDataOffset { offset });
    }
    read_ports(&reader, usize::from(offset) * 4)
}

fn read_ports(reader: &ByteReader<'_>, header_len: usize) -> Result<TransportHeader, HeaderError> {
    Ok(TransportHeader {
        source_port: reader.read_u16_be(layout::SOURCE_PORT_RANGE)?,
        destination_port: reader.read_u16_be(layout::DESTINATION_PORT_RANGE)?,
        header_len,
    })
}
