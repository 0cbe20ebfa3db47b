use std::io::{Read, Seek, SeekFrom};

use pcap_parser::Linktype;

use super::error::PcapSourceError;
use super::layout;
use crate::source::FrameReadError;

/// Read the magic bytes and rewind the reader to the start.
///
/// # Examples
/// This helper is part of an internal module, so the example is marked as
/// text example.
/// ```text
/// use tracesift_core::source::pcap::reader::read_magic_and_rewind;
/// use std::io::Cursor;
///
/// let bytes = [0x0a, 0x0d, 0x0d, 0x0a, 0x01];
/// let mut cursor = Cursor::new(bytes);
/// let magic = read_magic_and_rewind(&mut cursor).unwrap();
/// assert_eq!(magic, [0x0a, 0x0d, 0x0d, 0x0a]);
/// ```
///
/// # Errors
/// Returns `PcapSourceError` when the reader cannot be read or rewound.
pub fn read_magic_and_rewind<R: Read + Seek>(reader: &mut R) -> Result<[u8; 4], PcapSourceError> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    reader.seek(SeekFrom::Start(0))?;
    Ok(magic)
}

/// Check whether the magic bytes match PCAPNG.
pub fn is_pcapng_magic(magic: &[u8; 4]) -> bool {
    magic == &layout::PCAPNG_MAGIC
}

/// Decimal digits carried by legacy pcap timestamps for a given magic number.
pub fn legacy_ts_digits(magic_number: u32) -> u8 {
    if layout::NANOSECOND_MAGICS.contains(&magic_number) {
        layout::NANOSECOND_DIGITS
    } else {
        layout::MICROSECOND_DIGITS
    }
}

/// Per-interface state announced by a pcapng interface description block.
#[derive(Debug, Clone, Copy)]
pub struct InterfaceInfo {
    pub linktype: Linktype,
    pub snaplen: u32,
    pub tsresol: u8,
    pub tsoffset: i64,
}

impl Default for InterfaceInfo {
    fn default() -> Self {
        Self {
            linktype: Linktype::ETHERNET,
            snaplen: 0,
            tsresol: layout::DEFAULT_TSRESOL,
            tsoffset: 0,
        }
    }
}

/// Resolve the interface for a given id, defaulting to Ethernet at
/// microsecond resolution.
///
/// # Examples
/// This helper is part of an internal module, so the example is marked as
/// text example.
/// ```text
/// use tracesift_core::source::pcap::reader::{InterfaceInfo, interface_for};
/// use pcap_parser::Linktype;
///
/// let raw = InterfaceInfo { linktype: Linktype::RAW, ..InterfaceInfo::default() };
/// assert_eq!(interface_for(&[raw], 0).linktype, Linktype::RAW);
/// assert_eq!(interface_for(&[raw], 1).linktype, Linktype::ETHERNET);
/// ```
pub fn interface_for(interfaces: &[InterfaceInfo], if_id: u32) -> InterfaceInfo {
    interfaces
        .get(if_id as usize)
        .copied()
        .unwrap_or_default()
}

/// Validate a record header's length fields.
///
/// A snap length of zero means "unknown" and is not enforced.
pub fn check_record_lengths(caplen: u32, origlen: u32, snaplen: u32) -> Result<(), FrameReadError> {
    if caplen > origlen {
        return Err(FrameReadError::LengthMismatch { caplen, origlen });
    }
    if snaplen != 0 && caplen > snaplen {
        return Err(FrameReadError::BeyondSnaplen { caplen, snaplen });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{
        InterfaceInfo, check_record_lengths, interface_for, is_pcapng_magic, legacy_ts_digits,
        read_magic_and_rewind,
    };
    use crate::source::FrameReadError;
    use crate::source::pcap::error::PcapSourceError;
    use pcap_parser::Linktype;
    use std::io::Cursor;
    use std::io::Read;

    #[test]
    fn detect_pcapng_magic() {
        let data = super::layout::PCAPNG_MAGIC;
        assert!(is_pcapng_magic(&data));
        assert!(!is_pcapng_magic(&[0xd4, 0xc3, 0xb2, 0xa1]));
    }

    #[test]
    fn read_magic_rewinds() {
        let bytes = [0x0a, 0x0d, 0x0d, 0x0a, 0x01];
        let mut cursor = Cursor::new(bytes);
        let magic = read_magic_and_rewind(&mut cursor).unwrap();
        assert_eq!(magic, [0x0a, 0x0d, 0x0d, 0x0a]);
        let mut buf = [0u8; 1];
        cursor.read_exact(&mut buf).unwrap();
        assert_eq!(buf[0], 0x0a);
    }

    #[test]
    fn read_magic_too_short() {
        let bytes = [0x0a, 0x0d, 0x0d];
        let mut cursor = Cursor::new(bytes);
        let err = read_magic_and_rewind(&mut cursor).unwrap_err();
        assert!(matches!(err, PcapSourceError::Io(_)));
    }

    #[test]
    fn legacy_digits_follow_magic() {
        assert_eq!(legacy_ts_digits(0xa1b2_c3d4), 6);
        assert_eq!(legacy_ts_digits(0xa1b2_3c4d), 9);
        assert_eq!(legacy_ts_digits(0x4d3c_b2a1), 9);
    }

    #[test]
    fn interface_defaults_to_ethernet_when_missing() {
        let raw = InterfaceInfo {
            linktype: Linktype::RAW,
            ..InterfaceInfo::default()
        };
        assert_eq!(interface_for(&[raw], 0).linktype, Linktype::RAW);
        let missing = interface_for(&[raw], 1);
        assert_eq!(missing.linktype, Linktype::ETHERNET);
        assert_eq!(missing.tsresol, 6);
    }

    #[test]
    fn record_lengths() {
        assert!(check_record_lengths(60, 60, 65535).is_ok());
        assert!(check_record_lengths(96, 1500, 96).is_ok());
        assert!(check_record_lengths(200, 200, 0).is_ok());
        assert_eq!(
            check_record_lengths(100, 60, 0),
            Err(FrameReadError::LengthMismatch {
                caplen: 100,
                origlen: 60
            })
        );
        assert_eq!(
            check_record_lengths(200, 1500, 96),
            Err(FrameReadError::BeyondSnaplen {
                caplen: 200,
                snaplen: 96
            })
        );
    }
}
