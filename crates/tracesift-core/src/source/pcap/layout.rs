pub const PCAPNG_MAGIC: [u8; 4] = [0x0a, 0x0d, 0x0d, 0x0a];

/// Legacy pcap magic numbers announcing nanosecond timestamps, as read
/// little-endian from either byte order.
pub const NANOSECOND_MAGICS: [u32; 2] = [0xa1b2_3c4d, 0x4d3c_b2a1];

pub const MICROSECOND_DIGITS: u8 = 6;
pub const NANOSECOND_DIGITS: u8 = 9;

/// pcapng `if_tsresol` default: 10^-6 seconds.
pub const DEFAULT_TSRESOL: u8 = 6;

/// Large enough for a full 256 KiB snap length record.
pub const PCAP_READER_BUFFER_SIZE: usize = 512 * 1024;

/// Consecutive refills that fail to complete a record before the capture is
/// considered to end inside that record.
pub const MAX_STALLED_REFILLS: u8 = 2;
