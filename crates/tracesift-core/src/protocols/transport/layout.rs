pub const SOURCE_PORT_RANGE: std::ops::Range<usize> = 0..2;
pub const DESTINATION_PORT_RANGE: std::ops::Range<usize> = 2..4;

pub const UDP_HEADER_LEN: usize = 8;

pub const TCP_MIN_HEADER_LEN: usize = 20;
pub const TCP_DATA_OFFSET_OFFSET: usize = 12;
pub const TCP_MIN_DATA_OFFSET: u8 = 5;
