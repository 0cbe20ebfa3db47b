pub const HEADER_LEN: usize = 14;
pub const ETHER_TYPE_RANGE: std::ops::Range<usize> = 12..14;
