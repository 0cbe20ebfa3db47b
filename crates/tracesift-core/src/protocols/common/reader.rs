use std::ops::Range;

use super::error::HeaderError;

/// Bounds-checked view over one header's bytes.
pub(crate) struct ByteReader<'a> {
    bytes: &'a [u8],
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    pub fn require_len(&self, needed: usize) -> Result<(), HeaderError> {
        if self.bytes.len() < needed {
            return Err(HeaderError::TooShort {
                needed,
                actual: self.bytes.len(),
            });
        }
        Ok(())
    }

    pub fn read_u8(&self, offset: usize) -> Result<u8, HeaderError> {
        self.bytes
            .get(offset)
            .copied()
            .ok_or(HeaderError::TooShort {
                needed: offset + 1,
                actual: self.bytes.len(),
            })
    }

    pub fn read_u16_be(&self, range: Range<usize>) -> Result<u16, HeaderError> {
        let bytes = self.read_array::<2>(range)?;
        Ok(u16::from_be_bytes(bytes))
    }

    pub fn read_array<const N: usize>(&self, range: Range<usize>) -> Result<[u8; N], HeaderError> {
        let slice = self.read_slice(range)?;
        slice.try_into().map_err(|_| HeaderError::TooShort {
            needed: N,
            actual: slice.len(),
        })
    }

    pub fn read_slice(&self, range: Range<usize>) -> Result<&'a [u8], HeaderError> {
        self.bytes
            .get(range.clone())
            .ok_or(HeaderError::TooShort {
                needed: range.end,
                actual: self.bytes.len(),
            })
    }

    /// Bytes from `offset` to the end, or `None` when `offset` is past the end.
    pub fn tail(&self, offset: usize) -> Option<&'a [u8]> {
        self.bytes.get(offset..)
    }
}

#[cfg(test)]
mod tests {
    use super::ByteReader;
    use crate::protocols::common::HeaderError;

    #[test]
    fn read_u16_be_ok() {
        let bytes = [0x08, 0x00, 0xff];
        let reader = ByteReader::new(&bytes);
        assert_eq!(reader.read_u16_be(0..2).unwrap(), 0x0800);
    }

    #[test]
    fn read_past_end_reports_needed_length() {
        let bytes = [0u8; 3];
        let reader = ByteReader::new(&bytes);
        let err = reader.read_u16_be(2..4).unwrap_err();
        assert_eq!(
            err,
            HeaderError::TooShort {
                needed: 4,
                actual: 3
            }
        );
    }

    #[test]
    fn tail_at_end_is_empty_and_past_end_is_none() {
        let bytes = [1u8, 2];
        let reader = ByteReader::new(&bytes);
        assert_eq!(reader.tail(2), Some(&[][..]));
        assert!(reader.tail(3).is_none());
    }
}
