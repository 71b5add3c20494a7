//! Bounded frame building and parsing

use crate::{HalError, HalResult};
use tracing::trace;

/// Append-only byte frame with a hard size limit.
///
/// Every write checks the cumulative length against the limit before touching
/// the buffer, so a rejected write leaves the frame exactly as it was.
#[derive(Debug, Clone)]
pub struct FrameBuilder {
    buffer: Vec<u8>,
    limit: usize,
}

impl FrameBuilder {
    pub fn new(limit: usize) -> Self {
        Self {
            buffer: Vec::new(),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.buffer.len())
    }

    /// Check that `additional` more bytes fit and reserve room for them.
    pub fn reserve(&mut self, additional: usize) -> HalResult<()> {
        let required = self
            .buffer
            .len()
            .checked_add(additional)
            .ok_or(HalError::FrameOverflow {
                required: usize::MAX,
                limit: self.limit,
            })?;
        if required > self.limit {
            trace!(required, limit = self.limit, "Frame write rejected");
            return Err(HalError::FrameOverflow {
                required,
                limit: self.limit,
            });
        }
        self.buffer
            .try_reserve(additional)
            .map_err(|_alloc| HalError::FrameAllocation(additional))?;
        Ok(())
    }

    pub fn write_u8(&mut self, value: u8) -> HalResult<&mut Self> {
        self.write_bytes(&[value])
    }

    pub fn write_u16_le(&mut self, value: u16) -> HalResult<&mut Self> {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_u32_le(&mut self, value: u32) -> HalResult<&mut Self> {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> HalResult<&mut Self> {
        self.reserve(data.len())?;
        self.buffer.extend_from_slice(data);
        Ok(self)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }
}

/// Cursor over a received frame.
#[derive(Debug)]
pub struct FrameParser<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> FrameParser<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    pub fn read_bytes(&mut self, count: usize) -> HalResult<&'a [u8]> {
        let end = self
            .position
            .checked_add(count)
            .filter(|end| *end <= self.buffer.len())
            .ok_or(HalError::FrameTruncated {
                wanted: count,
                remaining: self.remaining(),
            })?;
        let bytes = self
            .buffer
            .get(self.position..end)
            .ok_or(HalError::FrameTruncated {
                wanted: count,
                remaining: self.remaining(),
            })?;
        self.position = end;
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> HalResult<u8> {
        let [value] = self.read_array::<1>()?;
        Ok(value)
    }

    pub fn read_u16_le(&mut self) -> HalResult<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32_le(&mut self) -> HalResult<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    fn read_array<const N: usize>(&mut self) -> HalResult<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_builder_layout() -> HalResult<()> {
        let mut builder = FrameBuilder::new(16);

        builder
            .write_u8(0x01)?
            .write_u16_le(0x1234)?
            .write_u32_le(0x12345678)?
            .write_bytes(&[0xAA, 0xBB])?;

        assert_eq!(
            builder.into_inner(),
            vec![0x01, 0x34, 0x12, 0x78, 0x56, 0x34, 0x12, 0xAA, 0xBB]
        );
        Ok(())
    }

    #[test]
    fn test_frame_builder_rejects_overflow_without_writing() -> HalResult<()> {
        let mut builder = FrameBuilder::new(4);
        builder.write_bytes(&[1, 2, 3])?;

        let result = builder.write_u16_le(0xFFFF);
        assert_eq!(
            result.err(),
            Some(HalError::FrameOverflow {
                required: 5,
                limit: 4
            })
        );
        assert_eq!(builder.as_slice(), &[1, 2, 3]);
        assert_eq!(builder.remaining(), 1);
        Ok(())
    }

    #[test]
    fn test_frame_builder_exact_fit() -> HalResult<()> {
        let mut builder = FrameBuilder::new(4);
        builder.write_u32_le(0)?;
        assert_eq!(builder.remaining(), 0);
        assert!(matches!(
            builder.write_u8(0),
            Err(HalError::FrameOverflow { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_frame_parser_reads() -> HalResult<()> {
        let data = [0x01, 0x34, 0x12, 0x78, 0x56, 0x34, 0x12, 0xAA];
        let mut parser = FrameParser::new(&data);

        assert_eq!(parser.read_u8()?, 0x01);
        assert_eq!(parser.read_u16_le()?, 0x1234);
        assert_eq!(parser.read_u32_le()?, 0x12345678);
        assert_eq!(parser.read_bytes(1)?, &[0xAA]);
        assert!(parser.is_exhausted());
        Ok(())
    }

    #[test]
    fn test_frame_parser_truncated() {
        let data = [0x01, 0x02];
        let mut parser = FrameParser::new(&data);
        assert_eq!(
            parser.read_u32_le().err(),
            Some(HalError::FrameTruncated {
                wanted: 4,
                remaining: 2
            })
        );
        assert_eq!(parser.remaining(), 2);
    }
}
