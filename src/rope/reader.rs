//! Forward-only rope reader
//!
//! Cursored reads of the little-endian wire primitives over a [`ByteRope`],
//! without materializing the rope into a contiguous buffer.

use crate::error::DecodeError;

use super::ByteRope;

/// Forward-only cursor over a [`ByteRope`]
pub struct RopeReader<'a> {
    rope: &'a ByteRope,
    chunk: usize,
    offset: usize,
    pos: usize,
}

impl<'a> RopeReader<'a> {
    pub(crate) fn new(rope: &'a ByteRope) -> Self {
        RopeReader {
            rope,
            chunk: 0,
            offset: 0,
            pos: 0,
        }
    }

    /// Absolute position from the start of the rope
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.rope.len() - self.pos
    }

    fn fill(&mut self, buf: &mut [u8]) -> Result<(), DecodeError> {
        if self.remaining() < buf.len() {
            return Err(DecodeError::Truncated(self.pos));
        }
        let mut filled = 0;
        while filled < buf.len() {
            let chunk = self
                .rope
                .logical_chunk(self.chunk)
                .ok_or(DecodeError::Truncated(self.pos))?;
            let avail = &chunk[self.offset..];
            if avail.is_empty() {
                self.chunk += 1;
                self.offset = 0;
                continue;
            }
            let n = avail.len().min(buf.len() - filled);
            buf[filled..filled + n].copy_from_slice(&avail[..n]);
            filled += n;
            self.offset += n;
            self.pos += n;
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        let mut buf = [0u8; 1];
        self.fill(&mut buf)?;
        Ok(buf[0])
    }

    pub fn read_i32_le(&mut self) -> Result<i32, DecodeError> {
        let mut buf = [0u8; 4];
        self.fill(&mut buf)?;
        Ok(i32::from_le_bytes(buf))
    }

    pub fn read_i64_le(&mut self) -> Result<i64, DecodeError> {
        let mut buf = [0u8; 8];
        self.fill(&mut buf)?;
        Ok(i64::from_le_bytes(buf))
    }

    pub fn read_f64_le(&mut self) -> Result<f64, DecodeError> {
        let mut buf = [0u8; 8];
        self.fill(&mut buf)?;
        Ok(f64::from_le_bytes(buf))
    }

    /// Copy `n` bytes out of the rope
    pub fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>, DecodeError> {
        let mut buf = vec![0u8; n];
        self.fill(&mut buf)?;
        Ok(buf)
    }

    /// Take the next `n` bytes as a rope view sharing the underlying chunks
    pub fn read_slice(&mut self, n: usize) -> Result<ByteRope, DecodeError> {
        let view = self.rope.slice(self.pos, self.pos + n).map_err(|_| DecodeError::Truncated(self.pos))?;
        self.skip(n)?;
        Ok(view)
    }

    /// Advance past `n` bytes without copying
    pub fn skip(&mut self, n: usize) -> Result<(), DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::Truncated(self.pos));
        }
        let mut left = n;
        while left > 0 {
            let chunk = self
                .rope
                .logical_chunk(self.chunk)
                .ok_or(DecodeError::Truncated(self.pos))?;
            let avail = chunk.len() - self.offset;
            if avail == 0 {
                self.chunk += 1;
                self.offset = 0;
                continue;
            }
            let step = avail.min(left);
            self.offset += step;
            self.pos += step;
            left -= step;
        }
        Ok(())
    }

    /// Read bytes up to and including a NUL terminator. Invalid UTF-8 is
    /// replaced rather than failing, to keep framing intact on hostile input.
    pub fn read_cstring(&mut self) -> Result<String, DecodeError> {
        let mut bytes = Vec::new();
        loop {
            let b = self.read_u8()?;
            if b == 0 {
                break;
            }
            bytes.push(b);
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read an int32 length prefix (terminator included), the UTF-8 bytes,
    /// and the trailing NUL
    pub fn read_utf8_string(&mut self) -> Result<String, DecodeError> {
        let declared = self.read_i32_le()?;
        if declared < 1 {
            return Err(DecodeError::LengthMismatch {
                declared,
                available: self.remaining(),
            });
        }
        let bytes = self.read_bytes(declared as usize)?;
        if bytes[bytes.len() - 1] != 0 {
            return Err(DecodeError::LengthMismatch {
                declared,
                available: declared as usize,
            });
        }
        Ok(String::from_utf8_lossy(&bytes[..bytes.len() - 1]).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitives_across_chunk_boundary() {
        // Split an i32 across two chunks
        let mut rope = ByteRope::from_vec(vec![0x2a, 0x00]);
        rope.append_rope(ByteRope::from_vec(vec![0x00, 0x00]));

        let mut reader = rope.reader();
        assert_eq!(reader.read_i32_le().unwrap(), 42);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_truncated_read() {
        let rope = ByteRope::from_vec(vec![1, 2]);
        let mut reader = rope.reader();
        assert_eq!(
            reader.read_i32_le().unwrap_err(),
            DecodeError::Truncated(0)
        );
    }

    #[test]
    fn test_cstring_missing_terminator() {
        let rope = ByteRope::from_vec(b"abc".to_vec());
        let mut reader = rope.reader();
        assert!(matches!(
            reader.read_cstring().unwrap_err(),
            DecodeError::Truncated(_)
        ));
    }
}
