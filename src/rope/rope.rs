//! ByteRope implementation
//!
//! Append-only builder producing an immutable chunked byte sequence.

use std::sync::Arc;

use crate::error::{DecodeError, EncodeError};

use super::RopeReader;

/// A sealed, shareable run of bytes
#[derive(Clone)]
struct Chunk {
    data: Arc<[u8]>,
    start: usize,
    end: usize,
}

impl Chunk {
    fn as_slice(&self) -> &[u8] {
        &self.data[self.start..self.end]
    }

    fn len(&self) -> usize {
        self.end - self.start
    }
}

/// An ordered byte sequence formed by concatenation of underlying chunks.
///
/// Appends go into a growable tail chunk; splicing another rope in with
/// [`ByteRope::append_rope`] shares that rope's sealed chunks without copying.
/// Slicing returns a view that shares chunks. Length is always the sum of
/// chunk lengths.
#[derive(Clone, Default)]
pub struct ByteRope {
    chunks: Vec<Chunk>,
    tail: Vec<u8>,
    len: usize,
}

impl ByteRope {
    /// Create an empty rope
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an owned buffer as a single sealed chunk
    pub fn from_vec(data: Vec<u8>) -> Self {
        let len = data.len();
        let data: Arc<[u8]> = Arc::from(data);
        ByteRope {
            chunks: vec![Chunk {
                data,
                start: 0,
                end: len,
            }],
            tail: Vec::new(),
            len,
        }
    }

    /// Total length in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    // -------------------------------------------------------------------------
    // Builder operations
    // -------------------------------------------------------------------------

    pub fn append_u8(&mut self, v: u8) {
        self.tail.push(v);
        self.len += 1;
    }

    pub fn append_i32_le(&mut self, v: i32) {
        self.tail.extend_from_slice(&v.to_le_bytes());
        self.len += 4;
    }

    pub fn append_i64_le(&mut self, v: i64) {
        self.tail.extend_from_slice(&v.to_le_bytes());
        self.len += 8;
    }

    pub fn append_f64_le(&mut self, v: f64) {
        self.tail.extend_from_slice(&v.to_le_bytes());
        self.len += 8;
    }

    pub fn append_bytes(&mut self, bytes: &[u8]) {
        self.tail.extend_from_slice(bytes);
        self.len += bytes.len();
    }

    /// Append a NUL-terminated string. Interior NUL bytes are rejected.
    pub fn append_cstring(&mut self, s: &str) -> Result<(), EncodeError> {
        if s.as_bytes().contains(&0) {
            return Err(EncodeError::InvalidFieldName);
        }
        self.tail.extend_from_slice(s.as_bytes());
        self.tail.push(0);
        self.len += s.len() + 1;
        Ok(())
    }

    /// Append an int32 length prefix (terminator included), the UTF-8 bytes,
    /// and a trailing NUL
    pub fn append_utf8_string(&mut self, s: &str) -> Result<(), EncodeError> {
        let prefixed = s.len() + 1;
        if prefixed > i32::MAX as usize {
            return Err(EncodeError::ValueTooLarge(s.len()));
        }
        self.append_i32_le(prefixed as i32);
        self.tail.extend_from_slice(s.as_bytes());
        self.tail.push(0);
        self.len += prefixed;
        Ok(())
    }

    /// Splice another rope onto the end, sharing its sealed chunks
    pub fn append_rope(&mut self, mut other: ByteRope) {
        self.seal_tail();
        other.seal_tail();
        self.len += other.len;
        self.chunks.append(&mut other.chunks);
    }

    fn seal_tail(&mut self) {
        if self.tail.is_empty() {
            return;
        }
        let data: Arc<[u8]> = Arc::from(std::mem::take(&mut self.tail));
        self.chunks.push(Chunk {
            start: 0,
            end: data.len(),
            data,
        });
    }

    // -------------------------------------------------------------------------
    // Views
    // -------------------------------------------------------------------------

    /// A sub-rope covering `[from, to)`, sharing sealed chunks. Bytes still in
    /// the open tail are copied into the view.
    pub fn slice(&self, from: usize, to: usize) -> Result<ByteRope, DecodeError> {
        if from > to || to > self.len {
            return Err(DecodeError::Truncated(self.len));
        }
        let mut out = ByteRope::new();
        let mut pos = 0usize;
        for chunk in &self.chunks {
            let clen = chunk.len();
            let cstart = pos;
            pos += clen;
            if pos <= from {
                continue;
            }
            if cstart >= to {
                return Ok(out);
            }
            let lo = from.saturating_sub(cstart);
            let hi = clen.min(to - cstart);
            out.chunks.push(Chunk {
                data: Arc::clone(&chunk.data),
                start: chunk.start + lo,
                end: chunk.start + hi,
            });
            out.len += hi - lo;
        }
        if !self.tail.is_empty() && pos < to {
            let cstart = pos;
            let lo = from.saturating_sub(cstart);
            let hi = (to - cstart).min(self.tail.len());
            out.tail.extend_from_slice(&self.tail[lo..hi]);
            out.len += hi - lo;
        }
        Ok(out)
    }

    /// Forward-only reader positioned at the start of the rope
    pub fn reader(&self) -> RopeReader<'_> {
        RopeReader::new(self)
    }

    /// Iterate the underlying chunk slices in order
    pub fn chunk_slices(&self) -> impl Iterator<Item = &[u8]> {
        self.chunks
            .iter()
            .map(|c| c.as_slice())
            .chain(if self.tail.is_empty() {
                None
            } else {
                Some(self.tail.as_slice())
            })
    }

    /// Copy the rope out into one contiguous buffer
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len);
        for slice in self.chunk_slices() {
            out.extend_from_slice(slice);
        }
        out
    }

    /// Chunk lookup by logical index (sealed chunks first, open tail last)
    pub(crate) fn logical_chunk(&self, idx: usize) -> Option<&[u8]> {
        if idx < self.chunks.len() {
            return Some(self.chunks[idx].as_slice());
        }
        if idx == self.chunks.len() && !self.tail.is_empty() {
            return Some(&self.tail);
        }
        None
    }
}

impl PartialEq for ByteRope {
    fn eq(&self, other: &Self) -> bool {
        if self.len != other.len {
            return false;
        }
        self.chunk_slices()
            .flatten()
            .eq(other.chunk_slices().flatten())
    }
}

impl Eq for ByteRope {}

impl From<&[u8]> for ByteRope {
    fn from(bytes: &[u8]) -> Self {
        ByteRope::from_vec(bytes.to_vec())
    }
}

impl std::fmt::Debug for ByteRope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ByteRope({} bytes, {} chunks)", self.len, self.chunks.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_rope_shares_chunks() {
        let inner = ByteRope::from_vec(vec![1, 2, 3]);
        let mut outer = ByteRope::new();
        outer.append_u8(0);
        outer.append_rope(inner.clone());
        outer.append_u8(4);

        assert_eq!(outer.to_vec(), vec![0, 1, 2, 3, 4]);
        assert_eq!(inner.to_vec(), vec![1, 2, 3]);
    }

    #[test]
    fn test_slice_spanning_chunks() {
        let mut rope = ByteRope::new();
        rope.append_bytes(b"abc");
        rope.append_rope(ByteRope::from_vec(b"defg".to_vec()));
        rope.append_bytes(b"hi");

        let view = rope.slice(2, 8).unwrap();
        assert_eq!(view.to_vec(), b"cdefgh");
        assert_eq!(view.len(), 6);
    }

    #[test]
    fn test_slice_out_of_range() {
        let rope = ByteRope::from_vec(vec![0; 4]);
        assert!(rope.slice(0, 5).is_err());
        assert!(rope.slice(3, 2).is_err());
    }
}
