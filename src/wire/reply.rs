//! Reply decoding
//!
//! OP_REPLY bodies: response flags, cursor id, and the returned documents
//! sliced lazily out of the frame buffer.

use crate::bson::BsonDocument;
use crate::error::DecodeError;
use crate::rope::ByteRope;

/// REPLY responseFlags bits
pub mod reply_flags {
    pub const CURSOR_NOT_FOUND: i32 = 1;
    pub const QUERY_FAILURE: i32 = 2;
    pub const SHARD_CONFIG_STALE: i32 = 4;
    pub const AWAIT_CAPABLE: i32 = 8;
}

/// A decoded OP_REPLY
#[derive(Debug, Clone)]
pub struct Reply {
    pub response_flags: i32,
    /// 0 means the server holds no further data for this query
    pub cursor_id: i64,
    pub starting_from: i32,
    pub number_returned: i32,
    /// Views into the reply buffer, one per returned document
    pub documents: Vec<BsonDocument>,
}

impl Reply {
    /// Decode a REPLY body (the frame after its 16-byte header).
    ///
    /// Documents are sliced from the body rope without copying; their bytes
    /// stay shared with the received frame.
    pub fn decode(body: &ByteRope) -> Result<Reply, DecodeError> {
        let mut reader = body.reader();
        let response_flags = reader.read_i32_le()?;
        let cursor_id = reader.read_i64_le()?;
        let starting_from = reader.read_i32_le()?;
        let number_returned = reader.read_i32_le()?;

        if number_returned < 0 {
            return Err(DecodeError::LengthMismatch {
                declared: number_returned,
                available: reader.remaining(),
            });
        }

        // capacity bounded separately from the declared count, which is
        // untrusted input
        let mut documents = Vec::with_capacity(number_returned.min(64) as usize);
        for _ in 0..number_returned {
            let start = reader.position();
            let declared = reader.read_i32_le()?;
            if declared < 5 {
                return Err(DecodeError::LengthMismatch {
                    declared,
                    available: reader.remaining() + 4,
                });
            }
            reader.skip(declared as usize - 4)?;
            let doc = body.slice(start, start + declared as usize)?;
            documents.push(BsonDocument::from_rope(doc));
        }

        if reader.remaining() != 0 {
            return Err(DecodeError::LengthMismatch {
                declared: number_returned,
                available: reader.remaining(),
            });
        }

        Ok(Reply {
            response_flags,
            cursor_id,
            starting_from,
            number_returned,
            documents,
        })
    }

    pub fn is_cursor_not_found(&self) -> bool {
        self.response_flags & reply_flags::CURSOR_NOT_FOUND != 0
    }

    pub fn is_query_failure(&self) -> bool {
        self.response_flags & reply_flags::QUERY_FAILURE != 0
    }
}
