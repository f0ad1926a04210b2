//! Frame encoding
//!
//! Per-variant request encoding into a rope, and the shared header.

use crate::error::{DecodeError, EncodeError};
use crate::rope::{ByteRope, RopeReader};

use super::Message;

/// Fixed frame header size: four int32s
pub const HEADER_SIZE: usize = 16;

/// The 16-byte header shared by every frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsgHeader {
    /// Total frame size in bytes, header included
    pub message_length: i32,
    pub request_id: i32,
    pub response_to: i32,
    pub op_code: i32,
}

impl MsgHeader {
    pub fn encode(&self, rope: &mut ByteRope) {
        rope.append_i32_le(self.message_length);
        rope.append_i32_le(self.request_id);
        rope.append_i32_le(self.response_to);
        rope.append_i32_le(self.op_code);
    }

    pub fn decode(reader: &mut RopeReader<'_>) -> Result<Self, DecodeError> {
        Ok(MsgHeader {
            message_length: reader.read_i32_le()?,
            request_id: reader.read_i32_le()?,
            response_to: reader.read_i32_le()?,
            op_code: reader.read_i32_le()?,
        })
    }
}

/// Encode a request into a complete wire frame.
///
/// Document payloads are spliced in as shared rope chunks, so building a
/// frame never copies document bytes. Fails with `FrameTooLarge` when the
/// frame would exceed `max_frame_bytes`.
pub fn encode_message(
    message: &Message,
    request_id: i32,
    max_frame_bytes: usize,
) -> Result<ByteRope, EncodeError> {
    let mut body = ByteRope::new();

    match message {
        Message::Update {
            full_collection_name,
            flags,
            selector,
            update,
        } => {
            body.append_i32_le(0); // reserved
            body.append_cstring(full_collection_name)?;
            body.append_i32_le(*flags);
            body.append_rope(selector.rope().clone());
            body.append_rope(update.rope().clone());
        }
        Message::Insert {
            flags,
            full_collection_name,
            documents,
        } => {
            body.append_i32_le(*flags);
            body.append_cstring(full_collection_name)?;
            for doc in documents {
                body.append_rope(doc.rope().clone());
            }
        }
        Message::Query {
            flags,
            full_collection_name,
            number_to_skip,
            number_to_return,
            query,
            return_fields_selector,
        } => {
            body.append_i32_le(*flags);
            body.append_cstring(full_collection_name)?;
            body.append_i32_le(*number_to_skip);
            body.append_i32_le(*number_to_return);
            body.append_rope(query.rope().clone());
            if let Some(selector) = return_fields_selector {
                body.append_rope(selector.rope().clone());
            }
        }
        Message::GetMore {
            full_collection_name,
            number_to_return,
            cursor_id,
        } => {
            body.append_i32_le(0); // reserved
            body.append_cstring(full_collection_name)?;
            body.append_i32_le(*number_to_return);
            body.append_i64_le(*cursor_id);
        }
        Message::Delete {
            full_collection_name,
            flags,
            selector,
        } => {
            body.append_i32_le(0); // reserved
            body.append_cstring(full_collection_name)?;
            body.append_i32_le(*flags);
            body.append_rope(selector.rope().clone());
        }
        Message::KillCursors { cursor_ids } => {
            body.append_i32_le(0); // reserved
            body.append_i32_le(cursor_ids.len() as i32);
            for id in cursor_ids {
                body.append_i64_le(*id);
            }
        }
    }

    let total = HEADER_SIZE + body.len();
    if total > max_frame_bytes {
        return Err(EncodeError::FrameTooLarge {
            size: total,
            max: max_frame_bytes,
        });
    }

    let header = MsgHeader {
        message_length: total as i32,
        request_id,
        response_to: 0,
        op_code: message.op_code(),
    };

    let mut frame = ByteRope::new();
    header.encode(&mut frame);
    frame.append_rope(body);
    Ok(frame)
}
