//! Wire Protocol Module
//!
//! MongoDB wire-protocol framing: request messages, reply decoding, and the
//! shared 16-byte header.
//!
//! ## Frame Format
//! ```text
//! ┌────────────┬───────────┬────────────┬──────────┬─────────────┐
//! │ msgLen (4) │ reqId (4) │ respTo (4) │ opCode(4)│    body     │
//! └────────────┴───────────┴────────────┴──────────┴─────────────┘
//! ```
//!
//! `messageLength` counts the whole frame including the header; every integer
//! is little-endian. Requests carry a fresh, process-unique request id;
//! replies echo it in `responseTo`.

mod codec;
mod message;
mod reply;

pub use codec::{encode_message, MsgHeader, HEADER_SIZE};
pub use message::{delete_flags, insert_flags, next_request_id, op_code, query_flags, update_flags, Message};
pub use reply::{reply_flags, Reply};
