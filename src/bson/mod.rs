//! BSON Codec Module
//!
//! Builder and lazy reader for the BSON document format.
//!
//! ## Wire Format
//! ```text
//! ┌───────────┬──────────────────────────────────────┬──────┐
//! │ int32 len │ (tag, cstring name, payload) repeated │ 0x00 │
//! └───────────┴──────────────────────────────────────┴──────┘
//! ```
//!
//! The length prefix counts itself and the trailing NUL. Field payloads are
//! tag-dictated; embedded documents and arrays are complete sub-documents
//! spliced in place (arrays use decimal-string keys "0", "1", ...).
//!
//! Building writes straight into a [`crate::rope::ByteRope`]; parsing
//! interprets a rope in place and only materializes the fields that are
//! asked for.

mod builder;
mod document;
mod object_id;
mod value;

pub use builder::{ArrayBuilder, DocumentBuilder};
pub use document::{BsonDocument, FieldIter};
pub use object_id::ObjectId;
pub use value::{tag, BsonValue};
