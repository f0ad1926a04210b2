//! Byte Rope Module
//!
//! Immutable, chunked byte sequences with O(1) concatenation.
//!
//! ## Responsibilities
//! - Accumulate wire frames without copying between sub-buffers
//! - Share received frame bytes across document views
//! - Forward-only primitive readers for the little-endian wire types
//!
//! ## Layout
//! ```text
//! ┌────────────────────── ByteRope ──────────────────────┐
//! │ ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌──────────────┐ │
//! │ │ chunk 0 │ │ chunk 1 │ │ chunk 2 │ │ tail (open)  │ │
//! │ │ Arc<[u8]>│ │ Arc<[u8]>│ │ Arc<[u8]>│ │ Vec<u8>     │ │
//! │ └─────────┘ └─────────┘ └─────────┘ └──────────────┘ │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! Sealed chunks are reference-counted slices shared between ropes; the open
//! tail receives primitive writes and is sealed when another rope is spliced
//! in or when the rope is sliced.

mod reader;
#[allow(clippy::module_inception)]
mod rope;

pub use reader::RopeReader;
pub use rope::ByteRope;
