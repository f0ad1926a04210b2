//! # mongowire
//!
//! The core of a reactive, non-blocking MongoDB driver:
//! - Zero-copy BSON codec built on an immutable byte rope
//! - MongoDB wire-protocol framing with request/reply correlation
//! - Supervised per-endpoint connection pools with backpressure
//! - Server-side cursors exposed as demand-driven streams
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Driver                               │
//! │                 (config, one per process)                    │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ connect(endpoint)
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      Supervisor                              │
//! │        (pool, reconnect backoff, shutdown, acquire)          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │ Connection  │   ...    │ Connection  │
//!   │ (writer +   │          │ (writer +   │
//!   │  reader +   │          │  reader +   │
//!   │  in-flight) │          │  in-flight) │
//!   └──────┬──────┘          └─────────────┘
//!          │ frames (ByteRope)
//!          ▼
//!   ┌─────────────┐
//!   │   mongod    │
//!   └─────────────┘
//! ```
//!
//! Requests are encoded straight into rope chunks shared with the caller's
//! documents; replies are parsed in place on the received frame. Each
//! connection multiplexes many in-flight requests, correlating replies by
//! request id. Query results come back as [`cursor::CursorStream`]s that
//! fetch batches on demand and kill the server cursor on early drop.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod rope;
pub mod bson;
pub mod wire;
pub mod network;
pub mod cursor;
pub mod driver;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{DecodeError, EncodeError, MongoError, Result};
pub use config::Config;
pub use bson::{BsonDocument, BsonValue, DocumentBuilder, ObjectId};
pub use wire::{Message, Reply};
pub use network::{Connection, Endpoint, ReplyFuture, Supervisor};
pub use cursor::CursorStream;
pub use driver::Driver;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of mongowire
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
